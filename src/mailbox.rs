//! The inbox attached to every process (4.C Mailbox & message passing).
//!
//! Messages sent by another process are deep-copied onto a small arena
//! (`MailboxAllocator`) owned by the mailbox itself, so the sender never
//! touches the receiver's live heap. Messages a process sends to itself
//! already live on its own heap and are queued without copying.

use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::immix::copy_object::CopyObject;
use crate::immix::global_allocator::RcGlobalAllocator;
use crate::immix::mailbox_allocator::MailboxAllocator;
use crate::object_pointer::ObjectPointer;

enum Message {
    /// A message copied in from another process' heap.
    External(ObjectPointer),

    /// A message sent by the process to itself; no copy was needed.
    Internal(ObjectPointer),
}

pub struct Mailbox {
    queue: Mutex<VecDeque<Message>>,
    allocator: Mutex<MailboxAllocator>,
}

impl Mailbox {
    pub fn new(global_allocator: RcGlobalAllocator, threshold: u32) -> Self {
        Mailbox {
            queue: Mutex::new(VecDeque::new()),
            allocator: Mutex::new(MailboxAllocator::new(global_allocator, threshold)),
        }
    }

    /// Copies `message` onto the mailbox heap and queues it. Used when the
    /// sender is a different process.
    pub fn send_from_external(&self, message: ObjectPointer) {
        let copy = self.allocator.lock().copy_object(message);

        self.queue.lock().push_back(Message::External(copy));
    }

    /// Queues `message` without copying. Used when a process sends a message
    /// to itself, since the pointer already lives on its own heap.
    pub fn send_from_self(&self, message: ObjectPointer) {
        self.queue.lock().push_back(Message::Internal(message));
    }

    /// Pops the oldest message, if any. The returned boolean indicates
    /// whether the pointer still lives on the mailbox heap and must be moved
    /// into the process' local heap before use.
    pub fn receive(&self) -> (bool, Option<ObjectPointer>) {
        match self.queue.lock().pop_front() {
            Some(Message::External(pointer)) => (true, Some(pointer)),
            Some(Message::Internal(pointer)) => (false, Some(pointer)),
            None => (false, None),
        }
    }

    pub fn has_messages(&self) -> bool {
        !self.queue.lock().is_empty()
    }

    pub fn should_collect(&self) -> bool {
        self.allocator.lock().should_collect()
    }

    pub fn block_count(&self) -> usize {
        self.allocator.lock().block_count()
    }

    pub fn reset_allocator(&self) {
        self.allocator.lock().reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::immix::global_allocator::GlobalAllocator;
    use crate::object::Object;
    use crate::object_value;

    fn mailbox() -> Mailbox {
        Mailbox::new(GlobalAllocator::new(), 4)
    }

    #[test]
    fn test_send_from_external_copies_and_flags_for_move() {
        let inbox = mailbox();
        let mut source = crate::immix::bucket::Bucket::new();
        let original = source.allocate(Object::new(object_value::integer(42)));

        inbox.send_from_external(original);

        let (should_copy, received) = inbox.receive();

        assert!(should_copy);
        assert_ne!(received.unwrap().raw.raw, original.raw.raw);
    }

    #[test]
    fn test_send_from_self_does_not_copy() {
        let inbox = mailbox();
        let mut source = crate::immix::bucket::Bucket::new();
        let original = source.allocate(Object::new(object_value::integer(7)));

        inbox.send_from_self(original);

        let (should_copy, received) = inbox.receive();

        assert!(!should_copy);
        assert_eq!(received.unwrap(), original);
    }

    #[test]
    fn test_receive_empty_mailbox() {
        let inbox = mailbox();

        assert!(!inbox.has_messages());
        assert_eq!(inbox.receive(), (false, None));
    }

    #[test]
    fn test_has_messages() {
        let inbox = mailbox();
        let mut source = crate::immix::bucket::Bucket::new();
        let original = source.allocate(Object::new(object_value::integer(1)));

        inbox.send_from_self(original);

        assert!(inbox.has_messages());
    }
}
