//! Allocation used when copying an inbound message.
//!
//! Kept separate from a process' `LocalAllocator` because a message is
//! copied in by whichever thread is running the *sender*, while the
//! receiving process' own heap may be concurrently mutated by the thread
//! running the receiver. Giving messages their own small arena means the
//! copy never needs to take a lock on the receiver's live heap.

use crate::immix::bucket::Bucket;
use crate::immix::copy_object::CopyObject;
use crate::immix::global_allocator::RcGlobalAllocator;
use crate::object::Object;
use crate::object_pointer::ObjectPointer;

pub struct MailboxAllocator {
    bucket: Bucket,
    global_allocator: RcGlobalAllocator,
    threshold: u32,
}

impl MailboxAllocator {
    pub fn new(global_allocator: RcGlobalAllocator, threshold: u32) -> Self {
        MailboxAllocator {
            bucket: Bucket::new(),
            global_allocator,
            threshold,
        }
    }

    pub fn should_collect(&self) -> bool {
        self.bucket.block_count() as u32 >= self.threshold
    }

    pub fn block_count(&self) -> usize {
        self.bucket.block_count()
    }

    pub fn reset(&mut self) {
        self.bucket.reset();
    }

    pub fn global_allocator(&self) -> &RcGlobalAllocator {
        &self.global_allocator
    }
}

impl CopyObject for MailboxAllocator {
    fn allocate_copy(&mut self, object: Object) -> ObjectPointer {
        self.bucket.allocate(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::immix::global_allocator::GlobalAllocator;
    use crate::object_value;

    #[test]
    fn test_copy_object_allocates_into_mailbox_bucket() {
        let mut source = Bucket::new();
        let original = source.allocate(Object::new(object_value::integer(9)));

        let mut allocator = MailboxAllocator::new(GlobalAllocator::new(), 4);
        let copy = allocator.copy_object(original);

        assert_ne!(copy.raw.raw, original.raw.raw);
        assert_eq!(allocator.block_count(), 1);
    }
}
