//! Lightweight processes: an isolated heap, a mailbox, and the execution
//! context stack that together make up a single green thread (4. Processes).
//!
//! The status/Condvar handshake used for GC-suspension and joins is carried
//! over from the teacher's original design; the atomic, tagged-pointer
//! suspended-with-timeout state and the `LocalData` layout come from a later
//! snapshot of the same project
//! (`examples/other_examples/885d3210_inko-lang-inko__vm-src-process.rs.rs`)
//! that had already grown the mailbox and pinning machinery this spec needs.

use parking_lot::{Condvar, Mutex};
use std::cell::UnsafeCell;
use std::hash::{Hash, Hasher};
use std::mem;
use std::panic::RefUnwindSafe;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::arc_without_weak::ArcWithoutWeak;
use crate::binding::RcBinding;
use crate::block::Block;
use crate::compiled_code::RcCompiledCode;
use crate::config::Config;
use crate::execution_context::ExecutionContext;
use crate::global_scope::RcGlobalScope;
use crate::immix::global_allocator::RcGlobalAllocator;
use crate::immix::local_allocator::LocalAllocator;
use crate::mailbox::Mailbox;
use crate::object_pointer::{ObjectPointer, ObjectPointerPointer};
use crate::object_value;
use crate::process_table::PID;
use crate::scheduler::timeout::Timeout;
use crate::tagged_pointer::{self, TaggedPointer};

pub type RcProcess = ArcWithoutWeak<Process>;

/// The bit tagged onto `Process::suspended` to mark "this process is
/// suspended" (the pointer payload, possibly null, identifies the timeout).
const SUSPENDED_BIT: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// The process has been scheduled for execution.
    Scheduled,

    /// The process is running.
    Running,

    /// The process has been suspended.
    Suspended,

    /// The process has been suspended by the garbage collector.
    SuspendedByGc,

    /// The process ran into some kind of error during execution.
    Failed,

    /// The process has finished execution.
    Finished,
}

impl ProcessStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessStatus::Running)
    }

    /// The numeric encoding exposed to bytecode via `ProcessStatus`.
    pub fn as_integer(&self) -> u8 {
        match self {
            ProcessStatus::Scheduled => 0,
            ProcessStatus::Running => 1,
            ProcessStatus::Suspended => 2,
            ProcessStatus::SuspendedByGc => 3,
            ProcessStatus::Failed => 4,
            ProcessStatus::Finished => 5,
        }
    }
}

pub enum GcState {
    /// No collector activity is taking place.
    None,

    /// A collection has been scheduled.
    Scheduled,
}

/// The rights a thread was given when trying to reschedule a suspended
/// process.
pub enum RescheduleRights {
    /// The rescheduling rights were not obtained.
    Failed,

    /// The rescheduling rights were obtained, and the process had no
    /// timeout.
    Acquired,

    /// The rescheduling rights were obtained, and the process was using a
    /// timeout.
    AcquiredWithTimeout(ArcWithoutWeak<Timeout>),
}

impl RescheduleRights {
    pub fn are_acquired(&self) -> bool {
        !matches!(self, RescheduleRights::Failed)
    }
}

pub struct LocalData {
    /// The process-local memory allocator.
    pub allocator: LocalAllocator,

    /// The mailbox used for sending/receiving messages.
    pub mailbox: Mailbox,

    /// The execution context this process is currently running.
    pub context: Box<ExecutionContext>,

    /// The block to run in the event of an unrecovered panic, if one was
    /// registered.
    pub panic_handler: Option<ObjectPointer>,

    /// Whether this process is performing a blocking operation and should
    /// therefore run on the blocking pool.
    pub blocking: bool,

    /// Whether this is the program's main process. When the main process
    /// terminates, the whole program does too.
    pub main: bool,

    /// The worker this process is pinned to, if any (4.D pinning).
    pub thread_id: Option<u8>,

    /// The garbage collector's current activity for this process.
    pub gc_state: GcState,

    /// Set by the collector to request that this process suspend itself so
    /// it can be scanned and evacuated safely.
    pub suspend_for_gc: bool,
}

pub struct Process {
    /// This process' identifier.
    pub pid: PID,

    /// The status of this process, guarded by a lock so joiners can wait on
    /// changes via `status_signaler`.
    status: Mutex<ProcessStatus>,

    /// Signalled whenever `status` changes.
    status_signaler: Condvar,

    /// Data only ever touched by the single thread currently running this
    /// process -- except for the handful of methods below that take the
    /// necessary precautions (the mailbox uses its own internal locking).
    local_data: UnsafeCell<LocalData>,

    /// Set while this process is blocked in `receive` without a ready
    /// message, so a sender knows to wake the suspension list.
    waiting_for_message: AtomicBool,

    /// Non-null while this process is suspended. See `RescheduleRights` for
    /// how this is consumed.
    suspended: TaggedPointer<Timeout>,
}

unsafe impl Sync for LocalData {}
unsafe impl Send for LocalData {}
unsafe impl Sync for Process {}
impl RefUnwindSafe for Process {}

impl Process {
    pub fn with_rc(
        pid: PID,
        context: ExecutionContext,
        global_allocator: RcGlobalAllocator,
        config: &Config,
    ) -> RcProcess {
        let local_data = LocalData {
            allocator: LocalAllocator::new(
                global_allocator.clone(),
                config.young_threshold,
                config.mature_threshold,
            ),
            mailbox: Mailbox::new(global_allocator, config.mailbox_threshold),
            context: Box::new(context),
            panic_handler: None,
            blocking: false,
            main: false,
            thread_id: None,
            gc_state: GcState::None,
            suspend_for_gc: false,
        };

        ArcWithoutWeak::new(Process {
            pid,
            status: Mutex::new(ProcessStatus::Scheduled),
            status_signaler: Condvar::new(),
            local_data: UnsafeCell::new(local_data),
            waiting_for_message: AtomicBool::new(false),
            suspended: TaggedPointer::null(),
        })
    }

    pub fn from_block(
        pid: PID,
        block: &Block,
        globals: RcGlobalScope,
        global_allocator: RcGlobalAllocator,
        config: &Config,
    ) -> RcProcess {
        let context =
            ExecutionContext::with_object(block.receiver, block.code.clone(), None, globals);

        Process::with_rc(pid, context, global_allocator, config)
    }

    pub fn from_code(
        pid: PID,
        code: RcCompiledCode,
        self_obj: ObjectPointer,
        globals: RcGlobalScope,
        global_allocator: RcGlobalAllocator,
        config: &Config,
    ) -> RcProcess {
        let context = ExecutionContext::with_object(self_obj, code, None, globals);

        Process::with_rc(pid, context, global_allocator, config)
    }

    #[cfg_attr(feature = "cargo-clippy", allow(mut_from_ref))]
    pub fn local_data_mut(&self) -> &mut LocalData {
        unsafe { &mut *self.local_data.get() }
    }

    pub fn local_data(&self) -> &LocalData {
        unsafe { &*self.local_data.get() }
    }

    pub fn set_main(&self) {
        self.local_data_mut().main = true;
    }

    pub fn is_main(&self) -> bool {
        self.local_data().main
    }

    pub fn set_blocking(&self, value: bool) {
        self.local_data_mut().blocking = value;
    }

    pub fn is_blocking(&self) -> bool {
        self.local_data().blocking
    }

    pub fn thread_id(&self) -> Option<u8> {
        self.local_data().thread_id
    }

    /// Pins this process to `id`. A process already pinned to a different
    /// worker cannot be re-pinned; pinning to the worker it is already
    /// pinned to is a no-op (Open Question: pinning is ownership, not a
    /// counter -- see DESIGN.md).
    pub fn pin_to_thread(&self, id: u8) -> bool {
        match self.local_data().thread_id {
            Some(current) => current == id,
            None => {
                self.local_data_mut().thread_id = Some(id);
                true
            }
        }
    }

    /// Unpins this process, but only if `id` is the worker that currently
    /// owns the pin.
    pub fn unpin_from_thread(&self, id: u8) -> bool {
        if self.local_data().thread_id == Some(id) {
            self.local_data_mut().thread_id = None;
            true
        } else {
            false
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.thread_id().is_some()
    }

    pub fn suspend_with_timeout(&self, timeout: ArcWithoutWeak<Timeout>) {
        let pointer = ArcWithoutWeak::into_raw(timeout);
        let tagged = tagged_pointer::with_bit(pointer, SUSPENDED_BIT);

        self.suspended.atomic_store(tagged);
    }

    pub fn suspend_without_timeout(&self) {
        let tagged = tagged_pointer::with_bit(ptr::null_mut(), SUSPENDED_BIT);

        self.suspended.atomic_store(tagged);
    }

    /// Attempts to acquire the rights to reschedule this process.
    pub fn acquire_rescheduling_rights(&self) -> RescheduleRights {
        let current = self.suspended.atomic_load();

        if current.is_null() {
            return RescheduleRights::Failed;
        }

        if self.suspended.compare_and_swap(current, ptr::null_mut()) {
            let untagged = tagged_pointer::untagged(current);

            if untagged.is_null() {
                RescheduleRights::Acquired
            } else {
                let timeout = unsafe { ArcWithoutWeak::from_raw(untagged) };

                RescheduleRights::AcquiredWithTimeout(timeout)
            }
        } else {
            RescheduleRights::Failed
        }
    }

    pub fn push_context(&self, context: ExecutionContext) {
        let mut boxed = Box::new(context);
        let local_data = self.local_data_mut();

        mem::swap(&mut local_data.context, &mut boxed);
        local_data.context.set_parent(boxed);
    }

    /// Pops an execution context, returning `true` if this left the process
    /// at the top of its context stack.
    pub fn pop_context(&self) -> bool {
        let local_data = self.local_data_mut();

        if let Some(parent) = local_data.context.parent.take() {
            local_data.context = parent;
            false
        } else {
            true
        }
    }

    /// Detaches the current execution context from the stack and returns it,
    /// leaving its parent as the new current context. Used by
    /// `GeneratorYield` to park a suspended generator body without running
    /// its deferred blocks (a yield isn't a normal return or a panic, it's a
    /// pause -- the frame is still alive and will resume later).
    ///
    /// Panics if called at the top level; a generator body always has at
    /// least the `GeneratorResume` caller's context as a parent.
    pub fn take_context(&self) -> Box<ExecutionContext> {
        let local_data = self.local_data_mut();
        let parent = local_data
            .context
            .parent
            .take()
            .expect("take_context called with no parent context");

        mem::replace(&mut local_data.context, parent)
    }

    pub fn at_top_level(&self) -> bool {
        self.context().parent().is_none()
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.local_data().context
    }

    #[cfg_attr(feature = "cargo-clippy", allow(mut_from_ref))]
    pub fn context_mut(&self) -> &mut ExecutionContext {
        &mut self.local_data_mut().context
    }

    pub fn compiled_code(&self) -> RcCompiledCode {
        self.context().code.clone()
    }

    pub fn instruction_index(&self) -> usize {
        self.context().instruction_index
    }

    pub fn set_instruction_index(&self, index: usize) {
        self.context_mut().instruction_index = index;
    }

    pub fn binding(&self) -> RcBinding {
        self.context().binding()
    }

    pub fn self_object(&self) -> ObjectPointer {
        self.context().self_object()
    }

    pub fn get_register(&self, register: usize) -> Option<ObjectPointer> {
        self.local_data().context.get_register(register)
    }

    pub fn set_register(&self, register: usize, value: ObjectPointer) {
        self.local_data_mut().context.set_register(register, value);
    }

    pub fn set_local(&self, index: usize, value: ObjectPointer) {
        self.local_data_mut().context.set_local(index, value);
    }

    pub fn get_local(&self, index: usize) -> Result<ObjectPointer, String> {
        self.local_data().context.get_local(index)
    }

    pub fn local_exists(&self, index: usize) -> bool {
        self.local_data().context.binding.local_exists(index)
    }

    pub fn allocate_empty(&self) -> ObjectPointer {
        self.local_data_mut().allocator.allocate_empty()
    }

    pub fn allocate(
        &self,
        value: object_value::ObjectValue,
        proto: ObjectPointer,
    ) -> ObjectPointer {
        self.local_data_mut()
            .allocator
            .allocate_with_prototype(value, proto)
    }

    pub fn allocate_without_prototype(
        &self,
        value: object_value::ObjectValue,
    ) -> ObjectPointer {
        self.local_data_mut()
            .allocator
            .allocate_without_prototype(value)
    }

    /// Sends `message` to this process on behalf of `sender`. A message from
    /// a different process is deep-copied onto the mailbox heap; a message
    /// the process sends to itself is queued as-is.
    pub fn send_message(&self, sender: &RcProcess, message: ObjectPointer) {
        if self.identifier() == sender.identifier() {
            self.local_data().mailbox.send_from_self(message);
        } else {
            self.local_data().mailbox.send_from_external(message);
        }
    }

    /// Returns the oldest queued message, moving it out of the mailbox
    /// arena and into this process' own young generation if necessary.
    pub fn receive_message(&self) -> Option<ObjectPointer> {
        let (should_move, pointer) = self.local_data().mailbox.receive();

        pointer.map(|message| {
            if should_move {
                self.local_data_mut().allocator.move_object(message)
            } else {
                message
            }
        })
    }

    pub fn has_messages(&self) -> bool {
        self.local_data().mailbox.has_messages()
    }

    pub fn waiting_for_message(&self) {
        self.waiting_for_message.store(true, Ordering::Release);
    }

    pub fn no_longer_waiting_for_message(&self) {
        self.waiting_for_message.store(false, Ordering::Release);
    }

    pub fn is_waiting_for_message(&self) -> bool {
        self.waiting_for_message.load(Ordering::Acquire)
    }

    pub fn panic_handler(&self) -> Option<ObjectPointer> {
        self.local_data().panic_handler
    }

    pub fn set_panic_handler(&self, handler: ObjectPointer) {
        self.local_data_mut().panic_handler = Some(handler);
    }

    pub fn status_integer(&self) -> u8 {
        self.status.lock().as_integer()
    }

    pub fn should_be_rescheduled(&self) -> bool {
        matches!(*self.status.lock(), ProcessStatus::Suspended)
    }

    pub fn is_alive(&self) -> bool {
        !matches!(
            *self.status.lock(),
            ProcessStatus::Failed | ProcessStatus::Finished
        )
    }

    pub fn available_for_execution(&self) -> bool {
        matches!(
            *self.status.lock(),
            ProcessStatus::Scheduled | ProcessStatus::Suspended
        )
    }

    pub fn running(&self) {
        self.set_status(ProcessStatus::Running);
    }

    pub fn set_status(&self, new_status: ProcessStatus) {
        *self.status.lock() = new_status;
        self.status_signaler.notify_all();
    }

    /// Sets the process' status, unless the garbage collector had suspended
    /// it -- in which case that suspension is reported instead, and a
    /// pending GC suspension request is cleared.
    pub fn set_status_without_overwriting_gc_status(&self, new_status: ProcessStatus) {
        let mut status = self.status.lock();

        if matches!(*status, ProcessStatus::SuspendedByGc) {
            return;
        }

        let local_data = self.local_data_mut();

        if local_data.suspend_for_gc {
            local_data.suspend_for_gc = false;
            *status = ProcessStatus::SuspendedByGc;
        } else {
            *status = new_status;
        }

        self.status_signaler.notify_all();
    }

    pub fn finished(&self) {
        self.set_status_without_overwriting_gc_status(ProcessStatus::Finished);
    }

    pub fn suspend(&self) {
        self.set_status_without_overwriting_gc_status(ProcessStatus::Suspended);
    }

    pub fn suspended_by_gc(&self) -> bool {
        matches!(*self.status.lock(), ProcessStatus::SuspendedByGc)
    }

    pub fn request_gc_suspension(&self) {
        if !self.suspended_by_gc() {
            self.local_data_mut().suspend_for_gc = true;
        }

        self.wait_while_running();
    }

    pub fn wait_while_running(&self) {
        let mut status = self.status.lock();

        while status.is_running() {
            self.status_signaler.wait(&mut status);
        }
    }

    pub fn should_suspend_for_gc(&self) -> bool {
        self.suspended_by_gc() || self.local_data().suspend_for_gc
    }

    pub fn gc_scheduled(&self) {
        self.local_data_mut().gc_state = GcState::Scheduled;
    }

    pub fn should_schedule_gc(&self) -> bool {
        matches!(self.local_data().gc_state, GcState::None)
            && self.should_collect_young_generation()
    }

    pub fn should_collect_young_generation(&self) -> bool {
        self.local_data()
            .allocator
            .young_block_allocation_threshold_exceeded()
    }

    pub fn should_collect_mature_generation(&self) -> bool {
        self.local_data()
            .allocator
            .mature_block_allocation_threshold_exceeded()
    }

    pub fn should_collect_mailbox(&self) -> bool {
        self.local_data().mailbox.should_collect()
    }

    pub fn reset_status(&self) {
        self.set_status(ProcessStatus::Scheduled);
        self.local_data_mut().gc_state = GcState::None;
    }

    pub fn contexts(&self) -> Vec<&ExecutionContext> {
        self.context().contexts().collect()
    }

    /// Collects every root pointer reachable from this process: its
    /// execution-context stack (registers, bindings, deferred blocks) plus
    /// any globally-visible pointer such as a registered panic handler.
    pub fn roots(&self) -> Vec<ObjectPointerPointer> {
        let mut pointers = Vec::new();

        for context in self.context().contexts() {
            context.each_pointer(|pointer| pointers.push(pointer));
        }

        if let Some(handler) = self.panic_handler() {
            pointers.push(handler.pointer());
        }

        pointers
    }

    pub fn has_remembered_objects(&self) -> bool {
        self.local_data().allocator.has_remembered_objects()
    }

    /// Write barrier for tracking cross-generation writes.
    ///
    /// Based on the Steele write barrier: it tracks the object that is
    /// *written to*, not the object that is being written, so the
    /// remembered set only ever needs scanning, never updating on every
    /// store.
    pub fn write_barrier(&self, written_to: ObjectPointer, written: ObjectPointer) {
        if written_to.is_mature() && written.is_young() {
            self.local_data_mut().allocator.remember_object(written_to);
        }
    }

    pub fn increment_young_ages(&self) {
        self.local_data_mut().allocator.increment_young_ages();
    }

    pub fn identifier(&self) -> usize {
        self as *const Process as usize
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        // Reclaims and drops any still-pending timeout rather than
        // duplicating that cleanup logic here.
        self.acquire_rescheduling_rights();
    }
}

impl PartialEq for Process {
    fn eq(&self, other: &Process) -> bool {
        self.pid == other.pid
    }
}

impl Eq for Process {}

impl Hash for Process {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pid.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiled_code::CompiledCode;
    use crate::global_scope::GlobalScope;
    use crate::immix::global_allocator::GlobalAllocator;

    fn new_process() -> RcProcess {
        let code = CompiledCode::with_rc("a".to_string(), "a".to_string(), 1, Vec::new());
        let self_obj = ObjectPointer::null();
        let config = Config::new();

        Process::from_code(
            1,
            code,
            self_obj,
            GlobalScope::new(),
            GlobalAllocator::new(),
            &config,
        )
    }

    #[test]
    fn test_roots() {
        let process = new_process();
        let pointer = process.allocate_empty();

        process.set_local(0, pointer);
        process.set_register(0, pointer);

        assert!(process.roots().len() >= 2);
    }

    #[test]
    fn test_pin_and_unpin() {
        let process = new_process();

        assert!(process.pin_to_thread(1));
        assert!(process.pin_to_thread(1));
        assert!(!process.pin_to_thread(2));

        assert!(!process.unpin_from_thread(2));
        assert!(process.unpin_from_thread(1));
        assert!(!process.is_pinned());
    }

    #[test]
    fn test_send_and_receive_message_from_self() {
        let process = new_process();
        let message = process.allocate_empty();

        process.send_message(&process, message);

        let received = process.receive_message().unwrap();

        assert_eq!(received, message);
    }

    #[test]
    fn test_send_and_receive_message_from_external() {
        let sender = new_process();
        let receiver = new_process();
        let message = sender.allocate_empty();

        receiver.send_message(&sender, message);

        let received = receiver.receive_message().unwrap();

        assert!(received.is_young());
    }

    #[test]
    fn test_suspend_and_reacquire_rescheduling_rights() {
        let process = new_process();

        process.suspend_without_timeout();

        assert!(process.acquire_rescheduling_rights().are_acquired());
        assert!(!process.acquire_rescheduling_rights().are_acquired());
    }

    #[test]
    fn test_write_barrier_remembers_mature_to_young_writes() {
        let process = new_process();
        let mature = process
            .local_data_mut()
            .allocator
            .allocate_mature(crate::object::Object::new(object_value::none()));
        let young = process.allocate_empty();

        process.write_barrier(mature, young);

        assert!(process.has_remembered_objects());
    }
}
