//! Global, shared virtual machine state (4.G Process Table & Identifiers,
//! plus the handful of cross-process singletons the object model and
//! scheduler depend on).
//!
//! Grounded directly on Inko's own `vm::state::State`: a process table, the
//! worker pools, the permanent allocator, and a fixed set of named
//! prototypes threaded through every process so `ObjectPointer::prototype`
//! never has to allocate to answer "what is this value's type". Extended
//! with the `suspension_list` and interned-symbol pool the rest of this
//! port's process/attribute instructions depend on (9. Global mutable
//! state: both are on the explicit allow-list).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::gc::thread::{Reschedule, Thread as GcThread};
use crate::global_scope::{GlobalScope, RcGlobalScope};
use crate::immix::copy_object::CopyObject;
use crate::immix::global_allocator::{GlobalAllocator, RcGlobalAllocator};
use crate::immix::permanent_allocator::PermanentAllocator;
use crate::object_pointer::ObjectPointer;
use crate::object_value;
use crate::process::RcProcess;
use crate::process_table::ProcessTable;
use crate::reactor::Reactor;
use crate::scheduler::pools::Pools;
use crate::scheduler::suspension_list::SuspensionList;

pub type RcState = Arc<State>;

/// How the VM as a whole will exit once its processes have drained (4.H
/// Panic & Shutdown).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The main process returned normally.
    Success,
    /// Some process panicked; per 4.C this terminates the entire VM, not
    /// just the panicking process.
    Panic,
    /// An explicit program exit chose a status code.
    Code(i32),
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Panic => 1,
            ExitStatus::Code(code) => code,
        }
    }
}

/// State shared by every process and worker in one VM instance.
pub struct State {
    pub config: Config,

    /// Table mapping PIDs to live process handles (4.G).
    pub process_table: RwLock<ProcessTable<RcProcess>>,

    /// The primary/blocking scheduler pools.
    pub process_pools: Pools,

    /// The background collector dispatcher and its tracer pool (4.B).
    pub gc_thread: Arc<GcThread>,

    /// Processes parked on `receive_timeout`/`suspend`/blocked sends (4.D/4.F).
    pub suspension_list: SuspensionList,

    /// The mio-backed I/O poller and timer-wheel thread (4.F).
    pub reactor: Arc<Reactor>,

    /// When this VM instance started, used to answer `TimeMonotonic` without
    /// exposing the wall clock (which can jump backwards).
    pub start_time: Instant,

    /// The permanent memory allocator backing module singletons and interned
    /// symbols.
    pub permanent_allocator: Mutex<PermanentAllocator>,

    /// The block pool shared by every process heap.
    pub global_allocator: RcGlobalAllocator,

    /// Interned attribute/global symbol names, so two separately-allocated
    /// string literals with the same bytes resolve to the same permanent
    /// `ObjectPointer` identity (required since `Header` keys attributes by
    /// pointer equality, not string content).
    symbols: Mutex<HashMap<String, ObjectPointer>>,

    /// The single module-level global scope threaded through every context
    /// this VM instance loads (6. External Interfaces: Module table -- this
    /// port treats the whole bytecode image as one implicit module).
    pub globals: RcGlobalScope,

    /// How the VM should exit once draining is complete.
    pub exit_status: Mutex<ExitStatus>,

    pub top_level: ObjectPointer,
    pub integer_prototype: ObjectPointer,
    pub float_prototype: ObjectPointer,
    pub string_prototype: ObjectPointer,
    pub array_prototype: ObjectPointer,
    pub byte_array_prototype: ObjectPointer,
    pub block_prototype: ObjectPointer,
    pub generator_prototype: ObjectPointer,
    pub process_prototype: ObjectPointer,
    pub file_prototype: ObjectPointer,
    pub library_prototype: ObjectPointer,
    pub true_prototype: ObjectPointer,
    pub false_prototype: ObjectPointer,
    pub true_object: ObjectPointer,
    pub false_object: ObjectPointer,
}

impl State {
    pub fn new(config: Config) -> RcState {
        let global_allocator = GlobalAllocator::new();
        let mut perm_alloc = PermanentAllocator::new(global_allocator.clone());

        let top_level = perm_alloc.allocate_empty();

        let integer_prototype = perm_alloc.allocate_empty();
        let float_prototype = perm_alloc.allocate_empty();
        let string_prototype = perm_alloc.allocate_empty();
        let array_prototype = perm_alloc.allocate_empty();
        let byte_array_prototype = perm_alloc.allocate_empty();
        let block_prototype = perm_alloc.allocate_empty();
        let generator_prototype = perm_alloc.allocate_empty();
        let process_prototype = perm_alloc.allocate_empty();
        let file_prototype = perm_alloc.allocate_empty();
        let library_prototype = perm_alloc.allocate_empty();
        let true_prototype = perm_alloc.allocate_empty();
        let false_prototype = perm_alloc.allocate_empty();

        let true_object =
            perm_alloc.allocate_with_prototype(object_value::none(), true_prototype);
        let false_object =
            perm_alloc.allocate_with_prototype(object_value::none(), false_prototype);

        let process_pools = Pools::new(config.primary_threads, config.blocking_threads);

        let reschedule_pools = process_pools.clone();
        let reschedule: Reschedule =
            Arc::new(move |process| reschedule_pools.schedule(process));

        let gc_thread = Arc::new(GcThread::new(config.gc_threads, reschedule));
        let reactor = Arc::new(Reactor::new().expect("failed to create the I/O reactor"));

        Arc::new(State {
            config,
            process_table: RwLock::new(ProcessTable::new()),
            process_pools,
            gc_thread,
            suspension_list: SuspensionList::new(),
            reactor,
            start_time: Instant::now(),
            permanent_allocator: Mutex::new(perm_alloc),
            global_allocator,
            symbols: Mutex::new(HashMap::new()),
            globals: GlobalScope::new(),
            exit_status: Mutex::new(ExitStatus::Success),
            top_level,
            integer_prototype,
            float_prototype,
            string_prototype,
            array_prototype,
            byte_array_prototype,
            block_prototype,
            generator_prototype,
            process_prototype,
            file_prototype,
            library_prototype,
            true_prototype,
            false_prototype,
            true_object,
            false_object,
        })
    }

    /// Returns the canonical permanent pointer for `name`, allocating and
    /// interning a fresh one the first time this exact string is seen.
    /// Attribute and global lookups key on pointer identity, so every site
    /// using the "same" name must resolve to the same pointer regardless of
    /// which `SetString` instruction happened to produce it.
    pub fn intern(&self, name: &str) -> ObjectPointer {
        let mut symbols = self.symbols.lock();

        if let Some(existing) = symbols.get(name) {
            return *existing;
        }

        let pointer = self
            .permanent_allocator
            .lock()
            .allocate_with_prototype(object_value::string(name.to_string()), self.string_prototype);

        symbols.insert(name.to_string(), pointer);

        pointer
    }

    /// Copies `pointer` into the permanent space if it isn't already there.
    /// Used by `SetGlobal`, since globals may outlive and be read by any
    /// process (3. Invariant 2).
    pub fn promote_to_permanent(&self, pointer: ObjectPointer) -> ObjectPointer {
        if pointer.is_permanent() {
            pointer
        } else {
            self.permanent_allocator.lock().copy_object(pointer)
        }
    }

    pub fn set_panicked(&self) {
        let mut status = self.exit_status.lock();

        if *status == ExitStatus::Success {
            *status = ExitStatus::Panic;
        }
    }

    pub fn set_exit_code(&self, code: i32) {
        *self.exit_status.lock() = ExitStatus::Code(code);
    }

    pub fn exit_status(&self) -> ExitStatus {
        *self.exit_status.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_builds_permanent_singletons() {
        let state = State::new(Config::new());

        assert!(state.top_level.is_permanent());
        assert!(state.true_object.is_permanent());
        assert!(state.false_object.is_permanent());
        assert_ne!(state.true_object, state.false_object);
    }

    #[test]
    fn test_intern_returns_same_pointer_for_equal_strings() {
        let state = State::new(Config::new());

        let a = state.intern("foo");
        let b = state.intern("foo");
        let c = state.intern("bar");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_set_panicked_does_not_override_explicit_code() {
        let state = State::new(Config::new());

        state.set_exit_code(7);
        state.set_panicked();

        assert_eq!(state.exit_status().code(), 7);
    }
}
