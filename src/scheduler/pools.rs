//! The primary/blocking pool split (4.D Scheduler, "Migration").
//!
//! Two independent `Pool`s share nothing but the processes that move
//! between them: the primary pool runs ordinary, CPU-bound work; the
//! blocking pool runs processes that called `set_blocking(true)` (FFI calls,
//! synchronous I/O) so a slow syscall never starves the primary pool's
//! workers.

use std::sync::Arc;

use crate::process::RcProcess;
use crate::scheduler::pool::Pool;
use crate::vm::machine::Machine;

#[derive(Clone)]
pub struct Pools {
    pub primary: Arc<Pool>,
    pub blocking: Arc<Pool>,
}

impl Pools {
    pub fn new(primary_threads: usize, blocking_threads: usize) -> Self {
        Pools {
            primary: Arc::new(Pool::new(primary_threads)),
            blocking: Arc::new(Pool::new(blocking_threads)),
        }
    }

    pub fn start(&self, machine: Arc<Machine>) {
        self.primary.start(machine.clone());
        self.blocking.start(machine);
    }

    /// Schedules `process` on whichever pool its `blocking` flag currently
    /// selects.
    pub fn schedule(&self, process: RcProcess) {
        if process.is_blocking() {
            self.blocking.schedule(process);
        } else {
            self.primary.schedule(process);
        }
    }

    pub fn shutdown(&self) {
        self.primary.shutdown();
        self.blocking.shutdown();
    }

    pub fn join(&self) {
        self.primary.join();
        self.blocking.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_builds_both_pools() {
        let pools = Pools::new(2, 1);

        assert_eq!(pools.primary.thread_count(), 2);
        assert_eq!(pools.blocking.thread_count(), 1);
    }
}
