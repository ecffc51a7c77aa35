//! A single worker thread belonging to a `scheduler::pool::Pool`.
//!
//! Generalizes the teacher's `thread.rs` (a condvar-guarded `Vec<RcProcess>`
//! with a `wake_up` flag) into a work-stealing queue: a worker drains its own
//! `crossbeam_deque::Worker` first, then the pool's shared `Injector`, then
//! its siblings' `Stealer`s, parking on the same condvar/flag pair as the
//! teacher's design whenever all three are dry.

use std::sync::Arc;
use std::thread;

use crossbeam_deque::{Steal, Stealer, Worker as Deque};
use log::{debug, error};

use crate::process::RcProcess;
use crate::scheduler::pool::PoolState;
use crate::vm::machine::Machine;

/// A worker pins itself to an index within its pool so bytecode-level
/// thread pinning (`pin_thread`/`unpin_thread`) has something stable to
/// refer to.
pub struct Worker {
    pub id: u8,
    queue: Deque<RcProcess>,
    state: Arc<PoolState>,
}

impl Worker {
    pub fn new(id: u8, queue: Deque<RcProcess>, state: Arc<PoolState>) -> Self {
        Worker { id, queue, state }
    }

    pub fn stealer(&self) -> Stealer<RcProcess> {
        self.queue.stealer()
    }

    /// Spawns the OS thread that runs this worker's loop until the pool is
    /// shut down, driving each popped process through `machine`.
    pub fn start(self, machine: Arc<Machine>) -> thread::JoinHandle<()> {
        thread::Builder::new()
            .name(format!("aeon-worker-{}", self.id))
            .spawn(move || self.run(machine))
            .expect("failed to spawn scheduler worker thread")
    }

    fn run(&self, machine: Arc<Machine>) {
        loop {
            let process = match self.pop() {
                Some(process) => process,
                None => return,
            };

            if process.is_pinned() && process.thread_id() != Some(self.id) {
                // Pinned to a different worker; hand it back to the pool so
                // its owner picks it up instead of looping on it forever.
                self.state.schedule(process);
                continue;
            }

            debug!("worker {} running a process", self.id);

            match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                machine.run(&process, self.id)
            })) {
                Ok(()) => {}
                Err(_) => {
                    error!("worker {} caught an unexpected panic running a process", self.id);
                }
            }
        }
    }

    fn pop(&self) -> Option<RcProcess> {
        if let Some(process) = self.queue.pop() {
            return Some(process);
        }

        loop {
            match self.state.global_queue.steal_batch_and_pop(&self.queue) {
                Steal::Success(process) => return Some(process),
                Steal::Retry => continue,
                Steal::Empty => break,
            }
        }

        for stealer in self.state.shuffled_stealers() {
            loop {
                match stealer.steal_batch_and_pop(&self.queue) {
                    Steal::Success(process) => return Some(process),
                    Steal::Retry => continue,
                    Steal::Empty => break,
                }
            }
        }

        self.state.park_until_work_or_stop()
    }
}
