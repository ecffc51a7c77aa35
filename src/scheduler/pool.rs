//! A single work-stealing pool of `scheduler::worker::Worker` threads (4.D
//! Scheduler).
//!
//! Generalizes the teacher's `thread.rs`/`thread_pool.rs` duo -- a
//! condvar-guarded `Vec<RcProcess>` shared by every worker -- into a proper
//! work-stealing pool: each worker owns a private `crossbeam_deque::Worker`
//! queue, backed by a shared `Injector` that callers push onto, with
//! siblings able to steal from each other's queues when both are dry. Park
//! and wake-up still use the same condvar/flag pair the teacher's design
//! relied on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_deque::{Injector, Steal, Stealer, Worker as Deque};
use parking_lot::{Condvar, Mutex};
use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::process::RcProcess;
use crate::scheduler::worker::Worker;
use crate::vm::machine::Machine;

/// How long a parked worker waits before re-checking the stop flag, in case
/// a wakeup notification is lost to a race with shutdown.
const PARK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// State shared by every worker in a pool: the injector queue callers push
/// onto, each worker's stealer handle (for sibling work-stealing), and the
/// park/unpark handshake.
pub struct PoolState {
    pub global_queue: Injector<RcProcess>,
    pub stealers: Vec<Stealer<RcProcess>>,
    parked: Mutex<()>,
    wakeup: Condvar,
    should_stop: AtomicBool,
}

impl PoolState {
    fn new(stealers: Vec<Stealer<RcProcess>>) -> Self {
        PoolState {
            global_queue: Injector::new(),
            stealers,
            parked: Mutex::new(()),
            wakeup: Condvar::new(),
            should_stop: AtomicBool::new(false),
        }
    }

    /// Pushes `process` onto the shared queue and wakes at least one parked
    /// worker -- required whenever a process becomes runnable again (a
    /// message arrives, a timeout expires, the reactor reports readiness).
    pub fn schedule(&self, process: RcProcess) {
        self.global_queue.push(process);
        self.wakeup.notify_one();
    }

    fn stop(&self) {
        self.should_stop.store(true, Ordering::Release);
        self.wakeup.notify_all();
    }

    /// Blocks the calling worker until either new work appears on the
    /// shared queue or the pool is shutting down.
    pub fn park_until_work_or_stop(&self) -> Option<RcProcess> {
        loop {
            if self.should_stop.load(Ordering::Acquire) {
                return None;
            }

            let mut guard = self.parked.lock();

            if let Steal::Success(process) = self.global_queue.steal() {
                return Some(process);
            }

            if self.should_stop.load(Ordering::Acquire) {
                return None;
            }

            self.wakeup.wait_for(&mut guard, PARK_POLL_INTERVAL);
        }
    }

    /// A randomized steal order across siblings, matching 4.D's fairness
    /// requirement ("stealing targets are chosen randomly to avoid
    /// contention pile-ups") rather than a fixed declaration-order sweep.
    pub fn shuffled_stealers(&self) -> Vec<&Stealer<RcProcess>> {
        let mut order: Vec<&Stealer<RcProcess>> = self.stealers.iter().collect();

        order.shuffle(&mut thread_rng());
        order
    }
}

/// A pool of worker threads executing processes popped from a shared queue.
/// Construction (`new`) only builds the queues; `start` actually spawns the
/// OS threads, deferred so a `Machine` can be built from a `Pools` handle
/// before any worker exists to run it.
pub struct Pool {
    state: Arc<PoolState>,
    workers: Mutex<Vec<Worker>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Pool {
    pub fn new(threads: usize) -> Self {
        let threads = threads.max(1);
        let mut deques = Vec::with_capacity(threads);
        let mut stealers = Vec::with_capacity(threads);

        for _ in 0..threads {
            let deque = Deque::new_fifo();

            stealers.push(deque.stealer());
            deques.push(deque);
        }

        let state = Arc::new(PoolState::new(stealers));

        let workers = deques
            .into_iter()
            .enumerate()
            .map(|(id, deque)| Worker::new(id as u8, deque, state.clone()))
            .collect();

        Pool {
            state,
            workers: Mutex::new(workers),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn schedule(&self, process: RcProcess) {
        self.state.schedule(process);
    }

    /// Spawns the OS thread for every worker built by `new`. Only valid to
    /// call once per pool.
    pub fn start(&self, machine: Arc<Machine>) {
        let mut handles = self.handles.lock();

        for worker in self.workers.lock().drain(..) {
            handles.push(worker.start(machine.clone()));
        }
    }

    pub fn shutdown(&self) {
        self.state.stop();
    }

    /// Blocks until every worker thread has exited. Call `shutdown` first.
    pub fn join(&self) {
        for handle in self.handles.lock().drain(..) {
            let _ = handle.join();
        }
    }

    pub fn thread_count(&self) -> usize {
        self.state.stealers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_builds_one_stealer_per_worker() {
        let pool = Pool::new(4);

        assert_eq!(pool.thread_count(), 4);
        assert_eq!(pool.workers.lock().len(), 4);
    }

    #[test]
    fn test_new_clamps_to_at_least_one_thread() {
        let pool = Pool::new(0);

        assert_eq!(pool.thread_count(), 1);
    }

    #[test]
    fn test_schedule_before_start_queues_on_injector() {
        let pool = Pool::new(1);
        let code = crate::compiled_code::CompiledCode::with_rc(
            "a".to_string(),
            "a.aeon".to_string(),
            1,
            Vec::new(),
        );
        let process = crate::process::Process::from_code(
            1,
            code,
            crate::object_pointer::ObjectPointer::null(),
            crate::global_scope::GlobalScope::new(),
            crate::immix::global_allocator::GlobalAllocator::new(),
            &crate::config::Config::new(),
        );

        pool.schedule(process);

        assert!(matches!(pool.state.global_queue.steal(), Steal::Success(_)));
    }
}
