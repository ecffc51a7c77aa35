//! The background thread(s) that service `gc::request::Request`s.
//!
//! Grounded on the teacher's own `thread.rs` (a condvar-guarded work queue
//! the scheduler's worker pools are built from too, see
//! `scheduler/worker.rs`) generalized to run collections instead of
//! bytecode: the same wake-up/queue/should_stop shape, with the payload
//! replaced by a `Request` and the "work" replaced by a dispatch into
//! `gc::collector`.

use std::sync::Arc;
use std::thread;

use log::debug;
use parking_lot::{Condvar, Mutex};

use crate::gc::collector;
use crate::gc::request::{Generation, Request};
use crate::gc::tracer;
use crate::process::RcProcess;

/// Something that can put a process back to work once its collection has
/// finished. Scheduler pools implement this by pushing onto their own
/// work-stealing queue (`scheduler::pool::Pool::schedule`); kept as a plain
/// callback here so `gc::thread` doesn't need to depend on `scheduler`.
pub type Reschedule = Arc<dyn Fn(RcProcess) + Send + Sync>;

struct State {
    queue: Mutex<Vec<Request>>,
    wakeup: Condvar,
    should_stop: Mutex<bool>,
}

/// A single GC worker: a request queue plus a tracer pool shared by every
/// mature collection it runs.
pub struct Thread {
    state: Arc<State>,
    tracer_pool: tracer::Pool,
    reschedule: Reschedule,
}

impl Thread {
    pub fn new(tracer_threads: usize, reschedule: Reschedule) -> Self {
        Thread {
            state: Arc::new(State {
                queue: Mutex::new(Vec::new()),
                wakeup: Condvar::new(),
                should_stop: Mutex::new(false),
            }),
            tracer_pool: tracer::Pool::new(tracer_threads),
            reschedule,
        }
    }

    pub fn schedule(&self, request: Request) {
        self.state.queue.lock().push(request);
        self.state.wakeup.notify_all();
    }

    pub fn stop(&self) {
        *self.state.should_stop.lock() = true;
        self.state.wakeup.notify_all();
    }

    /// Spawns the thread that drains the queue, returning its join handle.
    pub fn start(self: Arc<Self>) -> thread::JoinHandle<()> {
        thread::spawn(move || self.run())
    }

    fn run(&self) {
        loop {
            let request = match self.pop() {
                Some(request) => request,
                None => return,
            };

            self.process_request(request);
        }
    }

    fn pop(&self) -> Option<Request> {
        let mut queue = self.state.queue.lock();

        loop {
            if let Some(request) = queue.pop() {
                return Some(request);
            }

            if *self.state.should_stop.lock() {
                return None;
            }

            self.state.wakeup.wait(&mut queue);
        }
    }

    fn process_request(&self, request: Request) {
        let process = request.process.clone();

        process.request_gc_suspension();

        let stats = match request.generation {
            Generation::Young => collector::collect_young(&process),
            Generation::Mature => collector::collect_mature(&process, &self.tracer_pool),
            Generation::Mailbox => {
                collector::collect_mailbox(&process);
                Default::default()
            }
        };

        debug!(
            "collected process {:?}: generation={:?} marked={} promoted={} evacuated={}",
            request.generation, request.generation, stats.marked, stats.promoted, stats.evacuated
        );

        process.reset_status();

        (self.reschedule)(process);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiled_code::CompiledCode;
    use crate::config::Config;
    use crate::global_scope::GlobalScope;
    use crate::immix::global_allocator::GlobalAllocator;
    use crate::object_pointer::ObjectPointer;
    use crate::process::Process;
    use parking_lot::Mutex as PlMutex;

    fn process() -> RcProcess {
        let code = CompiledCode::with_rc("main".to_string(), "main.aeon".to_string(), 1, Vec::new());

        Process::from_code(
            0,
            code,
            ObjectPointer::integer(1),
            GlobalScope::new(),
            GlobalAllocator::new(),
            &Config::new(),
        )
    }

    #[test]
    fn test_process_request_reschedules_process() {
        let rescheduled: Arc<PlMutex<Vec<RcProcess>>> = Arc::new(PlMutex::new(Vec::new()));
        let captured = rescheduled.clone();

        let thread = Thread::new(1, Arc::new(move |process: RcProcess| captured.lock().push(process)));
        let process = process();

        thread.process_request(Request::new(Generation::Young, process.clone()));

        assert_eq!(rescheduled.lock().len(), 1);
    }
}
