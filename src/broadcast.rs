//! A fan-out channel: one value sent, every subscribed receiver gets a
//! clone of it.
//!
//! Used by the GC tracer pool (`gc::tracer`) to hand every tracer thread
//! the same `TraceJob` at the start of a collection without forcing the
//! pool to go through the work-stealing injector for something that isn't
//! actually stealable work -- every tracer must participate, not just
//! whichever one gets there first.

use parking_lot::{Condvar, Mutex};

struct Inner<T> {
    value: Option<T>,
    pending: usize,
    shutdown: bool,
}

pub struct Broadcast<T> {
    inner: Mutex<Inner<T>>,
    signal: Condvar,
}

impl<T: Clone> Broadcast<T> {
    pub fn new() -> Self {
        Broadcast {
            inner: Mutex::new(Inner {
                value: None,
                pending: 0,
                shutdown: false,
            }),
            signal: Condvar::new(),
        }
    }

    /// Publishes `value` to `subscribers` receivers.
    pub fn send(&self, subscribers: usize, value: T) {
        let mut inner = self.inner.lock();

        inner.value = Some(value);
        inner.pending = subscribers;

        self.signal.notify_all();
    }

    /// Blocks until a value is published or the channel is shut down,
    /// returning `None` in the latter case.
    pub fn recv(&self) -> Option<T> {
        let mut inner = self.inner.lock();

        loop {
            if inner.shutdown {
                return None;
            }

            if inner.pending > 0 {
                inner.pending -= 1;

                return inner.value.clone();
            }

            self.signal.wait(&mut inner);
        }
    }

    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();

        inner.shutdown = true;

        self.signal.notify_all();
    }
}

impl<T: Clone> Default for Broadcast<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_send_and_recv() {
        let broadcast = Arc::new(Broadcast::new());
        let mut handles = Vec::new();

        for _ in 0..4 {
            let broadcast = broadcast.clone();

            handles.push(thread::spawn(move || broadcast.recv()));
        }

        // Give every thread a chance to start waiting before publishing.
        thread::sleep(std::time::Duration::from_millis(10));
        broadcast.send(4, 42);

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some(42));
        }
    }

    #[test]
    fn test_shutdown_wakes_waiters() {
        let broadcast = Arc::new(Broadcast::<i32>::new());
        let waiter = broadcast.clone();
        let handle = thread::spawn(move || waiter.recv());

        thread::sleep(std::time::Duration::from_millis(10));
        broadcast.shutdown();

        assert_eq!(handle.join().unwrap(), None);
    }
}
