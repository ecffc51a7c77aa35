//! The set of processes currently suspended, each optionally carrying a
//! `Timeout`. A background thread periodically calls `process_expired` to
//! reclaim any process whose timeout has elapsed or whose rescheduling
//! rights can otherwise be claimed (4.D suspend / receive-with-timeout).
//!
//! No single upstream file defines this type; it is built directly from the
//! `state.suspension_list.suspend(...)` / `.wake_up()` call sites in
//! `vm-src-vm-process.rs` together with the `acquire_rescheduling_rights`
//! mechanism already present on `Process`.

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

use crate::process::{RcProcess, RescheduleRights};
use crate::scheduler::timeout::Timeout;

pub struct SuspensionList {
    entries: Mutex<Vec<RcProcess>>,
    wakeup: Condvar,
}

impl SuspensionList {
    pub fn new() -> Self {
        SuspensionList {
            entries: Mutex::new(Vec::new()),
            wakeup: Condvar::new(),
        }
    }

    /// Suspends `process`, optionally until `timeout_ms` milliseconds have
    /// passed.
    pub fn suspend(&self, process: RcProcess, timeout_ms: Option<u64>) {
        if let Some(ms) = timeout_ms {
            process.suspend_with_timeout(Timeout::with_rc(Duration::from_millis(ms)));
        } else {
            process.suspend_without_timeout();
        }

        self.entries.lock().push(process);
        self.wakeup.notify_all();
    }

    /// Pokes the background thread into rescanning the list immediately,
    /// without waiting for the next poll interval. Used after delivering a
    /// message to a process that might be waiting on it indefinitely.
    pub fn wake_up(&self) {
        self.wakeup.notify_all();
    }

    /// Drains every process whose rescheduling rights could be claimed: those
    /// with an expired timeout, and those that were otherwise explicitly
    /// rescheduled (e.g. a message arrived for a no-timeout waiter).
    pub fn process_expired(&self) -> Vec<RcProcess> {
        let mut entries = self.entries.lock();
        let mut ready = Vec::new();
        let mut remaining = Vec::with_capacity(entries.len());

        for process in entries.drain(..) {
            match process.acquire_rescheduling_rights() {
                RescheduleRights::Failed => {
                    // No longer suspended on this list; someone else already
                    // claimed it (or it was never actually suspended).
                }
                RescheduleRights::Acquired => {
                    ready.push(process);
                }
                RescheduleRights::AcquiredWithTimeout(timeout) => {
                    if timeout.is_expired() {
                        ready.push(process);
                    } else {
                        process.suspend_with_timeout(timeout);
                        remaining.push(process);
                    }
                }
            }
        }

        *entries = remaining;

        ready
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Blocks the calling thread until either `poll_interval` elapses or
    /// `wake_up` is called, whichever comes first.
    pub fn wait(&self, poll_interval: Duration) {
        let mut entries = self.entries.lock();

        if entries.is_empty() {
            self.wakeup.wait_for(&mut entries, poll_interval);
        }
    }
}

impl Default for SuspensionList {
    fn default() -> Self {
        Self::new()
    }
}
