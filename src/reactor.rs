//! The I/O reactor and timer wheel (4.F Reactor & Timers).
//!
//! The retrieved teacher snapshot predates Aeon ever growing non-blocking
//! I/O, so there is no direct file to generalize here; this module is built
//! from the spec's own description using the same crate the rest of the
//! pack reaches for non-blocking sockets with: `mio`. It plays two roles:
//!
//! * A `mio::Poll`-backed registry processes can park a raw fd on, woken the
//!   next time that fd becomes readable/writable.
//! * The thread that actually drives `SuspensionList::process_expired()` and
//!   `wait()` -- nothing else in this port calls either, so without this
//!   thread a `ProcessSuspendCurrent`/`Sleep`/`ReceiveMessage` timeout would
//!   never fire.
//!
//! No bytecode instruction in 4.E currently registers a socket with the
//! reactor (the instruction set has no `SocketConnect`/`SocketAccept`
//! opcodes), so `register`/`deregister` are exercised only by this module's
//! own tests for now; the timer-wheel duty is live from the moment
//! `start` is called.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use mio::{Events, Interest, Poll, Token};
use parking_lot::Mutex;

use crate::process::RcProcess;
use crate::vm::state::RcState;

/// How long a single `Poll::poll` call blocks before checking the
/// suspension list again. Keeps `Sleep`/timeout resolution bounded even
/// while no fd is registered at all.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct Reactor {
    poll: Mutex<Poll>,
    registrations: Mutex<HashMap<Token, RcProcess>>,
    next_token: AtomicUsize,
    should_stop: AtomicBool,
}

impl Reactor {
    pub fn new() -> io::Result<Self> {
        Ok(Reactor {
            poll: Mutex::new(Poll::new()?),
            registrations: Mutex::new(HashMap::new()),
            next_token: AtomicUsize::new(0),
            should_stop: AtomicBool::new(false),
        })
    }

    /// Registers `source` for `interest`, parking `process` until it fires.
    /// The caller is responsible for having already suspended `process`.
    pub fn register<S>(
        &self,
        source: &mut S,
        process: RcProcess,
        interest: Interest,
    ) -> io::Result<Token>
    where
        S: mio::event::Source + ?Sized,
    {
        let token = Token(self.next_token.fetch_add(1, Ordering::Relaxed));

        self.poll.lock().registry().register(source, token, interest)?;
        self.registrations.lock().insert(token, process);

        Ok(token)
    }

    pub fn deregister<S>(&self, source: &mut S) -> io::Result<()>
    where
        S: mio::event::Source + ?Sized,
    {
        self.poll.lock().registry().deregister(source)
    }

    /// Spawns the background thread driving readiness events and the
    /// suspension list's timer wheel until `stop` is called.
    pub fn start(self: Arc<Self>, state: RcState) -> thread::JoinHandle<()> {
        thread::Builder::new()
            .name("aeon-reactor".to_string())
            .spawn(move || self.run(state))
            .expect("failed to spawn the reactor thread")
    }

    fn run(&self, state: RcState) {
        let mut events = Events::with_capacity(256);

        loop {
            if self.should_stop.load(Ordering::Acquire) {
                return;
            }

            {
                let mut poll = self.poll.lock();

                if let Err(error) = poll.poll(&mut events, Some(POLL_INTERVAL)) {
                    if error.kind() != io::ErrorKind::Interrupted {
                        log::warn!("reactor poll failed: {}", error);
                    }
                }
            }

            for event in events.iter() {
                let woken = self.registrations.lock().remove(&event.token());

                if let Some(process) = woken {
                    if process.acquire_rescheduling_rights().are_acquired() {
                        state.process_pools.schedule(process);
                    }
                }
            }

            for process in state.suspension_list.process_expired() {
                state.process_pools.schedule(process);
            }

            state.suspension_list.wait(POLL_INTERVAL);
        }
    }

    pub fn stop(&self) {
        self.should_stop.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_succeeds() {
        assert!(Reactor::new().is_ok());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let reactor = Reactor::new().unwrap();

        reactor.stop();
        reactor.stop();

        assert!(reactor.should_stop.load(Ordering::Acquire));
    }
}
