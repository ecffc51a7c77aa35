//! A point in time at which a suspended process should be woken up even if
//! nothing else wakes it first (4.D suspend / receive-with-timeout).

use std::time::{Duration, Instant};

use crate::arc_without_weak::ArcWithoutWeak;

pub struct Timeout {
    resume_at: Instant,
}

impl Timeout {
    pub fn new(duration: Duration) -> Self {
        Timeout {
            resume_at: Instant::now() + duration,
        }
    }

    pub fn with_rc(duration: Duration) -> ArcWithoutWeak<Self> {
        ArcWithoutWeak::new(Self::new(duration))
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.resume_at
    }

    pub fn remaining(&self) -> Duration {
        self.resume_at
            .checked_duration_since(Instant::now())
            .unwrap_or(Duration::from_millis(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_expired() {
        let timeout = Timeout::new(Duration::from_millis(0));

        std::thread::sleep(Duration::from_millis(1));

        assert!(timeout.is_expired());
    }

    #[test]
    fn test_not_yet_expired() {
        let timeout = Timeout::new(Duration::from_secs(60));

        assert!(!timeout.is_expired());
        assert!(timeout.remaining() > Duration::from_secs(1));
    }
}
