//! Virtual machine configuration.
//!
//! Defaults come from the host's CPU count and a handful of tuned constants;
//! every threshold can be overridden with an `AEON_*` environment variable so
//! deployments don't need to recompile the VM to tune it.

use log::warn;
use std::env;

const DEFAULT_YOUNG_THRESHOLD: u32 = 8 * 1024 * 1024;
const DEFAULT_MATURE_THRESHOLD: u32 = 16 * 1024 * 1024;
const DEFAULT_MAILBOX_THRESHOLD: u32 = 1024 * 1024;
const DEFAULT_REDUCTIONS: usize = 1000;
const DEFAULT_GROWTH_FACTOR: f64 = 1.5;

/// A virtual machine's configuration.
///
/// Fields are intentionally plain `Copy`-able values (no `Mutex`): the
/// configuration is read many times per second on hot paths and is fixed for
/// the lifetime of the process, so it's built once at boot and shared behind
/// an `Arc` on `vm::state::State`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of threads to use for the primary process pool.
    pub primary_threads: usize,

    /// Number of threads to use for the blocking process pool.
    pub blocking_threads: usize,

    /// Number of threads to use for the parallel GC tracer pool.
    pub gc_threads: usize,

    /// The number of reductions a process is granted per scheduling quantum.
    pub reductions: usize,

    /// Heap growth factor applied after a collection that didn't free enough
    /// space to drop back under the threshold.
    pub heap_growth_factor: f64,

    /// Number of young-space blocks allowed before a young collection is
    /// requested.
    pub young_threshold: u32,

    /// Number of mature-space blocks allowed before a mature collection is
    /// requested.
    pub mature_threshold: u32,

    /// Number of mailbox-heap blocks allowed before the mailbox heap is
    /// collected.
    pub mailbox_threshold: u32,
}

impl Config {
    pub fn new() -> Self {
        Config {
            primary_threads: num_cpus::get(),
            blocking_threads: num_cpus::get(),
            gc_threads: num_cpus::get(),
            reductions: DEFAULT_REDUCTIONS,
            heap_growth_factor: DEFAULT_GROWTH_FACTOR,
            young_threshold: DEFAULT_YOUNG_THRESHOLD,
            mature_threshold: DEFAULT_MATURE_THRESHOLD,
            mailbox_threshold: DEFAULT_MAILBOX_THRESHOLD,
        }
    }

    /// Builds a `Config` from compiled-in defaults overridden by any
    /// recognised `AEON_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::new();

        config.set_from_env_usize("AEON_CONCURRENCY", |c, v| c.primary_threads = v);
        config.set_from_env_usize("AEON_BLOCKING_THREADS", |c, v| {
            c.blocking_threads = v
        });
        config.set_from_env_usize("AEON_REDUCTIONS", |c, v| c.reductions = v);
        config.set_from_env_u32("AEON_YOUNG_HEAP_THRESHOLD", |c, v| {
            c.young_threshold = v
        });
        config.set_from_env_u32("AEON_MATURE_HEAP_THRESHOLD", |c, v| {
            c.mature_threshold = v
        });

        config
    }

    fn set_from_env_usize<F>(&mut self, name: &str, setter: F)
    where
        F: FnOnce(&mut Self, usize),
    {
        if let Some(value) = Self::read_env_value::<usize>(name) {
            setter(self, value);
        }
    }

    fn set_from_env_u32<F>(&mut self, name: &str, setter: F)
    where
        F: FnOnce(&mut Self, u32),
    {
        if let Some(value) = Self::read_env_value::<u32>(name) {
            setter(self, value);
        }
    }

    fn read_env_value<T>(name: &str) -> Option<T>
    where
        T: std::str::FromStr + PartialOrd + Default,
    {
        let raw = match env::var(name) {
            Ok(raw) => raw,
            Err(_) => return None,
        };

        match raw.parse::<T>() {
            Ok(value) if value > T::default() => Some(value),
            Ok(_) => {
                warn!("{} must be greater than zero, ignoring \"{}\"", name, raw);
                None
            }
            Err(_) => {
                warn!("{} is not a valid number: \"{}\"", name, raw);
                None
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_cpu_count() {
        let config = Config::new();

        assert!(config.primary_threads >= 1);
        assert!(config.blocking_threads >= 1);
        assert_eq!(config.reductions, DEFAULT_REDUCTIONS);
    }

    #[test]
    fn test_from_env_overrides_reductions() {
        env::set_var("AEON_REDUCTIONS", "42");

        let config = Config::from_env();

        assert_eq!(config.reductions, 42);

        env::remove_var("AEON_REDUCTIONS");
    }

    #[test]
    fn test_from_env_ignores_invalid_values() {
        env::set_var("AEON_REDUCTIONS", "not-a-number");

        let config = Config::from_env();

        assert_eq!(config.reductions, DEFAULT_REDUCTIONS);

        env::remove_var("AEON_REDUCTIONS");
    }

    #[test]
    fn test_from_env_ignores_zero() {
        env::set_var("AEON_REDUCTIONS", "0");

        let config = Config::from_env();

        assert_eq!(config.reductions, DEFAULT_REDUCTIONS);

        env::remove_var("AEON_REDUCTIONS");
    }
}
