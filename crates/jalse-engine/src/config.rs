//! Engine configuration - tick rate, worker count and timing tunables
//!
//! All values have documented defaults; an absent tunable is never an error.
//! Durations are (de)serialized as whole milliseconds so configs stay
//! readable in RON:
//!
//! ```ron
//! (
//!     ticks_per_second: 20,
//!     worker_count: 4,
//!     spin_yield_threshold: 10,
//!     termination_timeout: 2000,
//! )
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default tick rate when none is configured
pub const DEFAULT_TICKS_PER_SECOND: u32 = 30;

/// Remaining wait below which the control loop spins instead of sleeping
pub const DEFAULT_SPIN_YIELD_THRESHOLD: Duration = Duration::from_millis(10);

/// How long `stop()` waits for in-flight work before abandoning workers
pub const DEFAULT_TERMINATION_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration for an engine
///
/// # Example
///
/// ```
/// use jalse_engine::EngineConfig;
/// use std::time::Duration;
///
/// let config = EngineConfig::with_ticks_per_second(10)
///     .with_worker_count(2)
///     .with_termination_timeout(Duration::from_millis(500));
///
/// assert_eq!(config.tick_interval(), Duration::from_millis(100));
/// assert_eq!(config.worker_count(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ideal number of ticks per second
    ticks_per_second: u32,
    /// Number of worker threads (thread-pool engines only)
    ///
    /// Defaults to `max_cores()`; never below one.
    worker_count: usize,
    /// Spin/yield window at the end of each tick
    #[serde(with = "millis")]
    spin_yield_threshold: Duration,
    /// Bounded wait for in-flight work on shutdown
    #[serde(with = "millis")]
    termination_timeout: Duration,
}

impl EngineConfig {
    /// Create a configuration with the given tick rate and defaults elsewhere
    pub fn with_ticks_per_second(ticks_per_second: u32) -> Self {
        Self {
            ticks_per_second,
            ..Self::default()
        }
    }

    /// Parse a configuration from a RON string
    ///
    /// Missing fields take their defaults. The result is validated.
    pub fn from_ron(content: &str) -> Result<Self> {
        let config: EngineConfig = ron::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the number of worker threads (at least one)
    pub fn with_worker_count(mut self, n: usize) -> Self {
        self.set_worker_count(n);
        self
    }

    /// Set the spin/yield threshold
    pub fn with_spin_yield_threshold(mut self, threshold: Duration) -> Self {
        self.spin_yield_threshold = threshold;
        self
    }

    /// Set the shutdown termination timeout
    pub fn with_termination_timeout(mut self, timeout: Duration) -> Self {
        self.termination_timeout = timeout;
        self
    }

    /// Configured ticks per second
    pub fn ticks_per_second(&self) -> u32 {
        self.ticks_per_second
    }

    /// Ideal interval between tick starts
    ///
    /// Returns zero for an invalid (zero) tick rate; `validate` rejects that.
    pub fn tick_interval(&self) -> Duration {
        if self.ticks_per_second == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(1_000_000_000 / self.ticks_per_second as u64)
        }
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Set the number of worker threads (at least one)
    ///
    /// The count may exceed the core count.
    pub fn set_worker_count(&mut self, n: usize) {
        self.worker_count = n.max(1);
    }

    /// Spin/yield threshold
    pub fn spin_yield_threshold(&self) -> Duration {
        self.spin_yield_threshold
    }

    /// Shutdown termination timeout
    pub fn termination_timeout(&self) -> Duration {
        self.termination_timeout
    }

    /// Check the configuration can drive an engine
    pub fn validate(&self) -> Result<()> {
        if self.ticks_per_second == 0 {
            return Err(Error::InvalidConfig(
                "ticks_per_second must be greater than zero".to_string(),
            ));
        }
        if self.worker_count == 0 {
            return Err(Error::InvalidConfig(
                "worker_count must be at least one".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            worker_count: max_cores(),
            spin_yield_threshold: DEFAULT_SPIN_YIELD_THRESHOLD,
            termination_timeout: DEFAULT_TERMINATION_TIMEOUT,
        }
    }
}

/// Get the maximum available cores on this system
///
/// This uses the `num_cpus` crate to detect the number of logical CPUs.
pub fn max_cores() -> usize {
    num_cpus::get()
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
