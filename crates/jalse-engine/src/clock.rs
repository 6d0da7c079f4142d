//! Clock sources for the tick loop
//!
//! Engine time is a monotonic [`Duration`] since the clock's origin. The
//! control loop never calls `std::time` directly so tests can substitute a
//! [`ManualClock`] and run the scheduler deterministically.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Time source used by the engine
pub trait Clock: Send + Sync + fmt::Debug {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;

    /// Block the calling thread for roughly `duration`
    fn sleep(&self, duration: Duration);

    /// Block until `deadline` using a coarse sleep followed by a spin/yield
    ///
    /// The final `spin_threshold` of the wait is spent yielding to absorb
    /// OS sleep granularity.
    fn park_until(&self, deadline: Duration, spin_threshold: Duration) {
        let now = self.now();
        if deadline <= now {
            return;
        }
        let remaining = deadline - now;
        if remaining > spin_threshold {
            self.sleep(remaining - spin_threshold);
        }
        while self.now() < deadline {
            thread::yield_now();
        }
    }
}

/// Wall-clock time based on [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose origin is now
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Manually advanced clock for deterministic tests
///
/// Sleeping or parking jumps time forward instead of blocking.
///
/// ```
/// use jalse_engine::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// clock.advance(Duration::from_millis(5));
/// clock.park_until(Duration::from_millis(100), Duration::from_millis(10));
/// assert_eq!(clock.now(), Duration::from_millis(100));
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    /// Create a clock at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::AcqRel);
    }

    /// Move time forward to `to` (never backwards)
    pub fn advance_to(&self, to: Duration) {
        self.nanos.fetch_max(to.as_nanos() as u64, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Acquire))
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }

    fn park_until(&self, deadline: Duration, _spin_threshold: Duration) {
        self.advance_to(deadline);
    }
}
