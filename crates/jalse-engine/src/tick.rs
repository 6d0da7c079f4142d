//! Tick bookkeeping
//!
//! [`TickInfo`] is written only by the control loop and read from any
//! thread. Fields are independent atomics: readers may observe a slightly
//! stale combination, which is acceptable for reporting.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Live tick information for an engine
#[derive(Debug)]
pub struct TickInfo {
    ticks_per_second: u32,
    interval: Duration,
    delta_nanos: AtomicU64,
    current_tps: AtomicU32,
    tick_count: AtomicU64,
    started: AtomicBool,
    last_start_nanos: AtomicU64,
    second_start_nanos: AtomicU64,
    ticks_this_second: AtomicU32,
}

impl TickInfo {
    /// Create tick information for the given tick rate
    pub fn new(ticks_per_second: u32) -> Self {
        let interval = if ticks_per_second == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(NANOS_PER_SECOND / ticks_per_second as u64)
        };
        Self {
            ticks_per_second,
            interval,
            delta_nanos: AtomicU64::new(0),
            current_tps: AtomicU32::new(0),
            tick_count: AtomicU64::new(0),
            started: AtomicBool::new(false),
            last_start_nanos: AtomicU64::new(0),
            second_start_nanos: AtomicU64::new(0),
            ticks_this_second: AtomicU32::new(0),
        }
    }

    /// Configured ticks per second
    pub fn ticks_per_second(&self) -> u32 {
        self.ticks_per_second
    }

    /// Ideal interval between tick starts
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time between the starts of the last two ticks
    pub fn delta(&self) -> Duration {
        Duration::from_nanos(self.delta_nanos.load(Ordering::Relaxed))
    }

    /// Ticks completed during the last measured clock second
    pub fn current_tps(&self) -> u32 {
        self.current_tps.load(Ordering::Relaxed)
    }

    /// Total ticks completed
    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::Relaxed)
    }

    /// Copy the current values
    pub fn snapshot(&self) -> TickSnapshot {
        TickSnapshot {
            ticks_per_second: self.ticks_per_second,
            interval: self.interval,
            delta: self.delta(),
            current_tps: self.current_tps(),
            tick_count: self.tick_count(),
        }
    }

    /// Record the start of a tick at `start`
    ///
    /// Updates the delta and, once per clock second, publishes the measured
    /// tick rate and resets the per-second counter.
    pub(crate) fn begin_tick(&self, start: Duration) {
        let start_nanos = start.as_nanos() as u64;
        if !self.started.swap(true, Ordering::AcqRel) {
            self.second_start_nanos.store(start_nanos, Ordering::Relaxed);
            self.last_start_nanos.store(start_nanos, Ordering::Relaxed);
            self.delta_nanos.store(0, Ordering::Relaxed);
            return;
        }

        let last = self.last_start_nanos.swap(start_nanos, Ordering::Relaxed);
        self.delta_nanos
            .store(start_nanos.saturating_sub(last), Ordering::Relaxed);

        let second_start = self.second_start_nanos.load(Ordering::Relaxed);
        if start_nanos.saturating_sub(second_start) >= NANOS_PER_SECOND {
            let ticks = self.ticks_this_second.swap(0, Ordering::Relaxed);
            self.current_tps.store(ticks, Ordering::Relaxed);
            self.second_start_nanos.store(start_nanos, Ordering::Relaxed);
        }
    }

    /// Record the completion of a tick
    pub(crate) fn end_tick(&self) {
        self.tick_count.fetch_add(1, Ordering::Relaxed);
        self.ticks_this_second.fetch_add(1, Ordering::Relaxed);
    }
}

/// Immutable copy of [`TickInfo`] handed to actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSnapshot {
    /// Configured ticks per second
    pub ticks_per_second: u32,
    /// Ideal interval between ticks
    pub interval: Duration,
    /// Time between the starts of the last two ticks
    pub delta: Duration,
    /// Measured ticks during the last clock second
    pub current_tps: u32,
    /// Total ticks completed
    pub tick_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval() {
        let info = TickInfo::new(10);
        assert_eq!(info.interval(), Duration::from_millis(100));
        assert_eq!(info.ticks_per_second(), 10);
    }

    #[test]
    fn test_delta_and_count() {
        let info = TickInfo::new(10);
        info.begin_tick(Duration::from_millis(0));
        info.end_tick();
        assert_eq!(info.delta(), Duration::ZERO);

        info.begin_tick(Duration::from_millis(120));
        info.end_tick();
        assert_eq!(info.delta(), Duration::from_millis(120));
        assert_eq!(info.tick_count(), 2);
    }

    #[test]
    fn test_tps_published_once_per_second() {
        let info = TickInfo::new(10);
        for i in 0..10u64 {
            info.begin_tick(Duration::from_millis(i * 100));
            info.end_tick();
        }
        assert_eq!(info.current_tps(), 0);

        info.begin_tick(Duration::from_millis(1000));
        assert_eq!(info.current_tps(), 10);
        info.end_tick();

        let snapshot = info.snapshot();
        assert_eq!(snapshot.current_tps, 10);
        assert_eq!(snapshot.tick_count, 11);
    }
}
