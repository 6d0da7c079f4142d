//! Engine lifecycle state machine
//!
//! ```text
//! Init ──────────────► InTick ◄──► InWait
//!   │                    ▲  │         │
//!   │                    │  ▼         ▼
//!   ├──────────────────► Paused ◄─────┘
//!   │                       │
//!   └──────────────────► Stopped ◄── (any)
//! ```
//!
//! `Stopped` is terminal: every transition out of it fails with
//! [`Error::Shutdown`].

use crate::error::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineState {
    /// Created, never ticked
    Init,
    /// Executing the body of a tick
    InTick,
    /// Waiting for the next tick boundary
    InWait,
    /// Tick loop suspended; can resume
    Paused,
    /// Shut down; absorbing
    Stopped,
}

impl EngineState {
    const ALL: [EngineState; 5] = [
        EngineState::Init,
        EngineState::InTick,
        EngineState::InWait,
        EngineState::Paused,
        EngineState::Stopped,
    ];

    /// True while the tick loop is executing or between ticks
    pub fn is_running(&self) -> bool {
        matches!(self, EngineState::InTick | EngineState::InWait)
    }

    /// Check whether `self -> to` is a legal transition
    pub fn can_transition_to(&self, to: EngineState) -> bool {
        use EngineState::*;
        match self {
            Init => matches!(to, InTick | Paused | Stopped),
            InTick | InWait => matches!(to, InTick | InWait | Paused | Stopped),
            Paused => matches!(to, InTick | Stopped),
            Stopped => false,
        }
    }

    fn as_u8(self) -> u8 {
        self as u8
    }

    fn from_u8(raw: u8) -> Self {
        Self::ALL[raw as usize]
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Init => "INIT",
            EngineState::InTick => "IN_TICK",
            EngineState::InWait => "IN_WAIT",
            EngineState::Paused => "PAUSED",
            EngineState::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

/// Shared engine state with lock-free reads
///
/// Reads are a single atomic load. Writers serialise on a mutex so
/// check-then-set transitions cannot interleave.
#[derive(Debug)]
pub(crate) struct StateCell {
    current: AtomicU8,
    write: Mutex<()>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            current: AtomicU8::new(EngineState::Init.as_u8()),
            write: Mutex::new(()),
        }
    }

    pub(crate) fn get(&self) -> EngineState {
        EngineState::from_u8(self.current.load(Ordering::Acquire))
    }

    /// Move to `to`, returning the previous state
    pub(crate) fn transition(&self, to: EngineState) -> Result<EngineState> {
        let _guard = self.write.lock();
        let from = self.get();
        if from == EngineState::Stopped {
            return Err(Error::Shutdown);
        }
        if !from.can_transition_to(to) {
            return Err(Error::IllegalTransition { from, to });
        }
        self.current.store(to.as_u8(), Ordering::Release);
        Ok(from)
    }

    /// Move to `to` only if the loop is still running
    ///
    /// Used by the control loop so it never overrides a concurrent
    /// pause or stop.
    pub(crate) fn transition_if_running(&self, to: EngineState) -> bool {
        let _guard = self.write.lock();
        if self.get().is_running() {
            self.current.store(to.as_u8(), Ordering::Release);
            true
        } else {
            false
        }
    }

    /// Move to `Stopped` unconditionally, returning the previous state
    pub(crate) fn stop(&self) -> EngineState {
        let _guard = self.write.lock();
        let from = self.get();
        self.current
            .store(EngineState::Stopped.as_u8(), Ordering::Release);
        from
    }
}
