//! End-of-tick rendezvous
//!
//! Every task submitted during a tick registers a party; the control thread
//! waits until all registered parties have arrived, then the barrier moves
//! to the next generation.

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct Phase {
    generation: u64,
    registered: usize,
    arrived: usize,
    terminated: bool,
}

/// Generation-counted barrier for the tasks of one tick
#[derive(Debug, Default)]
pub struct TickBarrier {
    phase: Mutex<Phase>,
    advanced: Condvar,
}

impl TickBarrier {
    /// Create a barrier at generation zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one more party for the current generation
    pub fn register(&self) -> u64 {
        let mut phase = self.phase.lock();
        phase.registered += 1;
        phase.generation
    }

    /// Mark one registered party as done
    pub fn arrive(&self) {
        let mut phase = self.phase.lock();
        phase.arrived += 1;
        if phase.arrived >= phase.registered {
            self.advanced.notify_all();
        }
    }

    /// Wait for every registered party, then start the next generation
    ///
    /// Returns `false` if the barrier was terminated before all parties
    /// arrived.
    pub fn await_advance(&self) -> bool {
        let mut phase = self.phase.lock();
        while phase.arrived < phase.registered && !phase.terminated {
            self.advanced.wait(&mut phase);
        }
        if phase.terminated {
            return false;
        }
        phase.generation += 1;
        phase.registered = 0;
        phase.arrived = 0;
        true
    }

    /// Release any waiter permanently
    pub fn terminate(&self) {
        let mut phase = self.phase.lock();
        phase.terminated = true;
        self.advanced.notify_all();
    }

    /// Current generation
    pub fn generation(&self) -> u64 {
        self.phase.lock().generation
    }

    /// Parties registered but not yet arrived
    pub fn pending(&self) -> usize {
        let phase = self.phase.lock();
        phase.registered.saturating_sub(phase.arrived)
    }
}
