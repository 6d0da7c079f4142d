//! Engine driven by a dedicated control thread and a worker pool

use crate::action::{Task, TaskId};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::engine::{Engine, EngineCore, TickExecutor};
use crate::error::{Error, Result};
use crate::pool::{is_worker_thread, WorkerPool};
use crate::queue::ScheduledTask;
use crate::state::EngineState;
use crate::tick::TickSnapshot;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use log::{trace, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const DEFAULT_NAME: &str = "jalse";

struct PoolExecutor {
    pool: Arc<WorkerPool>,
}

impl TickExecutor for PoolExecutor {
    fn execute(&self, core: &Arc<EngineCore>, task: ScheduledTask) -> Result<()> {
        let core = core.clone();
        self.pool.submit(Box::new(move || core.finish(task)))
    }
}

struct ControlThread {
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

/// Engine whose tick loop runs on its own thread
///
/// Task bodies run on a bounded [`WorkerPool`]; when every worker is busy
/// the control thread blocks, slowing the tick rate instead of queueing.
///
/// ```no_run
/// use jalse_engine::{Engine, EngineConfig, ThreadPoolEngine};
///
/// let engine = ThreadPoolEngine::new(EngineConfig::with_ticks_per_second(30))?;
/// engine.tick()?;
/// // ...
/// let unfinished = engine.stop();
/// # Ok::<(), jalse_engine::Error>(())
/// ```
pub struct ThreadPoolEngine {
    core: Arc<EngineCore>,
    pool: Arc<WorkerPool>,
    control: Mutex<Option<ControlThread>>,
}

impl ThreadPoolEngine {
    /// Create an engine on the system clock
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Create an engine on a custom clock
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::named(DEFAULT_NAME, config, clock)
    }

    /// Create an engine whose threads are named after `name`
    pub fn named(name: &str, config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let core = EngineCore::new(name, config, clock)?;
        let pool = WorkerPool::new(name, core.config().worker_count())?;
        Ok(Self {
            core: Arc::new(core),
            pool: Arc::new(pool),
            control: Mutex::new(None),
        })
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        self.core.config()
    }

    /// Workers currently running a task
    pub fn active_workers(&self) -> usize {
        self.pool.active_count()
    }

    /// Tasks waiting in the queue
    pub fn queued_count(&self) -> usize {
        self.core.queued_count()
    }

    /// Tasks handed to workers and not yet completed
    pub fn in_flight_count(&self) -> usize {
        self.core.in_flight_count()
    }

    /// Copy of a queued or in-flight task
    pub fn scheduled(&self, id: TaskId) -> Option<ScheduledTask> {
        self.core.scheduled(id)
    }

    fn spawn_control(&self) -> Result<()> {
        let core = self.core.clone();
        let executor = PoolExecutor {
            pool: self.pool.clone(),
        };
        let (done_tx, done_rx) = bounded(1);

        let spawned = thread::Builder::new()
            .name(format!("{}-control", core.name()))
            .spawn(move || {
                while core.should_continue() {
                    core.run_iteration(&executor);
                }
                trace!("engine '{}' control loop exited", core.name());
                let _ = done_tx.send(());
            });

        match spawned {
            Ok(handle) => {
                let previous = self.control.lock().replace(ControlThread {
                    handle,
                    done: done_rx,
                });
                if let Some(previous) = previous {
                    // Already past its last iteration.
                    let _ = previous.handle.join();
                }
                Ok(())
            }
            Err(e) => {
                self.core.abort_start();
                Err(Error::Spawn(e))
            }
        }
    }

    fn await_control(&self, timeout: Duration) {
        let Some(control) = self.control.lock().take() else {
            return;
        };
        if control.handle.thread().id() == thread::current().id() || is_worker_thread() {
            // The loop exits on its own once it sees the stop.
            return;
        }
        match control.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = control.handle.join();
            }
            Err(RecvTimeoutError::Timeout) => warn!(
                "engine '{}' control thread still running after {:?}; detaching it",
                self.core.name(),
                timeout
            ),
        }
    }
}

impl Engine for ThreadPoolEngine {
    fn tick(&self) -> Result<()> {
        if self.core.start()? {
            self.spawn_control()?;
        }
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.core.pause()
    }

    fn stop(&self) -> Vec<ScheduledTask> {
        let Some(abandoned) = self.core.shutdown() else {
            return Vec::new();
        };
        let timeout = self.core.config().termination_timeout();
        let deadline = Instant::now().checked_add(timeout);

        self.await_control(timeout);
        let remaining = match deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => timeout,
        };
        self.pool.shutdown(remaining);
        abandoned
    }

    fn state(&self) -> EngineState {
        self.core.state()
    }

    fn tick_info(&self) -> TickSnapshot {
        self.core.tick_info()
    }

    fn schedule_task(
        &self,
        task: Arc<dyn Task>,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<TaskId> {
        self.core.schedule(task, initial_delay, period)
    }

    fn cancel(&self, id: TaskId) -> bool {
        self.core.cancel(id)
    }

    fn is_active(&self, id: TaskId) -> bool {
        self.core.is_active(id)
    }

    fn set_first_action(&self, task: Option<Arc<dyn Task>>) {
        self.core.set_first_action(task);
    }

    fn set_last_action(&self, task: Option<Arc<dyn Task>>) {
        self.core.set_last_action(task);
    }
}

impl Drop for ThreadPoolEngine {
    fn drop(&mut self) {
        if self.core.state() != EngineState::Stopped {
            self.stop();
        }
    }
}

impl std::fmt::Debug for ThreadPoolEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPoolEngine")
            .field("core", &self.core)
            .field("pool", &self.pool)
            .finish()
    }
}
