//! Engine lifecycle surface and the shared tick-loop core
//!
//! Both [`ThreadPoolEngine`](crate::ThreadPoolEngine) and
//! [`ManualEngine`](crate::ManualEngine) are thin shells around
//! [`EngineCore`]; they differ only in where the tick loop runs and how the
//! tasks of a tick are executed.
//!
//! One tick:
//! 1. enter `InTick`, record the tick start
//! 2. run the "first" action on the control thread
//! 3. pop every task due before the end of the tick window and execute it
//! 4. wait at the tick barrier for all of them
//! 5. run the "last" action on the control thread
//! 6. enter `InWait` and park until the tick boundary

use crate::action::{Action, ActorTask, Task, TaskContext, TaskId};
use crate::barrier::TickBarrier;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::pool::panic_message;
use crate::queue::{ScheduledTask, TaskQueue};
use crate::state::{EngineState, StateCell};
use crate::tick::{TickInfo, TickSnapshot};
use log::{debug, error, trace, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle and scheduling surface shared by all engines
pub trait Engine: Send + Sync {
    /// Start (or resume) the tick loop; a no-op while already running
    fn tick(&self) -> Result<()>;

    /// Suspend the tick loop after the current tick
    fn pause(&self) -> Result<()>;

    /// Resume a paused engine
    fn resume(&self) -> Result<()> {
        self.tick()
    }

    /// Shut down permanently
    ///
    /// Returns every task that was queued or in flight. Calling it again
    /// returns an empty list.
    fn stop(&self) -> Vec<ScheduledTask>;

    /// Current lifecycle state
    fn state(&self) -> EngineState;

    /// Copy of the tick information
    fn tick_info(&self) -> TickSnapshot;

    /// Queue `task` to first run after `initial_delay`, then every `period`
    ///
    /// A zero period makes the task one-shot.
    fn schedule_task(
        &self,
        task: Arc<dyn Task>,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<TaskId>;

    /// Cancel a queued or in-flight task
    ///
    /// A task body that is already running is not interrupted; only its
    /// next run is suppressed.
    fn cancel(&self, id: TaskId) -> bool;

    /// True while the task is queued, or in flight and not cancelled
    fn is_active(&self, id: TaskId) -> bool;

    /// Set or clear the task run at the start of every tick
    fn set_first_action(&self, task: Option<Arc<dyn Task>>);

    /// Set or clear the task run at the end of every tick
    fn set_last_action(&self, task: Option<Arc<dyn Task>>);

    /// True once stopped
    fn is_stopped(&self) -> bool {
        self.state() == EngineState::Stopped
    }
}

/// Typed helpers on top of [`Engine`]
pub trait EngineExt: Engine {
    /// Schedule `action` to run against `actor`
    fn schedule_for_actor<A>(
        &self,
        action: Arc<dyn Action<A>>,
        actor: A,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<TaskId>
    where
        A: Send + Sync + 'static,
    {
        self.schedule_task(ActorTask::erased(action, actor), initial_delay, period)
    }
}

impl<E: Engine + ?Sized> EngineExt for E {}

#[derive(Debug, Default)]
struct Tasks {
    queue: TaskQueue,
    in_flight: HashMap<TaskId, ScheduledTask>,
}

/// Executes the due tasks of one tick
pub(crate) trait TickExecutor {
    /// Run or hand off `task`; must eventually call [`EngineCore::finish`]
    fn execute(&self, core: &Arc<EngineCore>, task: ScheduledTask) -> Result<()>;
}

/// Runs tasks inline on the control thread
pub(crate) struct InlineExecutor;

impl TickExecutor for InlineExecutor {
    fn execute(&self, core: &Arc<EngineCore>, task: ScheduledTask) -> Result<()> {
        core.finish(task);
        Ok(())
    }
}

/// State shared by an engine's control loop, workers and callers
pub(crate) struct EngineCore {
    name: String,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    state: StateCell,
    tick_info: TickInfo,
    tasks: Mutex<Tasks>,
    first: RwLock<Option<ScheduledTask>>,
    last: RwLock<Option<ScheduledTask>>,
    running: AtomicBool,
    loop_alive: Mutex<bool>,
    barrier: TickBarrier,
}

impl EngineCore {
    pub(crate) fn new(name: &str, config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            name: name.to_string(),
            tick_info: TickInfo::new(config.ticks_per_second()),
            config,
            clock,
            state: StateCell::new(),
            tasks: Mutex::new(Tasks::default()),
            first: RwLock::new(None),
            last: RwLock::new(None),
            running: AtomicBool::new(false),
            loop_alive: Mutex::new(false),
            barrier: TickBarrier::new(),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn state(&self) -> EngineState {
        self.state.get()
    }

    pub(crate) fn tick_info(&self) -> TickSnapshot {
        self.tick_info.snapshot()
    }

    pub(crate) fn set_first_action(&self, task: Option<Arc<dyn Task>>) {
        *self.first.write() = task.map(|t| ScheduledTask::new(t, Duration::ZERO, Duration::ZERO));
    }

    pub(crate) fn set_last_action(&self, task: Option<Arc<dyn Task>>) {
        *self.last.write() = task.map(|t| ScheduledTask::new(t, Duration::ZERO, Duration::ZERO));
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Mark the loop as running
    ///
    /// Returns `true` when the caller must drive a new loop, `false` when a
    /// loop is already alive and will pick up the change.
    pub(crate) fn start(&self) -> Result<bool> {
        let mut alive = self.loop_alive.lock();
        let state = self.state.get();
        if state == EngineState::Stopped {
            return Err(Error::Shutdown);
        }
        if !state.is_running() {
            self.state.transition(EngineState::InTick)?;
        }
        self.running.store(true, Ordering::Release);
        if *alive {
            Ok(false)
        } else {
            *alive = true;
            debug!("engine '{}' started ticking", self.name);
            Ok(true)
        }
    }

    /// Undo a successful `start` whose loop could not be launched
    pub(crate) fn abort_start(&self) {
        *self.loop_alive.lock() = false;
        self.running.store(false, Ordering::Release);
    }

    /// Enter `InTick` for a single externally driven tick
    pub(crate) fn enter_tick(&self) -> Result<()> {
        self.state.transition(EngineState::InTick).map(|_| ())
    }

    /// Decide whether the loop runs another iteration
    ///
    /// Enters `InTick` when it does; otherwise marks the loop as gone.
    pub(crate) fn should_continue(&self) -> bool {
        let mut alive = self.loop_alive.lock();
        if self.running.load(Ordering::Acquire)
            && self.state.transition_if_running(EngineState::InTick)
        {
            true
        } else {
            *alive = false;
            false
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn pause(&self) -> Result<()> {
        if self.state.get() == EngineState::Paused {
            return Ok(());
        }
        self.state.transition(EngineState::Paused)?;
        self.running.store(false, Ordering::Release);
        debug!("engine '{}' paused", self.name);
        Ok(())
    }

    /// Move to `Stopped` and collect abandoned work
    ///
    /// Returns `None` if the engine was already stopped.
    pub(crate) fn shutdown(&self) -> Option<Vec<ScheduledTask>> {
        self.running.store(false, Ordering::Release);
        if self.state.stop() == EngineState::Stopped {
            return None;
        }

        let abandoned = {
            let mut tasks = self.tasks.lock();
            let mut abandoned = tasks.queue.drain();
            for (_, task) in tasks.in_flight.drain() {
                task.cancel();
                abandoned.push(task);
            }
            abandoned
        };
        self.barrier.terminate();
        debug!(
            "engine '{}' stopped with {} unfinished task(s)",
            self.name,
            abandoned.len()
        );
        Some(abandoned)
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    pub(crate) fn schedule(
        &self,
        task: Arc<dyn Task>,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<TaskId> {
        let scheduled = ScheduledTask::new(task, period, after(self.clock.now(), initial_delay));
        let id = scheduled.id();

        let mut tasks = self.tasks.lock();
        if self.state.get() == EngineState::Stopped {
            return Err(Error::Shutdown);
        }
        tasks.queue.insert(scheduled);
        trace!("engine '{}' scheduled {}", self.name, id);
        Ok(id)
    }

    pub(crate) fn cancel(&self, id: TaskId) -> bool {
        let mut tasks = self.tasks.lock();
        if tasks.queue.remove_by_id(id) {
            return true;
        }
        match tasks.in_flight.get(&id) {
            Some(task) if !task.is_cancelled() => {
                task.cancel();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn is_active(&self, id: TaskId) -> bool {
        let tasks = self.tasks.lock();
        tasks.queue.contains_by_id(id)
            || tasks
                .in_flight
                .get(&id)
                .is_some_and(|task| !task.is_cancelled())
    }

    /// Copy of a queued or in-flight task
    pub(crate) fn scheduled(&self, id: TaskId) -> Option<ScheduledTask> {
        let tasks = self.tasks.lock();
        tasks
            .queue
            .get_by_id(id)
            .or_else(|| tasks.in_flight.get(&id))
            .cloned()
    }

    pub(crate) fn queued_count(&self) -> usize {
        self.tasks.lock().queue.len()
    }

    pub(crate) fn in_flight_count(&self) -> usize {
        self.tasks.lock().in_flight.len()
    }

    // ------------------------------------------------------------------
    // Tick loop
    // ------------------------------------------------------------------

    /// Run one tick; the caller has already entered `InTick`
    pub(crate) fn run_iteration(self: &Arc<Self>, executor: &dyn TickExecutor) {
        let start = self.clock.now();
        let estimated_end = after(start, self.tick_info.interval());
        self.tick_info.begin_tick(start);
        trace!(
            "engine '{}' tick {} started",
            self.name,
            self.tick_info.tick_count()
        );

        self.run_boundary(&self.first);

        let due = {
            let mut tasks = self.tasks.lock();
            let mut due = Vec::new();
            while let Some(task) = tasks.queue.pop_due(estimated_end) {
                tasks.in_flight.insert(task.id(), task.clone());
                due.push(task);
            }
            due
        };

        for task in due {
            self.barrier.register();
            let id = task.id();
            if let Err(e) = executor.execute(self, task) {
                debug!("engine '{}' could not execute {}: {}", self.name, id, e);
                self.tasks.lock().in_flight.remove(&id);
                self.barrier.arrive();
            }
        }

        if !self.barrier.await_advance() {
            // Stopped while waiting for this tick's tasks.
            return;
        }

        self.run_boundary(&self.last);
        self.tick_info.end_tick();

        if self.state.transition_if_running(EngineState::InWait) {
            self.clock
                .park_until(estimated_end, self.config.spin_yield_threshold());
        }
    }

    /// Run a task body, complete its bookkeeping and arrive at the barrier
    pub(crate) fn finish(&self, task: ScheduledTask) {
        self.run_task(&task);
        self.complete(task);
        self.barrier.arrive();
    }

    fn run_boundary(&self, slot: &RwLock<Option<ScheduledTask>>) {
        let task = slot.read().clone();
        if let Some(task) = task {
            self.run_task(&task);
            if task.is_cancelled() {
                let mut slot = slot.write();
                if slot.as_ref().is_some_and(|t| t.id() == task.id()) {
                    *slot = None;
                }
            }
        }
    }

    /// Run one invocation, containing any error or panic
    fn run_task(&self, task: &ScheduledTask) {
        if task.is_cancelled() {
            return;
        }
        let snapshot = self.tick_info.snapshot();
        let context = TaskContext::new(task.id(), task.period(), snapshot, task.cancel_flag());
        match panic::catch_unwind(AssertUnwindSafe(|| task.task().run(&context))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(
                "engine '{}': {} failed on tick {}: {}",
                self.name,
                task.id(),
                snapshot.tick_count,
                e
            ),
            Err(panic) => error!(
                "engine '{}': {} panicked on tick {}: {}",
                self.name,
                task.id(),
                snapshot.tick_count,
                panic_message(&panic)
            ),
        }
    }

    /// Leave the in-flight set; periodic tasks go back into the queue
    fn complete(&self, mut task: ScheduledTask) {
        let mut tasks = self.tasks.lock();
        if tasks.in_flight.remove(&task.id()).is_none() {
            // Abandoned by stop().
            return;
        }
        if task.is_periodic()
            && !task.is_cancelled()
            && self.state.get() != EngineState::Stopped
        {
            task.reschedule(after(self.clock.now(), task.period()));
            tasks.queue.insert(task);
        }
    }
}

/// `now + delay`, saturating at `Duration::MAX` (never due)
fn after(now: Duration, delay: Duration) -> Duration {
    now.checked_add(delay).unwrap_or(Duration::MAX)
}

impl std::fmt::Debug for EngineCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineCore")
            .field("name", &self.name)
            .field("state", &self.state.get())
            .field("tick_count", &self.tick_info.tick_count())
            .finish()
    }
}
