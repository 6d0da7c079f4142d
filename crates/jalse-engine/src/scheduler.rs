//! Actor-facing scheduling
//!
//! A [`Scheduler`] schedules actions against one actor. Every task it creates
//! is remembered in a [`TaskTracker`] so the actor can cancel all of its work
//! at once when it goes away.

use crate::action::{Action, TaskId};
use crate::engine::{Engine, EngineExt};
use crate::error::Result;
use log::trace;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Tracked ids beyond which finished tasks are pruned on the next schedule
const PRUNE_THRESHOLD: usize = 64;

/// Schedules actions against an actor of type `A`
pub trait Scheduler<A> {
    /// Schedule `action` after `initial_delay`, repeating every `period`
    ///
    /// A zero period makes the action one-shot.
    fn schedule_action(
        &self,
        action: Arc<dyn Action<A>>,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<TaskId>;

    /// Schedule a repeating action
    fn schedule_periodic<F>(
        &self,
        action: F,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<TaskId>
    where
        F: Action<A> + 'static,
        Self: Sized,
    {
        self.schedule_action(Arc::new(action), initial_delay, period)
    }

    /// Schedule a one-shot action after `delay`
    fn schedule_after<F>(&self, action: F, delay: Duration) -> Result<TaskId>
    where
        F: Action<A> + 'static,
        Self: Sized,
    {
        self.schedule_action(Arc::new(action), delay, Duration::ZERO)
    }

    /// Schedule a one-shot action for the next tick
    fn schedule<F>(&self, action: F) -> Result<TaskId>
    where
        F: Action<A> + 'static,
        Self: Sized,
    {
        self.schedule_action(Arc::new(action), Duration::ZERO, Duration::ZERO)
    }

    /// Cancel a task scheduled through this scheduler
    fn cancel(&self, id: TaskId) -> bool;

    /// True while a task scheduled through this scheduler is active
    fn is_active(&self, id: TaskId) -> bool;

    /// Cancel every task scheduled through this scheduler
    fn cancel_all_scheduled(&self);
}

/// Set of task ids owned by one actor
#[derive(Debug, Default)]
pub struct TaskTracker {
    ids: Mutex<HashSet<TaskId>>,
}

impl TaskTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `id`
    pub fn track(&self, id: TaskId) {
        self.ids.lock().insert(id);
    }

    /// Forget `id`, returning whether it was tracked
    pub fn untrack(&self, id: TaskId) -> bool {
        self.ids.lock().remove(&id)
    }

    /// Check whether `id` is tracked
    pub fn contains(&self, id: TaskId) -> bool {
        self.ids.lock().contains(&id)
    }

    /// Tracked ids
    pub fn ids(&self) -> Vec<TaskId> {
        self.ids.lock().iter().copied().collect()
    }

    /// Number of tracked ids
    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    /// Check if nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }

    /// Drop ids the engine no longer considers active
    pub fn prune(&self, engine: &dyn Engine) {
        self.ids.lock().retain(|id| engine.is_active(*id));
    }

    /// Cancel every tracked task and clear the set
    ///
    /// Returns how many tasks were actually cancelled.
    pub fn cancel_all(&self, engine: &dyn Engine) -> usize {
        let ids: Vec<TaskId> = self.ids.lock().drain().collect();
        let cancelled = ids.into_iter().filter(|id| engine.cancel(*id)).count();
        if cancelled > 0 {
            trace!("cancelled {} tracked task(s)", cancelled);
        }
        cancelled
    }

    /// Track `id` after pruning finished tasks if the set has grown large
    pub fn track_pruned(&self, engine: &dyn Engine, id: TaskId) {
        if self.len() >= PRUNE_THRESHOLD {
            self.prune(engine);
        }
        self.track(id);
    }
}

/// [`Scheduler`] binding an engine to a cloneable actor
///
/// ```
/// use jalse_engine::{ActionContext, ActionResult, ActorScheduler, ManualEngine, Scheduler};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// let engine = Arc::new(ManualEngine::new(10)?);
/// let counter = Arc::new(AtomicU32::new(0));
/// let scheduler = ActorScheduler::new(engine.clone(), counter.clone());
///
/// scheduler.schedule(|ctx: &ActionContext<'_, Arc<AtomicU32>>| -> ActionResult {
///     ctx.actor().fetch_add(1, Ordering::SeqCst);
///     Ok(())
/// })?;
/// engine.step()?;
/// assert_eq!(counter.load(Ordering::SeqCst), 1);
/// # Ok::<(), jalse_engine::Error>(())
/// ```
pub struct ActorScheduler<A> {
    engine: Arc<dyn Engine>,
    actor: A,
    tracker: TaskTracker,
}

impl<A> ActorScheduler<A>
where
    A: Clone + Send + Sync + 'static,
{
    /// Bind `actor` to `engine`
    pub fn new(engine: Arc<dyn Engine>, actor: A) -> Self {
        Self {
            engine,
            actor,
            tracker: TaskTracker::new(),
        }
    }

    /// The bound actor
    pub fn actor(&self) -> &A {
        &self.actor
    }

    /// The engine tasks are scheduled on
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Ids of the tasks scheduled through this scheduler
    pub fn tracked(&self) -> &TaskTracker {
        &self.tracker
    }
}

impl<A> Scheduler<A> for ActorScheduler<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn schedule_action(
        &self,
        action: Arc<dyn Action<A>>,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<TaskId> {
        let id = self
            .engine
            .schedule_for_actor(action, self.actor.clone(), initial_delay, period)?;
        self.tracker.track_pruned(self.engine.as_ref(), id);
        Ok(id)
    }

    fn cancel(&self, id: TaskId) -> bool {
        self.tracker.untrack(id) && self.engine.cancel(id)
    }

    fn is_active(&self, id: TaskId) -> bool {
        self.tracker.contains(id) && self.engine.is_active(id)
    }

    fn cancel_all_scheduled(&self) {
        self.tracker.cancel_all(self.engine.as_ref());
    }
}

impl<A> Drop for ActorScheduler<A> {
    fn drop(&mut self) {
        self.tracker.cancel_all(self.engine.as_ref());
    }
}
