//! Actions, tasks and their execution context

use crate::tick::TickSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Error escaping an action body
pub type ActionError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of one action invocation
pub type ActionResult = std::result::Result<(), ActionError>;

/// Opaque handle for a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task:{}", self.0)
    }
}

/// Unit for integer delays and periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TimeUnit {
    #[default]
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
}

impl TimeUnit {
    /// Convert `amount` of this unit into a duration
    pub fn to_duration(&self, amount: u64) -> Duration {
        match self {
            TimeUnit::Nanoseconds => Duration::from_nanos(amount),
            TimeUnit::Microseconds => Duration::from_micros(amount),
            TimeUnit::Milliseconds => Duration::from_millis(amount),
            TimeUnit::Seconds => Duration::from_secs(amount),
            TimeUnit::Minutes => Duration::from_secs(amount.saturating_mul(60)),
        }
    }
}

/// Read-only context of one task invocation
#[derive(Debug)]
pub struct TaskContext<'a> {
    id: TaskId,
    period: Duration,
    tick: TickSnapshot,
    cancelled: &'a AtomicBool,
}

impl<'a> TaskContext<'a> {
    pub(crate) fn new(
        id: TaskId,
        period: Duration,
        tick: TickSnapshot,
        cancelled: &'a AtomicBool,
    ) -> Self {
        Self {
            id,
            period,
            tick,
            cancelled,
        }
    }

    /// Id of the running task
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Period between runs (zero for one-shot tasks)
    pub fn period(&self) -> Duration {
        self.period
    }

    /// True if the task repeats
    pub fn is_periodic(&self) -> bool {
        !self.period.is_zero()
    }

    /// Tick information at the time the task was started
    pub fn tick_info(&self) -> &TickSnapshot {
        &self.tick
    }

    /// Suppress any further runs of this task
    ///
    /// The current invocation is not interrupted.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// True once the task has been cancelled (by itself, a caller or shutdown)
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Context handed to an [`Action`]: the actor plus the task context
pub struct ActionContext<'a, A> {
    actor: &'a A,
    task: &'a TaskContext<'a>,
}

impl<'a, A> ActionContext<'a, A> {
    /// Build a context for `actor`
    pub fn new(actor: &'a A, task: &'a TaskContext<'a>) -> Self {
        Self { actor, task }
    }

    /// The object this action runs against
    pub fn actor(&self) -> &A {
        self.actor
    }

    /// Task-level context (id, period, tick snapshot, cancellation)
    pub fn task(&self) -> &TaskContext<'a> {
        self.task
    }

    /// Tick information at the time the action was started
    pub fn tick_info(&self) -> &TickSnapshot {
        self.task.tick_info()
    }

    /// Suppress further runs of this action's task
    pub fn cancel(&self) {
        self.task.cancel();
    }
}

/// User-supplied behaviour run against an actor
///
/// Closures taking an [`ActionContext`] are actions:
///
/// ```
/// use jalse_engine::{Action, ActionContext, ActionResult};
///
/// fn counter() -> impl Action<u32> {
///     |ctx: &ActionContext<'_, u32>| -> ActionResult {
///         let _value = *ctx.actor();
///         Ok(())
///     }
/// }
/// ```
pub trait Action<A>: Send + Sync {
    /// Run one invocation
    fn perform(&self, context: &ActionContext<'_, A>) -> ActionResult;
}

impl<A, F> Action<A> for F
where
    F: Fn(&ActionContext<'_, A>) -> ActionResult + Send + Sync,
{
    fn perform(&self, context: &ActionContext<'_, A>) -> ActionResult {
        self(context)
    }
}

/// Type-erased unit of scheduled work
pub trait Task: Send + Sync {
    /// Run one invocation
    fn run(&self, context: &TaskContext<'_>) -> ActionResult;
}

/// An action bound to its actor
pub struct ActorTask<A> {
    action: Arc<dyn Action<A>>,
    actor: A,
}

impl<A> ActorTask<A>
where
    A: Send + Sync + 'static,
{
    /// Bind `action` to `actor`
    pub fn new(action: Arc<dyn Action<A>>, actor: A) -> Self {
        Self { action, actor }
    }

    /// Bind and erase in one step
    pub fn erased(action: Arc<dyn Action<A>>, actor: A) -> Arc<dyn Task> {
        Arc::new(Self::new(action, actor))
    }

    /// The bound actor
    pub fn actor(&self) -> &A {
        &self.actor
    }
}

impl<A> Task for ActorTask<A>
where
    A: Send + Sync + 'static,
{
    fn run(&self, context: &TaskContext<'_>) -> ActionResult {
        self.action.perform(&ActionContext::new(&self.actor, context))
    }
}
