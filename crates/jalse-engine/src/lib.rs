//! JALSE Engine - Tick-Driven Action Scheduler
//!
//! This crate runs time-based actions against arbitrary actors at a fixed
//! tick rate.
//!
//! ## Architecture
//!
//! ```text
//! Engine (trait)
//!  │
//!  ├── ThreadPoolEngine ← control thread + bounded WorkerPool
//!  ├── ManualEngine     ← caller-driven, inline execution
//!  │
//!  └── EngineCore (shared)
//!       ├── TaskQueue + in-flight map  (one mutex)
//!       ├── EngineState                (atomic read, serialised writes)
//!       ├── TickInfo                   (independent atomics)
//!       └── TickBarrier                (end-of-tick rendezvous)
//! ```
//!
//! ## Key Components
//!
//! - [`Engine`]: lifecycle (`tick`/`pause`/`resume`/`stop`) and task scheduling
//! - [`Scheduler`]: actor-facing scheduling with per-actor task tracking
//! - [`Action`]: user behaviour, run against an actor with a [`TickSnapshot`]
//! - [`Clock`]: injectable time source ([`SystemClock`], [`ManualClock`])
//!
//! ## Guarantees
//!
//! 1. **At most once per tick** - a task runs at most once in any tick
//! 2. **No self-overlap** - a periodic task is re-queued only after it completes
//! 3. **Tick ordering** - every task of tick n finishes before tick n's last action
//! 4. **Contained failures** - errors and panics in actions are logged, never propagated

mod action;
mod barrier;
mod clock;
mod config;
mod engine;
mod error;
mod manual;
mod pool;
mod queue;
mod scheduler;
mod state;
mod thread_pool;
mod tick;

pub use action::{
    Action, ActionContext, ActionError, ActionResult, ActorTask, Task, TaskContext, TaskId,
    TimeUnit,
};
pub use barrier::TickBarrier;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    max_cores, EngineConfig, DEFAULT_SPIN_YIELD_THRESHOLD, DEFAULT_TERMINATION_TIMEOUT,
    DEFAULT_TICKS_PER_SECOND,
};
pub use engine::{Engine, EngineExt};
pub use error::{Error, Result};
pub use manual::ManualEngine;
pub use pool::{is_worker_thread, Job, WorkerPool};
pub use queue::{ScheduledTask, TaskQueue};
pub use scheduler::{ActorScheduler, Scheduler, TaskTracker};
pub use state::EngineState;
pub use thread_pool::ThreadPoolEngine;
pub use tick::{TickInfo, TickSnapshot};
