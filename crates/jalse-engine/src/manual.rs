//! Single-threaded engine for deterministic runs
//!
//! Ticks execute on the calling thread and tasks run inline, in queue order.
//! Combined with a [`ManualClock`] this makes the whole scheduler
//! reproducible: parking at the end of a tick simply moves the clock to the
//! tick boundary.

use crate::action::{Task, TaskId};
use crate::clock::{Clock, ManualClock};
use crate::config::EngineConfig;
use crate::engine::{Engine, EngineCore, InlineExecutor};
use crate::error::{Error, Result};
use crate::queue::ScheduledTask;
use crate::state::EngineState;
use crate::tick::TickSnapshot;
use std::sync::Arc;
use std::time::Duration;

/// Engine driven explicitly by its caller
///
/// ```
/// use jalse_engine::{Engine, ManualEngine};
///
/// let engine = ManualEngine::new(10)?;
/// engine.step()?;
/// engine.step()?;
/// assert_eq!(engine.tick_info().tick_count, 2);
/// assert_eq!(engine.now().as_millis(), 200);
/// # Ok::<(), jalse_engine::Error>(())
/// ```
#[derive(Debug)]
pub struct ManualEngine {
    core: Arc<EngineCore>,
}

impl ManualEngine {
    /// Create an engine on a fresh [`ManualClock`]
    pub fn new(ticks_per_second: u32) -> Result<Self> {
        Self::with_clock(
            EngineConfig::with_ticks_per_second(ticks_per_second),
            Arc::new(ManualClock::new()),
        )
    }

    /// Create an engine on the given clock
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self {
            core: Arc::new(EngineCore::new("manual", config, clock)?),
        })
    }

    /// Current engine time
    pub fn now(&self) -> Duration {
        self.core.clock().now()
    }

    /// Run exactly one tick
    ///
    /// Does nothing while [`Engine::tick`] is driving the loop.
    pub fn step(&self) -> Result<()> {
        if self.core.is_running() {
            return Ok(());
        }
        self.core.enter_tick()?;
        self.core.run_iteration(&InlineExecutor);
        Ok(())
    }

    /// Run `n` ticks, stopping early if the engine is stopped
    pub fn step_n(&self, n: usize) -> Result<()> {
        for _ in 0..n {
            if self.core.state() == EngineState::Stopped {
                return Err(Error::Shutdown);
            }
            self.step()?;
        }
        Ok(())
    }

    /// Tasks waiting in the queue
    pub fn queued_count(&self) -> usize {
        self.core.queued_count()
    }

    /// Copy of a queued or in-flight task
    pub fn scheduled(&self, id: TaskId) -> Option<ScheduledTask> {
        self.core.scheduled(id)
    }
}

impl Engine for ManualEngine {
    /// Run ticks on the calling thread until paused or stopped
    fn tick(&self) -> Result<()> {
        if self.core.start()? {
            while self.core.should_continue() {
                self.core.run_iteration(&InlineExecutor);
            }
        }
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.core.pause()
    }

    fn stop(&self) -> Vec<ScheduledTask> {
        self.core.shutdown().unwrap_or_default()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionResult, TaskContext};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Weak;

    struct FnTask<F>(F);

    impl<F> Task for FnTask<F>
    where
        F: Fn(&TaskContext<'_>) -> ActionResult + Send + Sync,
    {
        fn run(&self, context: &TaskContext<'_>) -> ActionResult {
            (self.0)(context)
        }
    }

    fn task<F>(f: F) -> Arc<dyn Task>
    where
        F: Fn(&TaskContext<'_>) -> ActionResult + Send + Sync + 'static,
    {
        Arc::new(FnTask(f))
    }

    fn counting(counter: &Arc<AtomicUsize>) -> Arc<dyn Task> {
        let counter = counter.clone();
        task(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn manual(tps: u32) -> (ManualEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let engine =
            ManualEngine::with_clock(EngineConfig::with_ticks_per_second(tps), clock.clone())
                .unwrap();
        (engine, clock)
    }

    #[test]
    fn test_periodic_and_one_shot_at_ten_tps() {
        let (engine, _clock) = manual(10);
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        engine
            .schedule_task(counting(&a), Duration::ZERO, Duration::from_millis(100))
            .unwrap();
        let b_id = engine
            .schedule_task(counting(&b), Duration::from_millis(50), Duration::ZERO)
            .unwrap();

        engine.step_n(10).unwrap();
        assert_eq!(engine.now(), Duration::from_secs(1));
        assert_eq!(a.load(Ordering::SeqCst), 10);
        assert_eq!(b.load(Ordering::SeqCst), 1);
        assert!(!engine.is_active(b_id));

        // The measured rate is published at the start of the next second.
        engine.step().unwrap();
        assert_eq!(engine.tick_info().current_tps, 10);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reinsertion_measured_from_completion() {
        let (engine, clock) = manual(10);
        let work = {
            let clock = clock.clone();
            task(move |_| {
                clock.advance(Duration::from_millis(30));
                Ok(())
            })
        };
        let id = engine
            .schedule_task(work, Duration::ZERO, Duration::from_millis(100))
            .unwrap();

        engine.step().unwrap();
        let first = engine.scheduled(id).unwrap().estimated();
        assert_eq!(first, Duration::from_millis(130));

        engine.step().unwrap();
        let second = engine.scheduled(id).unwrap().estimated();
        assert_eq!(second - first, Duration::from_millis(100));
    }

    #[test]
    fn test_unbounded_delay_and_period() {
        let (engine, _clock) = manual(10);
        let never = Arc::new(AtomicUsize::new(0));
        let never_id = engine
            .schedule_task(counting(&never), Duration::MAX, Duration::ZERO)
            .unwrap();
        assert_eq!(engine.scheduled(never_id).unwrap().estimated(), Duration::MAX);

        let once = Arc::new(AtomicUsize::new(0));
        let once_id = engine
            .schedule_task(counting(&once), Duration::ZERO, Duration::MAX)
            .unwrap();

        engine.step_n(3).unwrap();
        assert_eq!(never.load(Ordering::SeqCst), 0);
        assert_eq!(once.load(Ordering::SeqCst), 1);
        assert!(engine.is_active(never_id));
        assert!(engine.is_active(once_id));
        assert_eq!(engine.scheduled(once_id).unwrap().estimated(), Duration::MAX);
    }

    #[test]
    fn test_one_shot_leaves_queue() {
        let (engine, _clock) = manual(10);
        let runs = Arc::new(AtomicUsize::new(0));
        let id = engine
            .schedule_task(counting(&runs), Duration::ZERO, Duration::ZERO)
            .unwrap();
        engine.step_n(5).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(engine.scheduled(id).is_none());
        assert!(!engine.is_active(id));
        assert_eq!(engine.queued_count(), 0);
    }

    #[test]
    fn test_task_cancels_itself() {
        let (engine, _clock) = manual(10);
        let runs = Arc::new(AtomicUsize::new(0));
        let body = {
            let runs = runs.clone();
            task(move |ctx| {
                if runs.fetch_add(1, Ordering::SeqCst) == 2 {
                    ctx.cancel();
                }
                Ok(())
            })
        };
        let id = engine
            .schedule_task(body, Duration::ZERO, Duration::from_millis(100))
            .unwrap();
        engine.step_n(6).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert!(!engine.is_active(id));
    }

    #[test]
    fn test_future_task_waits_for_its_tick() {
        let (engine, _clock) = manual(10);
        let runs = Arc::new(AtomicUsize::new(0));
        engine
            .schedule_task(counting(&runs), Duration::from_millis(250), Duration::ZERO)
            .unwrap();
        engine.step_n(2).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        engine.step().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_tick_runs_until_paused() {
        let (engine, _clock) = manual(10);
        let engine = Arc::new(engine);
        let handle: Weak<ManualEngine> = Arc::downgrade(&engine);
        let runs = Arc::new(AtomicUsize::new(0));
        engine.set_last_action(Some({
            let runs = runs.clone();
            task(move |_| {
                if runs.fetch_add(1, Ordering::SeqCst) == 4 {
                    if let Some(engine) = handle.upgrade() {
                        engine.pause()?;
                    }
                }
                Ok(())
            })
        }));

        engine.tick().unwrap();
        assert_eq!(engine.state(), EngineState::Paused);
        assert_eq!(runs.load(Ordering::SeqCst), 5);
        assert_eq!(engine.tick_info().tick_count, 5);
    }

    #[test]
    fn test_stop_from_inside_a_tick() {
        let (engine, _clock) = manual(10);
        let engine = Arc::new(engine);
        let handle = Arc::downgrade(&engine);
        let abandoned = Arc::new(AtomicUsize::new(0));
        {
            let abandoned = abandoned.clone();
            engine
                .schedule_task(
                    task(move |_| {
                        if let Some(engine) = handle.upgrade() {
                            abandoned.store(engine.stop().len(), Ordering::SeqCst);
                        }
                        Ok(())
                    }),
                    Duration::ZERO,
                    Duration::from_millis(100),
                )
                .unwrap();
        }
        engine
            .schedule_task(task(|_| Ok(())), Duration::from_secs(5), Duration::ZERO)
            .unwrap();

        engine.tick().unwrap();
        assert_eq!(engine.state(), EngineState::Stopped);
        // The running task and the queued one.
        assert_eq!(abandoned.load(Ordering::SeqCst), 2);
        assert_eq!(engine.queued_count(), 0);
        assert!(matches!(engine.step(), Err(Error::Shutdown)));
    }

    #[test]
    fn test_step_after_pause_resumes() {
        let (engine, _clock) = manual(10);
        engine.step().unwrap();
        engine.pause().unwrap();
        engine.pause().unwrap();
        assert_eq!(engine.state(), EngineState::Paused);
        engine.step().unwrap();
        assert_eq!(engine.state(), EngineState::InWait);
        assert_eq!(engine.tick_info().tick_count, 2);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(ManualEngine::new(0), Err(Error::InvalidConfig(_))));
    }
}
