//! Pending work ordered by estimated run time
//!
//! The queue itself is not synchronised; the engine keeps it behind the
//! same mutex as its in-flight map so a task id is never observable in both.

use crate::action::{Task, TaskId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A task together with its scheduling metadata
#[derive(Clone)]
pub struct ScheduledTask {
    id: TaskId,
    task: Arc<dyn Task>,
    period: Duration,
    estimated: Duration,
    cancelled: Arc<AtomicBool>,
}

impl ScheduledTask {
    /// Create a task due at `estimated`
    pub fn new(task: Arc<dyn Task>, period: Duration, estimated: Duration) -> Self {
        Self {
            id: TaskId::new(),
            task,
            period,
            estimated,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Task id
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// The work to run
    pub fn task(&self) -> &Arc<dyn Task> {
        &self.task
    }

    /// Period between runs (zero for one-shot)
    pub fn period(&self) -> Duration {
        self.period
    }

    /// True if the task repeats
    pub fn is_periodic(&self) -> bool {
        !self.period.is_zero()
    }

    /// Estimated engine time of the next run
    pub fn estimated(&self) -> Duration {
        self.estimated
    }

    pub(crate) fn reschedule(&mut self, estimated: Duration) {
        self.estimated = estimated;
    }

    /// Suppress further runs
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// True once cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub(crate) fn cancel_flag(&self) -> &AtomicBool {
        &self.cancelled
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("id", &self.id)
            .field("period", &self.period)
            .field("estimated", &self.estimated)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Min-ordered queue of scheduled tasks
///
/// Ties on estimated time are broken by insertion order.
#[derive(Debug, Default)]
pub struct TaskQueue {
    order: BTreeMap<(Duration, u64), ScheduledTask>,
    index: HashMap<TaskId, (Duration, u64)>,
    next_seq: u64,
}

impl TaskQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task, replacing any queued task with the same id
    pub fn insert(&mut self, task: ScheduledTask) {
        self.take_by_id(task.id());
        let key = (task.estimated(), self.next_seq);
        self.next_seq += 1;
        self.index.insert(task.id(), key);
        self.order.insert(key, task);
    }

    /// Earliest task whose estimated time is before `before`
    pub fn peek_due(&self, before: Duration) -> Option<&ScheduledTask> {
        self.order
            .iter()
            .next()
            .filter(|((estimated, _), _)| *estimated < before)
            .map(|(_, task)| task)
    }

    /// Remove and return the earliest task due before `before`
    pub fn pop_due(&mut self, before: Duration) -> Option<ScheduledTask> {
        let key = *self
            .order
            .keys()
            .next()
            .filter(|(estimated, _)| *estimated < before)?;
        let task = self.order.remove(&key)?;
        self.index.remove(&task.id());
        Some(task)
    }

    /// Remove a task by id, returning whether it was queued
    pub fn remove_by_id(&mut self, id: TaskId) -> bool {
        self.take_by_id(id).is_some()
    }

    /// Remove and return a task by id
    pub fn take_by_id(&mut self, id: TaskId) -> Option<ScheduledTask> {
        let key = self.index.remove(&id)?;
        self.order.remove(&key)
    }

    /// Look up a queued task by id
    pub fn get_by_id(&self, id: TaskId) -> Option<&ScheduledTask> {
        let key = self.index.get(&id)?;
        self.order.get(key)
    }

    /// Check whether a task is queued
    pub fn contains_by_id(&self, id: TaskId) -> bool {
        self.index.contains_key(&id)
    }

    /// Estimated time of the earliest task
    pub fn next_estimated(&self) -> Option<Duration> {
        self.order.keys().next().map(|(estimated, _)| *estimated)
    }

    /// Remove every task, in run order
    pub fn drain(&mut self) -> Vec<ScheduledTask> {
        self.index.clear();
        std::mem::take(&mut self.order).into_values().collect()
    }

    /// Number of queued tasks
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionResult, TaskContext};
    use proptest::prelude::*;

    struct Noop;

    impl Task for Noop {
        fn run(&self, _context: &TaskContext<'_>) -> ActionResult {
            Ok(())
        }
    }

    fn task_at(millis: u64) -> ScheduledTask {
        ScheduledTask::new(Arc::new(Noop), Duration::ZERO, Duration::from_millis(millis))
    }

    #[test]
    fn test_pop_due_respects_window() {
        let mut queue = TaskQueue::new();
        queue.insert(task_at(150));
        queue.insert(task_at(50));

        let window = Duration::from_millis(100);
        assert_eq!(
            queue.peek_due(window).map(|t| t.estimated()),
            Some(Duration::from_millis(50))
        );
        assert_eq!(
            queue.pop_due(window).map(|t| t.estimated()),
            Some(Duration::from_millis(50))
        );
        assert!(queue.pop_due(window).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_window_end_is_exclusive() {
        let mut queue = TaskQueue::new();
        queue.insert(task_at(100));
        assert!(queue.pop_due(Duration::from_millis(100)).is_none());
        assert!(queue.pop_due(Duration::from_millis(101)).is_some());
    }

    #[test]
    fn test_remove_by_id() {
        let mut queue = TaskQueue::new();
        let task = task_at(10);
        let id = task.id();
        queue.insert(task);
        queue.insert(task_at(20));

        assert!(queue.contains_by_id(id));
        assert!(queue.remove_by_id(id));
        assert!(!queue.contains_by_id(id));
        assert!(!queue.remove_by_id(id));
        assert_eq!(queue.next_estimated(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn test_reinsert_replaces() {
        let mut queue = TaskQueue::new();
        let mut task = task_at(10);
        queue.insert(task.clone());
        task.reschedule(Duration::from_millis(30));
        queue.insert(task);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_estimated(), Some(Duration::from_millis(30)));
    }

    #[test]
    fn test_drain() {
        let mut queue = TaskQueue::new();
        queue.insert(task_at(30));
        queue.insert(task_at(10));
        let drained: Vec<_> = queue.drain().iter().map(|t| t.estimated()).collect();
        assert_eq!(
            drained,
            vec![Duration::from_millis(10), Duration::from_millis(30)]
        );
        assert!(queue.is_empty());
    }

    proptest! {
        #[test]
        fn prop_pops_in_time_then_insertion_order(times in prop::collection::vec(0u64..20, 1..40)) {
            let mut queue = TaskQueue::new();
            let mut expected = Vec::new();
            for (seq, millis) in times.iter().enumerate() {
                let task = task_at(*millis);
                expected.push((*millis, seq, task.id()));
                queue.insert(task);
            }
            expected.sort_by_key(|(millis, seq, _)| (*millis, *seq));

            let mut popped = Vec::new();
            while let Some(task) = queue.pop_due(Duration::MAX) {
                popped.push(task.id());
            }
            let expected_ids: Vec<_> = expected.into_iter().map(|(_, _, id)| id).collect();
            prop_assert_eq!(popped, expected_ids);
            prop_assert!(queue.is_empty());
        }
    }
}
