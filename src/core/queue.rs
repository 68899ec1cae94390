//! Priority task queue contract.

use crate::core::task::{Task, TaskId, TaskType};
use crate::core::SchedulerError;

/// Predicate choosing which queued tasks a consumer is willing to take.
pub type TaskSelector<'a> = &'a (dyn Fn(&Task) -> bool + Sync);

/// Pending work ordered by class (High before Medium before Low), FIFO by
/// insertion within a class.
///
/// Implementations lock internally and never block waiting for work: an
/// empty or non-matching queue fails with [`SchedulerError::QueueEmpty`].
pub trait TaskQueue: Send + Sync {
    /// Add a task. Only capacity-limited queues fail, with
    /// [`SchedulerError::QueueFull`].
    fn push(&self, task: Task) -> Result<(), SchedulerError>;

    /// Remove and return the highest-ranked task accepted by `selector`
    /// (any task when `None`).
    fn pop(&self, selector: Option<TaskSelector<'_>>) -> Result<Task, SchedulerError>;

    /// Copy of the task `pop(None)` would return.
    fn peek(&self) -> Option<Task>;

    /// Number of queued tasks.
    fn len(&self) -> usize;

    /// Whether nothing is queued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove a queued task by id.
    fn remove(&self, id: TaskId) -> Option<Task>;

    /// Remove and return every task whose deadline is at or before `now_ms`.
    /// The caller owns the returned tasks and their reservations.
    fn prune_expired(&self, now_ms: u128) -> Vec<Task>;

    /// Configured capacity, `None` when unbounded.
    fn capacity(&self) -> Option<usize>;
}

/// Selector accepting a single task type.
pub fn by_type(task_type: TaskType) -> impl Fn(&Task) -> bool + Sync {
    move |task: &Task| task.task_type == task_type
}

/// Selector accepting any of several task types.
pub fn by_types(types: &[TaskType]) -> impl Fn(&Task) -> bool + Sync + '_ {
    move |task: &Task| types.contains(&task.task_type)
}
