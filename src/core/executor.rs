//! Task execution and spawning abstractions.

use std::future::Future;

use async_trait::async_trait;

use crate::core::lifecycle::TaskFailure;
use crate::core::task::Task;

/// Runs the business logic of a popped task.
///
/// The executor only reports what happened. Retry, abandonment and
/// reservation release are decided by the dispatcher through the
/// lifecycle policy.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use sp_scheduler::core::{Task, TaskExecutor, TaskFailure};
///
/// struct GcExecutor;
///
/// #[async_trait]
/// impl TaskExecutor for GcExecutor {
///     async fn execute(&self, task: &Task) -> Result<(), TaskFailure> {
///         if task.object_id.is_none() {
///             return Err(TaskFailure::fatal("gc task without object"));
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Run one attempt of `task`. Long-running executors should check
    /// [`Task::is_expired`] and bail out with [`TaskFailure::timed_out`].
    async fn execute(&self, task: &Task) -> Result<(), TaskFailure>;
}

/// Spawner abstraction for the runtime that drives worker loops.
pub trait Spawn {
    /// Spawn a future onto the runtime.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
