//! Per task-type timeout, retry and pacing policy.
//!
//! The policy is pure data plus decisions. It never touches the queue or the
//! resource manager; the module that owns a task applies its verdicts
//! (re-enqueue, or release the reservation on abandonment).

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::task::{Task, TaskState, TaskType};
use crate::core::SchedulerError;
use crate::util::clock::after_ms;

/// Default transfer speed for payload-moving tasks (10 MiB/s).
pub const DEFAULT_TASK_SPEED: u64 = 10 * 1024 * 1024;

/// How an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Worth another attempt (timeouts, transient chain/network errors).
    Retryable,
    /// Retrying cannot help (bad input, key failure).
    Fatal,
}

/// Failure reported by an executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    /// Classification.
    pub kind: FailureKind,
    /// Human-readable reason.
    pub reason: String,
}

impl TaskFailure {
    /// A failure worth retrying.
    pub fn retryable(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Retryable,
            reason: reason.into(),
        }
    }

    /// A failure that ends the task.
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Fatal,
            reason: reason.into(),
        }
    }

    /// The attempt overran its deadline.
    pub fn timed_out() -> Self {
        Self::retryable("task timed out")
    }

    /// Whether another attempt may be made.
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind, FailureKind::Retryable)
    }
}

/// Policy for one task type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPolicy {
    /// Target transfer speed in bytes per second; `0` means the type does not
    /// move payload and is timed by `timeout` alone.
    pub speed_bytes_per_sec: u64,
    /// Minimum time a running attempt gets before it counts as failed.
    pub timeout: Duration,
    /// Failed attempts allowed before abandonment.
    pub max_retry: u32,
}

impl TaskPolicy {
    /// Default policy for a type. Garbage collection gets much longer
    /// timeouts than interactive transfers.
    pub const fn default_for(task_type: TaskType) -> Self {
        let (speed, timeout_secs, max_retry) = match task_type {
            TaskType::Approval => (0, 10, 0),
            TaskType::Upload | TaskType::Download => (DEFAULT_TASK_SPEED, 60, 0),
            TaskType::Replicate => (DEFAULT_TASK_SPEED, 90, 3),
            TaskType::ReceiveConfirm => (DEFAULT_TASK_SPEED, 60, 3),
            TaskType::SealObject => (0, 120, 3),
            TaskType::GcObject | TaskType::GcZombie | TaskType::GcMeta => (0, 3_600, 2),
        };
        Self {
            speed_bytes_per_sec: speed,
            timeout: Duration::from_secs(timeout_secs),
            max_retry,
        }
    }

    /// Time needed to move `payload_size` bytes at the target speed, in
    /// whole milliseconds.
    pub fn transfer_time(&self, payload_size: u64) -> Duration {
        if self.speed_bytes_per_sec == 0 {
            return Duration::ZERO;
        }
        let millis = u128::from(payload_size) * 1_000 / u128::from(self.speed_bytes_per_sec);
        Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
    }
}

/// What the owner must do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// Task is `Queued` again; push it back.
    Requeued {
        /// Failed attempts so far.
        retry_count: u32,
    },
    /// Task is `Abandoned`; release its reservation.
    Abandoned {
        /// Failed attempts counted.
        attempts: u32,
    },
}

/// Policies for every task type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecyclePolicy {
    policies: HashMap<TaskType, TaskPolicy>,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

impl LifecyclePolicy {
    /// Build from overrides; types without one get
    /// [`TaskPolicy::default_for`].
    pub fn new(overrides: HashMap<TaskType, TaskPolicy>) -> Self {
        let policies = TaskType::ALL
            .iter()
            .map(|t| {
                let policy = overrides
                    .get(t)
                    .copied()
                    .unwrap_or_else(|| TaskPolicy::default_for(*t));
                (*t, policy)
            })
            .collect();
        Self { policies }
    }

    /// Policy for a type.
    pub fn policy(&self, task_type: TaskType) -> TaskPolicy {
        self.policies
            .get(&task_type)
            .copied()
            .unwrap_or_else(|| TaskPolicy::default_for(task_type))
    }

    /// Timeout for one attempt: the configured minimum, stretched to cover
    /// the transfer time of large payloads.
    pub fn timeout_for(&self, task_type: TaskType, payload_size: u64) -> Duration {
        let policy = self.policy(task_type);
        policy.timeout.max(policy.transfer_time(payload_size))
    }

    /// Minimum spacing between dispatches of this type for a payload size.
    /// Used by callers that pace dispatch; the queue does not enforce it.
    pub fn dispatch_interval(&self, task_type: TaskType, payload_size: u64) -> Duration {
        self.policy(task_type).transfer_time(payload_size)
    }

    /// Deadline of an attempt started at `start_ms`.
    pub fn expire_at_for(&self, task_type: TaskType, start_ms: u128, payload_size: u64) -> u128 {
        after_ms(start_ms, self.timeout_for(task_type, payload_size))
    }

    /// Fill in `max_retry` and the deadline of the next attempt.
    pub fn stamp(&self, task: &mut Task, now_ms: u128) {
        task.max_retry = self.policy(task.task_type).max_retry;
        task.expire_at_ms = Some(self.expire_at_for(task.task_type, now_ms, task.payload_size));
    }

    /// New stamped task created at `now_ms`.
    pub fn new_task(&self, task_type: TaskType, now_ms: u128) -> Task {
        let mut task = Task::new(task_type, now_ms);
        self.stamp(&mut task, now_ms);
        task
    }

    /// Whether a running task overran its deadline.
    pub fn is_expired(&self, task: &Task, now_ms: u128) -> bool {
        task.is_expired(now_ms)
    }

    /// Apply a failed attempt to a `Running` task.
    ///
    /// A retryable failure counts against the budget: the task is requeued
    /// while `retry_count < max_retry` after counting, so a task with
    /// `max_retry = k` is abandoned on exactly its `k`-th retryable failure
    /// (and on its first one when `k` is zero). A fatal failure abandons at
    /// once.
    pub fn on_failure(
        &self,
        task: &mut Task,
        failure: &TaskFailure,
        now_ms: u128,
    ) -> Result<LifecycleOutcome, SchedulerError> {
        task.transition(TaskState::Failed)?;
        task.last_error = Some(failure.reason.clone());

        if failure.is_retryable() {
            task.retry_count += 1;
            if task.retry_count < task.max_retry {
                task.transition(TaskState::Queued)?;
                task.expire_at_ms =
                    Some(self.expire_at_for(task.task_type, now_ms, task.payload_size));
                info!(
                    task = %task.id,
                    task_type = %task.task_type,
                    retry = task.retry_count,
                    max_retry = task.max_retry,
                    reason = %failure.reason,
                    "task requeued for retry"
                );
                return Ok(LifecycleOutcome::Requeued {
                    retry_count: task.retry_count,
                });
            }
        }

        task.transition(TaskState::Abandoned)?;
        warn!(
            task = %task.id,
            task_type = %task.task_type,
            attempts = task.retry_count,
            kind = ?failure.kind,
            reason = %failure.reason,
            "task abandoned"
        );
        Ok(LifecycleOutcome::Abandoned {
            attempts: task.retry_count,
        })
    }

    /// Apply a timeout to a `Running` task.
    pub fn on_timeout(
        &self,
        task: &mut Task,
        now_ms: u128,
    ) -> Result<LifecycleOutcome, SchedulerError> {
        self.on_failure(task, &TaskFailure::timed_out(), now_ms)
    }
}
