//! Schedulable units of work and their state machine.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::limit::PriorityClass;
use crate::core::resource_manager::ReservationHandle;
use crate::core::SchedulerError;

/// Unique task identifier.
pub type TaskId = Uuid;

/// Kind of work a task performs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Approve a bucket/object creation request.
    Approval,
    /// Receive object payload from a client.
    Upload,
    /// Serve object payload to a client.
    Download,
    /// Push pieces to secondary providers.
    Replicate,
    /// Confirm pieces received from a primary provider.
    ReceiveConfirm,
    /// Seal an object on chain.
    SealObject,
    /// Collect deleted objects.
    GcObject,
    /// Collect objects that never got sealed.
    GcZombie,
    /// Collect stale metadata.
    GcMeta,
}

impl TaskType {
    /// Every task type.
    pub const ALL: [Self; 9] = [
        Self::Approval,
        Self::Upload,
        Self::Download,
        Self::Replicate,
        Self::ReceiveConfirm,
        Self::SealObject,
        Self::GcObject,
        Self::GcZombie,
        Self::GcMeta,
    ];

    /// Class a task of this type is scheduled in unless overridden.
    pub const fn default_priority(self) -> PriorityClass {
        match self {
            Self::Approval | Self::Upload | Self::Download => PriorityClass::High,
            Self::Replicate | Self::ReceiveConfirm | Self::SealObject => PriorityClass::Medium,
            Self::GcObject | Self::GcZombie | Self::GcMeta => PriorityClass::Low,
        }
    }

    /// Background garbage-collection work.
    pub const fn is_gc(self) -> bool {
        matches!(self, Self::GcObject | Self::GcZombie | Self::GcMeta)
    }

    /// Snake-case name used in logs and config keys.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approval => "approval",
            Self::Upload => "upload",
            Self::Download => "download",
            Self::Replicate => "replicate",
            Self::ReceiveConfirm => "receive_confirm",
            Self::SealObject => "seal_object",
            Self::GcObject => "gc_object",
            Self::GcZombie => "gc_zombie",
            Self::GcMeta => "gc_meta",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a task.
///
/// ```text
/// Created -> Queued -> Running -> Succeeded
///              ^          |
///              |          v
///              +------ Failed -> Abandoned
/// ```
///
/// A queued task that is cancelled or expires before running moves straight
/// to `Abandoned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Built but not admitted.
    Created,
    /// Waiting in a queue.
    Queued,
    /// Picked up by a worker.
    Running,
    /// Finished successfully (terminal).
    Succeeded,
    /// Last attempt failed; awaiting retry decision.
    Failed,
    /// Given up (terminal).
    Abandoned,
}

impl TaskState {
    /// No further transitions allowed.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Abandoned)
    }

    /// Whether the state machine permits `self -> to`.
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Created | Self::Failed, Self::Queued)
                | (Self::Queued, Self::Running | Self::Abandoned)
                | (Self::Running, Self::Succeeded | Self::Failed)
                | (Self::Failed, Self::Abandoned)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Abandoned => "abandoned",
        };
        f.write_str(name)
    }
}

/// A unit of schedulable work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Unique identifier.
    pub id: TaskId,
    /// Kind of work.
    pub task_type: TaskType,
    /// Scheduling class.
    pub priority: PriorityClass,
    /// Object the task works on, if any.
    pub object_id: Option<u64>,
    /// Payload bytes the task moves; scales transfer timeouts.
    pub payload_size: u64,
    /// Creation time, ms since epoch.
    pub created_at_ms: u128,
    /// Time after which a running attempt counts as timed out.
    pub expire_at_ms: Option<u128>,
    /// Failed attempts so far.
    pub retry_count: u32,
    /// Failed attempts allowed before abandonment.
    pub max_retry: u32,
    /// Current lifecycle state.
    pub state: TaskState,
    /// Capacity booked for the task, released exactly once on a terminal
    /// state.
    pub reservation: Option<ReservationHandle>,
    /// Reason of the most recent failure.
    pub last_error: Option<String>,
}

impl Task {
    /// New task in `Created` state with its type's default priority.
    pub fn new(task_type: TaskType, created_at_ms: u128) -> Self {
        Self::with_id(Uuid::new_v4(), task_type, created_at_ms)
    }

    /// New task with a caller-chosen id (used when rebuilding from the
    /// journal).
    pub const fn with_id(id: TaskId, task_type: TaskType, created_at_ms: u128) -> Self {
        Self {
            id,
            task_type,
            priority: task_type.default_priority(),
            object_id: None,
            payload_size: 0,
            created_at_ms,
            expire_at_ms: None,
            retry_count: 0,
            max_retry: 0,
            state: TaskState::Created,
            reservation: None,
            last_error: None,
        }
    }

    /// Override the scheduling class.
    #[must_use]
    pub fn with_priority(mut self, priority: PriorityClass) -> Self {
        self.priority = priority;
        self
    }

    /// Attach the object being worked on and its payload size.
    #[must_use]
    pub fn with_object(mut self, object_id: u64, payload_size: u64) -> Self {
        self.object_id = Some(object_id);
        self.payload_size = payload_size;
        self
    }

    /// Move to `to`, enforcing the state machine.
    pub fn transition(&mut self, to: TaskState) -> Result<(), SchedulerError> {
        if !self.state.can_transition_to(to) {
            return Err(SchedulerError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        tracing::trace!(task = %self.id, from = %self.state, to = %to, "task transition");
        self.state = to;
        Ok(())
    }

    /// Whether the current attempt's deadline has passed.
    pub fn is_expired(&self, now_ms: u128) -> bool {
        self.expire_at_ms.is_some_and(|deadline| now_ms >= deadline)
    }
}
