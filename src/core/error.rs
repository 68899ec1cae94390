//! Error types for admission, queueing and lifecycle operations.

use thiserror::Error;

use crate::core::limit::{Dimension, PriorityClass};
use crate::core::task::{TaskId, TaskState};
use crate::core::resource_manager::ReservationId;

/// Errors produced by scheduler components.
///
/// Every variant is recoverable by the caller; none of them should take the
/// process down.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Admission denied: granting the request would exceed a ceiling.
    #[error("resource exhausted: {dimension} limit reached for {class} priority")]
    ResourceExhausted {
        /// Class the request was made for.
        class: PriorityClass,
        /// First dimension that would have been exceeded.
        dimension: Dimension,
    },
    /// Release of a reservation that is not live (double release, or
    /// release without acquire).
    #[error("unknown reservation {0}: released twice or never acquired")]
    UnknownReservation(ReservationId),
    /// Malformed admission request.
    #[error("invalid resource request: {0}")]
    InvalidRequest(String),
    /// Capacity-limited queue is at its configured size.
    #[error("queue full: capacity {0}")]
    QueueFull(usize),
    /// No queued task matched.
    #[error("queue empty")]
    QueueEmpty,
    /// Retry budget consumed; the task is abandoned.
    #[error("task {task} abandoned after {attempts} attempts")]
    RetryExhausted {
        /// Abandoned task.
        task: TaskId,
        /// Failed attempts counted.
        attempts: u32,
    },
    /// The task state machine does not allow this move.
    #[error("invalid task transition from {from} to {to}")]
    InvalidTransition {
        /// Current state.
        from: TaskState,
        /// Requested state.
        to: TaskState,
    },
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
}

impl SchedulerError {
    /// Admission and queue pressure errors: retry after backoff.
    pub const fn is_backpressure(&self) -> bool {
        matches!(
            self,
            Self::ResourceExhausted { .. } | Self::QueueFull(_) | Self::QueueEmpty
        )
    }
}

/// Application-facing result using anyhow for bootstrap and wiring code.
pub type AppResult<T> = Result<T, anyhow::Error>;
