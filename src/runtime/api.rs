//! Caller-facing status mapping.
//!
//! Front ends (HTTP handlers, RPC servers) never wait on admission: they
//! translate scheduler and signer errors into one of three outcomes.

use serde::{Deserialize, Serialize};

use crate::core::{ResourceRequest, SchedulerError, Task, TaskId};
use crate::runtime::dispatcher::Dispatcher;
use crate::signer::SignerError;

/// Outcome reported to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// Work accepted.
    Accepted,
    /// Node is busy; try again later.
    Unavailable,
    /// Work failed for good.
    Failed,
}

/// Response for a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// Outcome.
    pub status: ServiceStatus,
    /// Task id when accepted.
    pub task_id: Option<TaskId>,
    /// Error text otherwise.
    pub reason: Option<String>,
}

/// Map a scheduler error to the status a caller sees.
pub const fn status_of(err: &SchedulerError) -> ServiceStatus {
    if err.is_backpressure() {
        ServiceStatus::Unavailable
    } else {
        ServiceStatus::Failed
    }
}

/// Map a signer error to the status a caller sees.
pub const fn signer_status_of(err: &SignerError) -> ServiceStatus {
    match err {
        SignerError::InitNonce { .. } => ServiceStatus::Unavailable,
        _ => ServiceStatus::Failed,
    }
}

/// Submit a task and describe the result for a caller.
pub fn submit_task(dispatcher: &Dispatcher, task: Task, demand: ResourceRequest) -> SubmitResponse {
    match dispatcher.submit(task, demand) {
        Ok(id) => SubmitResponse {
            status: ServiceStatus::Accepted,
            task_id: Some(id),
            reason: None,
        },
        Err(err) => SubmitResponse {
            status: status_of(&err),
            task_id: None,
            reason: Some(err.to_string()),
        },
    }
}
