//! Durable record of task state transitions.
//!
//! The journal is the source for rebuilding the queue after a restart:
//! [`TaskJournal::pending`] lists every task whose last recorded state was
//! not terminal.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::task::{Task, TaskId, TaskState, TaskType};
use crate::core::SchedulerError;

/// Last known state of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Task identifier.
    pub task_id: TaskId,
    /// Object the task works on.
    pub object_id: Option<u64>,
    /// Kind of work.
    pub task_type: TaskType,
    /// Last recorded state.
    pub state: TaskState,
    /// Failed attempts so far.
    pub retry_count: u32,
    /// Payload size, kept so restarts rebuild the same timeout.
    pub payload_size: u64,
    /// Reason of the most recent failure.
    pub error: Option<String>,
    /// Creation time, ms since epoch.
    pub created_at_ms: u128,
    /// Time of the last recorded transition.
    pub modified_at_ms: u128,
}

impl JobRecord {
    /// Record reflecting `task` as of `now_ms`.
    pub fn from_task(task: &Task, now_ms: u128) -> Self {
        Self {
            task_id: task.id,
            object_id: task.object_id,
            task_type: task.task_type,
            state: task.state,
            retry_count: task.retry_count,
            payload_size: task.payload_size,
            error: task.last_error.clone(),
            created_at_ms: task.created_at_ms,
            modified_at_ms: now_ms,
        }
    }

    /// Rebuild a `Created` task carrying the recorded id and progress.
    pub fn to_task(&self) -> Task {
        let mut task = Task::with_id(self.task_id, self.task_type, self.created_at_ms);
        task.object_id = self.object_id;
        task.payload_size = self.payload_size;
        task.retry_count = self.retry_count;
        task.last_error = self.error.clone();
        task
    }
}

/// Storage for [`JobRecord`]s keyed by task id.
pub trait TaskJournal: Send + Sync {
    /// Insert or overwrite the record of `record.task_id`. A terminal
    /// record is final: moving it to another state fails with
    /// [`SchedulerError::InvalidTransition`].
    fn record(&self, record: JobRecord) -> Result<(), SchedulerError>;

    /// Record for a task id.
    fn get(&self, id: TaskId) -> Option<JobRecord>;

    /// Most recently modified record for an object.
    fn get_by_object(&self, object_id: u64) -> Option<JobRecord>;

    /// Records whose state is not terminal, oldest first.
    fn pending(&self) -> Vec<JobRecord>;
}

/// In-process journal for tests and single-node development.
#[derive(Debug, Default)]
pub struct InMemoryJournal {
    records: Mutex<HashMap<TaskId, JobRecord>>,
}

impl InMemoryJournal {
    /// Empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records kept.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether the journal is empty.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl TaskJournal for InMemoryJournal {
    fn record(&self, record: JobRecord) -> Result<(), SchedulerError> {
        let mut records = self.records.lock();
        if let Some(existing) = records.get(&record.task_id) {
            if existing.state.is_terminal() && existing.state != record.state {
                return Err(SchedulerError::InvalidTransition {
                    from: existing.state,
                    to: record.state,
                });
            }
        }
        records.insert(record.task_id, record);
        Ok(())
    }

    fn get(&self, id: TaskId) -> Option<JobRecord> {
        self.records.lock().get(&id).cloned()
    }

    fn get_by_object(&self, object_id: u64) -> Option<JobRecord> {
        self.records
            .lock()
            .values()
            .filter(|r| r.object_id == Some(object_id))
            .max_by_key(|r| r.modified_at_ms)
            .cloned()
    }

    fn pending(&self) -> Vec<JobRecord> {
        let mut pending: Vec<JobRecord> = self
            .records
            .lock()
            .values()
            .filter(|r| !r.state.is_terminal())
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.created_at_ms);
        pending
    }
}

/// Journal that keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullJournal;

impl TaskJournal for NullJournal {
    fn record(&self, _record: JobRecord) -> Result<(), SchedulerError> {
        Ok(())
    }

    fn get(&self, _id: TaskId) -> Option<JobRecord> {
        None
    }

    fn get_by_object(&self, _object_id: u64) -> Option<JobRecord> {
        None
    }

    fn pending(&self) -> Vec<JobRecord> {
        Vec::new()
    }
}
