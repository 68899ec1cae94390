//! Tests for the task journal

use std::sync::Arc;
use std::thread;

use sp_scheduler::core::{
    InMemoryJournal, JobRecord, NullJournal, Task, TaskJournal, TaskState, TaskType,
};

#[test]
fn test_record_serializes_with_snake_case_enums() {
    let mut task = Task::new(TaskType::ReceiveConfirm, 1_000).with_object(11, 2_048);
    task.transition(TaskState::Queued).unwrap();
    let record = JobRecord::from_task(&task, 1_500);

    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["task_type"], "receive_confirm");
    assert_eq!(json["state"], "queued");
    assert_eq!(json["object_id"], 11);

    let back: JobRecord = serde_json::from_value(json).unwrap();
    assert_eq!(back, record);
}

#[test]
fn test_null_journal_keeps_nothing() {
    let journal = NullJournal;
    let task = Task::new(TaskType::GcObject, 0).with_object(1, 0);
    journal.record(JobRecord::from_task(&task, 0)).unwrap();
    assert!(journal.get(task.id).is_none());
    assert!(journal.get_by_object(1).is_none());
    assert!(journal.pending().is_empty());
}

#[test]
fn test_pending_is_oldest_first() {
    let journal = InMemoryJournal::new();
    for created in [30, 10, 20] {
        let task = Task::new(TaskType::Download, created);
        journal.record(JobRecord::from_task(&task, created)).unwrap();
    }
    let created: Vec<u128> = journal.pending().iter().map(|r| r.created_at_ms).collect();
    assert_eq!(created, vec![10, 20, 30]);
}

#[test]
fn test_concurrent_writers() {
    let journal = Arc::new(InMemoryJournal::new());
    thread::scope(|s| {
        for worker in 0..8u64 {
            let journal = Arc::clone(&journal);
            s.spawn(move || {
                for i in 0..50 {
                    let task = Task::new(TaskType::Replicate, 0).with_object(worker * 100 + i, 0);
                    journal.record(JobRecord::from_task(&task, 0)).unwrap();
                }
            });
        }
    });
    assert_eq!(journal.len(), 400);
    assert!(journal.get_by_object(742).is_some());
}
