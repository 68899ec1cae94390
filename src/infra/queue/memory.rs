//! In-memory priority queues.
//!
//! Tasks are kept in a `BTreeMap` keyed by `(class rank, insertion seq)`, so
//! in-order iteration is exactly pop order: High before Medium before Low,
//! FIFO within a class. A side index maps task ids to keys for `remove`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::core::{NodeMetrics, SchedulerError, Task, TaskId, TaskQueue, TaskSelector};

type QueueKey = (usize, u64);

#[derive(Debug, Default)]
struct OrderedTasks {
    tasks: BTreeMap<QueueKey, Task>,
    index: HashMap<TaskId, QueueKey>,
    next_seq: u64,
}

impl OrderedTasks {
    fn insert(&mut self, task: Task) {
        let key = (task.priority.rank(), self.next_seq);
        self.next_seq += 1;
        if let Some(stale) = self.index.insert(task.id, key) {
            // Same id pushed twice: keep only the newest copy.
            self.tasks.remove(&stale);
        }
        self.tasks.insert(key, task);
    }

    fn pop(&mut self, selector: Option<TaskSelector<'_>>) -> Option<Task> {
        let key = match selector {
            None => self.tasks.keys().next().copied(),
            Some(accept) => self
                .tasks
                .iter()
                .find(|(_, task)| accept(task))
                .map(|(key, _)| *key),
        }?;
        self.take(key)
    }

    fn take(&mut self, key: QueueKey) -> Option<Task> {
        let task = self.tasks.remove(&key)?;
        self.index.remove(&task.id);
        Some(task)
    }

    fn remove(&mut self, id: TaskId) -> Option<Task> {
        let key = self.index.get(&id).copied()?;
        self.take(key)
    }

    fn prune_expired(&mut self, now_ms: u128) -> Vec<Task> {
        let expired: Vec<QueueKey> = self
            .tasks
            .iter()
            .filter(|(_, task)| task.is_expired(now_ms))
            .map(|(key, _)| *key)
            .collect();
        expired.into_iter().filter_map(|key| self.take(key)).collect()
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }
}

#[derive(Debug)]
struct QueueCore {
    inner: Mutex<OrderedTasks>,
    metrics: Option<Arc<NodeMetrics>>,
}

impl QueueCore {
    fn new(metrics: Option<Arc<NodeMetrics>>) -> Self {
        Self {
            inner: Mutex::new(OrderedTasks::default()),
            metrics,
        }
    }

    fn publish_depth(&self, depth: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.set_queue_depth(depth);
        }
    }

    fn push(&self, task: Task, capacity: Option<usize>) -> Result<(), SchedulerError> {
        let mut inner = self.inner.lock();
        if let Some(cap) = capacity {
            if inner.len() >= cap && !inner.index.contains_key(&task.id) {
                drop(inner);
                warn!(
                    task = %task.id,
                    task_type = %task.task_type,
                    capacity = cap,
                    "queue full, push rejected"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_queue_rejection();
                }
                return Err(SchedulerError::QueueFull(cap));
            }
        }
        debug!(task = %task.id, class = %task.priority, "task queued");
        inner.insert(task);
        self.publish_depth(inner.len());
        Ok(())
    }

    fn pop(&self, selector: Option<TaskSelector<'_>>) -> Result<Task, SchedulerError> {
        let mut inner = self.inner.lock();
        let task = inner.pop(selector).ok_or(SchedulerError::QueueEmpty)?;
        self.publish_depth(inner.len());
        Ok(task)
    }

    fn peek(&self) -> Option<Task> {
        self.inner.lock().tasks.values().next().cloned()
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }

    fn remove(&self, id: TaskId) -> Option<Task> {
        let mut inner = self.inner.lock();
        let removed = inner.remove(id);
        self.publish_depth(inner.len());
        removed
    }

    fn prune_expired(&self, now_ms: u128) -> Vec<Task> {
        let mut inner = self.inner.lock();
        let pruned = inner.prune_expired(now_ms);
        self.publish_depth(inner.len());
        if !pruned.is_empty() {
            debug!(count = pruned.len(), "pruned expired tasks");
        }
        pruned
    }
}

/// Queue without a capacity limit. `push` never fails.
#[derive(Debug)]
pub struct UnboundedTaskQueue {
    core: QueueCore,
}

impl Default for UnboundedTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl UnboundedTaskQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self {
            core: QueueCore::new(None),
        }
    }

    /// Empty queue publishing its depth to `metrics`.
    pub fn with_metrics(metrics: Arc<NodeMetrics>) -> Self {
        Self {
            core: QueueCore::new(Some(metrics)),
        }
    }
}

impl TaskQueue for UnboundedTaskQueue {
    fn push(&self, task: Task) -> Result<(), SchedulerError> {
        self.core.push(task, None)
    }

    fn pop(&self, selector: Option<TaskSelector<'_>>) -> Result<Task, SchedulerError> {
        self.core.pop(selector)
    }

    fn peek(&self) -> Option<Task> {
        self.core.peek()
    }

    fn len(&self) -> usize {
        self.core.len()
    }

    fn remove(&self, id: TaskId) -> Option<Task> {
        self.core.remove(id)
    }

    fn prune_expired(&self, now_ms: u128) -> Vec<Task> {
        self.core.prune_expired(now_ms)
    }

    fn capacity(&self) -> Option<usize> {
        None
    }
}

/// Queue holding at most `capacity` tasks; a push beyond that fails with
/// [`SchedulerError::QueueFull`].
#[derive(Debug)]
pub struct LimitedTaskQueue {
    core: QueueCore,
    capacity: usize,
}

impl LimitedTaskQueue {
    /// Empty queue with a fixed capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            core: QueueCore::new(None),
            capacity,
        }
    }

    /// Empty queue with a fixed capacity, publishing to `metrics`.
    pub fn with_metrics(capacity: usize, metrics: Arc<NodeMetrics>) -> Self {
        Self {
            core: QueueCore::new(Some(metrics)),
            capacity,
        }
    }
}

impl TaskQueue for LimitedTaskQueue {
    fn push(&self, task: Task) -> Result<(), SchedulerError> {
        self.core.push(task, Some(self.capacity))
    }

    fn pop(&self, selector: Option<TaskSelector<'_>>) -> Result<Task, SchedulerError> {
        self.core.pop(selector)
    }

    fn peek(&self) -> Option<Task> {
        self.core.peek()
    }

    fn len(&self) -> usize {
        self.core.len()
    }

    fn remove(&self, id: TaskId) -> Option<Task> {
        self.core.remove(id)
    }

    fn prune_expired(&self, now_ms: u128) -> Vec<Task> {
        self.core.prune_expired(now_ms)
    }

    fn capacity(&self) -> Option<usize> {
        Some(self.capacity)
    }
}
