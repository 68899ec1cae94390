//! Producer/consumer wiring over a [`NodeContext`].
//!
//! Producers call [`Dispatcher::submit`]: capacity is reserved first and the
//! task is queued only on a grant. Consumers call [`Dispatcher::run_once`]
//! (or run [`Dispatcher::spawn_workers`]): a task is popped, executed, and
//! either finished, requeued or abandoned according to the lifecycle policy.
//! The reservation stays with the task across retries and is released
//! exactly once, when the task reaches a terminal state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::core::{
    JobRecord, LifecycleOutcome, ResourceRequest, SchedulerError, Spawn, Task, TaskExecutor,
    TaskFailure, TaskId, TaskSelector, TaskState,
};
use crate::runtime::context::NodeContext;
use crate::util::clock::{after_ms, now_ms};

/// Result of one consumer step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Task finished.
    Succeeded(TaskId),
    /// Task failed and was put back.
    Requeued {
        /// Task id.
        task: TaskId,
        /// Failed attempts so far.
        retry_count: u32,
    },
    /// Task failed for good; its reservation is released.
    Abandoned {
        /// Task id.
        task: TaskId,
        /// Failed attempts counted.
        attempts: u32,
    },
}

/// Admission, dispatch and completion over shared node state.
#[derive(Debug)]
pub struct Dispatcher {
    ctx: Arc<NodeContext>,
    shutdown: AtomicBool,
}

impl Dispatcher {
    /// Dispatcher over `ctx`.
    pub fn new(ctx: Arc<NodeContext>) -> Self {
        Self {
            ctx,
            shutdown: AtomicBool::new(false),
        }
    }

    /// Shared node state.
    pub fn context(&self) -> &Arc<NodeContext> {
        &self.ctx
    }

    /// Reserve capacity for `task` and queue it.
    ///
    /// The reservation is booked in the task's priority class whatever
    /// `demand.class` says. Fails fast with
    /// [`SchedulerError::ResourceExhausted`] or [`SchedulerError::QueueFull`];
    /// on a queue rejection the task is journaled as abandoned and the
    /// reservation is returned before the error is.
    pub fn submit(
        &self,
        mut task: Task,
        demand: ResourceRequest,
    ) -> Result<TaskId, SchedulerError> {
        let now = now_ms();
        self.ctx.lifecycle.stamp(&mut task, now);
        task.transition(TaskState::Queued)?;

        let request = ResourceRequest {
            class: task.priority,
            ..demand
        };
        let handle = self.ctx.rcmgr.reserve(request)?;
        task.reservation = Some(handle);

        let id = task.id;
        // Journaled before the push so a worker's later write always wins.
        self.journal(JobRecord::from_task(&task, now));
        if let Err(err) = self.ctx.queue.push(task.clone()) {
            task.last_error = Some(err.to_string());
            task.transition(TaskState::Abandoned)?;
            self.release(&mut task);
            self.journal(JobRecord::from_task(&task, now));
            debug!(task = %id, error = %err, "task rejected by queue");
            return Err(err);
        }
        debug!(task = %id, "task admitted");
        Ok(id)
    }

    /// Pop one task, run it, and apply the outcome.
    ///
    /// The attempt is bounded by the lifecycle timeout of its type and
    /// payload. An attempt that overruns it counts as a retryable failure
    /// even if the executor reports success. A task whose retry budget runs
    /// out is abandoned and reported as [`SchedulerError::RetryExhausted`].
    pub async fn run_once(
        &self,
        executor: &dyn TaskExecutor,
        selector: Option<TaskSelector<'_>>,
    ) -> Result<RunOutcome, SchedulerError> {
        let mut task = self.ctx.queue.pop(selector)?;
        let started = now_ms();
        if let Err(err) = task.transition(TaskState::Running) {
            error!(task = %task.id, state = %task.state, "popped task cannot run");
            task.last_error = Some(err.to_string());
            task.state = TaskState::Abandoned;
            self.finish_abandoned(&mut task, started);
            return Err(err);
        }
        let timeout = self
            .ctx
            .lifecycle
            .timeout_for(task.task_type, task.payload_size);
        task.expire_at_ms = Some(after_ms(started, timeout));
        self.journal(JobRecord::from_task(&task, started));

        let result = tokio::time::timeout(timeout, executor.execute(&task)).await;
        let finished = now_ms();
        let elapsed_ms = u64::try_from(finished.saturating_sub(started)).unwrap_or(u64::MAX);

        let (verdict, failure) = match result {
            Ok(Ok(())) if !task.is_expired(finished) => {
                task.transition(TaskState::Succeeded)?;
                self.release(&mut task);
                self.ctx.metrics.record_success();
                self.journal(JobRecord::from_task(&task, finished));
                info!(task = %task.id, task_type = %task.task_type, elapsed_ms, "task succeeded");
                return Ok(RunOutcome::Succeeded(task.id));
            }
            Ok(Err(failure)) => {
                let verdict = self.ctx.lifecycle.on_failure(&mut task, &failure, finished)?;
                (verdict, failure)
            }
            Ok(Ok(())) | Err(_) => {
                warn!(task = %task.id, task_type = %task.task_type, elapsed_ms, "task timed out");
                let verdict = self.ctx.lifecycle.on_timeout(&mut task, finished)?;
                (verdict, TaskFailure::timed_out())
            }
        };

        match verdict {
            LifecycleOutcome::Requeued { retry_count } => {
                self.ctx.metrics.record_retry();
                let id = task.id;
                self.journal(JobRecord::from_task(&task, finished));
                match self.ctx.queue.push(task.clone()) {
                    Ok(()) => Ok(RunOutcome::Requeued {
                        task: id,
                        retry_count,
                    }),
                    Err(err) => {
                        warn!(task = %id, error = %err, "requeue rejected, abandoning");
                        task.last_error = Some(err.to_string());
                        task.transition(TaskState::Abandoned)?;
                        Ok(self.abandon(task, finished))
                    }
                }
            }
            LifecycleOutcome::Abandoned { attempts } if failure.is_retryable() => {
                let exhausted = SchedulerError::RetryExhausted {
                    task: task.id,
                    attempts,
                };
                task.last_error = Some(format!("{exhausted}: {}", failure.reason));
                self.finish_abandoned(&mut task, finished);
                Err(exhausted)
            }
            LifecycleOutcome::Abandoned { .. } => Ok(self.abandon(task, finished)),
        }
    }

    /// Drop a queued task. Running tasks are never preempted; `None` means
    /// the task is not (or no longer) queued.
    pub fn cancel(&self, id: TaskId) -> Option<Task> {
        let mut task = self.ctx.queue.remove(id)?;
        task.last_error = Some("cancelled".into());
        if let Err(err) = task.transition(TaskState::Abandoned) {
            error!(task = %id, error = %err, "cancelled task in unexpected state");
        }
        info!(task = %id, "task cancelled");
        self.finish_abandoned(&mut task, now_ms());
        Some(task)
    }

    /// Abandon every queued task whose deadline passed, releasing their
    /// reservations. Returns the abandoned tasks.
    pub fn prune_expired(&self, now_ms: u128) -> Vec<Task> {
        let mut pruned = self.ctx.queue.prune_expired(now_ms);
        for task in &mut pruned {
            task.last_error = Some("expired while queued".into());
            if let Err(err) = task.transition(TaskState::Abandoned) {
                error!(task = %task.id, error = %err, "expired task in unexpected state");
            }
            self.finish_abandoned(task, now_ms);
        }
        if !pruned.is_empty() {
            warn!(count = pruned.len(), "expired tasks abandoned");
        }
        pruned
    }

    /// Resubmit every non-terminal task found in the journal. `demand` gives
    /// the resources each task needs. Tasks that cannot be admitted are
    /// logged and skipped. Returns how many were queued.
    pub fn recover(&self, demand: impl Fn(&Task) -> ResourceRequest) -> usize {
        let mut queued = 0;
        for record in self.ctx.journal.pending() {
            let task = record.to_task();
            let request = demand(&task);
            match self.submit(task, request) {
                Ok(_) => queued += 1,
                Err(err) => {
                    warn!(task = %record.task_id, error = %err, "could not recover task");
                }
            }
        }
        info!(queued, "recovered pending tasks from journal");
        queued
    }

    /// Start `workers` loops calling [`Dispatcher::run_once`] until
    /// [`Dispatcher::shutdown`]. An idle loop sleeps for `idle`.
    pub fn spawn_workers<S: Spawn>(
        self: &Arc<Self>,
        spawner: &S,
        executor: Arc<dyn TaskExecutor>,
        workers: usize,
        idle: Duration,
    ) {
        for worker in 0..workers {
            let dispatcher = Arc::clone(self);
            let executor = Arc::clone(&executor);
            spawner.spawn(async move {
                debug!(worker, "worker started");
                while !dispatcher.is_shutdown() {
                    match dispatcher.run_once(executor.as_ref(), None).await {
                        Ok(_) => {}
                        Err(SchedulerError::QueueEmpty) => tokio::time::sleep(idle).await,
                        Err(err @ SchedulerError::RetryExhausted { .. }) => {
                            warn!(worker, error = %err, "task gave up");
                        }
                        Err(err) => {
                            error!(worker, error = %err, "worker step failed");
                            tokio::time::sleep(idle).await;
                        }
                    }
                }
                debug!(worker, "worker stopped");
            });
        }
    }

    /// [`Dispatcher::spawn_workers`] with the node's configured worker count.
    pub fn spawn_configured_workers<S: Spawn>(
        self: &Arc<Self>,
        spawner: &S,
        executor: Arc<dyn TaskExecutor>,
        idle: Duration,
    ) {
        info!(workers = self.ctx.workers, "starting workers");
        self.spawn_workers(spawner, executor, self.ctx.workers, idle);
    }

    /// Ask worker loops to stop after their current task.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Whether [`Dispatcher::shutdown`] was called.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn abandon(&self, mut task: Task, now: u128) -> RunOutcome {
        self.finish_abandoned(&mut task, now);
        RunOutcome::Abandoned {
            task: task.id,
            attempts: task.retry_count,
        }
    }

    fn finish_abandoned(&self, task: &mut Task, now: u128) {
        self.release(task);
        self.ctx.metrics.record_abandon();
        self.journal(JobRecord::from_task(task, now));
    }

    fn release(&self, task: &mut Task) {
        if let Some(handle) = task.reservation.take() {
            if let Err(err) = self.ctx.rcmgr.release(handle) {
                error!(task = %task.id, error = %err, "reservation release failed");
            }
        }
    }

    fn journal(&self, record: JobRecord) {
        let id = record.task_id;
        if let Err(err) = self.ctx.journal.record(record) {
            warn!(task = %id, error = %err, "journal write failed");
        }
    }
}
