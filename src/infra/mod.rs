//! Infrastructure adapters for queues.

pub mod queue;

pub use queue::{new_task_queue, LimitedTaskQueue, QueueStrategy, UnboundedTaskQueue};
