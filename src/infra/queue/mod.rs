//! Queue backends and the strategy factory.

pub mod memory;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{NodeMetrics, TaskQueue};

pub use memory::{LimitedTaskQueue, UnboundedTaskQueue};

/// Which queue implementation a node runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueueStrategy {
    /// No capacity limit.
    #[default]
    Unbounded,
    /// At most `capacity` queued tasks.
    Limited {
        /// Maximum queued tasks.
        capacity: usize,
    },
}

/// Build the queue selected by `strategy`.
pub fn new_task_queue(
    strategy: QueueStrategy,
    metrics: Option<Arc<NodeMetrics>>,
) -> Arc<dyn TaskQueue> {
    match (strategy, metrics) {
        (QueueStrategy::Unbounded, None) => Arc::new(UnboundedTaskQueue::new()),
        (QueueStrategy::Unbounded, Some(m)) => Arc::new(UnboundedTaskQueue::with_metrics(m)),
        (QueueStrategy::Limited { capacity }, None) => Arc::new(LimitedTaskQueue::new(capacity)),
        (QueueStrategy::Limited { capacity }, Some(m)) => {
            Arc::new(LimitedTaskQueue::with_metrics(capacity, m))
        }
    }
}
