//! Shared handles for one running node.

use std::sync::Arc;

use crate::core::{LifecyclePolicy, NodeMetrics, ResourceManager, TaskJournal, TaskQueue};
use crate::signer::SignerClient;

/// Everything producers and consumers share. Built once by
/// [`NodeBuilder`](crate::builders::NodeBuilder) and passed around by `Arc`.
#[derive(Clone)]
pub struct NodeContext {
    /// Admission control.
    pub rcmgr: Arc<dyn ResourceManager>,
    /// Pending work.
    pub queue: Arc<dyn TaskQueue>,
    /// Timeout and retry policy.
    pub lifecycle: Arc<LifecyclePolicy>,
    /// Task state records.
    pub journal: Arc<dyn TaskJournal>,
    /// Counters.
    pub metrics: Arc<NodeMetrics>,
    /// Chain signer, when the node is configured with one.
    pub signer: Option<Arc<SignerClient>>,
    /// Worker loops to start by default.
    pub workers: usize,
}

impl std::fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeContext")
            .field("queue_len", &self.queue.len())
            .field("queue_capacity", &self.queue.capacity())
            .field("live_reservations", &self.rcmgr.usage().live_reservations)
            .field("signer", &self.signer.is_some())
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}
