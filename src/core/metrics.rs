//! Lock-free counters for admission, queue and signer observability.
//!
//! Components share one [`NodeMetrics`] through an `Arc` and bump relaxed
//! atomics; exporters read a [`MetricsSnapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::core::limit::PriorityClass;

/// Admission counters for one priority class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounters {
    /// Reservations granted.
    pub grants: u64,
    /// Reservations denied.
    pub denials: u64,
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// High priority admission counters.
    pub high: ClassCounters,
    /// Medium priority admission counters.
    pub medium: ClassCounters,
    /// Low priority admission counters.
    pub low: ClassCounters,
    /// Tasks currently queued.
    pub queue_depth: u64,
    /// Pushes rejected by a full queue.
    pub queue_rejections: u64,
    /// Re-enqueues after a retryable failure.
    pub retries: u64,
    /// Tasks that reached `Succeeded`.
    pub succeeded: u64,
    /// Tasks that reached `Abandoned`.
    pub abandoned: u64,
    /// Nonce resynchronizations after a sequence mismatch.
    pub nonce_resyncs: u64,
    /// Transactions accepted by the chain.
    pub txs_submitted: u64,
    /// Transactions that failed to broadcast or were rejected.
    pub txs_failed: u64,
}

impl MetricsSnapshot {
    /// Counters for one class.
    pub const fn class(&self, class: PriorityClass) -> &ClassCounters {
        match class {
            PriorityClass::High => &self.high,
            PriorityClass::Medium => &self.medium,
            PriorityClass::Low => &self.low,
        }
    }
}

/// Shared node counters.
#[derive(Debug, Default)]
pub struct NodeMetrics {
    grants: [AtomicU64; 3],
    denials: [AtomicU64; 3],
    queue_depth: AtomicU64,
    queue_rejections: AtomicU64,
    retries: AtomicU64,
    succeeded: AtomicU64,
    abandoned: AtomicU64,
    nonce_resyncs: AtomicU64,
    txs_submitted: AtomicU64,
    txs_failed: AtomicU64,
}

impl NodeMetrics {
    /// Fresh zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an admission grant.
    pub fn record_grant(&self, class: PriorityClass) {
        self.grants[class.rank()].fetch_add(1, Ordering::Relaxed);
    }

    /// Count an admission denial.
    pub fn record_denial(&self, class: PriorityClass) {
        self.denials[class.rank()].fetch_add(1, Ordering::Relaxed);
    }

    /// Publish the current queue depth.
    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.store(depth as u64, Ordering::Relaxed);
    }

    /// Count a push rejected by a full queue.
    pub fn record_queue_rejection(&self) {
        self.queue_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a retry.
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a success.
    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an abandonment.
    pub fn record_abandon(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a nonce resync.
    pub fn record_nonce_resync(&self) {
        self.nonce_resyncs.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a transaction outcome.
    pub fn record_tx(&self, ok: bool) {
        let counter = if ok { &self.txs_submitted } else { &self.txs_failed };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let class = |class: PriorityClass| ClassCounters {
            grants: self.grants[class.rank()].load(Ordering::Relaxed),
            denials: self.denials[class.rank()].load(Ordering::Relaxed),
        };
        MetricsSnapshot {
            high: class(PriorityClass::High),
            medium: class(PriorityClass::Medium),
            low: class(PriorityClass::Low),
            queue_depth: self.queue_depth.load(Ordering::Relaxed),
            queue_rejections: self.queue_rejections.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            nonce_resyncs: self.nonce_resyncs.load(Ordering::Relaxed),
            txs_submitted: self.txs_submitted.load(Ordering::Relaxed),
            txs_failed: self.txs_failed.load(Ordering::Relaxed),
        }
    }
}
