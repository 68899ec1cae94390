//! Tests for builder modules

use std::sync::Arc;

use async_trait::async_trait;
use sp_scheduler::builders::NodeBuilder;
use sp_scheduler::config::{NodeConfig, RcmgrConfig, SignerConfig};
use sp_scheduler::core::{
    NodeMetrics, NullJournal, PriorityClass, ResourceRequest, Task, TaskType, GIB,
};
use sp_scheduler::infra::QueueStrategy;
use sp_scheduler::signer::{
    AccountAddress, BroadcastResponse, ChainClient, ChainError, SignedTx, SigningScope,
};

struct StaticChain {
    nonce: Result<u64, ChainError>,
}

#[async_trait]
impl ChainClient for StaticChain {
    async fn query_nonce(&self, _address: &AccountAddress) -> Result<u64, ChainError> {
        self.nonce.clone()
    }

    async fn broadcast_tx(&self, _tx: SignedTx) -> Result<BroadcastResponse, ChainError> {
        Err(ChainError::message("not used"))
    }
}

fn with_signer() -> NodeConfig {
    NodeConfig {
        signer: Some(SignerConfig {
            chain_id: Some("local-1".into()),
            operator_key: "11".repeat(32),
            funding_key: "22".repeat(32),
            seal_key: "33".repeat(32),
            approval_key: "44".repeat(32),
            gc_key: "55".repeat(32),
            ..SignerConfig::default()
        }),
        ..NodeConfig::default()
    }
}

#[tokio::test]
async fn test_defaults_build_limited_manager() {
    let ctx = NodeBuilder::new(NodeConfig::default()).build().await.unwrap();
    let huge = ResourceRequest::new(PriorityClass::High).with_memory(64 * GIB);
    assert!(ctx.rcmgr.reserve(huge).is_err());
    assert_eq!(ctx.queue.capacity(), None);
    assert!(ctx.signer.is_none());
}

#[tokio::test]
async fn test_disabled_rcmgr_admits_everything() {
    let config = NodeConfig {
        rcmgr: RcmgrConfig {
            disable_rcmgr: true,
            limiter: None,
        },
        ..NodeConfig::default()
    };
    let ctx = NodeBuilder::new(config).build().await.unwrap();
    let huge = ResourceRequest::new(PriorityClass::High).with_memory(64 * GIB);
    let handle = ctx.rcmgr.reserve(huge).unwrap();
    ctx.rcmgr.release(handle).unwrap();
}

#[tokio::test]
async fn test_queue_strategy_and_shared_metrics() {
    let metrics = Arc::new(NodeMetrics::new());
    let config = NodeConfig {
        queue: QueueStrategy::Limited { capacity: 2 },
        ..NodeConfig::default()
    };
    let ctx = NodeBuilder::new(config)
        .with_metrics(Arc::clone(&metrics))
        .with_journal(Arc::new(NullJournal))
        .build()
        .await
        .unwrap();

    assert_eq!(ctx.queue.capacity(), Some(2));
    ctx.queue.push(Task::new(TaskType::Upload, 0)).unwrap();
    assert_eq!(metrics.snapshot().queue_depth, 1);
    assert!(ctx.journal.pending().is_empty());
}

#[tokio::test]
async fn test_worker_count_reaches_context() {
    let config = NodeConfig {
        workers: Some(3),
        ..NodeConfig::default()
    };
    let ctx = NodeBuilder::new(config).build().await.unwrap();
    assert_eq!(ctx.workers, 3);

    let defaulted = NodeBuilder::new(NodeConfig::default()).build().await.unwrap();
    assert!(defaulted.workers >= 1);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let config = NodeConfig {
        workers: Some(0),
        ..NodeConfig::default()
    };
    let err = NodeBuilder::new(config).build().await.unwrap_err();
    assert!(format!("{err:#}").contains("workers must be greater than 0"));
}

#[tokio::test]
async fn test_signer_without_chain_client_fails() {
    let err = NodeBuilder::new(with_signer()).build().await.unwrap_err();
    assert!(err.to_string().contains("no chain client"));
}

#[tokio::test]
async fn test_signer_built_and_primed() {
    let ctx = NodeBuilder::new(with_signer())
        .with_chain_client(Arc::new(StaticChain { nonce: Ok(12) }))
        .build()
        .await
        .unwrap();
    let signer = ctx.signer.as_ref().unwrap();
    for scope in SigningScope::ALL {
        assert_eq!(signer.cached_nonce(scope).await, 11);
    }
}

#[tokio::test]
async fn test_signer_nonce_query_failure_fails_build() {
    let err = NodeBuilder::new(with_signer())
        .with_chain_client(Arc::new(StaticChain {
            nonce: Err(ChainError::message("connection refused")),
        }))
        .build()
        .await
        .unwrap_err();
    let chain = format!("{err:#}");
    assert!(chain.contains("connecting signer"));
    assert!(chain.contains("connection refused"));
}
