//! Builds a [`NodeContext`] from configuration.

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{info, warn};

use crate::config::NodeConfig;
use crate::core::{
    AppResult, InMemoryJournal, LimitedResourceManager, NodeMetrics, NullResourceManager,
    ResourceManager, TaskJournal,
};
use crate::infra::new_task_queue;
use crate::runtime::NodeContext;
use crate::signer::{ChainClient, SignerClient, SignerKeys};

/// Assembles node components. Configuration picks the implementations:
/// a disabled rcmgr yields [`NullResourceManager`], the queue strategy picks
/// the queue, and a signer is built when both a signer section and a chain
/// client are present.
pub struct NodeBuilder {
    config: NodeConfig,
    chain: Option<Arc<dyn ChainClient>>,
    journal: Option<Arc<dyn TaskJournal>>,
    metrics: Option<Arc<NodeMetrics>>,
}

impl NodeBuilder {
    /// Builder over `config`.
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            chain: None,
            journal: None,
            metrics: None,
        }
    }

    /// Chain RPC client used by the signer.
    #[must_use]
    pub fn with_chain_client(mut self, chain: Arc<dyn ChainClient>) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Journal to record task states in; in-memory when unset.
    #[must_use]
    pub fn with_journal(mut self, journal: Arc<dyn TaskJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Shared metrics; fresh counters when unset.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<NodeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate, default and assemble.
    pub async fn build(self) -> AppResult<NodeContext> {
        self.config.validate().context("node config invalid")?;
        let effective = self.config.effective();
        let metrics = self.metrics.unwrap_or_default();

        let rcmgr: Arc<dyn ResourceManager> = match effective.limiter {
            Some(limiter) => {
                info!(system = ?limiter.system, "admission control enabled");
                Arc::new(LimitedResourceManager::new(limiter, Arc::clone(&metrics)))
            }
            None => {
                warn!("admission control disabled");
                Arc::new(NullResourceManager)
            }
        };

        let queue = new_task_queue(effective.queue, Some(Arc::clone(&metrics)));
        let journal = self
            .journal
            .unwrap_or_else(|| Arc::new(InMemoryJournal::new()));

        let signer = match (effective.signer, self.chain) {
            (Some(cfg), Some(chain)) => {
                let secrets = cfg.keys.resolve_keys().context("resolving signer keys")?;
                let [operator, funding, seal, approval, gc] = &secrets;
                let keys = SignerKeys::from_hex([
                    operator.as_str(),
                    funding.as_str(),
                    seal.as_str(),
                    approval.as_str(),
                    gc.as_str(),
                ])
                .context("loading signer keys")?;
                let client = SignerClient::connect(
                    cfg.chain_id,
                    cfg.gas_limit,
                    keys,
                    chain,
                    Some(Arc::clone(&metrics)),
                )
                .await
                .with_context(|| format!("connecting signer to {}", cfg.rpc_address))?;
                Some(Arc::new(client))
            }
            (Some(cfg), None) => {
                bail!("signer configured for {} but no chain client given", cfg.rpc_address)
            }
            (None, _) => None,
        };

        info!(
            queue_capacity = ?queue.capacity(),
            signer = signer.is_some(),
            "node context built"
        );
        Ok(NodeContext {
            rcmgr,
            queue,
            lifecycle: Arc::new(effective.lifecycle),
            journal,
            metrics,
            signer,
            workers: effective.workers,
        })
    }
}
