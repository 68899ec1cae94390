//! Nonce-serialized transaction submission.
//!
//! Each [`SigningScope`] owns an account key and a cached nonce behind its
//! own `tokio::sync::Mutex`. A submission holds that lock from reading the
//! cached nonce until the cache is updated (or left alone on failure), so
//! concurrent submissions in one scope use strictly consecutive nonces while
//! other scopes proceed independently.
//!
//! The cache stores the last nonce the chain accepted; the next transaction
//! uses `cached + 1`. On a sequence mismatch the chain's expected nonce `N`
//! is fetched and the cache set to `N - 1`, so the following attempt uses
//! `N`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::core::NodeMetrics;
use crate::signer::chain::{
    is_sequence_mismatch, tx_sign_bytes, BroadcastMode, ChainClient, ChainMsg,
    MsgDiscontinueBucket, MsgSealObject, SignedTx, TxOptions,
};
use crate::signer::keys::{AccountAddress, AccountKey};
use crate::signer::scope::SigningScope;
use crate::signer::SignerError;

/// Seal request as received from the upload/replicate pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealObjectRequest {
    /// Bucket name.
    pub bucket_name: String,
    /// Object name.
    pub object_name: String,
    /// Secondary provider addresses, `0x` hex.
    pub secondary_sp_addresses: Vec<String>,
    /// Secondary provider signatures.
    pub secondary_sp_signatures: Vec<Vec<u8>>,
}

/// Bucket discontinuation request from garbage collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscontinueBucketRequest {
    /// Bucket name.
    pub bucket_name: String,
    /// Reason recorded on chain.
    pub reason: String,
}

/// One key per scope.
#[derive(Debug)]
pub struct SignerKeys {
    /// Operator account key.
    pub operator: AccountKey,
    /// Funding account key.
    pub funding: AccountKey,
    /// Seal account key.
    pub seal: AccountKey,
    /// Approval account key.
    pub approval: AccountKey,
    /// GC account key.
    pub gc: AccountKey,
}

impl SignerKeys {
    /// Load all five keys from hex secrets, in [`SigningScope::ALL`] order.
    pub fn from_hex(secrets: [&str; 5]) -> Result<Self, SignerError> {
        let [operator, funding, seal, approval, gc] = secrets;
        Ok(Self {
            operator: AccountKey::from_hex(operator)?,
            funding: AccountKey::from_hex(funding)?,
            seal: AccountKey::from_hex(seal)?,
            approval: AccountKey::from_hex(approval)?,
            gc: AccountKey::from_hex(gc)?,
        })
    }

    fn into_array(self) -> [(SigningScope, AccountKey); 5] {
        [
            (SigningScope::Operator, self.operator),
            (SigningScope::Funding, self.funding),
            (SigningScope::Seal, self.seal),
            (SigningScope::Approval, self.approval),
            (SigningScope::Gc, self.gc),
        ]
    }
}

#[derive(Debug)]
struct ScopeAccount {
    key: AccountKey,
    nonce: Mutex<u64>,
}

#[derive(Debug, Clone, Copy)]
enum TxKind {
    SealObject,
    DiscontinueBucket,
}

impl TxKind {
    const fn mode(self) -> BroadcastMode {
        match self {
            Self::SealObject => BroadcastMode::Async,
            Self::DiscontinueBucket => BroadcastMode::Sync,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::SealObject => "seal_object",
            Self::DiscontinueBucket => "discontinue_bucket",
        }
    }

    fn failure(self, reason: String) -> SignerError {
        match self {
            Self::SealObject => SignerError::SealObjectOnChain(reason),
            Self::DiscontinueBucket => SignerError::DiscontinueBucketOnChain(reason),
        }
    }
}

/// Signs and broadcasts transactions for the five node accounts.
pub struct SignerClient {
    chain_id: String,
    gas_limit: u64,
    chain: Arc<dyn ChainClient>,
    accounts: Vec<ScopeAccount>,
    metrics: Option<Arc<NodeMetrics>>,
}

impl std::fmt::Debug for SignerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerClient")
            .field("chain_id", &self.chain_id)
            .field("gas_limit", &self.gas_limit)
            .field("accounts", &self.accounts.len())
            .finish_non_exhaustive()
    }
}

impl SignerClient {
    /// Build the signer, priming every scope's nonce cache from the chain.
    pub async fn connect(
        chain_id: impl Into<String>,
        gas_limit: u64,
        keys: SignerKeys,
        chain: Arc<dyn ChainClient>,
        metrics: Option<Arc<NodeMetrics>>,
    ) -> Result<Self, SignerError> {
        let mut accounts = Vec::with_capacity(SigningScope::ALL.len());
        for (scope, key) in keys.into_array() {
            let on_chain = chain
                .query_nonce(&key.address())
                .await
                .map_err(|source| SignerError::InitNonce { scope, source })?;
            debug!(%scope, address = %key.address(), nonce = on_chain, "primed nonce cache");
            accounts.push(ScopeAccount {
                key,
                nonce: Mutex::new(on_chain.wrapping_sub(1)),
            });
        }
        let chain_id = chain_id.into();
        info!(%chain_id, gas_limit, "signer ready");
        Ok(Self {
            chain_id,
            gas_limit,
            chain,
            accounts,
            metrics,
        })
    }

    fn account(&self, scope: SigningScope) -> &ScopeAccount {
        // `accounts` is filled in `SigningScope::ALL` order.
        let idx = match scope {
            SigningScope::Operator => 0,
            SigningScope::Funding => 1,
            SigningScope::Seal => 2,
            SigningScope::Approval => 3,
            SigningScope::Gc => 4,
        };
        &self.accounts[idx]
    }

    /// Account address of a scope.
    pub fn address(&self, scope: SigningScope) -> AccountAddress {
        self.account(scope).key.address()
    }

    /// Sign `msg` with a scope's key.
    pub fn sign(&self, scope: SigningScope, msg: &[u8]) -> Vec<u8> {
        self.account(scope).key.sign(msg)
    }

    /// Check a signature made by a scope's key.
    pub fn verify_signature(&self, scope: SigningScope, msg: &[u8], sig: &[u8]) -> bool {
        self.account(scope).key.verify(msg, sig)
    }

    /// Last nonce the chain accepted for a scope, as cached.
    pub async fn cached_nonce(&self, scope: SigningScope) -> u64 {
        *self.account(scope).nonce.lock().await
    }

    /// Seal an object. Broadcasts in async mode and returns the tx hash.
    pub async fn submit_seal_object(
        &self,
        scope: SigningScope,
        request: &SealObjectRequest,
    ) -> Result<Vec<u8>, SignerError> {
        let secondary_sp_addresses = request
            .secondary_sp_addresses
            .iter()
            .map(|addr| AccountAddress::from_hex(addr))
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|err| error!(%scope, error = %err, "bad secondary sp address"))?;

        let msg = ChainMsg::SealObject(MsgSealObject {
            operator: self.address(scope),
            bucket_name: request.bucket_name.clone(),
            object_name: request.object_name.clone(),
            secondary_sp_addresses,
            secondary_sp_signatures: request.secondary_sp_signatures.clone(),
        });
        self.broadcast(scope, TxKind::SealObject, msg).await
    }

    /// Discontinue a bucket. Broadcasts in sync mode and returns the tx hash.
    /// Garbage collection passes [`SigningScope::Gc`].
    pub async fn submit_discontinue_bucket(
        &self,
        scope: SigningScope,
        request: &DiscontinueBucketRequest,
    ) -> Result<Vec<u8>, SignerError> {
        info!(%scope, bucket = %request.bucket_name, "discontinuing bucket");
        let msg = ChainMsg::DiscontinueBucket(MsgDiscontinueBucket {
            operator: self.address(scope),
            bucket_name: request.bucket_name.clone(),
            reason: request.reason.clone(),
        });
        self.broadcast(scope, TxKind::DiscontinueBucket, msg).await
    }

    async fn broadcast(
        &self,
        scope: SigningScope,
        kind: TxKind,
        msg: ChainMsg,
    ) -> Result<Vec<u8>, SignerError> {
        let account = self.account(scope);
        let mut cached = account.nonce.lock().await;
        let nonce = cached.wrapping_add(1);

        let options = TxOptions {
            mode: kind.mode(),
            gas_limit: self.gas_limit,
            nonce,
        };
        let msgs = vec![msg];
        let body = tx_sign_bytes(&self.chain_id, &msgs, &options)
            .map_err(|e| SignerError::SignMsg(e.to_string()))?;
        let tx = SignedTx {
            chain_id: self.chain_id.clone(),
            msgs,
            options,
            signer: account.key.address(),
            signature: account.key.sign(&body),
        };

        let response = match self.chain.broadcast_tx(tx).await {
            Ok(response) => response,
            Err(err) => {
                self.record_tx(false);
                error!(%scope, tx = kind.name(), nonce, error = %err, "failed to broadcast tx");
                if is_sequence_mismatch(&err) {
                    match self.chain.query_nonce(&account.key.address()).await {
                        Ok(on_chain) => {
                            *cached = on_chain.wrapping_sub(1);
                            if let Some(metrics) = &self.metrics {
                                metrics.record_nonce_resync();
                            }
                            warn!(%scope, stale = nonce, on_chain, "nonce resynchronized");
                        }
                        Err(query_err) => {
                            error!(%scope, error = %query_err, "failed to query nonce for resync");
                        }
                    }
                }
                return Err(kind.failure(err.to_string()));
            }
        };

        if response.code != 0 {
            self.record_tx(false);
            error!(
                %scope,
                tx = kind.name(),
                nonce,
                code = response.code,
                log = %response.raw_log,
                "tx rejected"
            );
            return Err(kind.failure(format!(
                "rejected with code {}: {}",
                response.code, response.raw_log
            )));
        }

        let tx_hash = hex::decode(&response.tx_hash).map_err(|e| {
            self.record_tx(false);
            error!(%scope, tx = kind.name(), hash = %response.tx_hash, "undecodable tx hash");
            kind.failure(format!("invalid tx hash {}: {e}", response.tx_hash))
        })?;

        *cached = nonce;
        self.record_tx(true);
        debug!(%scope, tx = kind.name(), nonce, hash = %response.tx_hash, "tx submitted");
        Ok(tx_hash)
    }

    fn record_tx(&self, ok: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_tx(ok);
        }
    }
}
