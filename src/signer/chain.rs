//! Chain client contract and the messages the signer broadcasts.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::signer::keys::AccountAddress;

/// Substring the chain puts in errors when a tx carries the wrong sequence.
pub const SEQUENCE_MISMATCH: &str = "account sequence mismatch";

/// How long `broadcast_tx` waits before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastMode {
    /// Return after the mempool check.
    Sync,
    /// Return immediately.
    Async,
}

/// Options attached to a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOptions {
    /// Broadcast mode.
    pub mode: BroadcastMode,
    /// Gas limit.
    pub gas_limit: u64,
    /// Account sequence to use.
    pub nonce: u64,
}

/// Seal an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSealObject {
    /// Account sealing the object.
    pub operator: AccountAddress,
    /// Bucket name.
    pub bucket_name: String,
    /// Object name.
    pub object_name: String,
    /// Secondary providers holding replicas.
    pub secondary_sp_addresses: Vec<AccountAddress>,
    /// Secondary providers' integrity signatures.
    pub secondary_sp_signatures: Vec<Vec<u8>>,
}

/// Stop serving a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgDiscontinueBucket {
    /// Account issuing the discontinuation.
    pub operator: AccountAddress,
    /// Bucket name.
    pub bucket_name: String,
    /// Reason recorded on chain.
    pub reason: String,
}

/// Message carried by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChainMsg {
    /// See [`MsgSealObject`].
    SealObject(MsgSealObject),
    /// See [`MsgDiscontinueBucket`].
    DiscontinueBucket(MsgDiscontinueBucket),
}

/// A transaction ready to broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTx {
    /// Chain id the tx is bound to.
    pub chain_id: String,
    /// Messages.
    pub msgs: Vec<ChainMsg>,
    /// Mode, gas and sequence.
    pub options: TxOptions,
    /// Signing account.
    pub signer: AccountAddress,
    /// Signature over the JSON body of `chain_id`, `msgs` and `options`.
    pub signature: Vec<u8>,
}

#[derive(Serialize)]
struct TxBody<'a> {
    chain_id: &'a str,
    msgs: &'a [ChainMsg],
    options: &'a TxOptions,
}

/// Bytes a transaction's signature covers.
pub fn tx_sign_bytes(
    chain_id: &str,
    msgs: &[ChainMsg],
    options: &TxOptions,
) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&TxBody {
        chain_id,
        msgs,
        options,
    })
}

impl SignedTx {
    /// Bytes covered by [`SignedTx::signature`].
    pub fn sign_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        tx_sign_bytes(&self.chain_id, &self.msgs, &self.options)
    }
}

/// Chain's answer to a broadcast that reached it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResponse {
    /// Hex-encoded transaction hash.
    pub tx_hash: String,
    /// `0` on acceptance.
    pub code: u32,
    /// Raw log returned with a rejection.
    #[serde(default)]
    pub raw_log: String,
}

/// Error codes a chain client can classify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainErrorCode {
    /// The tx sequence did not match the account's.
    SequenceMismatch,
    /// Fee or gas too low.
    InsufficientFee,
    /// Endpoint unreachable.
    Unavailable,
    /// Anything else.
    Other(u32),
}

/// Transport or chain error from a [`ChainClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainError {
    /// Classified code, when the client knows it.
    pub code: Option<ChainErrorCode>,
    /// Raw message.
    pub message: String,
}

impl ChainError {
    /// Error with only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Error with a classified code.
    pub fn with_code(code: ChainErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "chain error ({code:?}): {}", self.message),
            None => write!(f, "chain error: {}", self.message),
        }
    }
}

impl std::error::Error for ChainError {}

/// Whether a broadcast failed because the cached sequence is stale.
/// A typed code wins; otherwise the message is searched.
pub fn is_sequence_mismatch(err: &ChainError) -> bool {
    match err.code {
        Some(ChainErrorCode::SequenceMismatch) => true,
        Some(_) => false,
        None => err.message.contains(SEQUENCE_MISMATCH),
    }
}

/// Access to the chain RPC.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Next sequence the chain expects from `address`.
    async fn query_nonce(&self, address: &AccountAddress) -> Result<u64, ChainError>;

    /// Submit a signed transaction.
    async fn broadcast_tx(&self, tx: SignedTx) -> Result<BroadcastResponse, ChainError>;
}
