//! Chain signer: per-scope keys, serialized nonces and transaction submission.

pub mod chain;
pub mod client;
pub mod keys;
pub mod scope;

use thiserror::Error;

pub use chain::{
    is_sequence_mismatch, BroadcastMode, BroadcastResponse, ChainClient, ChainError,
    ChainErrorCode, ChainMsg, MsgDiscontinueBucket, MsgSealObject, SignedTx, TxOptions,
};
pub use client::{DiscontinueBucketRequest, SealObjectRequest, SignerClient, SignerKeys};
pub use keys::{keccak256, AccountAddress, AccountKey};
pub use scope::SigningScope;

/// Signer failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    /// Building or signing the transaction failed. Not worth retrying.
    #[error("failed to sign message: {0}")]
    SignMsg(String),
    /// A `0x` hex account address could not be parsed.
    #[error("invalid account address {address}: {reason}")]
    InvalidAddress {
        /// Input as given.
        address: String,
        /// Parse failure.
        reason: String,
    },
    /// A private key could not be loaded.
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    /// Seal transaction failed to broadcast or was rejected.
    #[error("failed to seal object on chain: {0}")]
    SealObjectOnChain(String),
    /// Discontinue-bucket transaction failed to broadcast or was rejected.
    #[error("failed to discontinue bucket on chain: {0}")]
    DiscontinueBucketOnChain(String),
    /// Initial nonce query failed while building the signer.
    #[error("failed to query initial nonce for {scope} account: {source}")]
    InitNonce {
        /// Scope being primed.
        scope: SigningScope,
        /// Chain failure.
        source: ChainError,
    },
}

impl SignerError {
    /// On-chain submission failures may succeed on a later attempt (the
    /// nonce has been resynchronized if needed).
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SealObjectOnChain(_) | Self::DiscontinueBucketOnChain(_)
        )
    }
}
