//! Configuration models and defaulting.

pub mod node;

pub use node::{
    resolve_key_ref, ConfigError, EffectiveConfig, EffectiveSignerConfig, NodeConfig,
    RcmgrConfig, SignerConfig, TaskPolicyConfig, DEFAULT_CHAIN_ID, DEFAULT_GAS_LIMIT,
    DEFAULT_RPC_ADDRESS,
};
