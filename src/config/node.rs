//! Node configuration: admission limits, task policies, queue strategy and
//! signer accounts.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{Limiter, LifecyclePolicy, PriorityClass, TaskPolicy, TaskType};
use crate::infra::QueueStrategy;

/// Chain id used when none is configured.
pub const DEFAULT_CHAIN_ID: &str = "greenfield_9000-1741";
/// Chain RPC endpoint used when none is configured.
pub const DEFAULT_RPC_ADDRESS: &str = "http://localhost:26750";
/// Gas limit used when none is configured.
pub const DEFAULT_GAS_LIMIT: u64 = 210_000;

/// Prefix marking a key reference resolved from the environment.
const ENV_KEY_PREFIX: &str = "env:";

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Input is not valid JSON for [`NodeConfig`].
    #[error("parse error: {0}")]
    Parse(String),
    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// An `env:NAME` key reference names an unset variable.
    #[error("key reference `{reference}` could not be resolved")]
    UnresolvedKey {
        /// Reference as written.
        reference: String,
    },
}

/// Admission control section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RcmgrConfig {
    /// Turn admission control off entirely.
    pub disable_rcmgr: bool,
    /// Limits; node defaults when absent.
    pub limiter: Option<Limiter>,
}

/// Per task-type overrides. Unset fields keep the type's default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskPolicyConfig {
    /// Transfer speed in bytes per second.
    pub speed: Option<u64>,
    /// Minimum timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Failed attempts allowed.
    pub max_retry: Option<u32>,
}

impl TaskPolicyConfig {
    fn apply(&self, base: TaskPolicy) -> TaskPolicy {
        TaskPolicy {
            speed_bytes_per_sec: self.speed.unwrap_or(base.speed_bytes_per_sec),
            timeout: self.timeout_secs.map_or(base.timeout, Duration::from_secs),
            max_retry: self.max_retry.unwrap_or(base.max_retry),
        }
    }
}

/// Signer section. Keys are literal hex secrets or `env:NAME` references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    /// Chain id.
    pub chain_id: Option<String>,
    /// Chain RPC endpoint.
    pub rpc_address: Option<String>,
    /// Gas limit per transaction.
    pub gas_limit: Option<u64>,
    /// Operator account key reference.
    pub operator_key: String,
    /// Funding account key reference.
    pub funding_key: String,
    /// Seal account key reference.
    pub seal_key: String,
    /// Approval account key reference.
    pub approval_key: String,
    /// GC account key reference.
    pub gc_key: String,
}

impl SignerConfig {
    /// Key references in operator, funding, seal, approval, gc order.
    pub fn key_refs(&self) -> [&str; 5] {
        [
            self.operator_key.as_str(),
            self.funding_key.as_str(),
            self.seal_key.as_str(),
            self.approval_key.as_str(),
            self.gc_key.as_str(),
        ]
    }

    /// Resolve every key reference to its secret.
    pub fn resolve_keys(&self) -> Result<[String; 5], ConfigError> {
        let [operator, funding, seal, approval, gc] = self.key_refs();
        Ok([
            resolve_key_ref(operator)?,
            resolve_key_ref(funding)?,
            resolve_key_ref(seal)?,
            resolve_key_ref(approval)?,
            resolve_key_ref(gc)?,
        ])
    }
}

/// Resolve a key reference: `env:NAME` reads `NAME` from `.env` or the
/// process environment, anything else is taken literally.
pub fn resolve_key_ref(reference: &str) -> Result<String, ConfigError> {
    match reference.strip_prefix(ENV_KEY_PREFIX) {
        Some(var) => dotenvy::var(var).map_err(|_| ConfigError::UnresolvedKey {
            reference: reference.to_string(),
        }),
        None => Ok(reference.to_string()),
    }
}

/// Root node configuration as written by an operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Admission control.
    pub rcmgr: RcmgrConfig,
    /// Task policy overrides keyed by type.
    pub task: BTreeMap<TaskType, TaskPolicyConfig>,
    /// Queue strategy.
    pub queue: QueueStrategy,
    /// Signer; the node runs without one when absent.
    pub signer: Option<SignerConfig>,
    /// Worker loops to run; CPU count when absent.
    pub workers: Option<usize>,
}

/// Signer settings after defaulting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveSignerConfig {
    /// Chain id.
    pub chain_id: String,
    /// Chain RPC endpoint.
    pub rpc_address: String,
    /// Gas limit.
    pub gas_limit: u64,
    /// Unresolved key references.
    pub keys: SignerConfig,
}

/// Configuration with every default filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    /// `None` when admission control is disabled.
    pub limiter: Option<Limiter>,
    /// Task policies.
    pub lifecycle: LifecyclePolicy,
    /// Queue strategy.
    pub queue: QueueStrategy,
    /// Signer settings.
    pub signer: Option<EffectiveSignerConfig>,
    /// Worker loops.
    pub workers: usize,
}

impl NodeConfig {
    /// Validate value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(limiter) = &self.rcmgr.limiter {
            let mut named = vec![("system", &limiter.system)];
            for class in PriorityClass::ALL {
                if let Some(limit) = limiter.class_limit(class) {
                    named.push((class.as_str(), limit));
                }
            }
            for (name, limit) in named {
                let negative = limit.negative_fields();
                if !negative.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "{name} limit has negative fields: {}",
                        negative.join(", ")
                    )));
                }
            }
        }
        if let QueueStrategy::Limited { capacity: 0 } = self.queue {
            return Err(ConfigError::Invalid(
                "limited queue capacity must be greater than 0".into(),
            ));
        }
        for (task_type, policy) in &self.task {
            if policy.timeout_secs == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "{task_type} timeout_secs must be greater than 0"
                )));
            }
        }
        if self.workers == Some(0) {
            return Err(ConfigError::Invalid("workers must be greater than 0".into()));
        }
        if let Some(signer) = &self.signer {
            if signer.chain_id.as_deref() == Some("") {
                return Err(ConfigError::Invalid("signer chain_id must not be empty".into()));
            }
            if signer.key_refs().iter().any(|k| k.is_empty()) {
                return Err(ConfigError::Invalid(
                    "signer needs all five account keys".into(),
                ));
            }
        }
        Ok(())
    }

    /// Parse JSON and validate.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let cfg: Self =
            serde_json::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Fill in defaults. Pure: reads nothing but `self`.
    pub fn effective(&self) -> EffectiveConfig {
        let limiter = if self.rcmgr.disable_rcmgr {
            None
        } else {
            Some(self.rcmgr.limiter.clone().unwrap_or_default())
        };

        let overrides: HashMap<TaskType, TaskPolicy> = self
            .task
            .iter()
            .map(|(t, cfg)| (*t, cfg.apply(TaskPolicy::default_for(*t))))
            .collect();

        let signer = self.signer.as_ref().map(|s| EffectiveSignerConfig {
            chain_id: s.chain_id.clone().unwrap_or_else(|| DEFAULT_CHAIN_ID.to_string()),
            rpc_address: s
                .rpc_address
                .clone()
                .unwrap_or_else(|| DEFAULT_RPC_ADDRESS.to_string()),
            gas_limit: s.gas_limit.unwrap_or(DEFAULT_GAS_LIMIT),
            keys: s.clone(),
        });

        EffectiveConfig {
            limiter,
            lifecycle: LifecyclePolicy::new(overrides),
            queue: self.queue,
            signer,
            workers: self.workers.unwrap_or_else(num_cpus::get),
        }
    }
}
