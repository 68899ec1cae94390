//! Tests for configuration parsing, validation and defaulting

use std::time::Duration;

use sp_scheduler::config::{
    resolve_key_ref, ConfigError, NodeConfig, SignerConfig, DEFAULT_CHAIN_ID, DEFAULT_GAS_LIMIT,
    DEFAULT_RPC_ADDRESS,
};
use sp_scheduler::core::{PriorityClass, ResourceLimit, TaskType, MIB};
use sp_scheduler::infra::QueueStrategy;

fn signer_section() -> SignerConfig {
    SignerConfig {
        operator_key: "01".repeat(32),
        funding_key: "02".repeat(32),
        seal_key: "03".repeat(32),
        approval_key: "04".repeat(32),
        gc_key: "05".repeat(32),
        ..SignerConfig::default()
    }
}

#[test]
fn test_empty_document_is_valid() {
    let cfg = NodeConfig::from_json_str("{}").unwrap();
    assert_eq!(cfg, NodeConfig::default());

    let effective = cfg.effective();
    assert_eq!(effective.limiter.unwrap().system, ResourceLimit::default());
    assert_eq!(effective.queue, QueueStrategy::Unbounded);
    assert!(effective.signer.is_none());
    assert!(effective.workers >= 1);
}

#[test]
fn test_full_document_parses() {
    let cfg = NodeConfig::from_json_str(
        r#"{
            "rcmgr": {
                "limiter": {
                    "system": { "memory_bytes": 104857600, "task_high": 4 },
                    "low": { "memory_bytes": 10485760 }
                }
            },
            "task": { "replicate": { "max_retry": 5, "timeout_secs": 30 } },
            "queue": { "kind": "limited", "capacity": 32 },
            "workers": 4
        }"#,
    )
    .unwrap();

    let effective = cfg.effective();
    let limiter = effective.limiter.unwrap();
    assert_eq!(limiter.system.memory_bytes, 100 * MIB);
    assert_eq!(limiter.system.task_high, 4);
    assert_eq!(limiter.class_limit(PriorityClass::Low).unwrap().memory_bytes, 10 * MIB);
    assert!(limiter.class_limit(PriorityClass::High).is_none());

    let replicate = effective.lifecycle.policy(TaskType::Replicate);
    assert_eq!(replicate.max_retry, 5);
    assert_eq!(replicate.timeout, Duration::from_secs(30));
    assert_eq!(
        effective.lifecycle.policy(TaskType::SealObject),
        sp_scheduler::core::TaskPolicy::default_for(TaskType::SealObject)
    );
    assert_eq!(effective.queue, QueueStrategy::Limited { capacity: 32 });
    assert_eq!(effective.workers, 4);
}

#[test]
fn test_disabled_rcmgr_has_no_limiter() {
    let cfg = NodeConfig::from_json_str(r#"{ "rcmgr": { "disable_rcmgr": true } }"#).unwrap();
    assert!(cfg.effective().limiter.is_none());
}

#[test]
fn test_malformed_json_is_parse_error() {
    let err = NodeConfig::from_json_str(r#"{ "queue": { "kind": "lifo" } }"#).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_negative_limit_rejected() {
    let err = NodeConfig::from_json_str(
        r#"{ "rcmgr": { "limiter": { "system": { "task_low": -1 } } } }"#,
    )
    .unwrap_err();
    assert_eq!(
        err,
        ConfigError::Invalid("system limit has negative fields: task_low".into())
    );
}

#[test]
fn test_zero_values_rejected() {
    let mut cfg = NodeConfig {
        queue: QueueStrategy::Limited { capacity: 0 },
        ..NodeConfig::default()
    };
    assert!(cfg.validate().is_err());

    cfg.queue = QueueStrategy::Unbounded;
    cfg.workers = Some(0);
    assert!(cfg.validate().is_err());

    cfg.workers = None;
    assert!(
        NodeConfig::from_json_str(r#"{ "task": { "gc_meta": { "timeout_secs": 0 } } }"#).is_err()
    );
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_signer_needs_every_key() {
    let mut signer = signer_section();
    signer.gc_key.clear();
    let cfg = NodeConfig {
        signer: Some(signer),
        ..NodeConfig::default()
    };
    assert_eq!(
        cfg.validate().unwrap_err(),
        ConfigError::Invalid("signer needs all five account keys".into())
    );
}

#[test]
fn test_signer_defaults_filled_in() {
    let cfg = NodeConfig {
        signer: Some(signer_section()),
        ..NodeConfig::default()
    };
    let signer = cfg.effective().signer.unwrap();
    assert_eq!(signer.chain_id, DEFAULT_CHAIN_ID);
    assert_eq!(signer.rpc_address, DEFAULT_RPC_ADDRESS);
    assert_eq!(signer.gas_limit, DEFAULT_GAS_LIMIT);
}

#[test]
fn test_effective_is_pure() {
    let cfg = NodeConfig {
        signer: Some(SignerConfig {
            gas_limit: Some(500_000),
            ..signer_section()
        }),
        ..NodeConfig::default()
    };
    let first = cfg.effective();
    let second = cfg.effective();
    assert_eq!(first, second);
    assert_eq!(first.signer.unwrap().gas_limit, 500_000);
}

#[test]
fn test_key_refs_resolve_from_environment() {
    std::env::set_var("SP_SCHEDULER_TEST_SEAL_KEY", "ab".repeat(32));
    let mut signer = signer_section();
    signer.seal_key = "env:SP_SCHEDULER_TEST_SEAL_KEY".into();

    let resolved = signer.resolve_keys().unwrap();
    assert_eq!(resolved[2], "ab".repeat(32));
    assert_eq!(resolved[0], "01".repeat(32));
}

#[test]
fn test_unset_key_ref_is_reported() {
    let err = resolve_key_ref("env:SP_SCHEDULER_TEST_MISSING_KEY").unwrap_err();
    assert_eq!(
        err,
        ConfigError::UnresolvedKey {
            reference: "env:SP_SCHEDULER_TEST_MISSING_KEY".into()
        }
    );
    assert_eq!(resolve_key_ref("deadbeef").unwrap(), "deadbeef");
}
