//! Tests for error types

use sp_scheduler::core::{Dimension, PriorityClass, SchedulerError, TaskState};
use sp_scheduler::signer::{ChainError, SignerError, SigningScope};

#[test]
fn test_resource_exhausted_error() {
    let err = SchedulerError::ResourceExhausted {
        class: PriorityClass::Low,
        dimension: Dimension::Memory,
    };
    assert_eq!(
        err.to_string(),
        "resource exhausted: memory limit reached for low priority"
    );
    assert!(err.is_backpressure());
}

#[test]
fn test_queue_errors() {
    assert_eq!(SchedulerError::QueueFull(8).to_string(), "queue full: capacity 8");
    assert_eq!(SchedulerError::QueueEmpty.to_string(), "queue empty");
    assert!(SchedulerError::QueueFull(8).is_backpressure());
}

#[test]
fn test_invalid_transition_error() {
    let err = SchedulerError::InvalidTransition {
        from: TaskState::Succeeded,
        to: TaskState::Running,
    };
    assert_eq!(
        err.to_string(),
        "invalid task transition from succeeded to running"
    );
    assert!(!err.is_backpressure());
}

#[test]
fn test_backend_error() {
    let err = SchedulerError::Backend("journal unavailable".to_string());
    assert_eq!(err.to_string(), "backend error: journal unavailable");
}

#[test]
fn test_signer_errors() {
    let err = SignerError::InitNonce {
        scope: SigningScope::Seal,
        source: ChainError::message("connection refused"),
    };
    assert!(err.to_string().starts_with("failed to query initial nonce for seal account"));
    assert!(!err.is_retryable());
    assert!(SignerError::SealObjectOnChain("code 5".into()).is_retryable());

    let err = SignerError::InvalidKey("odd length".into());
    assert_eq!(err.to_string(), "invalid private key: odd length");
    assert!(!err.is_retryable());
}
