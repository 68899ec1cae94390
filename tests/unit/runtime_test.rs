//! Tests for tokio spawner utilities and caller status mapping

use sp_scheduler::core::{Spawn, SchedulerError};
use sp_scheduler::runtime::tokio_spawner::TokioSpawner;
use sp_scheduler::runtime::{signer_status_of, status_of, ServiceStatus};
use sp_scheduler::signer::{ChainError, SignerError, SigningScope};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[tokio::test]
async fn test_current_spawner_inside_runtime() {
    let spawner = TokioSpawner::current().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send("done").unwrap();
    });
    assert_eq!(rx.await.unwrap(), "done");
}

#[test]
fn test_current_spawner_outside_runtime_fails() {
    assert!(TokioSpawner::current().is_err());
}

#[test]
fn test_status_mapping() {
    assert_eq!(status_of(&SchedulerError::QueueEmpty), ServiceStatus::Unavailable);
    assert_eq!(
        status_of(&SchedulerError::Backend("disk".into())),
        ServiceStatus::Failed
    );
    let init = SignerError::InitNonce {
        scope: SigningScope::Operator,
        source: ChainError::message("timeout"),
    };
    assert_eq!(signer_status_of(&init), ServiceStatus::Unavailable);
    assert_eq!(
        signer_status_of(&SignerError::SealObjectOnChain("code 11".into())),
        ServiceStatus::Failed
    );
}

#[test]
fn test_status_serializes_snake_case() {
    assert_eq!(
        serde_json::to_string(&ServiceStatus::Unavailable).unwrap(),
        "\"unavailable\""
    );
}
