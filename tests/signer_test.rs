//! Signer nonce handling against an in-process chain that enforces account
//! sequences the way a real chain does.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sp_scheduler::core::NodeMetrics;
use sp_scheduler::signer::{
    AccountAddress, BroadcastMode, BroadcastResponse, ChainClient, ChainError, ChainMsg,
    DiscontinueBucketRequest, SealObjectRequest, SignedTx, SignerClient, SignerError, SignerKeys,
    SigningScope,
};
use tokio::sync::Semaphore;

/// Scripted deviation for the next broadcast.
#[derive(Debug, Clone, Copy)]
enum Fault {
    Rejected(u32),
    BadHash,
    Transport,
}

#[derive(Default)]
struct ChainState {
    sequences: HashMap<AccountAddress, u64>,
    accepted: Vec<SignedTx>,
    attempts: usize,
    faults: VecDeque<Fault>,
    nonce_queries: usize,
}

#[derive(Default)]
struct MockChain {
    state: Mutex<ChainState>,
    seal_gate: Option<Arc<Semaphore>>,
    fail_queries: bool,
}

impl MockChain {
    fn new() -> Self {
        Self::default()
    }

    fn set_sequence(&self, address: AccountAddress, next: u64) {
        self.state.lock().sequences.insert(address, next);
    }

    fn inject(&self, fault: Fault) {
        self.state.lock().faults.push_back(fault);
    }

    fn accepted_nonces(&self, address: AccountAddress) -> Vec<u64> {
        self.state
            .lock()
            .accepted
            .iter()
            .filter(|tx| tx.signer == address)
            .map(|tx| tx.options.nonce)
            .collect()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn query_nonce(&self, address: &AccountAddress) -> Result<u64, ChainError> {
        if self.fail_queries {
            return Err(ChainError::message("node unreachable"));
        }
        let mut state = self.state.lock();
        state.nonce_queries += 1;
        Ok(*state.sequences.entry(*address).or_insert(1))
    }

    async fn broadcast_tx(&self, tx: SignedTx) -> Result<BroadcastResponse, ChainError> {
        if let (Some(gate), Some(ChainMsg::SealObject(_))) = (&self.seal_gate, tx.msgs.first()) {
            let _permit = gate.acquire().await.map_err(|e| ChainError::message(e.to_string()))?;
        }

        let mut state = self.state.lock();
        state.attempts += 1;
        match state.faults.pop_front() {
            Some(Fault::Transport) => return Err(ChainError::message("connection reset by peer")),
            Some(Fault::Rejected(code)) => {
                return Ok(BroadcastResponse {
                    tx_hash: "00".repeat(32),
                    code,
                    raw_log: "insufficient fee".into(),
                })
            }
            Some(Fault::BadHash) => {
                return Ok(BroadcastResponse {
                    tx_hash: "not-hex".into(),
                    code: 0,
                    raw_log: String::new(),
                })
            }
            None => {}
        }

        let expected = *state.sequences.entry(tx.signer).or_insert(1);
        if tx.options.nonce != expected {
            return Err(ChainError::message(format!(
                "account sequence mismatch, expected {expected}, got {}",
                tx.options.nonce
            )));
        }
        state.sequences.insert(tx.signer, expected + 1);
        let hash = format!("{:064x}", state.accepted.len() + 1);
        state.accepted.push(tx);
        Ok(BroadcastResponse {
            tx_hash: hash,
            code: 0,
            raw_log: String::new(),
        })
    }
}

fn keys() -> SignerKeys {
    SignerKeys::from_hex([
        "11".repeat(32).as_str(),
        "22".repeat(32).as_str(),
        "33".repeat(32).as_str(),
        "44".repeat(32).as_str(),
        "55".repeat(32).as_str(),
    ])
    .unwrap()
}

fn seal_request(n: usize) -> SealObjectRequest {
    SealObjectRequest {
        bucket_name: "photos".into(),
        object_name: format!("object-{n}"),
        secondary_sp_addresses: vec![
            format!("0x{}", "a1".repeat(20)),
            format!("0x{}", "b2".repeat(20)),
        ],
        secondary_sp_signatures: vec![vec![1; 64], vec![2; 64]],
    }
}

fn discontinue_request() -> DiscontinueBucketRequest {
    DiscontinueBucketRequest {
        bucket_name: "abandoned".into(),
        reason: "payment account frozen".into(),
    }
}

async fn signer_over(chain: Arc<MockChain>, metrics: Option<Arc<NodeMetrics>>) -> SignerClient {
    SignerClient::connect("greenfield_9000-1741", 210_000, keys(), chain, metrics)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_concurrent_submissions_use_consecutive_nonces() {
    let chain = Arc::new(MockChain::new());
    let signer = Arc::new(signer_over(Arc::clone(&chain), None).await);

    let submissions = (0..20).map(|n| {
        let signer = Arc::clone(&signer);
        async move {
            signer
                .submit_seal_object(SigningScope::Seal, &seal_request(n))
                .await
        }
    });
    let results = futures::future::join_all(submissions).await;
    assert!(results.iter().all(Result::is_ok));

    let nonces = chain.accepted_nonces(signer.address(SigningScope::Seal));
    assert_eq!(nonces, (1..=20).collect::<Vec<u64>>());
    assert_eq!(signer.cached_nonce(SigningScope::Seal).await, 20);
}

#[tokio::test]
async fn test_sequence_mismatch_resyncs_then_next_uses_chain_nonce() {
    let chain = Arc::new(MockChain::new());
    let metrics = Arc::new(NodeMetrics::new());
    let signer = signer_over(Arc::clone(&chain), Some(Arc::clone(&metrics))).await;
    let seal = signer.address(SigningScope::Seal);

    signer
        .submit_seal_object(SigningScope::Seal, &seal_request(0))
        .await
        .unwrap();

    // Another process spent sequences 2..=49 on the same account.
    chain.set_sequence(seal, 50);
    let err = signer
        .submit_seal_object(SigningScope::Seal, &seal_request(1))
        .await
        .unwrap_err();
    assert!(matches!(err, SignerError::SealObjectOnChain(_)));
    assert!(err.is_retryable());
    assert_eq!(signer.cached_nonce(SigningScope::Seal).await, 49);
    assert_eq!(metrics.snapshot().nonce_resyncs, 1);

    signer
        .submit_seal_object(SigningScope::Seal, &seal_request(2))
        .await
        .unwrap();
    assert_eq!(chain.accepted_nonces(seal), vec![1, 50]);
    assert_eq!(signer.cached_nonce(SigningScope::Seal).await, 50);
}

#[tokio::test]
async fn test_rejected_tx_does_not_advance_nonce() {
    let chain = Arc::new(MockChain::new());
    let metrics = Arc::new(NodeMetrics::new());
    let signer = signer_over(Arc::clone(&chain), Some(Arc::clone(&metrics))).await;

    chain.inject(Fault::Rejected(13));
    let err = signer
        .submit_discontinue_bucket(SigningScope::Gc, &discontinue_request())
        .await
        .unwrap_err();
    assert!(matches!(err, SignerError::DiscontinueBucketOnChain(ref msg) if msg.contains("13")));
    assert_eq!(signer.cached_nonce(SigningScope::Gc).await, 0);

    signer
        .submit_discontinue_bucket(SigningScope::Gc, &discontinue_request())
        .await
        .unwrap();
    assert_eq!(chain.accepted_nonces(signer.address(SigningScope::Gc)), vec![1]);
    let snap = metrics.snapshot();
    assert_eq!((snap.txs_submitted, snap.txs_failed, snap.nonce_resyncs), (1, 1, 0));
}

#[tokio::test]
async fn test_undecodable_hash_is_a_failure() {
    let chain = Arc::new(MockChain::new());
    let signer = signer_over(Arc::clone(&chain), None).await;
    chain.inject(Fault::BadHash);
    let err = signer
        .submit_seal_object(SigningScope::Seal, &seal_request(0))
        .await
        .unwrap_err();
    assert!(matches!(err, SignerError::SealObjectOnChain(_)));
    assert_eq!(signer.cached_nonce(SigningScope::Seal).await, 0);
}

#[tokio::test]
async fn test_transport_error_without_mismatch_skips_resync() {
    let chain = Arc::new(MockChain::new());
    let signer = signer_over(Arc::clone(&chain), None).await;
    let queries_after_connect = chain.state.lock().nonce_queries;

    chain.inject(Fault::Transport);
    assert!(signer
        .submit_seal_object(SigningScope::Seal, &seal_request(0))
        .await
        .is_err());
    assert_eq!(chain.state.lock().nonce_queries, queries_after_connect);
    assert_eq!(signer.cached_nonce(SigningScope::Seal).await, 0);
}

#[tokio::test]
async fn test_bad_secondary_address_consumes_no_nonce() {
    let chain = Arc::new(MockChain::new());
    let signer = signer_over(Arc::clone(&chain), None).await;
    let mut request = seal_request(0);
    request.secondary_sp_addresses.push("0xdeadbeef".into());

    let err = signer
        .submit_seal_object(SigningScope::Seal, &request)
        .await
        .unwrap_err();
    assert!(matches!(err, SignerError::InvalidAddress { .. }));
    assert!(!err.is_retryable());
    assert_eq!(chain.state.lock().attempts, 0);
    assert_eq!(signer.cached_nonce(SigningScope::Seal).await, 0);
}

#[tokio::test]
async fn test_scopes_do_not_block_each_other() {
    let gate = Arc::new(Semaphore::new(0));
    let chain = Arc::new(MockChain {
        seal_gate: Some(Arc::clone(&gate)),
        ..MockChain::default()
    });
    let signer = Arc::new(signer_over(Arc::clone(&chain), None).await);

    let sealing = tokio::spawn({
        let signer = Arc::clone(&signer);
        async move {
            signer
                .submit_seal_object(SigningScope::Seal, &seal_request(0))
                .await
        }
    });
    tokio::task::yield_now().await;

    // The seal broadcast is parked holding the seal lock; gc still proceeds.
    signer
        .submit_discontinue_bucket(SigningScope::Gc, &discontinue_request())
        .await
        .unwrap();
    assert_eq!(signer.cached_nonce(SigningScope::Gc).await, 1);
    assert!(!sealing.is_finished());

    gate.add_permits(1);
    sealing.await.unwrap().unwrap();
    assert_eq!(signer.cached_nonce(SigningScope::Seal).await, 1);
    assert_eq!(signer.cached_nonce(SigningScope::Operator).await, 0);
}

#[tokio::test]
async fn test_broadcast_modes_and_signatures() {
    let chain = Arc::new(MockChain::new());
    let signer = signer_over(Arc::clone(&chain), None).await;
    signer
        .submit_seal_object(SigningScope::Seal, &seal_request(0))
        .await
        .unwrap();
    signer
        .submit_discontinue_bucket(SigningScope::Gc, &discontinue_request())
        .await
        .unwrap();

    let accepted = chain.state.lock().accepted.clone();
    assert_eq!(accepted[0].options.mode, BroadcastMode::Async);
    assert_eq!(accepted[1].options.mode, BroadcastMode::Sync);
    assert_eq!(accepted[0].options.gas_limit, 210_000);
    for (tx, scope) in accepted.iter().zip([SigningScope::Seal, SigningScope::Gc]) {
        assert_eq!(tx.signer, signer.address(scope));
        assert!(signer.verify_signature(scope, &tx.sign_bytes().unwrap(), &tx.signature));
    }
    match &accepted[0].msgs[0] {
        ChainMsg::SealObject(msg) => {
            assert_eq!(msg.operator, signer.address(SigningScope::Seal));
            assert_eq!(msg.secondary_sp_addresses.len(), 2);
        }
        other => panic!("unexpected message {other:?}"),
    }
}

#[tokio::test]
async fn test_connect_fails_when_nonce_unavailable() {
    let chain = Arc::new(MockChain {
        fail_queries: true,
        ..MockChain::default()
    });
    let err = SignerClient::connect("c", 1, keys(), chain, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SignerError::InitNonce {
            scope: SigningScope::Operator,
            ..
        }
    ));
}
