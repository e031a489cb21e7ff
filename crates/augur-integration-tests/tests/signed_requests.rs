//! Integration test: signed request envelopes driving the engine.
//!
//! Every request travels as CBOR envelope bytes, is verified, and is
//! applied with the recovered signer as sender.

use augur_aggregate::{ScorePolicy, ScoringLedger};
use augur_codec::{CodecError, SignedRequest, SigningKey};
use augur_collateral::CollateralPool;
use augur_engine::{EngineContext, Outcome, TaskEngine};
use augur_params::ParameterStore;
use augur_types::params::TaskParams;
use augur_types::request::{
    MsgCreateTask, MsgFinalize, MsgLockCollateral, MsgSubmitData, MsgUpdateTaskParams, Request,
};
use augur_types::task::TaskStatus;
use augur_types::Height;

struct Node {
    params: ParameterStore,
    pool: CollateralPool,
    ledger: ScoringLedger,
    engine: TaskEngine,
}

impl Node {
    fn new(governor: &SigningKey) -> Self {
        Self {
            params: ParameterStore::in_memory(),
            pool: CollateralPool::new(),
            ledger: ScoringLedger::new(),
            engine: TaskEngine::new(ScorePolicy::default()).with_authority(governor.validator_id()),
        }
    }

    /// Decode, verify and apply envelope bytes.
    fn deliver(&mut self, bytes: &[u8], height: Height) -> Outcome {
        let envelope = SignedRequest::from_bytes(bytes).expect("decode envelope");
        let (signer, request) = envelope.open().expect("verify envelope");
        let mut ctx = EngineContext {
            params: &mut self.params,
            pool: &mut self.pool,
            ledger: &mut self.ledger,
        };
        self.engine
            .apply(&mut ctx, signer, request, height)
            .expect("apply request")
    }
}

fn wire(key: &SigningKey, request: Request) -> Vec<u8> {
    key.sign(&request)
        .expect("sign")
        .to_bytes()
        .expect("encode envelope")
}

#[test]
fn test_signed_round_to_aggregation() {
    let governor = SigningKey::generate();
    let creator = SigningKey::generate();
    let validators: Vec<SigningKey> = (0..3).map(|_| SigningKey::generate()).collect();
    let mut node = Node::new(&governor);

    let outcome = node.deliver(
        &wire(
            &governor,
            Request::UpdateTaskParams(MsgUpdateTaskParams {
                params: TaskParams {
                    aggregation_window: 3,
                    ..TaskParams::default()
                },
            }),
        ),
        1,
    );
    assert_eq!(outcome, Outcome::TaskParamsUpdated { version: 1 });

    for key in &validators {
        let outcome = node.deliver(
            &wire(key, Request::LockCollateral(MsgLockCollateral { amount: 50_000 })),
            2,
        );
        assert_eq!(outcome, Outcome::CollateralLocked { total: 50_000 });
    }

    let Outcome::TaskCreated { task_id } = node.deliver(
        &wire(
            &creator,
            Request::CreateTask(MsgCreateTask {
                description: "BTC/USD".to_string(),
            }),
        ),
        3,
    ) else {
        unreachable!("create returns TaskCreated");
    };
    assert_eq!(
        node.engine.task(&task_id).expect("task").creator,
        creator.validator_id()
    );

    let mut last = None;
    for (key, value) in validators.iter().zip([30_000, 30_010, 29_995]) {
        last = Some(node.deliver(
            &wire(key, Request::SubmitData(MsgSubmitData { task_id, value })),
            4,
        ));
    }
    let Some(Outcome::WindowFilled { result, .. }) = last else {
        unreachable!("third submission fills the window");
    };
    assert_eq!(result.value, Some(30_000));
    assert_eq!(
        node.engine.task(&task_id).expect("task").status,
        TaskStatus::Aggregated
    );

    let outcome = node.deliver(
        &wire(&creator, Request::Finalize(MsgFinalize { task_id })),
        5,
    );
    assert_eq!(
        outcome,
        Outcome::Finalized {
            task_id,
            result
        }
    );
}

#[test]
fn test_envelope_from_other_signer_rejected() {
    let honest = SigningKey::generate();
    let impostor = SigningKey::generate();
    let mut envelope = honest
        .sign(&Request::LockCollateral(MsgLockCollateral { amount: 50_000 }))
        .expect("sign");
    envelope.signer = impostor.validator_id();

    let bytes = envelope.to_bytes().expect("encode");
    let decoded = SignedRequest::from_bytes(&bytes).expect("decode");
    assert!(matches!(
        decoded.open(),
        Err(CodecError::SignatureVerification)
    ));
}

#[test]
fn test_envelope_json_wire_names() {
    let key = SigningKey::from_bytes(&[3; 32]);
    let envelope = key
        .sign(&Request::CreateTask(MsgCreateTask::default()))
        .expect("sign");
    let json = serde_json::to_value(&envelope).expect("json");
    assert_eq!(
        json["signer"].as_str(),
        Some(key.validator_id().to_string().as_str())
    );

    let (_, request) = envelope.open().expect("open");
    let request_json = serde_json::to_value(&request).expect("json");
    assert_eq!(request_json["type"], "oracle/MsgCreateTask");
}
