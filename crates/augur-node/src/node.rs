//! Block-driven node state.
//!
//! A [`Node`] owns the parameter store, collateral pool, scoring ledger and
//! task engine, and feeds them one signed transaction at a time. Heights
//! must never decrease; whenever the height advances the engine's
//! end-of-block pass runs and terminal tasks old enough are archived.
//!
//! Parameters, the task archive, the last applied height and the task-id
//! sequence live in SQLite and survive a restart. Collateral records,
//! scores and live tasks are held in memory and start empty.

use std::sync::{Arc, Mutex};

use augur_aggregate::ScoringLedger;
use augur_codec::{CodecError, SignedRequest};
use augur_collateral::CollateralPool;
use augur_db::queries::node_state::{self, NodeState};
use augur_db::{queries, DbError, SqliteSubspace};
use augur_engine::{EngineContext, EngineError, Outcome, TaskEngine};
use augur_params::ParameterStore;
use augur_types::{Height, TaskId, ValidatorId};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::NodeConfig;

/// Errors rejecting a single input line.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("malformed input: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("height {got} is below current height {current}")]
    HeightRegression { current: Height, got: Height },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("database: {0}")]
    Db(#[from] DbError),

    #[error("database lock poisoned")]
    LockPoisoned,
}

/// One input line: a signed request included at `height`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxEnvelope {
    pub height: Height,
    pub tx: SignedRequest,
}

/// One output line.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub height: Height,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer: Option<ValidatorId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Tasks that expired when this line advanced the height.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expired: Vec<TaskId>,
    /// Tasks moved to the archive when this line advanced the height.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub archived: Vec<TaskId>,
}

impl Receipt {
    fn new(height: Height) -> Self {
        Self {
            height,
            signer: None,
            request: None,
            outcome: None,
            error: None,
            expired: Vec::new(),
            archived: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

pub struct Node {
    params: ParameterStore,
    pool: CollateralPool,
    ledger: ScoringLedger,
    engine: TaskEngine,
    db: Arc<Mutex<Connection>>,
    height: Height,
    archive_after_blocks: u64,
}

impl Node {
    /// Build a node from configuration, opening (or creating) the database.
    pub fn from_config(config: &NodeConfig) -> anyhow::Result<Self> {
        let conn = match config.db_path() {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                augur_db::open(&path)?
            }
            None => augur_db::open_memory()?,
        };
        let state = node_state::load(&conn)?;
        if state != NodeState::default() {
            info!(
                height = state.height,
                sequence = state.sequence,
                "resuming from stored node state"
            );
        }
        let db = Arc::new(Mutex::new(conn));

        config.scoring.validate()?;
        let params = ParameterStore::open_with_genesis(
            Box::new(SqliteSubspace::new(db.clone())),
            config.genesis.task.clone(),
            config.genesis.pool.clone(),
        )?;

        let mut engine = TaskEngine::new(config.scoring.clone()).with_sequence(state.sequence);
        if let Some(authority) = config.authority()? {
            info!(authority = %authority, "governance authority configured");
            engine = engine.with_authority(authority);
        }

        Ok(Self {
            params,
            pool: CollateralPool::new(),
            ledger: ScoringLedger::new(),
            engine,
            db,
            height: state.height,
            archive_after_blocks: config.storage.archive_after_blocks,
        })
    }

    pub fn height(&self) -> Height {
        self.height
    }

    pub fn engine(&self) -> &TaskEngine {
        &self.engine
    }

    pub fn pool(&self) -> &CollateralPool {
        &self.pool
    }

    pub fn ledger(&self) -> &ScoringLedger {
        &self.ledger
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    /// Parse and apply one JSON input line. Never fails: rejections are
    /// reported in the receipt.
    pub fn handle_line(&mut self, line: &str) -> Receipt {
        match serde_json::from_str::<TxEnvelope>(line) {
            Ok(envelope) => self.handle(envelope),
            Err(e) => {
                let mut receipt = Receipt::new(self.height);
                receipt.error = Some(NodeError::from(e).to_string());
                receipt
            }
        }
    }

    /// Apply one signed transaction at its height.
    pub fn handle(&mut self, envelope: TxEnvelope) -> Receipt {
        let mut receipt = Receipt::new(envelope.height);

        if let Err(e) = self.advance(envelope.height, &mut receipt) {
            warn!(error = %e, "input rejected");
            receipt.error = Some(e.to_string());
            return receipt;
        }

        let (signer, request) = match envelope.tx.open() {
            Ok(opened) => opened,
            Err(e) => {
                warn!(signer = %envelope.tx.signer, error = %e, "transaction rejected");
                receipt.error = Some(NodeError::from(e).to_string());
                return receipt;
            }
        };
        receipt.signer = Some(signer);
        receipt.request = Some(request.type_name());

        let mut ctx = EngineContext {
            params: &mut self.params,
            pool: &mut self.pool,
            ledger: &mut self.ledger,
        };
        match self.engine.apply(&mut ctx, signer, request, self.height) {
            Ok(outcome) => receipt.outcome = Some(outcome),
            Err(e) => {
                debug!(signer = %signer, error = %e, "request failed");
                receipt.error = Some(NodeError::from(e).to_string());
            }
        }
        receipt
    }

    /// Move to `height`, running the end-of-block pass if it advanced.
    ///
    /// Due tasks are archived and the new height saved in one transaction;
    /// tasks leave the engine only after it commits. On failure the height
    /// stays put and the same tasks are due again on the next line.
    fn advance(&mut self, height: Height, receipt: &mut Receipt) -> Result<(), NodeError> {
        if height < self.height {
            return Err(NodeError::HeightRegression {
                current: self.height,
                got: height,
            });
        }
        if height == self.height {
            return Ok(());
        }

        receipt.expired = self.engine.end_block(height);
        let due = self
            .engine
            .due_for_archive(height, self.archive_after_blocks);
        let state = NodeState {
            height,
            sequence: self.engine.sequence(),
        };
        {
            let mut conn = self.db.lock().map_err(|_| NodeError::LockPoisoned)?;
            let tx = conn.transaction().map_err(DbError::from)?;
            for task in &due {
                queries::archive::archive_task(&tx, task)?;
            }
            node_state::save(&tx, &state)?;
            tx.commit().map_err(DbError::from)?;
        }

        let ids: Vec<TaskId> = due.iter().map(|t| t.id).collect();
        receipt.archived = self.engine.remove_tasks(&ids);
        if !receipt.archived.is_empty() {
            info!(height, count = receipt.archived.len(), "tasks archived");
        }

        self.height = height;
        Ok(())
    }

    /// Number of tasks in the archive.
    pub fn archived_count(&self) -> anyhow::Result<u64> {
        let conn = self
            .db
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))?;
        Ok(queries::archive::count_archived(&conn)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use augur_codec::SigningKey;
    use augur_types::params::TaskParams;
    use augur_types::request::{
        MsgCreateTask, MsgFinalize, MsgLockCollateral, MsgSubmitData, MsgUpdateTaskParams, Request,
    };
    use augur_types::task::TaskStatus;

    fn config() -> NodeConfig {
        let mut config = NodeConfig::default();
        config.genesis.task = TaskParams {
            expiration_duration: 10,
            aggregation_window: 2,
            ..TaskParams::default()
        };
        config.storage.archive_after_blocks = 5;
        config
    }

    fn line(key: &SigningKey, height: Height, request: Request) -> String {
        let envelope = TxEnvelope {
            height,
            tx: key.sign(&request).expect("sign"),
        };
        serde_json::to_string(&envelope).expect("encode envelope")
    }

    fn created_task(receipt: &Receipt) -> TaskId {
        receipt
            .outcome
            .as_ref()
            .and_then(|outcome| match outcome {
                Outcome::TaskCreated { task_id } => Some(*task_id),
                _ => None,
            })
            .expect("task created")
    }

    #[test]
    fn test_lock_submit_aggregate() {
        let mut node = Node::from_config(&config()).expect("node");
        let creator = SigningKey::from_bytes(&[1; 32]);
        let a = SigningKey::from_bytes(&[2; 32]);
        let b = SigningKey::from_bytes(&[3; 32]);

        for key in [&a, &b] {
            let receipt = node.handle_line(&line(
                key,
                1,
                Request::LockCollateral(MsgLockCollateral { amount: 50_000 }),
            ));
            assert!(receipt.is_ok(), "{:?}", receipt.error);
        }

        let receipt = node.handle_line(&line(
            &creator,
            2,
            Request::CreateTask(MsgCreateTask {
                description: "BTC/USD".to_string(),
            }),
        ));
        let task_id = created_task(&receipt);

        let first = node.handle_line(&line(
            &a,
            3,
            Request::SubmitData(MsgSubmitData { task_id, value: 100 }),
        ));
        assert!(matches!(
            first.outcome,
            Some(Outcome::SubmissionAccepted { count: 1, .. })
        ));
        let second = node.handle_line(&line(
            &b,
            3,
            Request::SubmitData(MsgSubmitData { task_id, value: 102 }),
        ));
        assert!(matches!(second.outcome, Some(Outcome::WindowFilled { .. })));
        assert_eq!(
            node.engine().task(&task_id).expect("task").status,
            TaskStatus::Aggregated
        );

        let finalized = node.handle_line(&line(
            &creator,
            4,
            Request::Finalize(MsgFinalize { task_id }),
        ));
        assert!(matches!(finalized.outcome, Some(Outcome::Finalized { .. })));
    }

    #[test]
    fn test_height_regression_rejected() {
        let mut node = Node::from_config(&config()).expect("node");
        let key = SigningKey::from_bytes(&[4; 32]);
        let ok = node.handle_line(&line(
            &key,
            10,
            Request::CreateTask(MsgCreateTask::default()),
        ));
        assert!(ok.is_ok());
        let stale = node.handle_line(&line(
            &key,
            9,
            Request::CreateTask(MsgCreateTask::default()),
        ));
        assert!(stale.error.expect("rejected").contains("below current height"));
        assert_eq!(node.height(), 10);
        assert_eq!(node.engine().tasks().count(), 1);
    }

    #[test]
    fn test_malformed_and_forged_lines() {
        let mut node = Node::from_config(&config()).expect("node");
        let receipt = node.handle_line("{not json");
        assert!(receipt.error.expect("rejected").starts_with("malformed input"));

        let key = SigningKey::from_bytes(&[5; 32]);
        let mut envelope = TxEnvelope {
            height: 1,
            tx: key
                .sign(&Request::CreateTask(MsgCreateTask::default()))
                .expect("sign"),
        };
        envelope.tx.signer = SigningKey::from_bytes(&[6; 32]).validator_id();
        let receipt = node.handle(envelope);
        assert!(!receipt.is_ok());
        assert!(receipt.signer.is_none());
        assert_eq!(node.engine().tasks().count(), 0);
    }

    #[test]
    fn test_expired_tasks_are_archived() {
        let mut node = Node::from_config(&config()).expect("node");
        let key = SigningKey::from_bytes(&[7; 32]);
        let created = node.handle_line(&line(
            &key,
            1,
            Request::CreateTask(MsgCreateTask::default()),
        ));
        let task_id = created_task(&created);

        // expires_at = 11; Expired at 12, archived once more than 5 blocks past.
        let at_12 = node.handle_line(&line(
            &key,
            12,
            Request::CreateTask(MsgCreateTask::default()),
        ));
        assert_eq!(at_12.expired, vec![task_id]);
        assert!(at_12.archived.is_empty());

        let at_17 = node.handle_line(&line(
            &key,
            17,
            Request::CreateTask(MsgCreateTask::default()),
        ));
        assert_eq!(at_17.archived, vec![task_id]);
        assert!(node.engine().task(&task_id).is_none());
        assert_eq!(node.archived_count().expect("count"), 1);
    }

    #[test]
    fn test_archive_failure_keeps_tasks() {
        let mut node = Node::from_config(&config()).expect("node");
        let key = SigningKey::from_bytes(&[11; 32]);
        let created = node.handle_line(&line(
            &key,
            1,
            Request::CreateTask(MsgCreateTask::default()),
        ));
        let task_id = created_task(&created);
        let at_12 = node.handle_line(&line(
            &key,
            12,
            Request::CreateTask(MsgCreateTask::default()),
        ));
        assert_eq!(at_12.expired, vec![task_id]);

        node.db
            .lock()
            .expect("lock")
            .execute_batch("ALTER TABLE task_archive RENAME TO task_archive_moved")
            .expect("move archive table");
        let failed = node.handle_line(&line(
            &key,
            17,
            Request::CreateTask(MsgCreateTask::default()),
        ));
        assert!(failed.error.expect("archive failed").starts_with("database"));
        assert!(failed.archived.is_empty());
        assert_eq!(node.height(), 12);
        assert_eq!(node.engine().tasks().count(), 2);
        assert_eq!(
            node.engine().task(&task_id).expect("task kept").status,
            TaskStatus::Expired
        );

        node.db
            .lock()
            .expect("lock")
            .execute_batch("ALTER TABLE task_archive_moved RENAME TO task_archive")
            .expect("restore archive table");
        let retried = node.handle_line(&line(
            &key,
            17,
            Request::CreateTask(MsgCreateTask::default()),
        ));
        assert!(retried.is_ok(), "{:?}", retried.error);
        assert_eq!(retried.archived, vec![task_id]);
        assert!(node.engine().task(&task_id).is_none());
        assert_eq!(node.archived_count().expect("count"), 1);
    }

    #[test]
    fn test_restart_resumes_height_and_sequence() {
        let dir = std::env::temp_dir().join(format!("augur-node-restart-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let mut config = config();
        config.storage.db_path = dir.join("augur.db").to_string_lossy().into_owned();
        let key = SigningKey::from_bytes(&[12; 32]);

        let first = {
            let mut node = Node::from_config(&config).expect("node");
            let receipt = node.handle_line(&line(
                &key,
                1,
                Request::CreateTask(MsgCreateTask::default()),
            ));
            let first = created_task(&receipt);
            // Advancing saves the sequence consumed at height 1.
            let receipt = node.handle_line(&line(
                &key,
                3,
                Request::LockCollateral(MsgLockCollateral { amount: 50_000 }),
            ));
            assert!(receipt.is_ok(), "{:?}", receipt.error);
            first
        };

        let mut node = Node::from_config(&config).expect("reopen");
        assert_eq!(node.height(), 3);
        assert_eq!(node.engine().sequence(), 1);
        let stale = node.handle_line(&line(
            &key,
            1,
            Request::CreateTask(MsgCreateTask::default()),
        ));
        assert!(stale.error.expect("rejected").contains("below current height"));
        let receipt = node.handle_line(&line(
            &key,
            3,
            Request::CreateTask(MsgCreateTask::default()),
        ));
        assert_ne!(created_task(&receipt), first);

        drop(node);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_param_update_needs_authority() {
        let governor = SigningKey::from_bytes(&[9; 32]);
        let mut config = config();
        config.governance.authority = governor.validator_id().to_string();
        let mut node = Node::from_config(&config).expect("node");

        let params = TaskParams {
            threshold_score: 200,
            ..TaskParams::default()
        };
        let outsider = node.handle_line(&line(
            &SigningKey::from_bytes(&[8; 32]),
            1,
            Request::UpdateTaskParams(MsgUpdateTaskParams {
                params: params.clone(),
            }),
        ));
        assert!(outsider.error.expect("rejected").contains("not the parameter authority"));

        let accepted = node.handle_line(&line(
            &governor,
            1,
            Request::UpdateTaskParams(MsgUpdateTaskParams { params }),
        ));
        assert!(matches!(
            accepted.outcome,
            Some(Outcome::TaskParamsUpdated { version: 1 })
        ));
        assert_eq!(node.params().task_params().threshold_score, 200);
    }

    #[test]
    fn test_receipt_json_shape() {
        let mut node = Node::from_config(&config()).expect("node");
        let key = SigningKey::from_bytes(&[10; 32]);
        let receipt = node.handle_line(&line(
            &key,
            1,
            Request::LockCollateral(MsgLockCollateral { amount: 60_000 }),
        ));
        let json = serde_json::to_value(&receipt).expect("json");
        assert_eq!(json["request"], "oracle/MsgLockCollateral");
        assert_eq!(json["outcome"]["outcome"], "collateral_locked");
        assert_eq!(json["outcome"]["total"], 60_000);
        assert!(json.get("error").is_none());
    }
}
