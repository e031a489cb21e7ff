//! Request dispatch.
//!
//! Applies one decoded [`Request`] from `sender` at `current_height`. The
//! sender is the transaction signer: it is the creator of a new task, the
//! submitting validator, or the collateral owner.

use augur_types::request::Request;
use augur_types::task::AggregateResult;
use augur_types::{Height, TaskId, ValidatorId};
use serde::Serialize;

use crate::engine::{EngineContext, SubmitOutcome, TaskEngine};
use crate::{EngineError, Result};

/// What an applied request changed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    TaskCreated {
        task_id: TaskId,
    },
    SubmissionAccepted {
        task_id: TaskId,
        count: usize,
    },
    WindowFilled {
        task_id: TaskId,
        result: AggregateResult,
    },
    Finalized {
        task_id: TaskId,
        result: AggregateResult,
    },
    CollateralLocked {
        total: u64,
    },
    UnlockRequested {
        unlocks_at: Height,
    },
    CollateralWithdrawn {
        amount: u64,
    },
    TaskParamsUpdated {
        version: u64,
    },
    PoolParamsUpdated {
        version: u64,
    },
}

impl TaskEngine {
    /// Apply `request` on behalf of `sender`.
    ///
    /// # Errors
    ///
    /// Whatever the underlying operation returns, plus
    /// [`EngineError::Unauthorized`] for parameter updates from anyone other
    /// than the configured authority.
    pub fn apply(
        &mut self,
        ctx: &mut EngineContext<'_>,
        sender: ValidatorId,
        request: Request,
        current_height: Height,
    ) -> Result<Outcome> {
        tracing::trace!(
            sender = %sender,
            request = request.type_name(),
            height = current_height,
            "applying request"
        );

        match request {
            Request::CreateTask(msg) => {
                let task_id = self.create_task(ctx, sender, msg.description, current_height);
                Ok(Outcome::TaskCreated { task_id })
            }
            Request::SubmitData(msg) => {
                let task_id = msg.task_id;
                match self.submit(ctx, task_id, sender, msg.value, current_height)? {
                    SubmitOutcome::Accepted { count } => {
                        Ok(Outcome::SubmissionAccepted { task_id, count })
                    }
                    SubmitOutcome::WindowFilled(result) => {
                        Ok(Outcome::WindowFilled { task_id, result })
                    }
                }
            }
            Request::Finalize(msg) => {
                let result = self.finalize(ctx, msg.task_id, current_height)?;
                Ok(Outcome::Finalized {
                    task_id: msg.task_id,
                    result,
                })
            }
            Request::LockCollateral(msg) => {
                let pool_params = ctx.params.pool_params();
                let total = ctx.pool.lock(sender, msg.amount, &pool_params)?;
                Ok(Outcome::CollateralLocked { total })
            }
            Request::RequestUnlock(_) => {
                let pool_params = ctx.params.pool_params();
                let unlocks_at = ctx
                    .pool
                    .request_unlock(sender, current_height, &pool_params)?;
                Ok(Outcome::UnlockRequested { unlocks_at })
            }
            Request::Withdraw(_) => {
                let amount = ctx.pool.withdraw(sender, current_height)?;
                Ok(Outcome::CollateralWithdrawn { amount })
            }
            Request::UpdateTaskParams(msg) => {
                self.authorize(&sender)?;
                let version = ctx.params.set_task_params(msg.params)?;
                Ok(Outcome::TaskParamsUpdated { version })
            }
            Request::UpdatePoolParams(msg) => {
                self.authorize(&sender)?;
                let version = ctx.params.set_pool_params(msg.params)?;
                Ok(Outcome::PoolParamsUpdated { version })
            }
        }
    }

    fn authorize(&self, sender: &ValidatorId) -> Result<()> {
        match self.authority() {
            Some(authority) if authority == sender => Ok(()),
            _ => Err(EngineError::Unauthorized(*sender)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use augur_aggregate::{ScorePolicy, ScoringLedger};
    use augur_collateral::{CollateralError, CollateralPool};
    use augur_params::{ParameterStore, ParamsError};
    use augur_types::params::TaskParams;
    use augur_types::request::{
        MsgCreateTask, MsgFinalize, MsgLockCollateral, MsgRequestUnlock, MsgSubmitData,
        MsgUpdateTaskParams, MsgWithdraw,
    };

    const GOV: ValidatorId = ValidatorId([0xee; 32]);

    fn v(n: u8) -> ValidatorId {
        ValidatorId([n; 32])
    }

    struct Node {
        params: ParameterStore,
        pool: CollateralPool,
        ledger: ScoringLedger,
        engine: TaskEngine,
    }

    impl Node {
        fn new() -> Self {
            Self {
                params: ParameterStore::in_memory(),
                pool: CollateralPool::new(),
                ledger: ScoringLedger::new(),
                engine: TaskEngine::new(ScorePolicy::default()).with_authority(GOV),
            }
        }

        fn apply(&mut self, sender: ValidatorId, request: Request, height: Height) -> Result<Outcome> {
            let mut ctx = EngineContext {
                params: &mut self.params,
                pool: &mut self.pool,
                ledger: &mut self.ledger,
            };
            self.engine.apply(&mut ctx, sender, request, height)
        }
    }

    #[test]
    fn test_full_request_flow() {
        let mut node = Node::new();
        node.apply(
            GOV,
            Request::UpdateTaskParams(MsgUpdateTaskParams {
                params: TaskParams {
                    aggregation_window: 2,
                    ..TaskParams::default()
                },
            }),
            1,
        )
        .expect("update params");

        for n in [1, 2] {
            let outcome = node
                .apply(v(n), Request::LockCollateral(MsgLockCollateral { amount: 50_000 }), 2)
                .expect("lock");
            assert_eq!(outcome, Outcome::CollateralLocked { total: 50_000 });
        }

        let Outcome::TaskCreated { task_id } = node
            .apply(v(9), Request::CreateTask(MsgCreateTask::default()), 3)
            .expect("create")
        else {
            unreachable!("create returns TaskCreated");
        };

        let outcome = node
            .apply(v(1), Request::SubmitData(MsgSubmitData { task_id, value: 7 }), 4)
            .expect("submit");
        assert_eq!(outcome, Outcome::SubmissionAccepted { task_id, count: 1 });

        let outcome = node
            .apply(v(2), Request::SubmitData(MsgSubmitData { task_id, value: 7 }), 5)
            .expect("submit");
        assert!(matches!(outcome, Outcome::WindowFilled { .. }));

        let outcome = node
            .apply(v(3), Request::Finalize(MsgFinalize { task_id }), 6)
            .expect("finalize");
        let Outcome::Finalized { result, .. } = outcome else {
            unreachable!("finalize returns Finalized");
        };
        assert_eq!(result.value, Some(7));
    }

    #[test]
    fn test_param_update_requires_authority() {
        let mut node = Node::new();
        let err = node
            .apply(
                v(1),
                Request::UpdateTaskParams(MsgUpdateTaskParams {
                    params: TaskParams::default(),
                }),
                1,
            )
            .expect_err("not the authority");
        assert!(matches!(err, EngineError::Unauthorized(_)));
        assert_eq!(node.params.versioned_task_params().version, 0);
    }

    #[test]
    fn test_invalid_param_update_surfaces_params_error() {
        let mut node = Node::new();
        let err = node
            .apply(
                GOV,
                Request::UpdateTaskParams(MsgUpdateTaskParams {
                    params: TaskParams {
                        threshold_score: 300,
                        ..TaskParams::default()
                    },
                }),
                1,
            )
            .expect_err("invalid threshold");
        assert!(matches!(
            err,
            EngineError::Params(ParamsError::InvalidParams { .. })
        ));
        assert_eq!(node.params.task_params(), TaskParams::default());
    }

    #[test]
    fn test_collateral_exit_flow() {
        let mut node = Node::new();
        node.apply(v(1), Request::LockCollateral(MsgLockCollateral { amount: 60_000 }), 1)
            .expect("lock");
        let outcome = node
            .apply(v(1), Request::RequestUnlock(MsgRequestUnlock {}), 10)
            .expect("unlock");
        assert_eq!(outcome, Outcome::UnlockRequested { unlocks_at: 40 });

        let err = node
            .apply(v(1), Request::Withdraw(MsgWithdraw {}), 39)
            .expect_err("still locked");
        assert!(matches!(
            err,
            EngineError::Collateral(CollateralError::StillLocked { .. })
        ));

        let outcome = node
            .apply(v(1), Request::Withdraw(MsgWithdraw {}), 40)
            .expect("withdraw");
        assert_eq!(outcome, Outcome::CollateralWithdrawn { amount: 60_000 });
    }

    #[test]
    fn test_engine_without_authority_rejects_updates() {
        let mut node = Node::new();
        node.engine = TaskEngine::new(ScorePolicy::default());
        let err = node
            .apply(
                GOV,
                Request::UpdateTaskParams(MsgUpdateTaskParams {
                    params: TaskParams::default(),
                }),
                1,
            )
            .expect_err("no authority configured");
        assert!(matches!(err, EngineError::Unauthorized(_)));
    }
}
