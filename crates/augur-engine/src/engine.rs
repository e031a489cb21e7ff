//! Task state machine.
//!
//! ```text
//!            window filled
//!   Open ─────────────────────▶ Aggregated
//!     │
//!     │  height > expires_at
//!     └───────────────────────▶ Expired
//! ```
//!
//! Every operation validates before it mutates, so a rejected call leaves
//! the engine untouched. The one exception is [`EngineError::TaskExpired`]:
//! discovering that a task's deadline has passed records the `Expired`
//! transition even though the submission is rejected.

use std::collections::BTreeMap;

use augur_aggregate::{aggregate, ScorePolicy, ScoringLedger};
use augur_collateral::CollateralPool;
use augur_params::ParameterStore;
use augur_types::task::{AggregateResult, Penalty, Submission, Task, TaskStatus};
use augur_types::{Height, TaskId, ValidatorId};
use serde::Serialize;

use crate::{EngineError, Result};

/// Global stores an operation reads and writes.
pub struct EngineContext<'a> {
    pub params: &'a mut ParameterStore,
    pub pool: &'a mut CollateralPool,
    pub ledger: &'a mut ScoringLedger,
}

/// Result of an accepted submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Stored; the window still has room.
    Accepted { count: usize },
    /// Stored and the window is now full; the task was aggregated.
    WindowFilled(AggregateResult),
}

/// Owner of every task's lifecycle.
#[derive(Debug, Default)]
pub struct TaskEngine {
    tasks: BTreeMap<TaskId, Task>,
    sequence: u64,
    policy: ScorePolicy,
    authority: Option<ValidatorId>,
}

impl TaskEngine {
    pub fn new(policy: ScorePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Allow `authority` to update parameters through requests.
    pub fn with_authority(mut self, authority: ValidatorId) -> Self {
        self.authority = Some(authority);
        self
    }

    /// Continue task-id derivation from `sequence`, as saved by a previous
    /// run.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Sequence number the next created task will use.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn policy(&self) -> &ScorePolicy {
        &self.policy
    }

    pub fn authority(&self) -> Option<&ValidatorId> {
        self.authority.as_ref()
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Open a task under the task parameters current at `current_height`.
    ///
    /// A frozen window of zero can never take a submission, so such a task
    /// is aggregated (empty, low-confidence) on creation.
    pub fn create_task(
        &mut self,
        ctx: &EngineContext<'_>,
        creator: ValidatorId,
        description: impl Into<String>,
        current_height: Height,
    ) -> TaskId {
        let snapshot = ctx.params.versioned_task_params().clone();
        let id = TaskId::derive(&creator, current_height, self.sequence);
        self.sequence += 1;

        let mut task = Task {
            id,
            creator,
            description: description.into(),
            created_at: current_height,
            expires_at: current_height.saturating_add(snapshot.params.expiry_blocks()),
            params: snapshot.params,
            params_version: snapshot.version,
            status: TaskStatus::Open,
            submissions: Vec::new(),
            result: None,
            penalties: Vec::new(),
        };

        tracing::info!(
            task = %id,
            creator = %creator,
            height = current_height,
            expires_at = task.expires_at,
            window = task.params.window(),
            params_version = task.params_version,
            "task created"
        );

        if task.window_filled() {
            let result = aggregate(&task.submissions, &task.params);
            task.result = Some(result);
            task.status = TaskStatus::Aggregated;
            tracing::info!(task = %id, "zero-size window: task aggregated on creation");
        }

        self.tasks.insert(id, task);
        id
    }

    /// Record `validator`'s value for an open task.
    ///
    /// Filling the window aggregates the task in the same step.
    ///
    /// # Errors
    ///
    /// Checked in this order:
    /// - [`EngineError::UnknownTask`]
    /// - [`EngineError::TaskNotOpen`] if the task is terminal
    /// - [`EngineError::TaskExpired`] if `current_height` is past the deadline (task becomes `Expired`)
    /// - [`EngineError::NotEligible`] if the validator's collateral does not qualify
    /// - [`EngineError::DuplicateSubmission`] if the validator already submitted
    pub fn submit(
        &mut self,
        ctx: &mut EngineContext<'_>,
        task_id: TaskId,
        validator: ValidatorId,
        value: i64,
        current_height: Height,
    ) -> Result<SubmitOutcome> {
        let task = self
            .tasks
            .get_mut(&task_id)
            .ok_or(EngineError::UnknownTask(task_id))?;

        if task.status != TaskStatus::Open {
            return Err(EngineError::TaskNotOpen {
                task: task_id,
                status: task.status,
            });
        }
        if task.is_past_expiry(current_height) {
            expire(task, current_height);
            return Err(EngineError::TaskExpired {
                task: task_id,
                expires_at: task.expires_at,
                height: current_height,
            });
        }
        if !ctx.pool.is_eligible(&validator, &ctx.params.pool_params()) {
            return Err(EngineError::NotEligible(validator));
        }
        if task.has_submitted(&validator) {
            return Err(EngineError::DuplicateSubmission {
                task: task_id,
                validator,
            });
        }

        task.submissions.push(Submission {
            validator,
            value,
            height: current_height,
        });
        let count = task.submissions.len();
        tracing::debug!(
            task = %task_id,
            validator = %validator,
            value,
            count,
            window = task.params.window(),
            "submission accepted"
        );

        if task.window_filled() {
            tracing::info!(task = %task_id, count, "aggregation window filled");
            let result = settle(task, ctx, &self.policy);
            return Ok(SubmitOutcome::WindowFilled(result));
        }
        Ok(SubmitOutcome::Accepted { count })
    }

    /// Aggregate a task, or return its stored result.
    ///
    /// - A task with a stored result returns it unchanged; repeat calls are no-ops.
    /// - A task past its deadline is marked `Expired` and aggregated over
    ///   whatever was submitted, without scoring or slashing.
    /// - An open task with a full window is aggregated, scored and marked
    ///   `Aggregated`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::UnknownTask`]
    /// - [`EngineError::NotReady`] if the task is open, unexpired and the window has room
    pub fn finalize(
        &mut self,
        ctx: &mut EngineContext<'_>,
        task_id: TaskId,
        current_height: Height,
    ) -> Result<AggregateResult> {
        let task = self
            .tasks
            .get_mut(&task_id)
            .ok_or(EngineError::UnknownTask(task_id))?;

        if let Some(result) = &task.result {
            return Ok(result.clone());
        }

        if task.status == TaskStatus::Open && task.is_past_expiry(current_height) {
            expire(task, current_height);
        }
        match task.status {
            TaskStatus::Expired => Ok(close_expired(task)),
            TaskStatus::Open if task.window_filled() => Ok(settle(task, ctx, &self.policy)),
            TaskStatus::Open | TaskStatus::Aggregated => Err(EngineError::NotReady {
                task: task_id,
                have: task.submissions.len(),
                need: task.params.window(),
            }),
        }
    }

    /// Move every open task whose deadline passed to `Expired`.
    ///
    /// Returns the ids of the tasks that expired, in id order.
    pub fn end_block(&mut self, current_height: Height) -> Vec<TaskId> {
        self.tasks
            .values_mut()
            .filter(|t| t.status == TaskStatus::Open && t.is_past_expiry(current_height))
            .map(|t| {
                expire(t, current_height);
                t.id
            })
            .collect()
    }

    /// Copies of the terminal tasks whose deadline is more than
    /// `retain_blocks` behind `current_height`, ready to archive.
    ///
    /// Expired tasks that were never finalized get their result computed on
    /// the copy so the archived record is complete. The engine is not
    /// changed; call [`TaskEngine::remove_tasks`] once the copies are stored.
    pub fn due_for_archive(&self, current_height: Height, retain_blocks: u64) -> Vec<Task> {
        self.tasks
            .values()
            .filter(|t| {
                t.status.is_terminal()
                    && current_height.saturating_sub(t.expires_at) > retain_blocks
            })
            .map(|t| {
                let mut task = t.clone();
                if task.result.is_none() {
                    close_expired(&mut task);
                }
                task
            })
            .collect()
    }

    /// Drop tasks by id, returning the ids that were present.
    pub fn remove_tasks(&mut self, ids: &[TaskId]) -> Vec<TaskId> {
        ids.iter()
            .filter(|id| self.tasks.remove(*id).is_some())
            .inspect(|id| tracing::debug!(task = %id, "task pruned"))
            .copied()
            .collect()
    }

    /// Remove and return the tasks [`TaskEngine::due_for_archive`] selects.
    pub fn prune_terminal(&mut self, current_height: Height, retain_blocks: u64) -> Vec<Task> {
        let due = self.due_for_archive(current_height, retain_blocks);
        let ids: Vec<TaskId> = due.iter().map(|t| t.id).collect();
        self.remove_tasks(&ids);
        due
    }
}

fn expire(task: &mut Task, current_height: Height) {
    task.status = TaskStatus::Expired;
    tracing::info!(
        task = %task.id,
        height = current_height,
        expires_at = task.expires_at,
        submissions = task.submissions.len(),
        "task expired"
    );
}

/// Store the result of an expired task. No scoring: running out of time is
/// not a validator fault.
fn close_expired(task: &mut Task) -> AggregateResult {
    let result = aggregate(&task.submissions, &task.params);
    task.result = Some(result.clone());
    tracing::info!(
        task = %task.id,
        value = ?result.value,
        low_confidence = result.low_confidence,
        "expired task closed"
    );
    result
}

/// Aggregate a full window, apply scores and slash validators whose score
/// crossed the task's frozen threshold.
fn settle(task: &mut Task, ctx: &mut EngineContext<'_>, policy: &ScorePolicy) -> AggregateResult {
    let result = aggregate(&task.submissions, &task.params);
    let threshold = task.params.threshold();

    let mut penalties = Vec::new();
    for deviation in &result.deviations {
        let score = ctx
            .ledger
            .apply_deviation(deviation.validator, deviation.tier, policy);
        if score <= threshold {
            continue;
        }
        let locked = ctx
            .pool
            .record(&deviation.validator)
            .map_or(0, |r| r.locked_amount);
        let slashed = ctx
            .pool
            .slash(deviation.validator, policy.slash_amount(locked));
        ctx.ledger
            .reset(deviation.validator, policy.reset_score(threshold));
        tracing::warn!(
            task = %task.id,
            validator = %deviation.validator,
            score,
            threshold,
            slashed,
            "score crossed threshold"
        );
        penalties.push(Penalty {
            validator: deviation.validator,
            score,
            slashed,
        });
    }

    task.result = Some(result.clone());
    task.penalties = penalties;
    task.status = TaskStatus::Aggregated;
    tracing::info!(
        task = %task.id,
        value = ?result.value,
        submissions = result.submission_count,
        penalties = task.penalties.len(),
        "task aggregated"
    );
    result
}
