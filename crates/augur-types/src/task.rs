//! Tasks, submissions and aggregation results.

use serde::{Deserialize, Serialize};

use crate::params::TaskParams;
use crate::{Height, TaskId, ValidatorId};

/// Lifecycle state of a task. `Expired` and `Aggregated` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    Expired,
    Aggregated,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Open)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::Expired => "expired",
            TaskStatus::Aggregated => "aggregated",
        }
    }
}

/// One validator's reported value for a task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub validator: ValidatorId,
    pub value: i64,
    pub height: Height,
}

/// How far a submission landed from the aggregate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviationTier {
    /// Within `epsilon1`.
    Tight,
    /// Beyond `epsilon1`, within `epsilon2`.
    Loose,
    /// Beyond `epsilon2`.
    Outlier,
}

/// Per-submission deviation from the aggregated center.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deviation {
    pub validator: ValidatorId,
    /// Absolute distance from the center.
    pub distance: u64,
    pub tier: DeviationTier,
}

/// Output of one aggregation round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateResult {
    /// Aggregated value; `None` when no submission was present.
    pub value: Option<i64>,
    /// Set when fewer than two submissions contributed.
    pub low_confidence: bool,
    pub submission_count: usize,
    /// One entry per submission, in arrival order.
    pub deviations: Vec<Deviation>,
}

/// Slashing applied to one validator when a task was aggregated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Penalty {
    pub validator: ValidatorId,
    /// Score that crossed the threshold.
    pub score: u8,
    /// Collateral actually removed.
    pub slashed: u64,
}

/// A single round of requested data aggregation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub creator: ValidatorId,
    #[serde(default)]
    pub description: String,
    pub created_at: Height,
    /// Last height at which submissions are accepted.
    pub expires_at: Height,
    /// Parameters frozen at creation.
    pub params: TaskParams,
    pub params_version: u64,
    pub status: TaskStatus,
    /// Arrival order, never longer than the frozen window.
    pub submissions: Vec<Submission>,
    pub result: Option<AggregateResult>,
    /// Slashing triggered by this task's aggregation.
    #[serde(default)]
    pub penalties: Vec<Penalty>,
}

impl Task {
    /// Whether the task's deadline has passed at `height`.
    pub fn is_past_expiry(&self, height: Height) -> bool {
        height > self.expires_at
    }

    pub fn has_submitted(&self, validator: &ValidatorId) -> bool {
        self.submissions.iter().any(|s| &s.validator == validator)
    }

    /// Whether the submission window is full.
    pub fn window_filled(&self) -> bool {
        self.submissions.len() >= self.params.window()
    }
}
