//! # augur-engine
//!
//! Task lifecycle engine for the oracle module.
//!
//! A task is created with a frozen copy of the current task parameters,
//! collects at most `aggregation_window` submissions from eligible
//! validators, and ends either `Aggregated` (window filled) or `Expired`
//! (deadline passed). Aggregation feeds the scoring ledger, which may slash
//! collateral.
//!
//! The engine owns only the tasks. Parameter, collateral and score state
//! are passed into every operation through an [`EngineContext`].
//!
//! ## Modules
//!
//! - [`engine`] — [`TaskEngine`] state machine
//! - [`dispatch`] — applies decoded [`Request`](augur_types::request::Request)s

pub mod dispatch;
pub mod engine;

pub use dispatch::Outcome;
pub use engine::{EngineContext, SubmitOutcome, TaskEngine};

use augur_collateral::CollateralError;
use augur_params::ParamsError;
use augur_types::task::TaskStatus;
use augur_types::{Height, TaskId, ValidatorId};

/// Error types for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No task with this id exists.
    #[error("unknown task {0}")]
    UnknownTask(TaskId),

    /// The task is no longer open for submissions.
    #[error("task {task} is not open (status {status:?})")]
    TaskNotOpen {
        /// Task id.
        task: TaskId,
        /// Current status.
        status: TaskStatus,
    },

    /// The task's deadline passed; it has been moved to `Expired`.
    #[error("task {task} expired at height {expires_at} (current {height})")]
    TaskExpired {
        /// Task id.
        task: TaskId,
        /// Last height that accepted submissions.
        expires_at: Height,
        /// Height of the rejected request.
        height: Height,
    },

    /// The validator does not hold eligible collateral.
    #[error("validator {0} is not eligible to submit")]
    NotEligible(ValidatorId),

    /// The validator already submitted to this task.
    #[error("validator {validator} already submitted to task {task}")]
    DuplicateSubmission {
        /// Task id.
        task: TaskId,
        /// Submitting validator.
        validator: ValidatorId,
    },

    /// Finalize called before the window filled or the task expired.
    #[error("task {task} not ready: {have} of {need} submissions")]
    NotReady {
        /// Task id.
        task: TaskId,
        /// Submissions collected.
        have: usize,
        /// Window size.
        need: usize,
    },

    /// A parameter update was sent by someone other than the authority.
    #[error("{0} is not the parameter authority")]
    Unauthorized(ValidatorId),

    #[error(transparent)]
    Params(#[from] ParamsError),

    #[error(transparent)]
    Collateral(#[from] CollateralError),
}

/// Convenience result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
