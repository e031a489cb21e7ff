//! Global parameter sets.
//!
//! [`TaskParams`] tune aggregation; [`LockedPoolParams`] set collateral
//! policy. Fields are signed so that a candidate update can carry an
//! out-of-range value all the way to [`TaskParams::validate`], which rejects
//! the whole update.

use serde::{Deserialize, Serialize};

/// Storage key for [`TaskParams`].
pub const KEY_TASK_PARAMS: &str = "taskparams";

/// Storage key for [`LockedPoolParams`].
pub const KEY_POOL_PARAMS: &str = "poolparams";

/// Default task lifetime: 24 hours at 5 seconds per block.
pub const DEFAULT_EXPIRATION_DURATION: i64 = 24 * 60 * 60 / 5;
pub const DEFAULT_AGGREGATION_WINDOW: i64 = 20;
pub const DEFAULT_AGGREGATION_RESULT: i64 = 1;
pub const DEFAULT_THRESHOLD_SCORE: i64 = 128;
pub const DEFAULT_EPSILON1: i64 = 1;
pub const DEFAULT_EPSILON2: i64 = 100;

pub const DEFAULT_LOCKED_IN_BLOCKS: i64 = 30;
pub const DEFAULT_MINIMUM_COLLATERAL: i64 = 50_000;

/// Upper bound of [`TaskParams::threshold_score`].
pub const MAX_THRESHOLD_SCORE: i64 = 255;

/// A single parameter field that failed validation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ParamViolation {
    pub field: &'static str,
    pub reason: String,
}

impl ParamViolation {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Aggregation tuning applied to every task created while it is current.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskParams {
    /// Maximum task lifetime, in blocks.
    #[serde(rename = "task_expiration_duration")]
    pub expiration_duration: i64,
    /// Number of submissions that closes the collection window.
    #[serde(rename = "task_aggregation_window")]
    pub aggregation_window: i64,
    /// Output quantum; the aggregate is rounded to a multiple of it.
    #[serde(rename = "task_aggregation_result")]
    pub aggregation_result: i64,
    /// Score above which a validator's collateral is slashed.
    #[serde(rename = "task_threshold_score")]
    pub threshold_score: i64,
    /// Tight tolerance: deviations up to this carry no penalty.
    #[serde(rename = "task_epsilon1")]
    pub epsilon1: i64,
    /// Loose tolerance: deviations up to this carry a minor penalty.
    #[serde(rename = "task_epsilon2")]
    pub epsilon2: i64,
}

impl Default for TaskParams {
    fn default() -> Self {
        Self {
            expiration_duration: DEFAULT_EXPIRATION_DURATION,
            aggregation_window: DEFAULT_AGGREGATION_WINDOW,
            aggregation_result: DEFAULT_AGGREGATION_RESULT,
            threshold_score: DEFAULT_THRESHOLD_SCORE,
            epsilon1: DEFAULT_EPSILON1,
            epsilon2: DEFAULT_EPSILON2,
        }
    }
}

impl TaskParams {
    /// Check every field against its bound.
    ///
    /// # Errors
    ///
    /// Returns the first [`ParamViolation`] found.
    pub fn validate(&self) -> Result<(), ParamViolation> {
        if self.expiration_duration < 0 {
            return Err(ParamViolation::new(
                "expiration_duration",
                format!("must be >= 0, got {}", self.expiration_duration),
            ));
        }
        if self.aggregation_window < 0 {
            return Err(ParamViolation::new(
                "aggregation_window",
                format!("must be >= 0, got {}", self.aggregation_window),
            ));
        }
        if !(0..=MAX_THRESHOLD_SCORE).contains(&self.threshold_score) {
            return Err(ParamViolation::new(
                "threshold_score",
                format!(
                    "must be in [0, {MAX_THRESHOLD_SCORE}], got {}",
                    self.threshold_score
                ),
            ));
        }
        if self.epsilon1 < 0 {
            return Err(ParamViolation::new(
                "epsilon1",
                format!("must be >= 0, got {}", self.epsilon1),
            ));
        }
        if self.epsilon2 < 0 {
            return Err(ParamViolation::new(
                "epsilon2",
                format!("must be >= 0, got {}", self.epsilon2),
            ));
        }
        Ok(())
    }

    /// Window size as a count. Negative values (never accepted by
    /// [`validate`](Self::validate)) read as zero.
    pub fn window(&self) -> usize {
        usize::try_from(self.aggregation_window).unwrap_or(0)
    }

    /// Task lifetime in blocks.
    pub fn expiry_blocks(&self) -> u64 {
        u64::try_from(self.expiration_duration).unwrap_or(0)
    }

    /// Slashing threshold clamped into the score range.
    pub fn threshold(&self) -> u8 {
        u8::try_from(self.threshold_score.clamp(0, MAX_THRESHOLD_SCORE)).unwrap_or(u8::MAX)
    }
}

/// Collateral policy for the locked pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedPoolParams {
    /// Blocks collateral stays locked after an unlock request.
    pub locked_in_blocks: i64,
    /// Stake floor required to submit data.
    pub minimum_collateral: i64,
}

impl Default for LockedPoolParams {
    fn default() -> Self {
        Self {
            locked_in_blocks: DEFAULT_LOCKED_IN_BLOCKS,
            minimum_collateral: DEFAULT_MINIMUM_COLLATERAL,
        }
    }
}

impl LockedPoolParams {
    /// # Errors
    ///
    /// Returns a [`ParamViolation`] if either field is negative.
    pub fn validate(&self) -> Result<(), ParamViolation> {
        if self.locked_in_blocks < 0 {
            return Err(ParamViolation::new(
                "locked_in_blocks",
                format!("must be >= 0, got {}", self.locked_in_blocks),
            ));
        }
        if self.minimum_collateral < 0 {
            return Err(ParamViolation::new(
                "minimum_collateral",
                format!("must be >= 0, got {}", self.minimum_collateral),
            ));
        }
        Ok(())
    }

    pub fn lock_blocks(&self) -> u64 {
        u64::try_from(self.locked_in_blocks).unwrap_or(0)
    }

    pub fn minimum(&self) -> u64 {
        u64::try_from(self.minimum_collateral).unwrap_or(0)
    }
}

/// A parameter set together with the version it was committed at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub params: T,
}
