//! Reliability scoring.
//!
//! Each validator carries a score in `[0, 255]`. Every aggregated
//! submission moves the score by the delta its [`DeviationTier`] maps to in
//! the [`ScorePolicy`] table, clamped to the range:
//!
//! ```text
//! score' = clamp(score + delta(tier), 0, 255)
//! ```
//!
//! Repeated loose deviations compound toward the task's threshold; a large
//! enough outlier delta crosses it in one step. When the engine slashes a
//! validator it resets the score to [`ScorePolicy::reset_score`], never
//! above the threshold that was crossed.

use std::collections::BTreeMap;

use augur_types::task::DeviationTier;
use augur_types::{ValidatorId, MAX_SCORE};
use serde::{Deserialize, Serialize};

use crate::{AggregateError, Result};

/// Basis points in one whole.
pub const BPS_DENOMINATOR: u64 = 10_000;

pub const DEFAULT_TIGHT_DELTA: i16 = -2;
pub const DEFAULT_LOOSE_DELTA: i16 = 16;
pub const DEFAULT_OUTLIER_DELTA: i16 = 64;
pub const DEFAULT_SLASH_BPS: u16 = 1_000;

/// Tunable mapping from deviation tiers to score movements, plus the
/// slashing curve applied once a score crosses the threshold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorePolicy {
    /// Delta for a submission within `epsilon1`. Never positive.
    pub tight: i16,
    /// Delta for a submission within `epsilon2`.
    pub loose: i16,
    /// Delta for a submission beyond `epsilon2`.
    pub outlier: i16,
    /// Share of the locked collateral slashed, in basis points.
    pub slash_bps: u16,
    /// Score a validator is reset to after being slashed, capped at the
    /// task's threshold.
    pub post_slash_score: u8,
}

impl Default for ScorePolicy {
    fn default() -> Self {
        Self {
            tight: DEFAULT_TIGHT_DELTA,
            loose: DEFAULT_LOOSE_DELTA,
            outlier: DEFAULT_OUTLIER_DELTA,
            slash_bps: DEFAULT_SLASH_BPS,
            post_slash_score: 0,
        }
    }
}

impl ScorePolicy {
    /// # Errors
    ///
    /// - [`AggregateError::InvalidPolicy`] if `tight` is positive or
    ///   `slash_bps` exceeds 10 000
    pub fn validate(&self) -> Result<()> {
        if self.tight > 0 {
            return Err(AggregateError::InvalidPolicy(format!(
                "tight delta must be <= 0, got {}",
                self.tight
            )));
        }
        if u64::from(self.slash_bps) > BPS_DENOMINATOR {
            return Err(AggregateError::InvalidPolicy(format!(
                "slash_bps must be <= {BPS_DENOMINATOR}, got {}",
                self.slash_bps
            )));
        }
        Ok(())
    }

    pub fn delta(&self, tier: DeviationTier) -> i16 {
        match tier {
            DeviationTier::Tight => self.tight,
            DeviationTier::Loose => self.loose,
            DeviationTier::Outlier => self.outlier,
        }
    }

    /// Score after a slash under `threshold`.
    ///
    /// A reset above the threshold would slash a validator again on its next
    /// tight submission.
    pub fn reset_score(&self, threshold: u8) -> u8 {
        self.post_slash_score.min(threshold)
    }

    /// Amount to slash from `locked` collateral.
    ///
    /// At least one unit is taken whenever slashing is enabled and there is
    /// collateral left.
    pub fn slash_amount(&self, locked: u64) -> u64 {
        if self.slash_bps == 0 || locked == 0 {
            return 0;
        }
        let share = u128::from(locked) * u128::from(self.slash_bps) / u128::from(BPS_DENOMINATOR);
        u64::try_from(share).unwrap_or(locked).max(1)
    }
}

/// Running reliability score per validator.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScoringLedger {
    scores: BTreeMap<ValidatorId, u8>,
}

impl ScoringLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one deviation into the validator's score and return the result.
    pub fn apply_deviation(
        &mut self,
        validator: ValidatorId,
        tier: DeviationTier,
        policy: &ScorePolicy,
    ) -> u8 {
        let entry = self.scores.entry(validator).or_insert(0);
        let next = (i32::from(*entry) + i32::from(policy.delta(tier))).clamp(0, i32::from(MAX_SCORE));
        // Clamped into u8 range above.
        *entry = u8::try_from(next).unwrap_or(MAX_SCORE);

        tracing::debug!(validator = %validator, ?tier, score = *entry, "reliability score updated");
        *entry
    }

    /// Current score; validators never seen score zero.
    pub fn score(&self, validator: &ValidatorId) -> u8 {
        self.scores.get(validator).copied().unwrap_or(0)
    }

    pub fn reset(&mut self, validator: ValidatorId, score: u8) {
        self.scores.insert(validator, score);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ValidatorId, &u8)> {
        self.scores.iter()
    }
}
