//! Collateral pool state machine.
//!
//! ```text
//! lock ──▶ Active ──request_unlock──▶ PendingUnlock ──withdraw──▶ Withdrawn
//!            ▲                             │                          │
//!            └──────────── lock ───────────┴────────── lock ──────────┘
//! ```
//!
//! Slashing reduces the locked amount in place in `Active` and
//! `PendingUnlock`, saturating at zero.

use std::collections::BTreeMap;

use augur_types::collateral::{CollateralStatus, ValidatorCollateralRecord};
use augur_types::params::LockedPoolParams;
use augur_types::{Height, ValidatorId};
use serde::{Deserialize, Serialize};

use crate::{CollateralError, Result};

/// Locked stake for every validator that has ever locked.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CollateralPool {
    records: BTreeMap<ValidatorId, ValidatorCollateralRecord>,
    /// Pool-wide total removed by slashing.
    total_slashed: u64,
}

impl CollateralPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock `amount` more collateral for `validator`.
    ///
    /// A withdrawn record starts again from zero. The record becomes
    /// `Active` and any pending unlock is cancelled.
    ///
    /// # Errors
    ///
    /// - [`CollateralError::ZeroAmount`] if `amount` is zero
    /// - [`CollateralError::InsufficientCollateral`] if the resulting total is below the minimum
    /// - [`CollateralError::Overflow`] if the total overflows
    pub fn lock(
        &mut self,
        validator: ValidatorId,
        amount: u64,
        params: &LockedPoolParams,
    ) -> Result<u64> {
        if amount == 0 {
            return Err(CollateralError::ZeroAmount);
        }

        let current = match self.records.get(&validator) {
            Some(record) if record.status != CollateralStatus::Withdrawn => record.locked_amount,
            _ => 0,
        };
        let resulting = current
            .checked_add(amount)
            .ok_or(CollateralError::Overflow)?;
        let required = params.minimum();
        if resulting < required {
            return Err(CollateralError::InsufficientCollateral {
                required,
                resulting,
            });
        }

        let record = self
            .records
            .entry(validator)
            .or_insert_with(|| ValidatorCollateralRecord::new(validator));
        record.locked_amount = resulting;
        record.status = CollateralStatus::Active;
        record.lock_expiry_height = None;

        tracing::info!(validator = %validator, amount, total = resulting, "collateral locked");
        Ok(resulting)
    }

    /// Begin the exit of an active validator.
    ///
    /// Returns the height from which [`withdraw`](Self::withdraw) succeeds.
    ///
    /// # Errors
    ///
    /// - [`CollateralError::NotActive`] if the record is absent or not `Active`
    pub fn request_unlock(
        &mut self,
        validator: ValidatorId,
        current_height: Height,
        params: &LockedPoolParams,
    ) -> Result<Height> {
        let record = self
            .records
            .get_mut(&validator)
            .filter(|r| r.status == CollateralStatus::Active)
            .ok_or(CollateralError::NotActive(validator))?;

        let unlocks_at = current_height.saturating_add(params.lock_blocks());
        record.status = CollateralStatus::PendingUnlock;
        record.lock_expiry_height = Some(unlocks_at);

        tracing::info!(validator = %validator, unlocks_at, "collateral unlock requested");
        Ok(unlocks_at)
    }

    /// Return the remaining collateral once the lock window has elapsed.
    ///
    /// # Errors
    ///
    /// - [`CollateralError::UnknownValidator`] if no record exists
    /// - [`CollateralError::NotUnlocking`] if the record is not `PendingUnlock`
    /// - [`CollateralError::StillLocked`] if `current_height` is before the lock expiry
    pub fn withdraw(&mut self, validator: ValidatorId, current_height: Height) -> Result<u64> {
        let record = self
            .records
            .get_mut(&validator)
            .ok_or(CollateralError::UnknownValidator(validator))?;
        if record.status != CollateralStatus::PendingUnlock {
            return Err(CollateralError::NotUnlocking(validator));
        }
        let unlocks_at = record.lock_expiry_height.unwrap_or(0);
        if current_height < unlocks_at {
            return Err(CollateralError::StillLocked {
                current: current_height,
                unlocks_at,
            });
        }

        let amount = std::mem::take(&mut record.locked_amount);
        record.status = CollateralStatus::Withdrawn;
        record.lock_expiry_height = None;

        tracing::info!(validator = %validator, amount, "collateral withdrawn");
        Ok(amount)
    }

    /// Remove up to `amount` from the validator's locked collateral.
    ///
    /// Returns the amount actually slashed, which is zero when there is
    /// nothing left to take (absent, withdrawn or empty records).
    pub fn slash(&mut self, validator: ValidatorId, amount: u64) -> u64 {
        let Some(record) = self
            .records
            .get_mut(&validator)
            .filter(|r| r.status != CollateralStatus::Withdrawn)
        else {
            tracing::debug!(validator = %validator, "slash skipped: no locked collateral");
            return 0;
        };

        let slashed = amount.min(record.locked_amount);
        record.locked_amount -= slashed;
        record.total_slashed = record.total_slashed.saturating_add(slashed);
        self.total_slashed = self.total_slashed.saturating_add(slashed);

        if slashed > 0 {
            tracing::warn!(
                validator = %validator,
                requested = amount,
                slashed,
                remaining = record.locked_amount,
                "collateral slashed"
            );
        }
        slashed
    }

    /// Whether `validator` may submit data: `Active` with at least the
    /// minimum collateral still locked.
    pub fn is_eligible(&self, validator: &ValidatorId, params: &LockedPoolParams) -> bool {
        self.records.get(validator).is_some_and(|r| {
            r.status == CollateralStatus::Active && r.locked_amount >= params.minimum()
        })
    }

    pub fn record(&self, validator: &ValidatorId) -> Option<&ValidatorCollateralRecord> {
        self.records.get(validator)
    }

    pub fn records(&self) -> impl Iterator<Item = &ValidatorCollateralRecord> {
        self.records.values()
    }

    pub fn total_slashed(&self) -> u64 {
        self.total_slashed
    }
}
