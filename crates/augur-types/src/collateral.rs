//! Validator collateral records.

use serde::{Deserialize, Serialize};

use crate::{Height, ValidatorId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollateralStatus {
    /// Stake locked and eligible to submit.
    Active,
    /// Exit requested; stake stays locked (and slashable) until expiry.
    PendingUnlock,
    /// Funds returned.
    Withdrawn,
}

/// Locked stake held for one validator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorCollateralRecord {
    pub validator: ValidatorId,
    pub locked_amount: u64,
    /// Set while the record is `PendingUnlock`.
    pub lock_expiry_height: Option<Height>,
    pub status: CollateralStatus,
    /// Lifetime total removed by slashing.
    pub total_slashed: u64,
}

impl ValidatorCollateralRecord {
    pub fn new(validator: ValidatorId) -> Self {
        Self {
            validator,
            locked_amount: 0,
            lock_expiry_height: None,
            status: CollateralStatus::Active,
            total_slashed: 0,
        }
    }
}
