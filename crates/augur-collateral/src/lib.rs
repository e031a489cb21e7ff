//! # augur-collateral
//!
//! Locked-collateral pool gating oracle participation.
//!
//! A validator locks at least the minimum collateral to become eligible,
//! requests an unlock to exit, and withdraws once the lock window has passed.
//! Collateral stays slashable until it is withdrawn.
//!
//! ## Modules
//!
//! - [`pool`] — [`CollateralPool`] and its lifecycle operations

pub mod pool;

pub use pool::CollateralPool;

use augur_types::{Height, ValidatorId};

/// Error types for collateral operations.
#[derive(Debug, thiserror::Error)]
pub enum CollateralError {
    /// The resulting locked total would be below the pool minimum.
    #[error("insufficient collateral: need {required}, would have {resulting}")]
    InsufficientCollateral {
        /// Pool minimum.
        required: u64,
        /// Total the lock would have produced.
        resulting: u64,
    },

    /// No active record exists for the validator.
    #[error("collateral not active for {0}")]
    NotActive(ValidatorId),

    /// The lock window has not elapsed yet.
    #[error("collateral still locked: current height {current}, unlocks at {unlocks_at}")]
    StillLocked {
        /// Height of the withdraw attempt.
        current: Height,
        /// First height at which withdrawal succeeds.
        unlocks_at: Height,
    },

    /// Withdrawal requested without a pending unlock.
    #[error("no pending unlock for {0}")]
    NotUnlocking(ValidatorId),

    /// The validator has never locked collateral.
    #[error("unknown validator: {0}")]
    UnknownValidator(ValidatorId),

    /// Lock amount is zero.
    #[error("amount must be non-zero")]
    ZeroAmount,

    /// Arithmetic overflow in a collateral total.
    #[error("collateral arithmetic overflow")]
    Overflow,
}

/// Convenience result type for collateral operations.
pub type Result<T> = std::result::Result<T, CollateralError>;
