//! # augur-aggregate
//!
//! Aggregation of validator submissions and the reliability scores derived
//! from them.
//!
//! ## Modules
//!
//! - [`aggregate`] — median aggregation with two-tier epsilon tolerance
//! - [`scoring`] — bounded per-validator score accumulator and slashing policy

pub mod aggregate;
pub mod scoring;

pub use aggregate::aggregate;
pub use scoring::{ScorePolicy, ScoringLedger};

/// Error types for aggregation and scoring configuration.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// A score policy field is out of range.
    #[error("invalid score policy: {0}")]
    InvalidPolicy(String),
}

/// Convenience result type for aggregation operations.
pub type Result<T> = std::result::Result<T, AggregateError>;
