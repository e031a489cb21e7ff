//! # augur-types
//!
//! Shared domain types used across the Augur workspace: identities,
//! parameter sets, tasks and submissions, collateral records, and the
//! closed set of requests the engine accepts.

pub mod collateral;
pub mod ids;
pub mod params;
pub mod request;
pub mod task;

pub use ids::{TaskId, ValidatorId};

/// Ledger height supplied by the substrate on every call.
pub type Height = u64;

/// Highest reliability score a validator can accumulate.
pub const MAX_SCORE: u8 = u8::MAX;
