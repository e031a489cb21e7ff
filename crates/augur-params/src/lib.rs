//! # augur-params
//!
//! Versioned, validated storage for the two global parameter sets.
//!
//! ## Modules
//!
//! - [`store`] — [`ParameterStore`]: typed get/set with validation and versioning
//! - [`subspace`] — [`ParamSubspace`] backend trait and an in-memory backend

pub mod store;
pub mod subspace;

pub use store::ParameterStore;
pub use subspace::{MemorySubspace, ParamSubspace};

/// Error types for parameter operations.
#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    /// A candidate (or stored) parameter set violates an invariant.
    #[error("invalid {key} parameter {field}: {reason}")]
    InvalidParams {
        /// Storage key of the rejected set.
        key: &'static str,
        /// Offending field.
        field: &'static str,
        /// Human-readable bound that was violated.
        reason: String,
    },

    /// The persistence backend failed; the committed value is unchanged.
    #[error("parameter backend error: {0}")]
    Backend(String),

    /// A stored value could not be encoded or decoded.
    #[error("parameter serialization error: {0}")]
    Serialization(String),
}

/// Convenience result type for parameter operations.
pub type Result<T> = std::result::Result<T, ParamsError>;
