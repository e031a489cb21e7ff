//! # augur-codec
//!
//! Wire encoding for engine requests.
//!
//! Requests travel as CBOR inside an ed25519-signed envelope. Decoding an
//! envelope verifies the signature and yields the signer's
//! [`ValidatorId`](augur_types::ValidatorId) together with the typed
//! [`Request`](augur_types::request::Request); nothing else reaches the engine.
//!
//! ## Modules
//!
//! - [`cbor`] — CBOR serialization helpers
//! - [`signed`] — signing keys and [`SignedRequest`] envelopes

pub mod cbor;
pub mod signed;

pub use signed::{SignedRequest, SigningKey};

/// Error types for codec operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A value could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Bytes could not be decoded into the expected type.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Key material is malformed.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The envelope signature does not verify against its signer.
    #[error("signature verification failed")]
    SignatureVerification,
}

/// Convenience result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
