//! CBOR serialization helpers.
//!
//! Thin wrappers over [`ciborium`] that map failures into [`CodecError`].

use serde::{de::DeserializeOwned, Serialize};

use crate::{CodecError, Result};

/// Serialize a value to CBOR bytes.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the value cannot be serialized.
pub fn to_vec<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| CodecError::Serialization(format!("CBOR serialization failed: {e}")))?;
    Ok(buf)
}

/// Deserialize a value from CBOR bytes.
///
/// # Errors
///
/// Returns [`CodecError::Deserialization`] if the bytes do not decode into `T`.
pub fn from_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    ciborium::from_reader(data)
        .map_err(|e| CodecError::Deserialization(format!("CBOR deserialization failed: {e}")))
}

/// Deserialize with the expected type name in the error message.
///
/// # Errors
///
/// Returns [`CodecError::Deserialization`] if the bytes do not decode into `T`.
pub fn from_slice_named<T: DeserializeOwned>(data: &[u8], type_name: &str) -> Result<T> {
    ciborium::from_reader(data).map_err(|e| {
        CodecError::Deserialization(format!("CBOR deserialization of {type_name} failed: {e}"))
    })
}
