//! Signed request envelopes.
//!
//! The signature covers `SIGNING_CONTEXT || payload`, where `payload` is
//! the CBOR encoding of the request. The signer's ed25519 public key is the
//! validator identity.

use augur_types::request::Request;
use augur_types::ValidatorId;
use ed25519_dalek::{Signer, Verifier};
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use zeroize::Zeroizing;

use crate::{cbor, CodecError, Result};

/// Domain separation prefix for request signatures.
pub const SIGNING_CONTEXT: &[u8] = b"augur.request.v1";

/// A validator's ed25519 signing key.
pub struct SigningKey {
    inner: ed25519_dalek::SigningKey,
}

impl SigningKey {
    /// Generate a new random signing key.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            inner: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            inner: ed25519_dalek::SigningKey::from_bytes(bytes),
        }
    }

    /// Parse a hex-encoded 32-byte secret. Intermediate buffers are wiped.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidKey`] if the input is not 64 hex characters.
    pub fn from_hex(secret: &str) -> Result<Self> {
        let decoded = Zeroizing::new(
            hex::decode(secret.trim()).map_err(|e| CodecError::InvalidKey(e.to_string()))?,
        );
        let bytes: Zeroizing<[u8; 32]> = Zeroizing::new(
            decoded
                .as_slice()
                .try_into()
                .map_err(|_| CodecError::InvalidKey(format!("expected 32 bytes, got {}", decoded.len())))?,
        );
        Ok(Self::from_bytes(&bytes))
    }

    /// Hex encoding of the 32-byte secret, wiped on drop.
    pub fn to_hex(&self) -> Zeroizing<String> {
        let bytes = Zeroizing::new(self.inner.to_bytes());
        Zeroizing::new(hex::encode(bytes.as_slice()))
    }

    /// Identity of the validator holding this key.
    pub fn validator_id(&self) -> ValidatorId {
        ValidatorId(self.inner.verifying_key().to_bytes())
    }

    /// Encode and sign `request`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Serialization`] if the request cannot be encoded.
    pub fn sign(&self, request: &Request) -> Result<SignedRequest> {
        let payload = cbor::to_vec(request)?;
        let signature = self.inner.sign(&signing_message(&payload));
        Ok(SignedRequest {
            signer: self.validator_id(),
            payload,
            signature: signature.to_bytes(),
        })
    }
}

/// A CBOR-encoded request with its signer and signature.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRequest {
    pub signer: ValidatorId,
    #[serde_as(as = "Hex")]
    pub payload: Vec<u8>,
    #[serde_as(as = "Hex")]
    pub signature: [u8; 64],
}

impl SignedRequest {
    /// Verify the signature and decode the request.
    ///
    /// # Errors
    ///
    /// - [`CodecError::InvalidKey`] if the signer is not a valid ed25519 point
    /// - [`CodecError::SignatureVerification`] if the signature does not match
    /// - [`CodecError::Deserialization`] if the payload is not a known request
    pub fn open(&self) -> Result<(ValidatorId, Request)> {
        let key = ed25519_dalek::VerifyingKey::from_bytes(self.signer.as_bytes())
            .map_err(|e| CodecError::InvalidKey(e.to_string()))?;
        let signature = ed25519_dalek::Signature::from_bytes(&self.signature);
        key.verify(&signing_message(&self.payload), &signature)
            .map_err(|_| CodecError::SignatureVerification)?;

        let request: Request = cbor::from_slice_named(&self.payload, "Request")?;
        tracing::trace!(signer = %self.signer, request = request.type_name(), "request verified");
        Ok((self.signer, request))
    }

    /// CBOR encoding of the whole envelope.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Serialization`] on encoder failure.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        cbor::to_vec(self)
    }

    /// # Errors
    ///
    /// Returns [`CodecError::Deserialization`] if `data` is not an envelope.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        cbor::from_slice_named(data, "SignedRequest")
    }
}

fn signing_message(payload: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(SIGNING_CONTEXT.len() + payload.len());
    message.extend_from_slice(SIGNING_CONTEXT);
    message.extend_from_slice(payload);
    message
}
