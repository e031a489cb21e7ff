//! Validator and task identities.
//!
//! Both are 32-byte values rendered as lowercase hex. A validator identity
//! is the ed25519 public key the validator signs requests with; a task
//! identity is derived with BLAKE3 from the creator, the creation height and
//! the engine's task sequence number.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

use crate::Height;

/// Domain separation prefix for task id derivation.
const TASK_ID_CONTEXT: &[u8] = b"augur.task-id.v1";

/// Error returned when parsing a hex identity fails.
#[derive(Debug, thiserror::Error)]
pub enum IdParseError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("expected 32 bytes, got {0}")]
    Length(usize),
}

/// Identity of a data-reporting validator.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidatorId(#[serde_as(as = "Hex")] pub [u8; 32]);

/// Identity of an oracle task.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(#[serde_as(as = "Hex")] pub [u8; 32]);

impl ValidatorId {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl TaskId {
    /// Derive a task id from its creator, creation height and sequence number.
    ///
    /// The sequence number keeps ids unique when one creator opens several
    /// tasks at the same height.
    pub fn derive(creator: &ValidatorId, created_at: Height, sequence: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(TASK_ID_CONTEXT);
        hasher.update(creator.as_bytes());
        hasher.update(&created_at.to_le_bytes());
        hasher.update(&sequence.to_le_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

fn parse_32(s: &str) -> Result<[u8; 32], IdParseError> {
    let bytes = hex::decode(s)?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| IdParseError::Length(len))
}

impl FromStr for ValidatorId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_32(s).map(Self)
    }
}

impl FromStr for TaskId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_32(s).map(Self)
    }
}

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidatorId({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({})", hex::encode(&self.0[..8]))
    }
}
