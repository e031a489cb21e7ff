//! Keyed persistence backend for parameter sets.

use std::collections::HashMap;

use crate::Result;

/// Raw keyed storage the [`ParameterStore`](crate::ParameterStore) writes
/// through to. Values are opaque bytes; the store owns the encoding.
pub trait ParamSubspace: Send {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the value stored under `key`.
    fn set(&mut self, key: &str, value: &[u8]) -> Result<()>;
}

/// Process-local backend, used by tests and by nodes without a database.
#[derive(Debug, Default, Clone)]
pub struct MemorySubspace {
    entries: HashMap<String, Vec<u8>>,
}

impl MemorySubspace {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ParamSubspace for MemorySubspace {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
