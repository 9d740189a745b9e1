//! In-memory key-value store
//!
//! Lives as long as the process. Backs session-scoped state and tests.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{KeyValueStore, StorageError, StorageResult};

/// Process-scoped [`KeyValueStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored
    pub fn len(&self) -> usize {
        self.values.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let values = self
            .values
            .read()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut values = self
            .values
            .write()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
