//! storage::memory_store
//!
//! In-memory storage, lost when the process exits.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::traits::{KeyValueStore, StorageError};

/// In-memory key/value store.
///
/// Used for one-shot CLI runs where nothing should outlive the process,
/// and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        data.remove(key);
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<String> = data
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}
