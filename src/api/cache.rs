//! api::cache
//!
//! Cache of API results by request name.
//!
//! Views ask for the same data repeatedly: on back navigation, on re-entry,
//! and when several views render at once. Results are kept until a reload
//! is forced or the session changes.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde_json::Value;

/// In-memory cache of successful API responses.
#[derive(Debug, Default)]
pub struct FetchCache {
    items: Mutex<HashMap<String, Value>>,
}

impl FetchCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cached result, if present.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.lock().get(name).cloned()
    }

    /// Store a result under `name`.
    pub fn set(&self, name: &str, value: Value) {
        self.lock().insert(name.to_string(), value);
    }

    /// Drop one result.
    pub fn remove(&self, name: &str) {
        self.lock().remove(name);
    }

    /// Drop everything, e.g. after login or logout.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of cached results.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
