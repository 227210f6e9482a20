//! storage::traits
//!
//! The store behind [`AppStorage`](super::AppStorage). In a browser this
//! would be session storage; here it is a TOML file or a map.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unknown storage provider '{name}', must be one of: {valid}")]
    UnknownProvider { name: String, valid: String },

    #[error("no home directory to keep the storage file in")]
    NoHomeDirectory,

    #[error("storage file {} is not valid TOML: {message}", .path.display())]
    Corrupt { path: PathBuf, message: String },

    #[error("cannot {action} storage file {}: {message}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        message: String,
    },
}

/// String key/value store shared by every authenticator.
///
/// Keys look like `oac.preLoginLocation`; flags are stored as `"true"` and
/// removed when cleared.
///
/// ```
/// use oauth_agent_client::storage::{KeyValueStore, MemoryStore};
///
/// let store = MemoryStore::new();
/// store.set("oac.oidc.request.a", "{}").unwrap();
/// store.set("oac.loggedOut", "true").unwrap();
/// assert_eq!(store.keys("oac.oidc.request.").unwrap(), vec!["oac.oidc.request.a"]);
/// ```
pub trait KeyValueStore: Send + Sync {
    /// Value for `key`, or `None`.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Missing keys are not an error.
    fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Every key starting with `prefix`, sorted.
    fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(key)?.is_some())
    }
}
