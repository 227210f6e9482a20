//! storage
//!
//! Persistence for state that must survive a full-page navigation.
//!
//! # Architecture
//!
//! Values go through the [`KeyValueStore`] trait, which has two
//! implementations:
//!
//! - [`FileStore`]: Stores in `~/.oac/storage.toml` (default)
//! - [`MemoryStore`]: Process-local, used for one-shot runs and tests
//!
//! [`AppStorage`] wraps a store with the typed entries the authenticators
//! need: the pre-login location, the logged-out flag, the OIDC
//! "can silently renew" flag and pending OIDC login requests.

mod file_store;
mod memory_store;
mod traits;

pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use traits::{KeyValueStore, StorageError};

use std::path::PathBuf;
use std::sync::Arc;

/// Key prefix for every entry written by this crate.
const KEY_PREFIX: &str = "oac";

const PRE_LOGIN_LOCATION: &str = "preLoginLocation";
const LOGGED_OUT: &str = "loggedOut";
const CAN_SILENTLY_RENEW: &str = "canSilentlyRenew";
const SESSION_ID: &str = "sessionId";
const OIDC_REQUEST: &str = "oidc.request";

/// Create a store for the given provider.
///
/// # Providers
///
/// - `"file"`: [`FileStore`], at `path` if given, else `~/.oac/storage.toml`
/// - `"memory"`: [`MemoryStore`]
///
/// # Errors
///
/// Returns an error for an unknown provider name or if the home directory
/// cannot be determined.
pub fn create_store(
    provider: &str,
    path: Option<PathBuf>,
) -> Result<Arc<dyn KeyValueStore>, StorageError> {
    match provider {
        "file" => match path {
            Some(path) => Ok(Arc::new(FileStore::with_path(path))),
            None => Ok(Arc::new(FileStore::new()?)),
        },
        "memory" => Ok(Arc::new(MemoryStore::new())),
        other => Err(StorageError::UnknownProvider {
            name: other.to_string(),
            valid: valid_provider_names().join(", "),
        }),
    }
}

/// Storage provider names accepted by [`create_store`].
pub fn valid_provider_names() -> &'static [&'static str] {
    &["file", "memory"]
}

/// Typed accessors over a [`KeyValueStore`].
#[derive(Clone)]
pub struct AppStorage {
    store: Arc<dyn KeyValueStore>,
}

impl AppStorage {
    /// Wrap a store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Convenience constructor over a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    fn key(name: &str) -> String {
        format!("{}.{}", KEY_PREFIX, name)
    }

    /// Remember the app location to return to after login.
    pub fn set_pre_login_location(&self, location: &str) -> Result<(), StorageError> {
        self.store.set(&Self::key(PRE_LOGIN_LOCATION), location)
    }

    /// Read and remove the pre-login location.
    pub fn take_pre_login_location(&self) -> Result<Option<String>, StorageError> {
        let key = Self::key(PRE_LOGIN_LOCATION);
        let location = self.store.get(&key)?;
        if location.is_some() {
            self.store.delete(&key)?;
        }
        Ok(location)
    }

    /// Whether the user explicitly logged out.
    pub fn logged_out(&self) -> Result<bool, StorageError> {
        self.flag(LOGGED_OUT)
    }

    /// Set or clear the logged-out flag.
    pub fn set_logged_out(&self, value: bool) -> Result<(), StorageError> {
        self.set_flag(LOGGED_OUT, value)
    }

    /// Whether the OIDC client may try a silent renew.
    pub fn can_silently_renew(&self) -> Result<bool, StorageError> {
        self.flag(CAN_SILENTLY_RENEW)
    }

    /// Set or clear the silent renew flag.
    pub fn set_can_silently_renew(&self, value: bool) -> Result<(), StorageError> {
        self.set_flag(CAN_SILENTLY_RENEW, value)
    }

    /// Previously stored session id, if any.
    pub fn session_id(&self) -> Result<Option<String>, StorageError> {
        self.store.get(&Self::key(SESSION_ID))
    }

    /// Store the session id.
    pub fn set_session_id(&self, value: &str) -> Result<(), StorageError> {
        self.store.set(&Self::key(SESSION_ID), value)
    }

    /// Save an in-flight OIDC authorization request under its `state`.
    pub fn set_oidc_request(&self, state: &str, request: &str) -> Result<(), StorageError> {
        self.store
            .set(&Self::key(&format!("{}.{}", OIDC_REQUEST, state)), request)
    }

    /// The in-flight OIDC authorization request for `state`, if any.
    pub fn oidc_request(&self, state: &str) -> Result<Option<String>, StorageError> {
        self.store
            .get(&Self::key(&format!("{}.{}", OIDC_REQUEST, state)))
    }

    /// States of every saved OIDC authorization request.
    pub fn oidc_request_states(&self) -> Result<Vec<String>, StorageError> {
        let prefix = Self::key(&format!("{}.", OIDC_REQUEST));
        Ok(self
            .store
            .keys(&prefix)?
            .into_iter()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }

    /// Forget the OIDC authorization request for `state`.
    pub fn remove_oidc_request(&self, state: &str) -> Result<(), StorageError> {
        self.store
            .delete(&Self::key(&format!("{}.{}", OIDC_REQUEST, state)))
    }

    fn flag(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.store.get(&Self::key(name))?.as_deref() == Some("true"))
    }

    // A cleared flag is removed rather than stored as "false".
    fn set_flag(&self, name: &str, value: bool) -> Result<(), StorageError> {
        let key = Self::key(name);
        if value {
            self.store.set(&key, "true")
        } else {
            self.store.delete(&key)
        }
    }
}

impl std::fmt::Debug for AppStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppStorage").finish_non_exhaustive()
    }
}
