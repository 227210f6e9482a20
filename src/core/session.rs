//! core::session
//!
//! The per-load session identifier sent with every outbound request so
//! that API and agent logs can be correlated with one application load.

use std::fmt;

use uuid::Uuid;

use crate::storage::{AppStorage, StorageError};

/// An opaque identifier for one application load.
///
/// Created once at startup and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh session id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Reuse the session id kept in storage, or generate and store one.
    ///
    /// A browser tab keeps its session id across page reloads; the
    /// interactive CLI session does the same through its storage.
    pub fn load_or_create(storage: &AppStorage) -> Result<Self, StorageError> {
        if let Some(existing) = storage.session_id()? {
            if !existing.is_empty() {
                return Ok(Self(existing));
            }
        }

        let created = Self::generate();
        storage.set_session_id(created.as_str())?;
        Ok(created)
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A fresh correlation id for a single request.
pub fn correlation_id() -> String {
    Uuid::new_v4().to_string()
}
