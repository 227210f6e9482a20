//! storage::file_store
//!
//! Storage that survives between `oac` runs, so a login started by one
//! process can be completed by the next.
//!
//! The whole map lives in one TOML file (`~/.oac/storage.toml` by default),
//! readable only by its owner on Unix. Each change rewrites the file through
//! a temp file and a rename, under a lock so writers in one process do not
//! lose each other's updates.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use super::traits::{KeyValueStore, StorageError};

type Entries = BTreeMap<String, String>;

/// TOML file store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Store at `~/.oac/storage.toml`.
    pub fn new() -> Result<Self, StorageError> {
        let home = dirs::home_dir().ok_or(StorageError::NoHomeDirectory)?;
        Ok(Self::with_path(home.join(".oac").join("storage.toml")))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, action: &'static str, err: std::io::Error) -> StorageError {
        StorageError::Io {
            action,
            path: self.path.clone(),
            message: err.to_string(),
        }
    }

    fn load(&self) -> Result<Entries, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(self.io_error("read", e)),
        };

        toml::from_str(&content).map_err(|e| StorageError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    fn save(&self, entries: &Entries) -> Result<(), StorageError> {
        let content = toml::to_string(entries).map_err(|e| StorageError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| self.io_error("create directory for", e))?;
        }

        let staged = self.path.with_extension("tmp");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&staged)
            .map_err(|e| self.io_error("stage", e))?;

        #[cfg(unix)]
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| self.io_error("restrict", e))?;

        file.write_all(content.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| self.io_error("write", e))?;
        drop(file);

        fs::rename(&staged, &self.path).map_err(|e| self.io_error("replace", e))
    }

    /// Load, apply `change`, and save when it reports a modification.
    fn update(&self, change: impl FnOnce(&mut Entries) -> bool) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load()?;
        if change(&mut entries) {
            self.save(&entries)?;
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.update(|entries| entries.remove(key).is_some())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .load()?
            .into_keys()
            .filter(|key| key.starts_with(prefix))
            .collect())
    }
}
