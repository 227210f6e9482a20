//! core::config
//!
//! Configuration schema and loading.
//!
//! # Locations
//!
//! Searched in order, first match wins:
//! 1. An explicit path (the `--config` flag)
//! 2. `$OAC_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/oac/config.toml`
//! 4. `~/.oac/config.toml`
//!
//! Missing files are not an error; defaults are used.
//!
//! # Example
//!
//! ```no_run
//! use oauth_agent_client::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! println!("API: {}", config.api_base_url());
//! println!("Mode: {}", config.mode());
//! ```

pub mod schema;

pub use schema::{AppSection, BridgeSection, ConfigFile, HostMode, OAuthSection, StorageSection};

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default business API base URL.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/investments";

/// Default OAuth agent base URL.
pub const DEFAULT_OAUTH_AGENT_BASE_URL: &str = "http://localhost:3000/oauth-agent";

/// Default value of the client identifier header.
pub const DEFAULT_CLIENT_NAME: &str = "FinalSPA";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Loaded configuration with defaults applied through accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents
    pub file: ConfigFile,
    /// Path the file was loaded from, if any
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `explicit` or the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed
    /// or validated, or if `explicit` does not exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::discover(),
        };

        let config = match path {
            Some(path) => Config {
                file: Self::read_file(&path)?,
                path: Some(path),
            },
            None => Config::default(),
        };

        config.file.validate()?;
        tracing::debug!(path = ?config.path, mode = %config.mode(), "configuration loaded");
        Ok(config)
    }

    /// Build a config from already-parsed contents.
    pub fn from_file(file: ConfigFile) -> Result<Self, ConfigError> {
        file.validate()?;
        Ok(Config { file, path: None })
    }

    fn discover() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("OAC_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("oac/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".oac/config.toml"))
            .filter(|path| path.exists())
    }

    fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Host environment. Defaults to [`HostMode::Agent`].
    pub fn mode(&self) -> HostMode {
        self.file.mode.unwrap_or_default()
    }

    /// Business API base URL, always ending in `/`.
    pub fn api_base_url(&self) -> String {
        let url = self
            .file
            .app
            .as_ref()
            .and_then(|a| a.api_base_url.as_deref())
            .unwrap_or(DEFAULT_API_BASE_URL);
        with_trailing_slash(url)
    }

    /// OAuth agent base URL, without a trailing `/`.
    pub fn oauth_agent_base_url(&self) -> String {
        self.file
            .app
            .as_ref()
            .and_then(|a| a.oauth_agent_base_url.as_deref())
            .unwrap_or(DEFAULT_OAUTH_AGENT_BASE_URL)
            .trim_end_matches('/')
            .to_string()
    }

    /// Client identifier header value.
    pub fn client_name(&self) -> &str {
        self.file
            .app
            .as_ref()
            .and_then(|a| a.client_name.as_deref())
            .unwrap_or(DEFAULT_CLIENT_NAME)
    }

    /// Bridge program and its leading arguments, if configured.
    pub fn bridge_command(&self) -> Option<(&str, &[String])> {
        let bridge = self.file.bridge.as_ref()?;
        let command = bridge.command.as_deref()?;
        Some((command, bridge.args.as_slice()))
    }

    /// OIDC settings, if configured.
    pub fn oauth(&self) -> Option<&OAuthSection> {
        self.file.oauth.as_ref()
    }

    /// Storage provider name. Defaults to "file".
    pub fn storage_provider(&self) -> &str {
        self.file
            .storage
            .as_ref()
            .and_then(|s| s.provider.as_deref())
            .unwrap_or("file")
    }

    /// Storage file location, if overridden.
    pub fn storage_path(&self) -> Option<&Path> {
        self.file.storage.as_ref().and_then(|s| s.path.as_deref())
    }

    /// Path the configuration was loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}
