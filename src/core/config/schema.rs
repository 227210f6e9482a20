//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Example
//!
//! ```toml
//! mode = "agent"
//!
//! [app]
//! api_base_url = "https://api.example.com/investments"
//! oauth_agent_base_url = "https://bff.example.com/oauth-agent"
//! client_name = "FinalSPA"
//!
//! [storage]
//! provider = "file"
//! ```
//!
//! # Validation
//!
//! Values are validated after parsing: URLs must parse, and the section the
//! selected mode depends on must be present.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use super::ConfigError;

/// Which host environment the app runs in, and so which authenticator
/// variant is created at startup.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HostMode {
    /// Cookie-session web app calling an OAuth agent.
    #[default]
    Agent,
    /// Embedded in a native host that owns the tokens.
    Bridge,
    /// Redirect-based OIDC client.
    Oidc,
}

impl HostMode {
    /// All mode names, for help and error messages.
    pub fn names() -> &'static [&'static str] {
        &["agent", "bridge", "oidc"]
    }
}

impl fmt::Display for HostMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HostMode::Agent => "agent",
            HostMode::Bridge => "bridge",
            HostMode::Oidc => "oidc",
        };
        f.write_str(name)
    }
}

impl FromStr for HostMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agent" => Ok(HostMode::Agent),
            "bridge" => Ok(HostMode::Bridge),
            "oidc" => Ok(HostMode::Oidc),
            other => Err(ConfigError::InvalidValue(format!(
                "invalid mode '{}', must be one of: {}",
                other,
                HostMode::names().join(", ")
            ))),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Host environment
    pub mode: Option<HostMode>,

    /// API and OAuth agent locations
    pub app: Option<AppSection>,

    /// Native host bridge settings
    pub bridge: Option<BridgeSection>,

    /// OIDC client settings
    pub oauth: Option<OAuthSection>,

    /// Browser storage settings
    pub storage: Option<StorageSection>,
}

impl ConfigFile {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(app) = &self.app {
            app.validate()?;
        }

        if let Some(storage) = &self.storage {
            storage.validate()?;
        }

        if let Some(oauth) = &self.oauth {
            oauth.validate()?;
        }

        match self.mode.unwrap_or_default() {
            HostMode::Agent => Ok(()),
            HostMode::Bridge => match &self.bridge {
                Some(bridge) => bridge.validate(),
                None => Err(ConfigError::InvalidValue(
                    "mode 'bridge' requires a [bridge] section".to_string(),
                )),
            },
            HostMode::Oidc => match &self.oauth {
                Some(_) => Ok(()),
                None => Err(ConfigError::InvalidValue(
                    "mode 'oidc' requires an [oauth] section".to_string(),
                )),
            },
        }
    }
}

/// Where the API and OAuth agent live.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AppSection {
    /// Business API base URL
    pub api_base_url: Option<String>,

    /// OAuth agent base URL
    pub oauth_agent_base_url: Option<String>,

    /// Value sent in the client identifier header
    pub client_name: Option<String>,
}

impl AppSection {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.api_base_url {
            validate_url("app.api_base_url", url)?;
        }
        if let Some(url) = &self.oauth_agent_base_url {
            validate_url("app.oauth_agent_base_url", url)?;
        }
        if let Some(name) = &self.client_name {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "app.client_name cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Native host bridge settings.
///
/// The bridge program is run as `<command> [args...] <method> [method args...]`
/// and its trimmed stdout is the result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeSection {
    /// Program to run
    pub command: Option<String>,

    /// Arguments placed before the method name
    pub args: Vec<String>,
}

impl BridgeSection {
    fn validate(&self) -> Result<(), ConfigError> {
        match self.command.as_deref() {
            Some(command) if !command.trim().is_empty() => Ok(()),
            _ => Err(ConfigError::InvalidValue(
                "bridge.command is required".to_string(),
            )),
        }
    }
}

/// OIDC client settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct OAuthSection {
    /// Authorization server base URL
    pub authority: Option<String>,

    /// OAuth client id
    pub client_id: Option<String>,

    /// Redirect URI for login and silent renew responses
    pub app_uri: Option<String>,

    /// Path appended to `app_uri` after logout
    pub post_logout_path: Option<String>,

    /// Requested scopes
    pub scope: Option<String>,
}

impl OAuthSection {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.authority {
            validate_url("oauth.authority", url)?;
        }
        if let Some(url) = &self.app_uri {
            validate_url("oauth.app_uri", url)?;
        }
        Ok(())
    }
}

/// Browser storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    /// Provider name ("file" or "memory")
    pub provider: Option<String>,

    /// File location for the "file" provider
    pub path: Option<PathBuf>,
}

impl StorageSection {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(provider) = &self.provider {
            let valid = crate::storage::valid_provider_names();
            if !valid.contains(&provider.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid storage provider '{}', must be one of: {}",
                    provider,
                    valid.join(", ")
                )));
            }
        }
        Ok(())
    }
}

fn validate_url(field: &str, value: &str) -> Result<(), ConfigError> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidValue(format!("{} is not a valid URL: {}", field, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_lowercase() {
        let config: ConfigFile = toml::from_str("mode = \"bridge\"\n[bridge]\ncommand = \"host\"").unwrap();
        assert_eq!(config.mode, Some(HostMode::Bridge));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn mode_from_str() {
        assert_eq!("oidc".parse::<HostMode>().unwrap(), HostMode::Oidc);
        let err = "android".parse::<HostMode>().unwrap_err();
        assert!(err.to_string().contains("agent, bridge, oidc"));
    }

    #[test]
    fn bridge_mode_requires_command() {
        let config = ConfigFile {
            mode: Some(HostMode::Bridge),
            bridge: Some(BridgeSection::default()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn oidc_mode_requires_oauth_section() {
        let config = ConfigFile {
            mode: Some(HostMode::Oidc),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("[oauth]"));
    }

    #[test]
    fn invalid_url_rejected() {
        let config = ConfigFile {
            app: Some(AppSection {
                api_base_url: Some("not a url".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("app.api_base_url"));
    }

    #[test]
    fn invalid_storage_provider_rejected() {
        let config = ConfigFile {
            storage: Some(StorageSection {
                provider: Some("keychain".to_string()),
                path: None,
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
