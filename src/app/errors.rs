//! app::errors
//!
//! Errors as the user sees them.

use std::fmt;

use thiserror::Error;

use crate::api::ApiError;
use crate::auth::AuthError;
use crate::core::config::ConfigError;

/// Errors that stop the app from starting.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

/// A displayable error summary for one area of the app.
///
/// Login-required errors never become summaries. They are an expected part
/// of the session lifecycle and lead to a login redirect instead.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorSummary {
    /// Where the error happened, e.g. "companies" or "login"
    pub area: String,
    /// Stable error code
    pub code: String,
    /// HTTP status, when the error came from a response
    pub status: Option<u16>,
    /// Full error description
    pub message: String,
}

impl ErrorSummary {
    /// Summarise an authentication error, or `None` if login is required.
    pub fn from_auth(area: &str, err: &AuthError) -> Option<Self> {
        if err.is_login_required() {
            return None;
        }

        Some(Self {
            area: area.to_string(),
            code: err.code().to_string(),
            status: err.status(),
            message: err.to_string(),
        })
    }

    /// Summarise an API error, or `None` if login is required.
    pub fn from_api(area: &str, err: &ApiError) -> Option<Self> {
        if err.is_login_required() {
            return None;
        }

        Some(Self {
            area: area.to_string(),
            code: err.code().to_string(),
            status: err.status(),
            message: err.to_string(),
        })
    }
}

impl fmt::Display for ErrorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Problem encountered in {} ({}", self.area, self.code)?;
        if let Some(status) = self.status {
            write!(f, ", status {}", status)?;
        }
        write!(f, "): {}", self.message)
    }
}
