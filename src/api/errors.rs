//! api::errors
//!
//! Errors from calling the business API.

use thiserror::Error;

use crate::auth::AuthError;

/// Errors from API calls.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The session could not be renewed; the user must log in again.
    #[error("login required")]
    LoginRequired,

    /// Attaching credentials or refreshing them failed.
    #[error(transparent)]
    Auth(AuthError),

    /// The API returned an error status.
    #[error("Web API request to {url} failed with status {status}: {message}")]
    Http {
        /// Endpoint called
        url: String,
        /// HTTP status code
        status: u16,
        /// Error code from the response body, if any
        code: Option<String>,
        /// Error message from the response body, or the status reason
        message: String,
    },

    /// The request could not be sent or its response not read.
    #[error("network error calling {url}: {message}")]
    Network {
        /// Endpoint called
        url: String,
        /// Transport error description
        message: String,
    },

    /// A success response was not JSON, or not the expected shape.
    #[error("malformed response from {url}: {message}")]
    MalformedResponse {
        /// Endpoint called
        url: String,
        /// What was wrong
        message: String,
    },

    /// The request was rejected before it was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Whether this error means the user must log in again.
    pub fn is_login_required(&self) -> bool {
        match self {
            ApiError::LoginRequired => true,
            ApiError::Auth(e) => e.is_login_required(),
            _ => false,
        }
    }

    /// A stable error code for display and logs.
    ///
    /// Uses the API's own code when the response carried one.
    pub fn code(&self) -> &str {
        match self {
            ApiError::LoginRequired => "login_required",
            ApiError::Auth(e) => e.code(),
            ApiError::Http {
                code: Some(code), ..
            } => code.as_str(),
            ApiError::Http { .. } => "http_error",
            ApiError::Network { .. } => "network_error",
            ApiError::MalformedResponse { .. } => "malformed_response",
            ApiError::InvalidRequest(_) => "invalid_request",
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Auth(e) => e.status(),
            _ => None,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if err.is_login_required() {
            ApiError::LoginRequired
        } else {
            ApiError::Auth(err)
        }
    }
}
