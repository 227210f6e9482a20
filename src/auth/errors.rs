//! auth::errors
//!
//! Authentication error types.
//!
//! # Design
//!
//! Error messages never contain tokens, anti-forgery values or cookies.
//! Variants wrap the underlying failure so callers can still tell a
//! session-expired 401 apart from other transport errors.
//!
//! Errors are `Clone` because one refresh outcome is handed to every
//! caller waiting on the same single-flight round.
//!
//! # Example
//!
//! ```
//! use oauth_agent_client::auth::AuthError;
//!
//! let err = AuthError::LoginRequired;
//! assert!(err.is_login_required());
//! assert_eq!(err.code(), "login_required");
//! ```

use std::fmt;

use thiserror::Error;

use crate::navigation::NavigationError;
use crate::storage::StorageError;

/// Which token a test-only expiry call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// The access token
    Access,
    /// The refresh token
    Refresh,
}

impl TokenKind {
    /// Wire name used by the OAuth agent's `/expire` endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from authentication operations.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// There is no usable session; the user must log in again.
    #[error("login required")]
    LoginRequired,

    /// The authority rejected the session credentials (HTTP 401).
    #[error("session expired calling {url}")]
    SessionExpired {
        /// Endpoint that returned the 401
        url: String,
    },

    /// Refreshing the access token failed for a reason other than an
    /// expired session.
    #[error("token refresh failed: {0}")]
    TokenRefresh(Box<AuthError>),

    /// Setting up the login redirect failed.
    #[error("login request failed: {0}")]
    LoginRequestFailed(Box<AuthError>),

    /// Processing the login response failed.
    #[error("login response failed: {0}")]
    LoginResponseFailed(Box<AuthError>),

    /// Setting up the logout redirect failed.
    #[error("logout request failed: {0}")]
    LogoutRequestFailed(Box<AuthError>),

    /// A test-only expiry call failed.
    #[error("failed to expire the {kind} token: {source}")]
    TestExpiryFailed {
        /// Token the call targeted
        kind: TokenKind,
        /// Underlying failure
        source: Box<AuthError>,
    },

    /// A success response was not the JSON the contract promises.
    #[error("malformed response from {url}: {message}")]
    MalformedResponse {
        /// Endpoint called
        url: String,
        /// What was wrong
        message: String,
    },

    /// The endpoint returned an error status other than 401.
    #[error("{api} request to {url} failed with status {status}: {message}")]
    Http {
        /// Name of the called component ("OAuth agent", "Web API")
        api: String,
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

    /// A call into the native host failed.
    #[error("host bridge call '{method}' failed: {message}")]
    Bridge {
        /// Bridge method name
        method: String,
        /// Failure reason
        message: String,
    },

    /// The OIDC client reported an error.
    #[error("OIDC error ({code}): {message}")]
    Oidc {
        /// OAuth error code, e.g. "login_required"
        code: String,
        /// Description
        message: String,
    },

    /// Browser storage failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A full-page redirect failed.
    #[error(transparent)]
    Navigation(#[from] NavigationError),
}

impl AuthError {
    /// Whether this error means the user must log in again.
    pub fn is_login_required(&self) -> bool {
        matches!(self, AuthError::LoginRequired)
    }

    /// Whether this error is a 401 from an authority-fronting endpoint.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, AuthError::SessionExpired { .. })
    }

    /// A stable error code for display and logs.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::LoginRequired => "login_required",
            AuthError::SessionExpired { .. } => "session_expired",
            AuthError::TokenRefresh(_) => "token_refresh_error",
            AuthError::LoginRequestFailed(_) => "login_request_failed",
            AuthError::LoginResponseFailed(_) => "login_response_failed",
            AuthError::LogoutRequestFailed(_) => "logout_request_failed",
            AuthError::TestExpiryFailed { .. } => "test_expiry_failed",
            AuthError::MalformedResponse { .. } => "malformed_response",
            AuthError::Http { .. } => "http_error",
            AuthError::Network { .. } => "network_error",
            AuthError::Bridge { .. } => "host_bridge_error",
            AuthError::Oidc { .. } => "oidc_error",
            AuthError::Storage(_) => "storage_error",
            AuthError::Navigation(_) => "navigation_error",
        }
    }

    /// HTTP status carried by this error, if it came from an HTTP response.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::SessionExpired { .. } => Some(401),
            AuthError::Http { status, .. } => Some(*status),
            AuthError::TokenRefresh(inner)
            | AuthError::LoginRequestFailed(inner)
            | AuthError::LoginResponseFailed(inner)
            | AuthError::LogoutRequestFailed(inner)
            | AuthError::TestExpiryFailed { source: inner, .. } => inner.status(),
            _ => None,
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::Storage(err.to_string())
    }
}
