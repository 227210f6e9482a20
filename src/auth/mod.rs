//! auth - Authentication for API calls
//!
//! The app does not care how the user is authenticated, only that API calls
//! carry credentials and that an expired session can be renewed. The
//! [`Authenticator`] trait captures that capability; the host environment
//! picks the implementation at startup.
//!
//! # Variants
//!
//! - [`AgentAuthenticator`] - web host; tokens live in OAuth agent cookies
//!   and requests carry an anti-forgery token
//! - [`BridgeAuthenticator`] - embedded in a native host that owns the
//!   tokens and is reached through a [`HostBridge`]
//! - [`OidcAuthenticator`] - the app runs the OIDC code flow itself via a
//!   [`UserManager`]
//!
//! # Refresh
//!
//! Every variant routes refreshes through a
//! [`ConcurrentActionHandler`](crate::core::concurrent::ConcurrentActionHandler),
//! so many callers hitting an expired token at once cause a single refresh.
//!
//! # Security
//!
//! Tokens and anti-forgery values never appear in logs, errors or debug
//! output. Types holding them implement a redacting `Debug`.

mod agent;
mod bridge;
mod code_flow;
mod errors;
mod oidc;

pub use agent::{AgentAuthenticator, AgentSettings, OAuthUserInfo};
pub use bridge::{BridgeAuthenticator, CommandBridge, HostBridge, PostLoginAction};
pub use code_flow::{CodeFlowUserManager, OidcSettings};
pub use errors::{AuthError, TokenKind};
pub use oidc::{OidcAuthenticator, OidcUser, UserManager};

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;

/// Authentication capability shared by every host environment.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Whether the app currently holds a session.
    ///
    /// This is a local view. It may be stale until the next API call fails.
    fn is_logged_in(&self) -> bool;

    /// Start a login, remembering `current_location` to return to.
    ///
    /// Web variants end by navigating away to the authorization server.
    async fn login(&self, current_location: &str) -> Result<(), AuthError>;

    /// Process the URL the app was loaded with.
    ///
    /// Returns the location to navigate to when the URL was a login
    /// response, or `None` for an ordinary page load.
    async fn handle_page_load(&self, page_url: &str) -> Result<Option<String>, AuthError>;

    /// Log out, clearing local state even if the remote call fails.
    async fn logout(&self) -> Result<(), AuthError>;

    /// Forget the local session without telling anyone.
    fn clear_login_state(&self);

    /// React to a logout that happened elsewhere.
    ///
    /// Records the logged-out state so the next page load does not try to
    /// resume the session.
    fn on_logged_out(&self) -> Result<(), AuthError> {
        self.clear_login_state();
        Ok(())
    }

    /// Add the anti-forgery header to a state-changing request, if one is
    /// held. A no-op for variants without the concept.
    fn add_anti_forgery_token(&self, method: &Method, headers: &mut HeaderMap);

    /// Attach whatever credentials an API request needs.
    async fn add_credentials(
        &self,
        method: &Method,
        headers: &mut HeaderMap,
    ) -> Result<(), AuthError> {
        self.add_anti_forgery_token(method, headers);
        Ok(())
    }

    /// Renew the session, sharing one refresh among concurrent callers.
    ///
    /// # Errors
    ///
    /// [`AuthError::LoginRequired`] when the session cannot be renewed.
    async fn synchronized_refresh(&self) -> Result<(), AuthError>;

    /// Make the access token expire, for testing the refresh path.
    async fn expire_access_token(&self) -> Result<(), AuthError>;

    /// Make the refresh token expire, for testing the re-login path.
    async fn expire_refresh_token(&self) -> Result<(), AuthError>;
}
