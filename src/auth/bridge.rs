//! auth::bridge
//!
//! Authenticator for apps embedded in a native host.
//!
//! When the app runs inside a mobile web view, the native app owns the
//! tokens and runs login and logout itself. This side only asks for things
//! by name through a [`HostBridge`]:
//!
//! | Method | Result |
//! |---|---|
//! | `isLoggedIn` | `"true"` or `"false"` |
//! | `startLogin` | completes when the user has logged in |
//! | `startLogout` | completes when the user has logged out |
//! | `getAccessToken <request id>` | the current access token |
//! | `refreshAccessToken <request id>` | a renewed access token |
//! | `expireAccessToken` | test only |
//! | `expireRefreshToken` | test only |
//!
//! Token calls carry a fresh request id so the host can correlate them.
//!
//! Login and logout do not leave the page, so there is no login response to
//! process on page load and no anti-forgery token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::process::Stdio;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;

use super::errors::AuthError;
use super::Authenticator;
use crate::core::concurrent::ConcurrentActionHandler;
use crate::core::session::correlation_id;

/// Call-by-name channel to the native host.
#[async_trait]
pub trait HostBridge: Send + Sync {
    /// Invoke `method` with `args` on the host and return its string result.
    async fn call(&self, method: &str, args: &[String]) -> Result<String, AuthError>;
}

/// Bridge that runs an external program once per call.
///
/// The program is run as `<command> [config args...] <method> [call args...]`.
/// Its trimmed stdout
/// is the result; a non-zero exit is a failure, described by its stderr.
#[derive(Debug, Clone)]
pub struct CommandBridge {
    command: String,
    args: Vec<String>,
}

impl CommandBridge {
    /// Create a bridge for `command`, passing `args` before the method name.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

#[async_trait]
impl HostBridge for CommandBridge {
    async fn call(&self, method: &str, args: &[String]) -> Result<String, AuthError> {
        tracing::debug!(command = %self.command, %method, "calling host bridge");

        let output = tokio::process::Command::new(&self.command)
            .args(&self.args)
            .arg(method)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| AuthError::Bridge {
                method: method.to_string(),
                message: format!("cannot run '{}': {}", self.command, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(AuthError::Bridge {
                method: method.to_string(),
                message: if stderr.is_empty() {
                    format!("host exited with {}", output.status)
                } else {
                    stderr
                },
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Callback run after the host reports a completed login.
pub type PostLoginAction = Arc<dyn Fn() + Send + Sync>;

/// Authenticator that delegates everything to a [`HostBridge`].
pub struct BridgeAuthenticator {
    bridge: Arc<dyn HostBridge>,
    logged_in: AtomicBool,
    post_login: Option<PostLoginAction>,
    refresh: ConcurrentActionHandler<AuthError>,
}

impl BridgeAuthenticator {
    /// Create an authenticator over `bridge`. Starts logged out until
    /// [`initialise`](Self::initialise) asks the host.
    pub fn new(bridge: Arc<dyn HostBridge>) -> Self {
        Self {
            bridge,
            logged_in: AtomicBool::new(false),
            post_login: None,
            refresh: ConcurrentActionHandler::new(),
        }
    }

    /// Run `action` whenever a login completes, e.g. to reload views.
    pub fn with_post_login_action(mut self, action: PostLoginAction) -> Self {
        self.post_login = Some(action);
        self
    }

    /// Ask the host whether a user is logged in.
    pub async fn initialise(&self) -> Result<(), AuthError> {
        let result = self.bridge.call("isLoggedIn", &[]).await?;
        let logged_in = result == "true";
        self.logged_in.store(logged_in, Ordering::SeqCst);
        tracing::debug!(logged_in, "host bridge login state");
        Ok(())
    }

    async fn refresh_access_token(&self) -> Result<(), AuthError> {
        self.bridge
            .call("refreshAccessToken", &[correlation_id()])
            .await
            .map(|_| ())
            .map_err(|e| AuthError::TokenRefresh(Box::new(e)))
    }
}

#[async_trait]
impl Authenticator for BridgeAuthenticator {
    fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    async fn login(&self, _current_location: &str) -> Result<(), AuthError> {
        self.bridge
            .call("startLogin", &[])
            .await
            .map_err(|e| AuthError::LoginRequestFailed(Box::new(e)))?;

        self.logged_in.store(true, Ordering::SeqCst);
        if let Some(action) = &self.post_login {
            action();
        }
        Ok(())
    }

    async fn handle_page_load(&self, _page_url: &str) -> Result<Option<String>, AuthError> {
        Ok(None)
    }

    async fn logout(&self) -> Result<(), AuthError> {
        let result = self.bridge.call("startLogout", &[]).await;
        self.logged_in.store(false, Ordering::SeqCst);
        result
            .map(|_| ())
            .map_err(|e| AuthError::LogoutRequestFailed(Box::new(e)))
    }

    fn clear_login_state(&self) {
        self.logged_in.store(false, Ordering::SeqCst);
    }

    fn add_anti_forgery_token(&self, _method: &Method, _headers: &mut HeaderMap) {}

    async fn add_credentials(
        &self,
        _method: &Method,
        headers: &mut HeaderMap,
    ) -> Result<(), AuthError> {
        let token = self
            .bridge
            .call("getAccessToken", &[correlation_id()])
            .await?;
        if token.is_empty() {
            return Err(AuthError::LoginRequired);
        }

        let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
            AuthError::Bridge {
                method: "getAccessToken".to_string(),
                message: "access token is not a valid header value".to_string(),
            }
        })?;
        headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    async fn synchronized_refresh(&self) -> Result<(), AuthError> {
        self.refresh
            .execute(|| self.refresh_access_token())
            .await
    }

    async fn expire_access_token(&self) -> Result<(), AuthError> {
        self.bridge.call("expireAccessToken", &[]).await.map(|_| ())
    }

    async fn expire_refresh_token(&self) -> Result<(), AuthError> {
        self.bridge.call("expireRefreshToken", &[]).await.map(|_| ())
    }
}

impl std::fmt::Debug for BridgeAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeAuthenticator")
            .field("logged_in", &self.is_logged_in())
            .finish_non_exhaustive()
    }
}
