//! auth::oidc
//!
//! Authenticator for apps that run the OIDC code flow themselves.
//!
//! The protocol work is behind the [`UserManager`] trait; this type adds
//! the app's rules on top:
//!
//! - the pre-login location travels in the OAuth `state` as `{"hash": ...}`
//! - a "can silently renew" flag in storage records that a login completed,
//!   so a reload may renew without a full redirect
//! - silent renew failing with `login_required` is treated as success with
//!   no user, which makes the next API call start a fresh login

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use super::errors::AuthError;
use super::Authenticator;
use crate::core::concurrent::ConcurrentActionHandler;
use crate::storage::AppStorage;

/// OAuth error code for an expired authorization server session.
const LOGIN_REQUIRED: &str = "login_required";

/// Tokens and state held for the logged-in user.
#[derive(Clone, PartialEq, Deserialize, Serialize)]
pub struct OidcUser {
    /// Access token sent to APIs
    pub access_token: String,
    /// ID token, used as a logout hint
    pub id_token: Option<String>,
    /// Refresh token, when the authorization server issues one
    pub refresh_token: Option<String>,
    /// Access token expiry
    pub expires_at: Option<DateTime<Utc>>,
    /// App state sent with the login request
    pub state: Option<String>,
}

impl std::fmt::Debug for OidcUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcUser")
            .field("access_token", &"[REDACTED]")
            .field("has_id_token", &self.id_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// The OIDC client: runs redirects and token requests, and holds the user.
#[async_trait]
pub trait UserManager: Send + Sync {
    /// The current user, if any.
    fn user(&self) -> Option<OidcUser>;

    /// Replace the current user.
    fn store_user(&self, user: OidcUser);

    /// Forget the current user.
    fn remove_user(&self);

    /// Start a login redirect carrying `state` back to the app.
    async fn signin_redirect(&self, state: &str) -> Result<(), AuthError>;

    /// Whether `state` belongs to a login this client started.
    fn has_stored_state(&self, state: &str) -> Result<bool, AuthError>;

    /// Complete a login from the response URL and return the new user.
    async fn signin_redirect_callback(&self, url: &str) -> Result<OidcUser, AuthError>;

    /// Renew tokens without user interaction.
    ///
    /// Fails with an [`AuthError::Oidc`] coded `login_required` when the
    /// authorization server session has ended.
    async fn signin_silent(&self) -> Result<OidcUser, AuthError>;

    /// Start a logout redirect.
    async fn signout_redirect(&self) -> Result<(), AuthError>;
}

/// Where the login request's state says to return to.
#[derive(Deserialize, Serialize)]
struct ReturnState {
    hash: String,
}

/// Authenticator backed by a [`UserManager`].
pub struct OidcAuthenticator {
    manager: Arc<dyn UserManager>,
    storage: AppStorage,
    refresh: ConcurrentActionHandler<AuthError>,
}

impl OidcAuthenticator {
    /// Create an authenticator over `manager`.
    pub fn new(manager: Arc<dyn UserManager>, storage: AppStorage) -> Self {
        Self {
            manager,
            storage,
            refresh: ConcurrentActionHandler::new(),
        }
    }

    /// Run one silent renew. `login_required` ends the session quietly.
    async fn perform_token_refresh(&self) -> Result<(), AuthError> {
        match self.manager.signin_silent().await {
            Ok(user) => {
                tracing::debug!("silent renew succeeded");
                self.manager.store_user(user);
                Ok(())
            }
            Err(AuthError::Oidc { code, .. }) if code == LOGIN_REQUIRED => {
                tracing::info!("authorization server session ended");
                self.manager.remove_user();
                self.storage.set_can_silently_renew(false)?;
                Ok(())
            }
            Err(e) => Err(AuthError::TokenRefresh(Box::new(e))),
        }
    }

    async fn complete_login(&self, url: &str) -> Result<String, AuthError> {
        let user = self.manager.signin_redirect_callback(url).await?;

        let location = user
            .state
            .as_deref()
            .and_then(|state| serde_json::from_str::<ReturnState>(state).ok())
            .map(|state| state.hash)
            .filter(|hash| !hash.is_empty())
            .unwrap_or_else(|| "/".to_string());

        self.manager.store_user(user);
        self.storage.set_can_silently_renew(true)?;
        Ok(location)
    }

    fn bearer(token: &str) -> Result<HeaderValue, AuthError> {
        HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| AuthError::Oidc {
            code: "invalid_token".to_string(),
            message: "access token is not a valid header value".to_string(),
        })
    }
}

/// Read the `state` query parameter from an absolute or app-relative URL.
fn state_parameter(page_url: &str) -> Option<String> {
    let base = Url::parse("http://localhost/").ok()?;
    let url = base.join(page_url).ok()?;
    url.query_pairs()
        .find(|(name, _)| name == "state")
        .map(|(_, value)| value.into_owned())
}

#[async_trait]
impl Authenticator for OidcAuthenticator {
    fn is_logged_in(&self) -> bool {
        self.manager.user().is_some()
    }

    async fn login(&self, current_location: &str) -> Result<(), AuthError> {
        let state = serde_json::to_string(&ReturnState {
            hash: current_location.to_string(),
        })
        .map_err(|e| AuthError::LoginRequestFailed(Box::new(AuthError::Oidc {
            code: "invalid_state".to_string(),
            message: e.to_string(),
        })))?;

        self.manager
            .signin_redirect(&state)
            .await
            .map_err(|e| AuthError::LoginRequestFailed(Box::new(e)))
    }

    async fn handle_page_load(&self, page_url: &str) -> Result<Option<String>, AuthError> {
        let Some(state) = state_parameter(page_url) else {
            return Ok(None);
        };

        let known = self
            .manager
            .has_stored_state(&state)
            .map_err(|e| AuthError::LoginResponseFailed(Box::new(e)))?;
        if !known {
            tracing::debug!("ignoring unrecognised state parameter");
            return Ok(None);
        }

        let location = self
            .complete_login(page_url)
            .await
            .map_err(|e| AuthError::LoginResponseFailed(Box::new(e)))?;
        tracing::info!("login response handled");
        Ok(Some(location))
    }

    async fn logout(&self) -> Result<(), AuthError> {
        let result = async {
            self.storage.set_can_silently_renew(false)?;
            self.manager.signout_redirect().await
        }
        .await;

        self.manager.remove_user();
        result.map_err(|e| AuthError::LogoutRequestFailed(Box::new(e)))
    }

    fn clear_login_state(&self) {
        self.manager.remove_user();
    }

    fn add_anti_forgery_token(&self, _method: &Method, _headers: &mut HeaderMap) {}

    async fn add_credentials(
        &self,
        _method: &Method,
        headers: &mut HeaderMap,
    ) -> Result<(), AuthError> {
        let user = match self.manager.user().filter(|u| !u.access_token.is_empty()) {
            Some(user) => user,
            None => {
                self.synchronized_refresh().await?;
                self.manager.user().ok_or(AuthError::LoginRequired)?
            }
        };

        headers.insert(AUTHORIZATION, Self::bearer(&user.access_token)?);
        Ok(())
    }

    async fn synchronized_refresh(&self) -> Result<(), AuthError> {
        if !self.storage.can_silently_renew()? {
            return Err(AuthError::LoginRequired);
        }

        self.refresh
            .execute(|| self.perform_token_refresh())
            .await?;

        match self.manager.user() {
            Some(user) if !user.access_token.is_empty() => Ok(()),
            _ => Err(AuthError::LoginRequired),
        }
    }

    async fn expire_access_token(&self) -> Result<(), AuthError> {
        if let Some(mut user) = self.manager.user() {
            user.access_token = format!("x{}x", user.access_token);
            self.manager.store_user(user);
        }
        Ok(())
    }

    async fn expire_refresh_token(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

impl std::fmt::Debug for OidcAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcAuthenticator")
            .field("is_logged_in", &self.is_logged_in())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn user(token: &str, state: Option<&str>) -> OidcUser {
        OidcUser {
            access_token: token.to_string(),
            id_token: Some("id".to_string()),
            refresh_token: None,
            expires_at: None,
            state: state.map(str::to_string),
        }
    }

    #[derive(Default)]
    struct MockUserManager {
        user: Mutex<Option<OidcUser>>,
        redirect_state: Mutex<Option<String>>,
        silent_result: Mutex<Option<Result<OidcUser, AuthError>>>,
        silent_calls: AtomicUsize,
        signed_out: AtomicUsize,
    }

    impl MockUserManager {
        fn silent(self, result: Result<OidcUser, AuthError>) -> Self {
            *self.silent_result.lock().unwrap() = Some(result);
            self
        }
    }

    #[async_trait]
    impl UserManager for MockUserManager {
        fn user(&self) -> Option<OidcUser> {
            self.user.lock().unwrap().clone()
        }

        fn store_user(&self, user: OidcUser) {
            *self.user.lock().unwrap() = Some(user);
        }

        fn remove_user(&self) {
            *self.user.lock().unwrap() = None;
        }

        async fn signin_redirect(&self, state: &str) -> Result<(), AuthError> {
            *self.redirect_state.lock().unwrap() = Some(state.to_string());
            Ok(())
        }

        fn has_stored_state(&self, state: &str) -> Result<bool, AuthError> {
            Ok(state == "known")
        }

        async fn signin_redirect_callback(&self, _url: &str) -> Result<OidcUser, AuthError> {
            let state = self.redirect_state.lock().unwrap().clone();
            Ok(user("at-1", state.as_deref()))
        }

        async fn signin_silent(&self) -> Result<OidcUser, AuthError> {
            self.silent_calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.silent_result
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Ok(user("at-renewed", None)))
        }

        async fn signout_redirect(&self) -> Result<(), AuthError> {
            self.signed_out.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn make(manager: MockUserManager) -> (OidcAuthenticator, Arc<MockUserManager>, AppStorage) {
        let manager = Arc::new(manager);
        let storage = AppStorage::in_memory();
        let authenticator = OidcAuthenticator::new(manager.clone(), storage.clone());
        (authenticator, manager, storage)
    }

    #[tokio::test]
    async fn login_round_trip_restores_location() {
        let (authenticator, _, storage) = make(MockUserManager::default());

        authenticator.login("/companies/2").await.unwrap();
        let location = authenticator
            .handle_page_load("https://web.example.com/spa?code=abc&state=known")
            .await
            .unwrap();

        assert_eq!(location.as_deref(), Some("/companies/2"));
        assert!(authenticator.is_logged_in());
        assert!(storage.can_silently_renew().unwrap());
    }

    #[tokio::test]
    async fn page_load_without_state_is_ordinary() {
        let (authenticator, _, _) = make(MockUserManager::default());
        let result = authenticator.handle_page_load("/companies").await.unwrap();
        assert!(result.is_none());
        assert!(!authenticator.is_logged_in());
    }

    #[tokio::test]
    async fn unknown_state_is_ignored() {
        let (authenticator, _, _) = make(MockUserManager::default());
        let result = authenticator
            .handle_page_load("/?code=abc&state=forged")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn refresh_without_flag_requires_login() {
        let (authenticator, manager, _) = make(MockUserManager::default());
        let err = authenticator.synchronized_refresh().await.unwrap_err();
        assert!(err.is_login_required());
        assert_eq!(manager.silent_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn login_required_clears_user_and_flag() {
        let (authenticator, manager, storage) =
            make(MockUserManager::default().silent(Err(AuthError::Oidc {
                code: "login_required".to_string(),
                message: "session ended".to_string(),
            })));
        storage.set_can_silently_renew(true).unwrap();
        manager.store_user(user("old", None));

        let err = authenticator.synchronized_refresh().await.unwrap_err();

        assert!(err.is_login_required());
        assert!(!authenticator.is_logged_in());
        assert!(!storage.can_silently_renew().unwrap());
    }

    #[tokio::test]
    async fn other_silent_errors_are_refresh_errors() {
        let (authenticator, _, storage) =
            make(MockUserManager::default().silent(Err(AuthError::Network {
                url: "https://login.example.com/token".to_string(),
                message: "connection reset".to_string(),
            })));
        storage.set_can_silently_renew(true).unwrap();

        let err = authenticator.synchronized_refresh().await.unwrap_err();
        assert_eq!(err.code(), "token_refresh_error");
        assert!(storage.can_silently_renew().unwrap());
    }

    #[tokio::test]
    async fn concurrent_refreshes_renew_once() {
        let (authenticator, manager, storage) = make(MockUserManager::default());
        storage.set_can_silently_renew(true).unwrap();

        let (a, b) = tokio::join!(
            authenticator.synchronized_refresh(),
            authenticator.synchronized_refresh()
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(manager.silent_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn credentials_use_access_token() {
        let (authenticator, manager, _) = make(MockUserManager::default());
        manager.store_user(user("at-1", None));

        let mut headers = HeaderMap::new();
        authenticator
            .add_credentials(&Method::GET, &mut headers)
            .await
            .unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer at-1");
    }

    #[tokio::test]
    async fn expire_access_token_corrupts_token() {
        let (authenticator, manager, _) = make(MockUserManager::default());
        manager.store_user(user("at-1", None));

        authenticator.expire_access_token().await.unwrap();
        assert_eq!(manager.user().unwrap().access_token, "xat-1x");

        authenticator.expire_refresh_token().await.unwrap();
    }

    #[tokio::test]
    async fn logout_clears_flag_and_user() {
        let (authenticator, manager, storage) = make(MockUserManager::default());
        storage.set_can_silently_renew(true).unwrap();
        manager.store_user(user("at-1", None));

        authenticator.logout().await.unwrap();

        assert_eq!(manager.signed_out.load(Ordering::SeqCst), 1);
        assert!(!storage.can_silently_renew().unwrap());
        assert!(!authenticator.is_logged_in());
    }

    #[test]
    fn user_debug_redacts_tokens() {
        let debug = format!("{:?}", user("secret-access-token", None));
        assert!(!debug.contains("secret-access-token"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn state_parameter_from_relative_and_absolute_urls() {
        assert_eq!(state_parameter("/?state=abc").as_deref(), Some("abc"));
        assert_eq!(
            state_parameter("https://web.example.com/?code=1&state=xyz").as_deref(),
            Some("xyz")
        );
        assert!(state_parameter("/companies").is_none());
    }
}
