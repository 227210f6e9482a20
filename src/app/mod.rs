//! app
//!
//! The application model: everything a host (the CLI, a test) needs to run
//! the app.
//!
//! # Startup
//!
//! [`App::initialise`] creates the session id, picks the authenticator for
//! the configured [`HostMode`] and builds the API client on top of it. One
//! cookie-keeping HTTP client is shared by the OAuth agent calls and the API
//! calls, as a browser would share its cookie jar.
//!
//! # Errors
//!
//! Operations record an [`ErrorSummary`] for display and also return their
//! error. Login-required errors are never recorded. When an API call needs
//! a login, the app starts one unless the user explicitly logged out.

mod errors;

pub use errors::{AppError, ErrorSummary};

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use url::Url;

use crate::api::{
    ApiClient, ApiError, ApiFetch, ApiRequestOptions, ApiUserInfo, Company, CompanyTransactions,
    FetchCache,
};
use crate::auth::{
    AgentAuthenticator, AgentSettings, AuthError, Authenticator, BridgeAuthenticator,
    CodeFlowUserManager, CommandBridge, OAuthUserInfo, OidcAuthenticator, OidcSettings,
};
use crate::core::config::{Config, ConfigError, HostMode};
use crate::core::session::SessionId;
use crate::http;
use crate::navigation::Navigator;
use crate::storage::AppStorage;

/// Path the authorization server returns to after logout.
const LOGGED_OUT_PATH: &str = "/loggedout";

/// A running application.
pub struct App {
    mode: HostMode,
    storage: AppStorage,
    session_id: SessionId,
    authenticator: Arc<dyn Authenticator>,
    agent: Option<Arc<AgentAuthenticator>>,
    api: ApiClient,
    error: Mutex<Option<ErrorSummary>>,
}

impl App {
    /// Create the app for `config`.
    ///
    /// # Errors
    ///
    /// - Configuration missing for the selected mode
    /// - Storage failures creating the session id
    /// - In bridge mode, the host failing to report its login state
    pub async fn initialise(
        config: &Config,
        storage: AppStorage,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, AppError> {
        let mode = config.mode();
        let session_id = SessionId::load_or_create(&storage).map_err(AuthError::from)?;
        let client = http::cookie_client().map_err(|e| AppError::Client(e.to_string()))?;
        let cache = Arc::new(FetchCache::new());

        let mut agent = None;
        let authenticator: Arc<dyn Authenticator> = match mode {
            HostMode::Agent => {
                let authenticator = Arc::new(AgentAuthenticator::new(
                    AgentSettings::from_config(config),
                    client.clone(),
                    session_id.clone(),
                    storage.clone(),
                    navigator,
                ));
                agent = Some(authenticator.clone());
                authenticator
            }
            HostMode::Bridge => {
                let (command, args) = config.bridge_command().ok_or_else(|| {
                    ConfigError::InvalidValue("mode 'bridge' requires bridge.command".to_string())
                })?;
                let bridge = Arc::new(CommandBridge::new(command, args.to_vec()));

                let reload = cache.clone();
                let authenticator = BridgeAuthenticator::new(bridge)
                    .with_post_login_action(Arc::new(move || reload.clear()));
                authenticator.initialise().await?;
                Arc::new(authenticator)
            }
            HostMode::Oidc => {
                let settings = OidcSettings::from_config(config)?;
                let manager = Arc::new(CodeFlowUserManager::new(
                    settings,
                    storage.clone(),
                    navigator,
                ));
                Arc::new(OidcAuthenticator::new(manager, storage.clone()))
            }
        };

        let channel = Arc::new(ApiFetch::new(
            client,
            config.api_base_url(),
            config.client_name(),
            session_id.clone(),
            authenticator.clone(),
        ));

        tracing::info!(%mode, %session_id, "app initialised");

        Ok(Self {
            mode,
            storage,
            session_id,
            authenticator,
            agent,
            api: ApiClient::new(channel, cache),
            error: Mutex::new(None),
        })
    }

    /// Host mode the app runs in.
    pub fn mode(&self) -> HostMode {
        self.mode
    }

    /// This load's session id.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// The authenticator chosen at startup.
    pub fn authenticator(&self) -> &Arc<dyn Authenticator> {
        &self.authenticator
    }

    /// Whether a session is currently held.
    pub fn is_logged_in(&self) -> bool {
        self.authenticator.is_logged_in()
    }

    /// Whether the user explicitly logged out.
    pub fn is_logged_out(&self) -> bool {
        self.storage.logged_out().unwrap_or(false)
    }

    /// The most recent error to display, if any.
    pub fn error(&self) -> Option<ErrorSummary> {
        self.error_slot().clone()
    }

    /// Dismiss the current error.
    pub fn clear_error(&self) {
        *self.error_slot() = None;
    }

    /// Process the URL the app was loaded with.
    ///
    /// Returns where to navigate next when the URL was a login response.
    /// Landing on the logged-out page records the logout.
    pub async fn handle_page_load(&self, page_url: &str) -> Result<Option<String>, AuthError> {
        if is_logged_out_page(page_url) {
            tracing::debug!("landed on the logged out page");
            return self
                .authenticator
                .on_logged_out()
                .map(|_| None)
                .inspect_err(|e| self.record_auth("page load", e));
        }

        self.authenticator
            .handle_page_load(page_url)
            .await
            .inspect_err(|e| self.record_auth("page load", e))
    }

    /// Start a login, returning to `current_location` afterwards.
    pub async fn login(&self, current_location: &str) -> Result<(), AuthError> {
        self.clear_error();
        self.storage.set_logged_out(false)?;
        self.authenticator
            .login(current_location)
            .await
            .inspect_err(|e| self.record_auth("login", e))
    }

    /// Log out and forget cached data.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.clear_error();
        self.api.cache().clear();
        self.authenticator
            .logout()
            .await
            .inspect_err(|e| self.record_auth("logout", e))
    }

    /// Renew the session now.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        self.authenticator
            .synchronized_refresh()
            .await
            .inspect_err(|e| self.record_auth("refresh", e))
    }

    /// Make the access token expire, for reliability testing.
    pub async fn expire_access_token(&self) -> Result<(), AuthError> {
        self.authenticator
            .expire_access_token()
            .await
            .inspect_err(|e| self.record_auth("expire access token", e))
    }

    /// Make the refresh token expire, for reliability testing.
    pub async fn expire_refresh_token(&self) -> Result<(), AuthError> {
        self.authenticator
            .expire_refresh_token()
            .await
            .inspect_err(|e| self.record_auth("expire refresh token", e))
    }

    /// Forget cached API results and any displayed error.
    pub fn reload_data(&self) {
        self.api.cache().clear();
        self.clear_error();
    }

    /// Companies the user may see.
    pub async fn companies(&self, options: ApiRequestOptions) -> Result<Vec<Company>, ApiError> {
        self.call_api("companies", "/", |api| async move { api.companies(options).await })
            .await
    }

    /// A company and its transactions.
    pub async fn transactions(
        &self,
        company_id: &str,
        options: ApiRequestOptions,
    ) -> Result<CompanyTransactions, ApiError> {
        let location = format!("/companies/{}", company_id);
        let company_id = company_id.to_string();
        self.call_api("transactions", &location, |api| async move {
            api.company_transactions(&company_id, options).await
        })
        .await
    }

    /// User attributes held by the API.
    pub async fn api_user_info(&self, options: ApiRequestOptions) -> Result<ApiUserInfo, ApiError> {
        self.call_api("userinfo", "/", |api| async move { api.user_info(options).await })
            .await
    }

    /// User name from the authorization server.
    ///
    /// Only the OAuth agent exposes this; other modes return `None`.
    pub async fn oauth_user_info(&self) -> Result<Option<OAuthUserInfo>, AuthError> {
        let Some(agent) = &self.agent else {
            return Ok(None);
        };

        match agent.user_info().await {
            Ok(info) => Ok(Some(info)),
            Err(e) if e.is_login_required() => {
                self.start_login_after("/").await;
                Err(e)
            }
            Err(e) => {
                self.record_auth("userinfo", &e);
                Err(e)
            }
        }
    }

    async fn call_api<T, F, Fut>(&self, area: &str, location: &str, call: F) -> Result<T, ApiError>
    where
        F: FnOnce(ApiClient) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        match call(self.api.clone()).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_login_required() => {
                self.start_login_after(location).await;
                Err(e)
            }
            Err(e) => {
                if let Some(summary) = ErrorSummary::from_api(area, &e) {
                    *self.error_slot() = Some(summary);
                }
                Err(e)
            }
        }
    }

    /// Begin a login because an operation found the session gone.
    async fn start_login_after(&self, location: &str) {
        if self.is_logged_out() {
            tracing::debug!("user logged out explicitly, not starting a login");
            return;
        }

        if let Err(e) = self.login(location).await {
            tracing::warn!(error = %e, "could not start login");
        }
    }

    fn record_auth(&self, area: &str, err: &AuthError) {
        if let Some(summary) = ErrorSummary::from_auth(area, err) {
            tracing::debug!(%area, code = %summary.code, "recording error");
            *self.error_slot() = Some(summary);
        }
    }

    fn error_slot(&self) -> std::sync::MutexGuard<'_, Option<ErrorSummary>> {
        self.error.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_logged_out_page(page_url: &str) -> bool {
    Url::parse("http://localhost/")
        .and_then(|base| base.join(page_url))
        .map(|url| url.path().trim_end_matches('/').ends_with(LOGGED_OUT_PATH))
        .unwrap_or(false)
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("mode", &self.mode)
            .field("session_id", &self.session_id)
            .field("is_logged_in", &self.is_logged_in())
            .finish_non_exhaustive()
    }
}
