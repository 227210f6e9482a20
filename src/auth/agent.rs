//! auth::agent
//!
//! Authenticator for web hosts that keep tokens in an OAuth agent.
//!
//! # Flow
//!
//! The OAuth agent is a backend-for-frontend that runs the OAuth code flow
//! and stores tokens in encrypted, HTTP-only cookies. This client never sees
//! a token. It only holds the anti-forgery token returned when a page load
//! is processed, and uses that token as its logged-in indicator.
//!
//! - `login` - `POST /login/start`, then redirect to the authorization server
//! - `handle_page_load` - `POST /login/end` with the current URL
//! - `logout` - `POST /logout`, then redirect to the end session endpoint
//! - `synchronized_refresh` - `POST /refresh`, single-flighted
//! - `expire_*_token` - `POST /expire`, for reliability testing
//! - `user_info` - `GET /userinfo`
//!
//! # Session expiry
//!
//! A 401 from the agent means its cookies no longer work: the refresh token
//! expired, or the agent's cookie encryption key changed after a redeploy.
//! During a refresh this becomes [`AuthError::LoginRequired`] and the
//! anti-forgery token is dropped. During a page load it is ignored, so the
//! app still loads and its first API call drives a new login.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{AuthError, TokenKind};
use super::Authenticator;
use crate::core::concurrent::ConcurrentActionHandler;
use crate::core::config::Config;
use crate::core::session::SessionId;
use crate::http::{self, BodyError, CSRF_HEADER};
use crate::navigation::Navigator;
use crate::storage::AppStorage;

/// Component name used in error messages.
const AGENT_API_NAME: &str = "OAuth agent";

/// Response from `POST /login/start`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartLoginResponse {
    authorization_request_uri: String,
}

/// Response from `POST /login/end`.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct EndLoginResponse {
    handled: bool,
    is_logged_in: bool,
    anti_forgery_token: Option<String>,
}

/// Response from `POST /logout`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogoutResponse {
    end_session_request_uri: String,
}

#[derive(Serialize)]
struct EndLoginRequest<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct ExpireRequest {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// User info held by the authorization server, returned by `GET /userinfo`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthUserInfo {
    /// First name
    pub given_name: String,
    /// Last name
    pub family_name: String,
}

/// Settings for reaching the OAuth agent.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Agent base URL, without a trailing `/`
    pub base_url: String,
    /// Client identifier header value
    pub client_name: String,
}

impl AgentSettings {
    /// Read agent settings from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.oauth_agent_base_url(),
            client_name: config.client_name().to_string(),
        }
    }
}

/// Authenticator backed by an OAuth agent and its cookies.
pub struct AgentAuthenticator {
    client: Client,
    settings: AgentSettings,
    session_id: SessionId,
    storage: AppStorage,
    navigator: Arc<dyn Navigator>,
    anti_forgery_token: RwLock<Option<String>>,
    refresh: ConcurrentActionHandler<AuthError>,
}

impl AgentAuthenticator {
    /// Create an authenticator.
    ///
    /// `client` must keep cookies, and should be shared with the API fetch
    /// channel so that API calls carry the agent's cookies too.
    pub fn new(
        settings: AgentSettings,
        client: Client,
        session_id: SessionId,
        storage: AppStorage,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            client,
            settings,
            session_id,
            storage,
            navigator,
            anti_forgery_token: RwLock::new(None),
            refresh: ConcurrentActionHandler::new(),
        }
    }

    /// Get user info from the authorization server, via the agent.
    ///
    /// A 401 triggers one synchronized refresh and one retry.
    ///
    /// # Errors
    ///
    /// - [`AuthError::LoginRequired`] if not logged in, or if the retry is
    ///   also rejected
    /// - Any refresh error
    pub async fn user_info(&self) -> Result<OAuthUserInfo, AuthError> {
        if !self.is_logged_in() {
            return Err(AuthError::LoginRequired);
        }

        match self.call_agent_as(Method::GET, "/userinfo", None).await {
            Err(e) if e.is_session_expired() => {
                tracing::debug!("user info returned 401, refreshing");
                self.synchronized_refresh().await?;
                self.call_agent_as(Method::GET, "/userinfo", None)
                    .await
                    .map_err(|e| {
                        if e.is_session_expired() {
                            self.clear_login_state();
                            AuthError::LoginRequired
                        } else {
                            e
                        }
                    })
            }
            other => other,
        }
    }

    fn token(&self) -> Option<String> {
        self.anti_forgery_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_token(&self, token: Option<String>) {
        *self
            .anti_forgery_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// Send the refresh request. Runs once per single-flight round.
    async fn perform_token_refresh(&self) -> Result<(), AuthError> {
        match self.call_agent(Method::POST, "/refresh", None).await {
            Ok(_) => {
                tracing::debug!("agent cookies refreshed");
                Ok(())
            }
            Err(e) if e.is_session_expired() => {
                tracing::info!("refresh rejected by the agent, login required");
                self.set_token(None);
                Err(AuthError::LoginRequired)
            }
            Err(e) => Err(AuthError::TokenRefresh(Box::new(e))),
        }
    }

    async fn expire(&self, kind: TokenKind) -> Result<(), AuthError> {
        let body = serde_json::to_value(ExpireRequest {
            kind: kind.as_str(),
        })
        .map_err(|e| AuthError::MalformedResponse {
            url: self.url("/expire"),
            message: e.to_string(),
        })?;

        match self.call_agent(Method::POST, "/expire", Some(body)).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_session_expired() => {
                tracing::debug!(%kind, "expiry call ignored, session already expired");
                Ok(())
            }
            Err(e) => Err(AuthError::TestExpiryFailed {
                kind,
                source: Box::new(e),
            }),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url, path)
    }

    async fn call_agent_as<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, AuthError> {
        let value = self.call_agent(method, path, body).await?;
        serde_json::from_value(value).map_err(|e| AuthError::MalformedResponse {
            url: self.url(path),
            message: e.to_string(),
        })
    }

    /// Call an agent endpoint and return its JSON body.
    async fn call_agent(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, AuthError> {
        let url = self.url(path);

        let mut headers = http::correlation_headers(&self.settings.client_name, &self.session_id);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        self.add_anti_forgery_token(&method, &mut headers);

        tracing::debug!(%method, %url, "calling OAuth agent");

        let mut request = self.client.request(method, &url).headers(headers);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| AuthError::Network {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::SessionExpired { url });
        }

        if !status.is_success() {
            let details = http::error_details(response).await;
            return Err(AuthError::Http {
                api: AGENT_API_NAME.to_string(),
                url,
                status: status.as_u16(),
                code: details.code,
                message: details.message,
            });
        }

        http::read_json(response).await.map_err(|e| match e {
            BodyError::Read(message) => AuthError::Network { url, message },
            BodyError::NotJson(message) => AuthError::MalformedResponse { url, message },
        })
    }
}

#[async_trait]
impl Authenticator for AgentAuthenticator {
    fn is_logged_in(&self) -> bool {
        self.anti_forgery_token
            .read()
            .map(|token| token.is_some())
            .unwrap_or_else(|e| e.into_inner().is_some())
    }

    async fn login(&self, current_location: &str) -> Result<(), AuthError> {
        let result: Result<(), AuthError> = async {
            let response: StartLoginResponse =
                self.call_agent_as(Method::POST, "/login/start", None).await?;
            self.storage.set_pre_login_location(current_location)?;
            self.navigator.navigate(&response.authorization_request_uri)?;
            Ok(())
        }
        .await;

        result.map_err(|e| AuthError::LoginRequestFailed(Box::new(e)))
    }

    async fn handle_page_load(&self, page_url: &str) -> Result<Option<String>, AuthError> {
        let body = serde_json::to_value(EndLoginRequest { url: page_url }).map_err(|e| {
            AuthError::LoginResponseFailed(Box::new(AuthError::MalformedResponse {
                url: self.url("/login/end"),
                message: e.to_string(),
            }))
        })?;

        let response: EndLoginResponse = match self
            .call_agent_as(Method::POST, "/login/end", Some(body))
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_session_expired() => {
                // Cookies from an old encryption key; the next API call
                // will drive a fresh login.
                tracing::info!("page load ignored a 401 from the agent");
                return Ok(None);
            }
            Err(e) => return Err(AuthError::LoginResponseFailed(Box::new(e))),
        };

        let storage_result: Result<Option<String>, AuthError> = (|| {
            if response.is_logged_in {
                self.storage.set_logged_out(false)?;
            }

            if let Some(token) = response.anti_forgery_token.filter(|t| !t.is_empty()) {
                self.set_token(Some(token));
            }

            if response.handled {
                tracing::info!("login response handled");
                let location = self.storage.take_pre_login_location()?;
                return Ok(Some(location.unwrap_or_else(|| "/".to_string())));
            }

            Ok(None)
        })();

        storage_result.map_err(|e| AuthError::LoginResponseFailed(Box::new(e)))
    }

    async fn logout(&self) -> Result<(), AuthError> {
        let result: Result<(), AuthError> = async {
            let response: LogoutResponse =
                self.call_agent_as(Method::POST, "/logout", None).await?;
            self.storage.set_logged_out(true)?;
            self.navigator.navigate(&response.end_session_request_uri)?;
            Ok(())
        }
        .await;

        // Logged out locally whatever happened remotely.
        self.set_token(None);

        result.map_err(|e| AuthError::LogoutRequestFailed(Box::new(e)))
    }

    fn clear_login_state(&self) {
        self.set_token(None);
    }

    fn on_logged_out(&self) -> Result<(), AuthError> {
        self.set_token(None);
        self.storage.set_logged_out(true)?;
        Ok(())
    }

    fn add_anti_forgery_token(&self, method: &Method, headers: &mut HeaderMap) {
        if !http::is_mutating(method) {
            return;
        }

        if let Some(token) = self.token() {
            if let Ok(value) = HeaderValue::from_str(&token) {
                headers.insert(CSRF_HEADER, value);
            }
        }
    }

    async fn synchronized_refresh(&self) -> Result<(), AuthError> {
        self.refresh
            .execute(|| self.perform_token_refresh())
            .await
    }

    async fn expire_access_token(&self) -> Result<(), AuthError> {
        self.expire(TokenKind::Access).await
    }

    async fn expire_refresh_token(&self) -> Result<(), AuthError> {
        self.expire(TokenKind::Refresh).await
    }
}

// Custom Debug to avoid exposing the anti-forgery token
impl std::fmt::Debug for AgentAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentAuthenticator")
            .field("base_url", &self.settings.base_url)
            .field("session_id", &self.session_id)
            .field("is_logged_in", &self.is_logged_in())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::RecordingNavigator;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_authenticator(base_url: &str) -> (AgentAuthenticator, Arc<RecordingNavigator>) {
        let navigator = Arc::new(RecordingNavigator::new());
        let authenticator = AgentAuthenticator::new(
            AgentSettings {
                base_url: base_url.to_string(),
                client_name: "FinalSPA".to_string(),
            },
            http::cookie_client().expect("build client"),
            SessionId::from("test-session"),
            AppStorage::in_memory(),
            navigator.clone(),
        );
        (authenticator, navigator)
    }

    #[tokio::test]
    async fn not_logged_in_initially() {
        let (authenticator, _) = make_authenticator("http://127.0.0.1:9");
        assert!(!authenticator.is_logged_in());

        let mut headers = HeaderMap::new();
        authenticator.add_anti_forgery_token(&Method::POST, &mut headers);
        assert!(headers.get(CSRF_HEADER).is_none());
    }

    #[tokio::test]
    async fn user_info_requires_login() {
        let (authenticator, _) = make_authenticator("http://127.0.0.1:9");
        let result = authenticator.user_info().await;
        assert!(matches!(result, Err(AuthError::LoginRequired)));
    }

    #[tokio::test]
    async fn page_load_stores_token_and_csrf_follows() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/end"))
            .and(header_exists("x-mycompany-correlation-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "handled": false,
                "isLoggedIn": true,
                "antiForgeryToken": "csrf-123"
            })))
            .mount(&server)
            .await;

        let (authenticator, _) = make_authenticator(&server.uri());
        let navigate_to = authenticator
            .handle_page_load("https://web.example.com/")
            .await
            .unwrap();

        assert!(navigate_to.is_none());
        assert!(authenticator.is_logged_in());

        let mut post_headers = HeaderMap::new();
        authenticator.add_anti_forgery_token(&Method::POST, &mut post_headers);
        assert_eq!(post_headers.get(CSRF_HEADER).unwrap(), "csrf-123");

        let mut get_headers = HeaderMap::new();
        authenticator.add_anti_forgery_token(&Method::GET, &mut get_headers);
        assert!(get_headers.get(CSRF_HEADER).is_none());
    }

    #[tokio::test]
    async fn login_failure_is_wrapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/start"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (authenticator, navigator) = make_authenticator(&server.uri());
        let err = authenticator.login("/companies").await.unwrap_err();

        assert!(matches!(err, AuthError::LoginRequestFailed(_)));
        assert_eq!(err.status(), Some(500));
        assert!(navigator.visited().is_empty());
    }

    #[tokio::test]
    async fn failed_logout_still_logs_out_locally() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/logout"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (authenticator, navigator) = make_authenticator(&server.uri());
        authenticator.set_token(Some("csrf-123".to_string()));

        let err = authenticator.logout().await.unwrap_err();

        assert_eq!(err.code(), "logout_request_failed");
        assert!(!authenticator.is_logged_in());
        assert!(navigator.visited().is_empty());
    }

    #[tokio::test]
    async fn expire_with_expired_session_is_ignored() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/expire"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let (authenticator, _) = make_authenticator(&server.uri());
        authenticator.set_token(Some("csrf-123".to_string()));

        authenticator.expire_access_token().await.unwrap();
    }

    #[tokio::test]
    async fn expire_server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/expire"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (authenticator, _) = make_authenticator(&server.uri());
        authenticator.set_token(Some("csrf-123".to_string()));

        let err = authenticator.expire_refresh_token().await.unwrap_err();

        assert_eq!(err.code(), "test_expiry_failed");
        assert!(matches!(
            err,
            AuthError::TestExpiryFailed {
                kind: TokenKind::Refresh,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn refresh_gateway_error_is_not_login_required() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&server)
            .await;

        let (authenticator, _) = make_authenticator(&server.uri());
        authenticator.set_token(Some("csrf-123".to_string()));

        let err = authenticator.synchronized_refresh().await.unwrap_err();

        assert_eq!(err.code(), "token_refresh_error");
        assert!(!err.is_login_required());
        assert!(authenticator.is_logged_in());
    }

    #[tokio::test]
    async fn page_load_with_stale_cookies_loads_logged_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/end"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let (authenticator, navigator) = make_authenticator(&server.uri());
        let navigate_to = authenticator
            .handle_page_load("https://web.example.com/")
            .await
            .unwrap();

        assert!(navigate_to.is_none());
        assert!(!authenticator.is_logged_in());
        assert!(navigator.visited().is_empty());
    }

    #[test]
    fn debug_does_not_expose_token() {
        let (authenticator, _) = make_authenticator("http://127.0.0.1:9");
        authenticator.set_token(Some("secret-csrf-value".to_string()));

        let debug = format!("{:?}", authenticator);
        assert!(!debug.contains("secret-csrf-value"));
        assert!(debug.contains("is_logged_in: true"));
    }
}
