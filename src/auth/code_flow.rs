//! auth::code_flow
//!
//! A [`UserManager`] for the authorization code flow with PKCE.
//!
//! # Flow
//!
//! 1. Discover endpoints from `{authority}/.well-known/openid-configuration`.
//! 2. `signin_redirect` saves a code verifier under a random `state` and
//!    navigates to the authorization endpoint.
//! 3. `signin_redirect_callback` swaps the returned code for tokens.
//! 4. `signin_silent` uses the refresh token grant. A rejected or missing
//!    refresh token reports `login_required`.
//!
//! Tokens are held in memory only. Pending authorization requests are kept
//! in [`AppStorage`] because they must survive the redirect.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use base64::prelude::*;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use url::Url;
use uuid::Uuid;

use super::errors::AuthError;
use super::oidc::{OidcUser, UserManager};
use crate::core::config::{Config, ConfigError};
use crate::http::{self, BodyError};
use crate::navigation::Navigator;
use crate::storage::AppStorage;

/// Scopes requested when none are configured.
const DEFAULT_SCOPE: &str = "openid profile";

/// Client settings for the authorization server.
#[derive(Debug, Clone, PartialEq)]
pub struct OidcSettings {
    /// Authorization server base URL
    pub authority: String,
    /// OAuth client id
    pub client_id: String,
    /// Where login responses are sent
    pub redirect_uri: String,
    /// Where the authorization server returns after logout
    pub post_logout_redirect_uri: String,
    /// Requested scopes, space separated
    pub scope: String,
}

impl OidcSettings {
    /// Read settings from the `[oauth]` section.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `authority`, `client_id` or
    /// `app_uri` is missing.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let oauth = config.oauth().ok_or_else(|| {
            ConfigError::InvalidValue("mode 'oidc' requires an [oauth] section".to_string())
        })?;

        let required = |value: &Option<String>, name: &str| {
            value
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::InvalidValue(format!("oauth.{} is required", name)))
        };

        let redirect_uri = required(&oauth.app_uri, "app_uri")?;
        let post_logout_redirect_uri = format!(
            "{}{}",
            redirect_uri,
            oauth.post_logout_path.as_deref().unwrap_or_default()
        );

        Ok(Self {
            authority: required(&oauth.authority, "authority")?
                .trim_end_matches('/')
                .to_string(),
            client_id: required(&oauth.client_id, "client_id")?,
            redirect_uri,
            post_logout_redirect_uri,
            scope: oauth
                .scope
                .clone()
                .unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
        })
    }
}

/// Endpoints from the discovery document.
#[derive(Debug, Clone, Deserialize)]
struct ProviderMetadata {
    authorization_endpoint: String,
    token_endpoint: String,
    end_session_endpoint: Option<String>,
}

/// Saved between the login redirect and its response.
#[derive(Deserialize, Serialize)]
struct PendingRequest {
    code_verifier: String,
    app_state: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

/// Login requests older than this were abandoned and are dropped.
const PENDING_REQUEST_MAX_AGE_MINUTES: i64 = 30;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// PKCE code verifier and its S256 challenge.
struct Pkce {
    verifier: String,
    challenge: String,
}

impl Pkce {
    fn generate() -> Self {
        let verifier = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        Self::from_verifier(verifier)
    }

    fn from_verifier(verifier: String) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        let challenge = BASE64_URL_SAFE_NO_PAD.encode(hasher.finalize());
        Self {
            verifier,
            challenge,
        }
    }
}

/// Code flow client holding tokens in memory.
pub struct CodeFlowUserManager {
    settings: OidcSettings,
    client: Client,
    storage: AppStorage,
    navigator: Arc<dyn Navigator>,
    metadata: OnceCell<ProviderMetadata>,
    user: RwLock<Option<OidcUser>>,
}

impl CodeFlowUserManager {
    /// Create a client. Discovery happens on first use.
    pub fn new(settings: OidcSettings, storage: AppStorage, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            settings,
            client: Client::new(),
            storage,
            navigator,
            metadata: OnceCell::new(),
            user: RwLock::new(None),
        }
    }

    async fn metadata(&self) -> Result<&ProviderMetadata, AuthError> {
        self.metadata
            .get_or_try_init(|| async {
                let url = format!(
                    "{}/.well-known/openid-configuration",
                    self.settings.authority
                );
                tracing::debug!(%url, "downloading OIDC metadata");

                let response = self.client.get(&url).send().await.map_err(|e| {
                    AuthError::Network {
                        url: url.clone(),
                        message: e.to_string(),
                    }
                })?;

                if !response.status().is_success() {
                    let status = response.status().as_u16();
                    let details = http::error_details(response).await;
                    return Err(AuthError::Http {
                        api: "Authorization server".to_string(),
                        url,
                        status,
                        code: details.code,
                        message: details.message,
                    });
                }

                let value = read_body(&url, response).await?;
                serde_json::from_value(value).map_err(|e| AuthError::MalformedResponse {
                    url,
                    message: e.to_string(),
                })
            })
            .await
    }

    /// Post a token request and build a user from the response.
    async fn token_request(
        &self,
        form: &[(&str, &str)],
        state: Option<String>,
        previous_refresh_token: Option<String>,
    ) -> Result<OidcUser, AuthError> {
        let url = self.metadata().await?.token_endpoint.clone();

        let response = self
            .client
            .post(&url)
            .form(form)
            .send()
            .await
            .map_err(|e| AuthError::Network {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let text = response.text().await.unwrap_or_default();
            let error: TokenErrorResponse = serde_json::from_str(&text).unwrap_or_default();
            let message = error
                .error_description
                .unwrap_or_else(|| "token request rejected".to_string());
            return Err(AuthError::Oidc {
                code: if error.error.is_empty() {
                    "invalid_request".to_string()
                } else {
                    error.error
                },
                message,
            });
        }

        if !status.is_success() {
            let details = http::error_details(response).await;
            return Err(AuthError::Http {
                api: "Authorization server".to_string(),
                url,
                status: status.as_u16(),
                code: details.code,
                message: details.message,
            });
        }

        let value = read_body(&url, response).await?;
        let tokens: TokenResponse =
            serde_json::from_value(value).map_err(|e| AuthError::MalformedResponse {
                url,
                message: e.to_string(),
            })?;

        Ok(OidcUser {
            access_token: tokens.access_token,
            id_token: tokens.id_token,
            refresh_token: tokens.refresh_token.or(previous_refresh_token),
            expires_at: tokens.expires_in.and_then(expiry_after),
            state,
        })
    }

    /// Drop saved login requests that never got a response.
    fn prune_pending_requests(&self) -> Result<(), AuthError> {
        let cutoff = Utc::now() - Duration::minutes(PENDING_REQUEST_MAX_AGE_MINUTES);

        for state in self.storage.oidc_request_states()? {
            let Some(saved) = self.storage.oidc_request(&state)? else {
                continue;
            };
            let created_at = serde_json::from_str::<PendingRequest>(&saved)
                .ok()
                .and_then(|pending| pending.created_at);

            if created_at.map_or(true, |at| at < cutoff) {
                tracing::debug!(%state, "dropping abandoned login request");
                self.storage.remove_oidc_request(&state)?;
            }
        }
        Ok(())
    }
}

/// Expiry time `seconds` from now, or `None` when it is out of range.
fn expiry_after(seconds: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(seconds).and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
}

async fn read_body(url: &str, response: reqwest::Response) -> Result<serde_json::Value, AuthError> {
    http::read_json(response).await.map_err(|e| match e {
        BodyError::Read(message) => AuthError::Network {
            url: url.to_string(),
            message,
        },
        BodyError::NotJson(message) => AuthError::MalformedResponse {
            url: url.to_string(),
            message,
        },
    })
}

fn invalid_url(url: &str, e: url::ParseError) -> AuthError {
    AuthError::Oidc {
        code: "invalid_request".to_string(),
        message: format!("invalid URL '{}': {}", url, e),
    }
}

#[async_trait]
impl UserManager for CodeFlowUserManager {
    fn user(&self) -> Option<OidcUser> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store_user(&self, user: OidcUser) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = Some(user);
    }

    fn remove_user(&self) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    async fn signin_redirect(&self, state: &str) -> Result<(), AuthError> {
        let endpoint = self.metadata().await?.authorization_endpoint.clone();

        let pkce = Pkce::generate();
        let request_state = Uuid::new_v4().simple().to_string();

        let pending = serde_json::to_string(&PendingRequest {
            code_verifier: pkce.verifier.clone(),
            app_state: state.to_string(),
            created_at: Some(Utc::now()),
        })
        .map_err(|e| AuthError::Storage(e.to_string()))?;
        self.prune_pending_requests()?;
        self.storage.set_oidc_request(&request_state, &pending)?;

        let url = Url::parse_with_params(
            &endpoint,
            &[
                ("client_id", self.settings.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("scope", self.settings.scope.as_str()),
                ("state", request_state.as_str()),
                ("code_challenge", pkce.challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        )
        .map_err(|e| invalid_url(&endpoint, e))?;

        self.navigator.navigate(url.as_str())?;
        Ok(())
    }

    fn has_stored_state(&self, state: &str) -> Result<bool, AuthError> {
        Ok(self.storage.oidc_request(state)?.is_some())
    }

    async fn signin_redirect_callback(&self, url: &str) -> Result<OidcUser, AuthError> {
        let base = Url::parse(&self.settings.redirect_uri)
            .map_err(|e| invalid_url(&self.settings.redirect_uri, e))?;
        let response_url = base.join(url).map_err(|e| invalid_url(url, e))?;

        let param = |name: &str| {
            response_url
                .query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };

        let state = param("state").ok_or_else(|| AuthError::Oidc {
            code: "invalid_request".to_string(),
            message: "login response has no state".to_string(),
        })?;

        let pending = self.storage.oidc_request(&state)?.ok_or_else(|| AuthError::Oidc {
            code: "invalid_state".to_string(),
            message: "no matching login request".to_string(),
        })?;
        self.storage.remove_oidc_request(&state)?;

        if let Some(error) = param("error") {
            return Err(AuthError::Oidc {
                code: error,
                message: param("error_description")
                    .unwrap_or_else(|| "login was not completed".to_string()),
            });
        }

        let code = param("code").ok_or_else(|| AuthError::Oidc {
            code: "invalid_request".to_string(),
            message: "login response has no authorization code".to_string(),
        })?;

        let pending: PendingRequest =
            serde_json::from_str(&pending).map_err(|e| AuthError::Storage(e.to_string()))?;

        self.token_request(
            &[
                ("grant_type", "authorization_code"),
                ("client_id", self.settings.client_id.as_str()),
                ("code", code.as_str()),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("code_verifier", pending.code_verifier.as_str()),
            ],
            Some(pending.app_state.clone()),
            None,
        )
        .await
    }

    async fn signin_silent(&self) -> Result<OidcUser, AuthError> {
        let refresh_token = self
            .user()
            .and_then(|user| user.refresh_token)
            .ok_or_else(|| AuthError::Oidc {
                code: "login_required".to_string(),
                message: "no refresh token is held".to_string(),
            })?;

        let result = self
            .token_request(
                &[
                    ("grant_type", "refresh_token"),
                    ("client_id", self.settings.client_id.as_str()),
                    ("refresh_token", refresh_token.as_str()),
                ],
                None,
                Some(refresh_token.clone()),
            )
            .await;

        match result {
            Err(AuthError::Oidc { code, message }) if code == "invalid_grant" => {
                Err(AuthError::Oidc {
                    code: "login_required".to_string(),
                    message,
                })
            }
            other => other,
        }
    }

    async fn signout_redirect(&self) -> Result<(), AuthError> {
        let Some(endpoint) = self.metadata().await?.end_session_endpoint.clone() else {
            tracing::debug!("authorization server has no end session endpoint");
            self.navigator
                .navigate(&self.settings.post_logout_redirect_uri)?;
            return Ok(());
        };

        let id_token = self.user().and_then(|user| user.id_token);
        let mut params = vec![
            ("client_id", self.settings.client_id.as_str()),
            (
                "post_logout_redirect_uri",
                self.settings.post_logout_redirect_uri.as_str(),
            ),
        ];
        if let Some(hint) = id_token.as_deref() {
            params.push(("id_token_hint", hint));
        }

        let url = Url::parse_with_params(&endpoint, &params).map_err(|e| invalid_url(&endpoint, e))?;
        self.navigator.navigate(url.as_str())?;
        Ok(())
    }
}

impl std::fmt::Debug for CodeFlowUserManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeFlowUserManager")
            .field("authority", &self.settings.authority)
            .field("client_id", &self.settings.client_id)
            .field("has_user", &self.user().is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{ConfigFile, HostMode, OAuthSection};
    use crate::navigation::RecordingNavigator;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(authority: &str) -> OidcSettings {
        OidcSettings {
            authority: authority.to_string(),
            client_id: "spa-client".to_string(),
            redirect_uri: "https://web.example.com/spa/".to_string(),
            post_logout_redirect_uri: "https://web.example.com/spa/loggedout".to_string(),
            scope: "openid profile".to_string(),
        }
    }

    async fn mock_authority() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "authorization_endpoint": format!("{}/authorize", server.uri()),
                "token_endpoint": format!("{}/token", server.uri()),
                "end_session_endpoint": format!("{}/logout", server.uri()),
            })))
            .mount(&server)
            .await;
        server
    }

    fn query_param(url: &str, name: &str) -> Option<String> {
        Url::parse(url)
            .ok()?
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    #[test]
    fn pkce_challenge_is_s256() {
        // RFC 7636 appendix B
        let pkce = Pkce::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string());
        assert_eq!(pkce.challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");

        let generated = Pkce::generate();
        assert_eq!(generated.verifier.len(), 64);
    }

    #[test]
    fn settings_from_config() {
        let config = Config::from_file(ConfigFile {
            mode: Some(HostMode::Oidc),
            oauth: Some(OAuthSection {
                authority: Some("https://login.example.com/".to_string()),
                client_id: Some("spa-client".to_string()),
                app_uri: Some("https://web.example.com/spa/".to_string()),
                post_logout_path: Some("loggedout".to_string()),
                scope: None,
            }),
            ..Default::default()
        })
        .unwrap();

        let settings = OidcSettings::from_config(&config).unwrap();
        assert_eq!(settings.authority, "https://login.example.com");
        assert_eq!(
            settings.post_logout_redirect_uri,
            "https://web.example.com/spa/loggedout"
        );
        assert_eq!(settings.scope, DEFAULT_SCOPE);
    }

    #[test]
    fn settings_require_client_id() {
        let config = Config::from_file(ConfigFile {
            mode: Some(HostMode::Oidc),
            oauth: Some(OAuthSection {
                authority: Some("https://login.example.com".to_string()),
                app_uri: Some("https://web.example.com/".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        })
        .unwrap();

        let err = OidcSettings::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("client_id"));
    }

    #[tokio::test]
    async fn redirect_then_callback_produces_user() {
        let server = mock_authority().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code_verifier="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-1",
                "id_token": "id-1",
                "refresh_token": "rt-1",
                "expires_in": 300
            })))
            .expect(1)
            .mount(&server)
            .await;

        let navigator = Arc::new(RecordingNavigator::new());
        let storage = AppStorage::in_memory();
        let manager =
            CodeFlowUserManager::new(settings(&server.uri()), storage.clone(), navigator.clone());

        manager.signin_redirect(r#"{"hash":"/companies"}"#).await.unwrap();

        let authorize = navigator.last().unwrap();
        assert!(authorize.starts_with(&format!("{}/authorize?", server.uri())));
        assert_eq!(
            query_param(&authorize, "code_challenge_method").as_deref(),
            Some("S256")
        );
        let state = query_param(&authorize, "state").unwrap();
        assert!(manager.has_stored_state(&state).unwrap());

        let user = manager
            .signin_redirect_callback(&format!("/spa/?code=abc&state={}", state))
            .await
            .unwrap();

        assert_eq!(user.access_token, "at-1");
        assert_eq!(user.refresh_token.as_deref(), Some("rt-1"));
        assert_eq!(user.state.as_deref(), Some(r#"{"hash":"/companies"}"#));
        assert!(user.expires_at.is_some());
        assert!(!manager.has_stored_state(&state).unwrap());
    }

    #[tokio::test]
    async fn error_response_is_reported() {
        let server = mock_authority().await;
        let navigator = Arc::new(RecordingNavigator::new());
        let manager =
            CodeFlowUserManager::new(settings(&server.uri()), AppStorage::in_memory(), navigator.clone());

        manager.signin_redirect("{}").await.unwrap();
        let state = query_param(&navigator.last().unwrap(), "state").unwrap();

        let err = manager
            .signin_redirect_callback(&format!("/?error=access_denied&state={}", state))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Oidc { ref code, .. } if code == "access_denied"));
    }

    #[tokio::test]
    async fn silent_renew_without_refresh_token_requires_login() {
        let manager = CodeFlowUserManager::new(
            settings("http://127.0.0.1:9"),
            AppStorage::in_memory(),
            Arc::new(RecordingNavigator::new()),
        );

        let err = manager.signin_silent().await.unwrap_err();
        assert!(matches!(err, AuthError::Oidc { ref code, .. } if code == "login_required"));
    }

    #[tokio::test]
    async fn rejected_refresh_token_requires_login() {
        let server = mock_authority().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "refresh token expired"
            })))
            .mount(&server)
            .await;

        let manager = CodeFlowUserManager::new(
            settings(&server.uri()),
            AppStorage::in_memory(),
            Arc::new(RecordingNavigator::new()),
        );
        manager.store_user(OidcUser {
            access_token: "at-1".to_string(),
            id_token: None,
            refresh_token: Some("rt-1".to_string()),
            expires_at: None,
            state: None,
        });

        let err = manager.signin_silent().await.unwrap_err();
        assert!(matches!(err, AuthError::Oidc { ref code, .. } if code == "login_required"));
    }

    #[tokio::test]
    async fn silent_renew_keeps_refresh_token() {
        let server = mock_authority().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-2"
            })))
            .mount(&server)
            .await;

        let manager = CodeFlowUserManager::new(
            settings(&server.uri()),
            AppStorage::in_memory(),
            Arc::new(RecordingNavigator::new()),
        );
        manager.store_user(OidcUser {
            access_token: "at-1".to_string(),
            id_token: None,
            refresh_token: Some("rt-1".to_string()),
            expires_at: None,
            state: None,
        });

        let user = manager.signin_silent().await.unwrap();
        assert_eq!(user.access_token, "at-2");
        assert_eq!(user.refresh_token.as_deref(), Some("rt-1"));
    }

    #[tokio::test]
    async fn abandoned_login_requests_are_dropped() {
        let server = mock_authority().await;
        let storage = AppStorage::in_memory();
        let saved = |minutes_ago: Option<i64>| {
            serde_json::to_string(&PendingRequest {
                code_verifier: "v".to_string(),
                app_state: "{}".to_string(),
                created_at: minutes_ago.map(|m| Utc::now() - Duration::minutes(m)),
            })
            .unwrap()
        };
        storage.set_oidc_request("stale", &saved(Some(120))).unwrap();
        storage.set_oidc_request("recent", &saved(Some(1))).unwrap();
        storage.set_oidc_request("undated", &saved(None)).unwrap();
        storage.set_oidc_request("garbage", "not json").unwrap();

        let navigator = Arc::new(RecordingNavigator::new());
        let manager =
            CodeFlowUserManager::new(settings(&server.uri()), storage.clone(), navigator.clone());
        manager.signin_redirect("{}").await.unwrap();

        let new_state = query_param(&navigator.last().unwrap(), "state").unwrap();
        let mut expected = vec!["recent".to_string(), new_state];
        expected.sort();
        assert_eq!(storage.oidc_request_states().unwrap(), expected);
    }

    #[test]
    fn expiry_out_of_range_is_none() {
        assert!(expiry_after(300).is_some_and(|at| at > Utc::now()));
        assert!(expiry_after(9_000_000_000_000_000).is_none());
        assert!(expiry_after(i64::MIN).is_none());
    }

    #[tokio::test]
    async fn huge_token_lifetime_has_no_expiry() {
        let server = mock_authority().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-2",
                "expires_in": 9_000_000_000_000_000_i64
            })))
            .mount(&server)
            .await;

        let manager = CodeFlowUserManager::new(
            settings(&server.uri()),
            AppStorage::in_memory(),
            Arc::new(RecordingNavigator::new()),
        );
        manager.store_user(OidcUser {
            access_token: "at-1".to_string(),
            id_token: None,
            refresh_token: Some("rt-1".to_string()),
            expires_at: None,
            state: None,
        });

        let user = manager.signin_silent().await.unwrap();
        assert_eq!(user.access_token, "at-2");
        assert!(user.expires_at.is_none());
    }

    #[tokio::test]
    async fn signout_sends_id_token_hint() {
        let server = mock_authority().await;
        let navigator = Arc::new(RecordingNavigator::new());
        let manager =
            CodeFlowUserManager::new(settings(&server.uri()), AppStorage::in_memory(), navigator.clone());
        manager.store_user(OidcUser {
            access_token: "at-1".to_string(),
            id_token: Some("id-1".to_string()),
            refresh_token: None,
            expires_at: None,
            state: None,
        });

        manager.signout_redirect().await.unwrap();

        let logout = navigator.last().unwrap();
        assert_eq!(query_param(&logout, "id_token_hint").as_deref(), Some("id-1"));
        assert_eq!(
            query_param(&logout, "post_logout_redirect_uri").as_deref(),
            Some("https://web.example.com/spa/loggedout")
        );
    }
}
