//! api::fetch
//!
//! The channel every business API call goes through.
//!
//! # Retry
//!
//! Access tokens expire at any time, so a 401 is expected rather than
//! exceptional. The channel asks the authenticator for a synchronized
//! refresh and retries exactly once. A second 401 means the session cannot
//! be renewed: local login state is cleared and
//! [`ApiError::LoginRequired`] is returned, which the app turns into a
//! login redirect.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

use super::errors::ApiError;
use crate::auth::Authenticator;
use crate::core::session::SessionId;
use crate::http::{self, BodyError, TEST_EXCEPTION_HEADER};

/// Value of the test exception header; names the API that should fail.
const TEST_EXCEPTION_TARGET: &str = "SampleApi";

/// Per-call options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApiRequestOptions {
    /// Bypass any cached result.
    pub force_reload: bool,
    /// Ask the API to fail, for testing error display.
    pub cause_error: bool,
}

/// Something that can carry an API request.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Send a request to `path`, relative to the API base URL.
    ///
    /// Returns the JSON body, or `Value::Null` for an empty body.
    async fn fetch(
        &self,
        path: &str,
        method: Method,
        data: Option<Value>,
        options: ApiRequestOptions,
    ) -> Result<Value, ApiError>;
}

/// Result of one physical attempt.
enum Attempt {
    Done(Value),
    Unauthorized,
}

/// HTTP channel with credentials and one 401 retry.
pub struct ApiFetch {
    client: Client,
    base_url: String,
    client_name: String,
    session_id: SessionId,
    authenticator: Arc<dyn Authenticator>,
}

impl ApiFetch {
    /// Create a channel.
    ///
    /// `base_url` gains a trailing `/` if it lacks one.
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        client_name: impl Into<String>,
        session_id: SessionId,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Self {
            client,
            base_url,
            client_name: client_name.into(),
            session_id,
            authenticator,
        }
    }

    /// The API base URL, ending in `/`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn headers(&self, options: ApiRequestOptions) -> HeaderMap {
        let mut headers = http::correlation_headers(&self.client_name, &self.session_id);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if options.cause_error {
            headers.insert(
                TEST_EXCEPTION_HEADER,
                HeaderValue::from_static(TEST_EXCEPTION_TARGET),
            );
        }
        headers
    }

    async fn attempt(
        &self,
        url: &str,
        method: &Method,
        data: Option<&Value>,
        options: ApiRequestOptions,
    ) -> Result<Attempt, ApiError> {
        let mut headers = self.headers(options);
        self.authenticator
            .add_credentials(method, &mut headers)
            .await?;

        let mut request = self.client.request(method.clone(), url).headers(headers);
        if let Some(data) = data {
            request = request.json(data);
        }

        let response = request.send().await.map_err(|e| ApiError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(Attempt::Unauthorized);
        }

        if !status.is_success() {
            let details = http::error_details(response).await;
            return Err(ApiError::Http {
                url: url.to_string(),
                status: status.as_u16(),
                code: details.code,
                message: details.message,
            });
        }

        let value = http::read_json(response).await.map_err(|e| match e {
            BodyError::Read(message) => ApiError::Network {
                url: url.to_string(),
                message,
            },
            BodyError::NotJson(message) => ApiError::MalformedResponse {
                url: url.to_string(),
                message,
            },
        })?;

        Ok(Attempt::Done(value))
    }
}

#[async_trait]
impl Channel for ApiFetch {
    async fn fetch(
        &self,
        path: &str,
        method: Method,
        data: Option<Value>,
        options: ApiRequestOptions,
    ) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path.trim_start_matches('/'));
        tracing::debug!(%method, %url, "calling API");

        if let Attempt::Done(value) = self.attempt(&url, &method, data.as_ref(), options).await? {
            return Ok(value);
        }

        tracing::debug!(%url, "API returned 401, refreshing");
        self.authenticator.synchronized_refresh().await?;

        match self.attempt(&url, &method, data.as_ref(), options).await? {
            Attempt::Done(value) => Ok(value),
            Attempt::Unauthorized => {
                tracing::info!(%url, "API rejected renewed credentials, login required");
                self.authenticator.clear_login_state();
                Err(ApiError::LoginRequired)
            }
        }
    }
}

impl std::fmt::Debug for ApiFetch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiFetch")
            .field("base_url", &self.base_url)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}
