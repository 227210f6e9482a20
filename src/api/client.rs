//! api::client
//!
//! Typed calls to the business API.

use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::cache::FetchCache;
use super::errors::ApiError;
use super::fetch::{ApiRequestOptions, Channel};
use super::types::{ApiUserInfo, Company, CompanyTransactions};

/// Business API client with result caching.
#[derive(Clone)]
pub struct ApiClient {
    channel: Arc<dyn Channel>,
    cache: Arc<FetchCache>,
}

impl ApiClient {
    /// Create a client over `channel`.
    pub fn new(channel: Arc<dyn Channel>, cache: Arc<FetchCache>) -> Self {
        Self { channel, cache }
    }

    /// The result cache, shared with whoever needs to invalidate it.
    pub fn cache(&self) -> &Arc<FetchCache> {
        &self.cache
    }

    /// List companies the user may see.
    pub async fn companies(&self, options: ApiRequestOptions) -> Result<Vec<Company>, ApiError> {
        self.get("companies", options).await
    }

    /// Get a company and its transactions.
    ///
    /// # Errors
    ///
    /// [`ApiError::InvalidRequest`] if `company_id` is not a positive
    /// integer; the request is not sent.
    pub async fn company_transactions(
        &self,
        company_id: &str,
        options: ApiRequestOptions,
    ) -> Result<CompanyTransactions, ApiError> {
        let id = match company_id.trim().parse::<u32>() {
            Ok(id) if id > 0 => id,
            _ => {
                return Err(ApiError::InvalidRequest(format!(
                    "company id '{}' must be a positive integer",
                    company_id
                )))
            }
        };

        self.get(&format!("companies/{}/transactions", id), options)
            .await
    }

    /// Get user attributes held by the API.
    pub async fn user_info(&self, options: ApiRequestOptions) -> Result<ApiUserInfo, ApiError> {
        self.get("userinfo", options).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        options: ApiRequestOptions,
    ) -> Result<T, ApiError> {
        let value = match self.cached(path, options) {
            Some(value) => {
                tracing::debug!(%path, "using cached API result");
                value
            }
            None => {
                let value = self
                    .channel
                    .fetch(path, Method::GET, None, options)
                    .await
                    .inspect_err(|_| self.cache.remove(path))?;
                self.cache.set(path, value.clone());
                value
            }
        };

        serde_json::from_value(value).map_err(|e| {
            self.cache.remove(path);
            ApiError::MalformedResponse {
                url: path.to_string(),
                message: e.to_string(),
            }
        })
    }

    fn cached(&self, path: &str, options: ApiRequestOptions) -> Option<Value> {
        if options.force_reload {
            self.cache.remove(path);
            return None;
        }
        self.cache.get(path)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}
