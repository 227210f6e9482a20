//! api - Business API access
//!
//! # Layers
//!
//! - [`Channel`] / [`ApiFetch`] - one HTTP request with correlation headers,
//!   credentials from the [`Authenticator`](crate::auth::Authenticator) and
//!   a single retry after a 401
//! - [`ApiClient`] - typed operations over a channel, with a [`FetchCache`]
//! - [`ApiError`] - what can go wrong, with login-required kept distinct so
//!   the app can start a login instead of showing an error

mod cache;
mod client;
mod errors;
mod fetch;
mod types;

pub use cache::FetchCache;
pub use client::ApiClient;
pub use errors::ApiError;
pub use fetch::{ApiFetch, ApiRequestOptions, Channel};
pub use types::{ApiUserInfo, Company, CompanyTransactions, Transaction};
