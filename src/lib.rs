//! oauth-agent-client - Drive an OAuth-secured app from the terminal
//!
//! The crate models the client side of a web app whose API calls are
//! authorized by OAuth. The app can obtain its session three ways:
//!
//! - through an OAuth agent, a backend-for-frontend that keeps tokens in
//!   HTTP-only cookies and hands the app an anti-forgery token
//! - through a host bridge, a native shell that owns the tokens
//! - through OpenID Connect, where the app holds tokens itself
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to the app)
//! - [`app`] - The application model and its error summaries
//! - [`api`] - Typed API calls, caching and the 401 retry
//! - [`auth`] - Authenticators for each host mode
//! - [`http`] - Shared request headers and response helpers
//! - [`core`] - Configuration, session ids and single-flight concurrency
//! - [`storage`] - Key-value persistence for flags and pending requests
//! - [`navigation`] - Full-page redirects to the authorization server
//! - [`ui`] - Terminal output
//!
//! # Invariants
//!
//! 1. However many calls hit an expired session at once, one refresh runs
//! 2. An API request is retried at most once after a refresh
//! 3. Login-required conditions never surface as displayed errors

pub mod api;
pub mod app;
pub mod auth;
pub mod cli;
pub mod core;
pub mod http;
pub mod navigation;
pub mod storage;
pub mod ui;
