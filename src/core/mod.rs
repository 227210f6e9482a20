//! core
//!
//! Building blocks shared by the authenticators and the API channel.
//!
//! - [`concurrent`] - Single-flight coordination of async actions
//! - [`config`] - Configuration schema and loading
//! - [`session`] - Per-load session and per-request correlation ids

pub mod concurrent;
pub mod config;
pub mod session;
