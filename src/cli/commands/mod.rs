//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Calls one app operation
//! 2. Formats and displays the result
//!
//! When an operation fails, the error summary the app recorded is what the
//! user sees. Login-required failures have no summary; a login is started
//! instead, unless the user logged out.

mod auth;
mod data;
mod session;
mod status;

pub use auth::{expire, login, logout, page_load, refresh};
pub use data::{companies, transactions, userinfo};
pub use session::session;
pub use status::status;

use anyhow::{anyhow, bail, Result};

use crate::api::ApiError;
use crate::auth::AuthError;
use crate::cli::args::Command;
use crate::cli::Context;
use crate::ui::output;

/// Dispatch a command to its handler.
pub async fn dispatch(command: Command, ctx: &Context<'_>) -> Result<()> {
    match command {
        Command::Session => session::session(ctx).await,
        other => execute(other, ctx).await,
    }
}

/// Run one command against the current app load.
pub(crate) async fn execute(command: Command, ctx: &Context<'_>) -> Result<()> {
    match command {
        Command::Status => status::status(ctx),
        Command::Login { location } => auth::login(ctx, &location).await,
        Command::PageLoad { url } => auth::page_load(ctx, &url).await,
        Command::Logout => auth::logout(ctx).await,
        Command::Refresh => auth::refresh(ctx).await,
        Command::Expire { token } => auth::expire(ctx, token).await,
        Command::Companies {
            reload,
            cause_error,
        } => data::companies(ctx, reload, cause_error).await,
        Command::Transactions {
            id,
            reload,
            cause_error,
        } => data::transactions(ctx, &id, reload, cause_error).await,
        Command::Userinfo { reload } => data::userinfo(ctx, reload).await,
        Command::Session => bail!("already in a session"),
    }
}

/// Turn an authentication failure into what the user should see.
pub(crate) fn auth_failure(ctx: &Context<'_>, err: AuthError) -> anyhow::Error {
    if err.is_login_required() {
        return login_required(ctx);
    }
    match ctx.app.error() {
        Some(summary) => anyhow!("{}", summary),
        None => err.into(),
    }
}

/// Turn an API failure into what the user should see.
pub(crate) fn api_failure(ctx: &Context<'_>, err: ApiError) -> anyhow::Error {
    if err.is_login_required() {
        return login_required(ctx);
    }
    match ctx.app.error() {
        Some(summary) => anyhow!("{}", summary),
        None => err.into(),
    }
}

fn login_required(ctx: &Context<'_>) -> anyhow::Error {
    if ctx.app.is_logged_out() {
        anyhow!("logged out, run `oac login` to sign in again")
    } else {
        output::warn(
            "the session has ended, a new login has been started",
            ctx.verbosity,
        );
        anyhow!("login required")
    }
}
