//! Session lifecycle commands: login, page-load, logout, refresh, expire.

use anyhow::Result;

use super::auth_failure;
use crate::cli::args::ExpireTarget;
use crate::cli::Context;
use crate::ui::output;

/// Start a login that returns to `location`.
pub async fn login(ctx: &Context<'_>, location: &str) -> Result<()> {
    ctx.app
        .login(location)
        .await
        .map_err(|e| auth_failure(ctx, e))?;

    if ctx.app.is_logged_in() {
        output::success("Logged in", ctx.verbosity);
    } else {
        output::print(
            "After signing in, pass the URL the browser returns to to `oac page-load`",
            ctx.verbosity,
        );
    }
    Ok(())
}

/// Process a page URL, completing a login when it carries a login response.
pub async fn page_load(ctx: &Context<'_>, url: &str) -> Result<()> {
    let next = ctx
        .app
        .handle_page_load(url)
        .await
        .map_err(|e| auth_failure(ctx, e))?;

    match next {
        Some(location) => output::success(
            format!("Logged in, continue at {}", location),
            ctx.verbosity,
        ),
        None if ctx.app.is_logged_out() => output::print("Logged out", ctx.verbosity),
        None if ctx.app.is_logged_in() => output::print("Logged in", ctx.verbosity),
        None => output::print("Not logged in", ctx.verbosity),
    }
    Ok(())
}

/// Log out.
pub async fn logout(ctx: &Context<'_>) -> Result<()> {
    ctx.app.logout().await.map_err(|e| auth_failure(ctx, e))?;
    output::success("Logged out", ctx.verbosity);
    Ok(())
}

/// Renew the session now.
pub async fn refresh(ctx: &Context<'_>) -> Result<()> {
    ctx.app.refresh().await.map_err(|e| auth_failure(ctx, e))?;
    output::success("Session renewed", ctx.verbosity);
    Ok(())
}

/// Make a token act expired.
pub async fn expire(ctx: &Context<'_>, token: ExpireTarget) -> Result<()> {
    let result = match token {
        ExpireTarget::Access => ctx.app.expire_access_token().await,
        ExpireTarget::Refresh => ctx.app.expire_refresh_token().await,
    };
    result.map_err(|e| auth_failure(ctx, e))?;

    let name = match token {
        ExpireTarget::Access => "Access",
        ExpireTarget::Refresh => "Refresh",
    };
    output::success(format!("{} token expired", name), ctx.verbosity);
    Ok(())
}
