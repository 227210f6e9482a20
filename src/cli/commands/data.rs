//! API data commands: companies, transactions, userinfo.

use anyhow::Result;

use super::{api_failure, auth_failure};
use crate::api::ApiRequestOptions;
use crate::cli::Context;
use crate::ui::output;

fn options(reload: bool, cause_error: bool) -> ApiRequestOptions {
    ApiRequestOptions {
        force_reload: reload,
        cause_error,
    }
}

/// List companies.
pub async fn companies(ctx: &Context<'_>, reload: bool, cause_error: bool) -> Result<()> {
    let companies = ctx
        .app
        .companies(options(reload, cause_error))
        .await
        .map_err(|e| api_failure(ctx, e))?;

    output::print(output::format_companies(&companies), ctx.verbosity);
    Ok(())
}

/// Show one company's transactions.
pub async fn transactions(
    ctx: &Context<'_>,
    id: &str,
    reload: bool,
    cause_error: bool,
) -> Result<()> {
    let data = ctx
        .app
        .transactions(id, options(reload, cause_error))
        .await
        .map_err(|e| api_failure(ctx, e))?;

    output::print(output::format_transactions(&data), ctx.verbosity);
    Ok(())
}

/// Show the user's name and API-held attributes.
pub async fn userinfo(ctx: &Context<'_>, reload: bool) -> Result<()> {
    let oauth = ctx
        .app
        .oauth_user_info()
        .await
        .map_err(|e| auth_failure(ctx, e))?;
    let api = ctx
        .app
        .api_user_info(options(reload, false))
        .await
        .map_err(|e| api_failure(ctx, e))?;

    output::print(
        output::format_user(oauth.as_ref(), Some(&api)),
        ctx.verbosity,
    );
    Ok(())
}
