//! status command - Show mode, session and login state

use anyhow::Result;

use crate::cli::Context;
use crate::ui::output;

/// Show the app's mode, session id and login state.
pub fn status(ctx: &Context<'_>) -> Result<()> {
    let app = ctx.app;
    let yes_no = |b: bool| if b { "yes" } else { "no" };

    let config = ctx
        .config_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(defaults)".to_string());

    let lines = [
        format!("Mode:       {}", app.mode()),
        format!("Session:    {}", app.session_id()),
        format!("Logged in:  {}", yes_no(app.is_logged_in())),
        format!("Logged out: {}", yes_no(app.is_logged_out())),
        format!("Config:     {}", config),
    ];
    output::print(output::format_list(&lines, ""), ctx.verbosity);
    Ok(())
}
