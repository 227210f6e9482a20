//! oac binary entry point.

use std::process::ExitCode;

fn main() -> ExitCode {
    match oauth_agent_client::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            oauth_agent_client::ui::output::error(format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
