//! session command - Run many commands against one app load
//!
//! Each line read from stdin is parsed like a command line without the
//! binary name. Failures are reported and the loop continues. `exit`,
//! `quit` or end of input leave the session.

use std::io::Write;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::execute;
use crate::cli::args::SessionLine;
use crate::cli::Context;
use crate::ui::output::{self, Verbosity};

/// What to do with one line of input.
#[derive(Debug, PartialEq)]
enum LineAction {
    Skip,
    Exit,
    Run(SessionLine),
    Report(String),
}

/// Read and run commands until the user leaves.
pub async fn session(ctx: &Context<'_>) -> Result<()> {
    output::print(
        format!(
            "Session {} started, type `help` for commands or `exit` to leave",
            ctx.app.session_id()
        ),
        ctx.verbosity,
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt(ctx.verbosity);

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_line(&line) {
            LineAction::Skip => {}
            LineAction::Exit => break,
            LineAction::Report(text) => println!("{}", text.trim_end()),
            LineAction::Run(parsed) => {
                if let Err(e) = execute(parsed.command, ctx).await {
                    output::error(format!("{:#}", e));
                }
            }
        }
    }

    tracing::debug!("session ended");
    Ok(())
}

fn prompt(verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        print!("oac> ");
        let _ = std::io::stdout().flush();
    }
}

fn parse_line(line: &str) -> LineAction {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        [] => LineAction::Skip,
        ["exit"] | ["quit"] => LineAction::Exit,
        _ => match SessionLine::try_parse_from(words) {
            Ok(parsed) => LineAction::Run(parsed),
            Err(e) => LineAction::Report(e.render().to_string()),
        },
    }
}
