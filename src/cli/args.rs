//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <path>`: Use this config file instead of discovery
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output
//! - `--no-browser`: Print redirect URLs instead of opening a browser

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// oac - Drive an OAuth-secured app from the terminal
#[derive(Parser, Debug)]
#[command(name = "oac")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file to use instead of the default locations
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print redirect URLs instead of opening the system browser
    #[arg(long, global = true)]
    pub no_browser: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// One line typed at the `session` prompt.
#[derive(Parser, Debug, PartialEq)]
#[command(name = "", no_binary_name = true, disable_version_flag = true)]
pub struct SessionLine {
    #[command(subcommand)]
    pub command: Command,
}

/// Which token an expiry command targets.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpireTarget {
    /// The access token
    Access,
    /// The refresh token
    Refresh,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Show mode, session and login state
    Status,

    /// Start a login
    #[command(
        long_about = "Start a login.\n\n\
            In agent and OIDC modes this opens the authorization server in a browser. \
            After signing in, the browser is sent back to the app with a login response \
            in its URL; pass that URL to `oac page-load` to complete the login.",
        after_help = "\
EXAMPLES:
    oac login
    oac login --location /companies/2"
    )]
    Login {
        /// App location to return to after login
        #[arg(long, default_value = "/")]
        location: String,
    },

    /// Process the URL the app was loaded with
    #[command(name = "page-load")]
    PageLoad {
        /// Full page URL, e.g. the login response URL from the browser
        url: String,
    },

    /// Log out
    Logout,

    /// Renew the session now
    Refresh,

    /// Make a token act expired, for reliability testing
    Expire {
        /// Token to expire
        #[arg(value_enum)]
        token: ExpireTarget,
    },

    /// List companies
    Companies {
        /// Bypass cached results
        #[arg(long)]
        reload: bool,

        /// Ask the API to fail, to test error handling
        #[arg(long)]
        cause_error: bool,
    },

    /// Show a company's transactions
    Transactions {
        /// Company id
        id: String,

        /// Bypass cached results
        #[arg(long)]
        reload: bool,

        /// Ask the API to fail, to test error handling
        #[arg(long)]
        cause_error: bool,
    },

    /// Show the logged-in user
    Userinfo {
        /// Bypass cached results
        #[arg(long)]
        reload: bool,
    },

    /// Keep one app load alive and read commands from stdin
    #[command(
        long_about = "Keep one app load alive and read commands from stdin.\n\n\
            The OAuth agent keeps the session in cookies and the app keeps an \
            anti-forgery token in memory, so a login only lasts as long as one app \
            load. A session runs every command against the same load. Type `help` \
            for commands and `exit` to leave."
    )]
    Session,
}
