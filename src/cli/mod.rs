//! cli
//!
//! Command-line interface layer for oac.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Set up logging, configuration, storage and the app
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It builds one [`App`] per process, which plays the
//! part of one page load, and dispatches to [`commands`] which call the app.
//! Async work runs on a tokio runtime created here.

pub mod args;
pub mod commands;

pub use args::{Cli, Command, ExpireTarget};

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::App;
use crate::core::config::Config;
use crate::navigation::{Navigator, PrintNavigator, SystemBrowser};
use crate::storage::{create_store, AppStorage};
use crate::ui::output::Verbosity;

/// Shared state for command handlers.
pub struct Context<'a> {
    /// The running app
    pub app: &'a App,
    /// Output verbosity
    pub verbosity: Verbosity,
    /// Config file in use, if any
    pub config_path: Option<PathBuf>,
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    let verbosity = Verbosity::from_flags(cli.quiet, cli.debug);
    init_tracing(verbosity);

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    let store = create_store(
        config.storage_provider(),
        config.storage_path().map(|p| p.to_path_buf()),
    )
    .context("failed to open storage")?;
    let storage = AppStorage::new(store);

    let navigator: Arc<dyn Navigator> = if cli.no_browser {
        Arc::new(PrintNavigator)
    } else {
        Arc::new(SystemBrowser)
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let app = App::initialise(&config, storage, navigator)
            .await
            .context("failed to start the app")?;

        let ctx = Context {
            app: &app,
            verbosity,
            config_path: config.loaded_from().map(|p| p.to_path_buf()),
        };

        commands::dispatch(cli.command, &ctx).await
    })
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the verbosity flags when set.
fn init_tracing(verbosity: Verbosity) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(verbosity.log_filter()));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}
