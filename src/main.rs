//! Interactive and one-shot client for the Elasticsearch REST API.
//!
//! - `elasticsearch-cli get _cat/indices` performs one request and exits
//! - `elasticsearch-cli` starts a REPL with history, a prompt coloured by
//!   cluster health, and tab completion of API paths and index names
//!   (indices are rediscovered every `--poll-interval` seconds)
//!
//! Logs go to stderr; `RUST_LOG` overrides the default level.

mod app;
mod cli;
mod client;
mod config;
mod poller;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app::Application;
use crate::config::{Cli, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (settings, config_file) = Settings::load(cli).context("failed to load configuration")?;

    init_tracing(settings.verbose);
    if let Some(path) = config_file {
        info!(path = %path.display(), "using cluster config file");
    }

    let mut app = Application::new(&settings)?;
    if settings.args.is_empty() {
        app.interactive().await
    } else {
        app.handle_cli(&settings.args).await
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "warn,elasticsearch_cli=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
