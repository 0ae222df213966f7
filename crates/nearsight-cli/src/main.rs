//! Nearsight CLI - search an image collection by text and download originals
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        reason = "Allow for tests"
    )
)]

use std::io;

use anyhow::Result;
use clap::Parser as _;
use cli::{Cli, Commands};

mod cli;
mod handlers;
mod interactive;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    handlers::init_tracing();

    let config = handlers::resolve_config(&cli.options)?;
    let mut stdout = io::stdout();

    match cli.command {
        Commands::Search { query } => handlers::handle_search(&config, &query, &mut stdout).await,
        Commands::Download { id, out } => {
            handlers::handle_download(&config, &id, out, &mut stdout).await
        }
        Commands::Upload { paths } => handlers::handle_upload(&config, &paths, &mut stdout).await,
        Commands::Interactive => interactive::run_interactive(&config).await,
        Commands::Config => {
            let file = handlers::config_file(&cli.options)?;
            handlers::handle_config(&config, &file, &mut stdout)
        }
    }
}
