//! Line-oriented search loop.

use std::sync::Arc;

use anyhow::Result;
use nearsight_client::{AssetRetriever, DirectoryTarget, SearchSession, SubmitOutcome};
use nearsight_core::{ClientConfig, Query};
use tokio::io::{self as async_io, AsyncBufReadExt as _, AsyncWriteExt as _, BufReader};
use tokio::task::JoinSet;

use crate::handlers::{build_dispatcher, render_results};

/// What one input line asks for.
#[derive(Debug, PartialEq, Eq)]
enum ReplCommand {
    /// Search for the text.
    Search(Query),
    /// Save the current top match.
    Download,
    /// Leave the loop.
    Quit,
    /// Unrecognized `:` command.
    Unknown(String),
    /// Nothing typed.
    Blank,
}

fn parse_line(line: &str) -> ReplCommand {
    let line = line.trim();
    match line {
        "" => ReplCommand::Blank,
        ":quit" | ":q" => ReplCommand::Quit,
        ":download" | ":d" => ReplCommand::Download,
        command if command.starts_with(':') => ReplCommand::Unknown(command.to_owned()),
        text => ReplCommand::Search(Query::new(text)),
    }
}

async fn emit(text: &str) -> Result<()> {
    let mut stdout = async_io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

/// Reads queries from stdin until `:quit` or end of input.
///
/// Each query runs as its own task; only the newest query's results are printed.
///
/// # Errors
/// Returns an error if the backend cannot be built or stdio fails
pub async fn run_interactive(config: &ClientConfig) -> Result<()> {
    let session = Arc::new(SearchSession::new(build_dispatcher(config)?));
    let retriever = Arc::new(AssetRetriever::from_config(&config.backend)?);
    let target = DirectoryTarget::new(config.download.output_dir.clone());
    let mut searches = JoinSet::new();

    tracing::debug!(
        backend = session.dispatcher().backend_name(),
        "interactive session started"
    );

    let mut lines = BufReader::new(async_io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            ReplCommand::Blank => {}
            ReplCommand::Quit => break,
            ReplCommand::Unknown(command) => {
                emit(&format!("unknown command {command}; try :download or :quit\n")).await?;
            }
            ReplCommand::Download => match session.top() {
                Some(record) => match retriever.download_original(record.id(), &target).await {
                    Ok(report) => emit(&format!("saved {}\n", report.saved_to.display())).await?,
                    Err(error) => emit(&format!("download failed: {error}\n")).await?,
                },
                None => emit("nothing to download\n").await?,
            },
            ReplCommand::Search(query) => {
                let session = Arc::clone(&session);
                let retriever = Arc::clone(&retriever);
                searches.spawn(async move {
                    if let SubmitOutcome::Applied(token) = session.submit(&query).await {
                        let state = session.state();
                        if state.token() == Some(token) {
                            let rendered = render_results(&state.results(), &retriever);
                            if let Err(error) = emit(&rendered).await {
                                tracing::warn!(%error, "failed to print results");
                            }
                        }
                    }
                });
            }
        }
    }

    while searches.join_next().await.is_some() {}
    Ok(())
}
