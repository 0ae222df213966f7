//! Command handlers for CLI operations

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use nearsight_client::{AssetRetriever, DirectoryTarget, QueryDispatcher};
use nearsight_core::{AssetId, ClientConfig, Query, ResultSet};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

use crate::cli::ConfigArgs;

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "nearsight_client=info,nearsight_backends=info";

/// Line printed when a search yields nothing.
pub const NO_MATCHES: &str = "no matches";

/// Routes logs to stderr so stdout carries only command output.
pub fn init_tracing() {
    Registry::default()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .init();
}

/// Config file named by `--config`, else `~/.nearsight/config.toml`.
///
/// # Errors
/// Returns an error if no path was given and the home directory is unknown
pub fn config_file(args: &ConfigArgs) -> Result<PathBuf> {
    match &args.config {
        Some(path) => Ok(path.clone()),
        None => Ok(ClientConfig::config_path()?),
    }
}

/// Loads the config file, then applies environment and flag overrides.
///
/// A missing file means defaults; nothing is written.
///
/// # Errors
/// Returns an error if an explicitly given config file cannot be read or any
/// override is invalid
pub fn resolve_config(args: &ConfigArgs) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load_or_default(path)?,
        None => ClientConfig::config_path()
            .and_then(|path| ClientConfig::load_or_default(&path))
            .unwrap_or_else(|error| {
                tracing::warn!("Failed to load config from ~/.nearsight/config.toml: {error}");
                tracing::warn!("Using default configuration");
                ClientConfig::default()
            }),
    };

    config.apply_env()?;
    args.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Builds the dispatcher for the configured protocol.
///
/// # Errors
/// Returns an error if the backend configuration is invalid
pub fn build_dispatcher(config: &ClientConfig) -> Result<QueryDispatcher> {
    let backend = nearsight_backends::from_config(&config.backend, config.render)?;
    Ok(QueryDispatcher::new(backend).with_limit(config.backend.limit))
}

/// One `<id>\t<display reference>` line per match, or [`NO_MATCHES`].
pub fn render_results(results: &ResultSet, retriever: &AssetRetriever) -> String {
    if results.is_empty() {
        return format!("{NO_MATCHES}\n");
    }
    results
        .iter()
        .map(|record| format!("{}\t{}\n", record.id(), retriever.display(record)))
        .collect()
}

/// Handle `search`
///
/// # Errors
/// Returns an error if the backend cannot be built or stdout cannot be written.
/// Search failures are not errors; they print [`NO_MATCHES`].
pub async fn handle_search(
    config: &ClientConfig,
    words: &[String],
    out: &mut impl Write,
) -> Result<()> {
    let dispatcher = build_dispatcher(config)?;
    let retriever = AssetRetriever::from_config(&config.backend)?;

    let results = dispatcher.search(&Query::new(words.join(" "))).await;
    out.write_all(render_results(&results, &retriever).as_bytes())?;
    Ok(())
}

/// Handle `download`
///
/// # Errors
/// Returns an error if the asset cannot be fetched or saved
pub async fn handle_download(
    config: &ClientConfig,
    id: &str,
    out_dir: Option<PathBuf>,
    out: &mut impl Write,
) -> Result<()> {
    let retriever = AssetRetriever::from_config(&config.backend)?;
    let target =
        DirectoryTarget::new(out_dir.unwrap_or_else(|| config.download.output_dir.clone()));

    let report = retriever
        .download_original(&AssetId::new(id), &target)
        .await?;
    writeln!(out, "{}", report.saved_to.display())?;
    Ok(())
}

/// Handle `upload`
///
/// Prints one assigned id per line, in upload order.
///
/// # Errors
/// Returns an error if a file cannot be read or the gateway rejects the upload
pub async fn handle_upload(
    config: &ClientConfig,
    paths: &[PathBuf],
    out: &mut impl Write,
) -> Result<()> {
    let retriever = AssetRetriever::from_config(&config.backend)?;
    for id in retriever.upload(paths).await? {
        writeln!(out, "{id}")?;
    }
    Ok(())
}

/// Handle `config`
///
/// Writes the default config to `file` if nothing is there yet, then prints the
/// effective configuration.
///
/// # Errors
/// Returns an error if the config cannot be serialized or written
pub fn handle_config(config: &ClientConfig, file: &Path, out: &mut impl Write) -> Result<()> {
    ClientConfig::load_or_create(file)?;
    out.write_all(config.to_toml()?.as_bytes())?;
    Ok(())
}
