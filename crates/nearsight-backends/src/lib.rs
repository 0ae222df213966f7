//! Search backend adapters for the two near-text protocols.

/// In-memory backend with canned results for tests.
pub mod mock;
/// Plain REST gateway returning asset identifiers.
pub mod rest;
/// Near-text query builder against the vector search service.
pub mod structured;

use std::sync::Arc;

use nearsight_core::{BackendConfig, Protocol, RenderConfig, Result, SearchBackend};

pub use mock::{MockBackend, MockFailure};
pub use rest::RestBackend;
pub use structured::{NearTextQuery, StructuredBackend};

/// Builds the backend selected by `config.protocol`.
///
/// # Errors
/// Returns an error if the configured URLs or collection name are invalid.
pub fn from_config(config: &BackendConfig, render: RenderConfig) -> Result<Arc<dyn SearchBackend>> {
    let backend: Arc<dyn SearchBackend> = match config.protocol {
        Protocol::Structured => Arc::new(StructuredBackend::from_config(config)?),
        Protocol::Rest => Arc::new(RestBackend::from_config(config, render)?),
    };
    tracing::debug!(backend = backend.name(), "search backend selected");
    Ok(backend)
}
