//! Core types and traits for the nearsight search client.
//!
//! This crate provides the normalized result model, error taxonomy, backend
//! trait and configuration shared by the protocol adapters and the client.

/// Client configuration and loading.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Synchronization helpers.
pub mod sync;
/// Trait definitions for search backends.
pub mod traits;
/// Core data types for queries, matches, and downloads.
pub mod types;

pub use config::{
    BackendConfig, ClientConfig, DownloadConfig, Protocol, RenderConfig, join_endpoint,
    parse_base_url,
};
pub use error::{Error, Result};
pub use sync::IgnoreLock;
pub use traits::SearchBackend;
pub use types::{
    AssetId, DisplayRef, DownloadArtifact, FilenameSource, MatchRecord, Query, ResultSet,
};
