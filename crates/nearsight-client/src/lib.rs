//! Search and retrieval client.
//!
//! - [`QueryDispatcher`] sends a query to whichever [`nearsight_core::SearchBackend`]
//!   is configured and never fails past its boundary: errors become an empty result set.
//! - [`SearchSession`] is the single source of truth for one UI. Every submit takes
//!   a [`DispatchToken`] and only the latest token's result is applied.
//! - [`AssetRetriever`] turns a match into a displayable reference and downloads
//!   originals through a [`StagedBlob`] that is released exactly once. It also
//!   uploads local images to the gateway.

/// Transient staging of downloaded bytes and save targets.
pub mod blob;
/// Query dispatch with failure degradation.
pub mod dispatcher;
/// `Content-Disposition` parsing and filename hygiene.
pub mod filename;
/// Display references and the download flow.
pub mod retriever;
/// Search state machine with stale-response suppression.
pub mod session;
/// Reading local files for multipart upload.
pub mod upload;

pub use blob::{DirectoryTarget, SaveTarget, StagedBlob};
pub use dispatcher::QueryDispatcher;
pub use filename::{fallback_filename, parse_content_disposition, sanitize_filename};
pub use retriever::{AssetRetriever, DownloadReport, DownloadState};
pub use session::{DispatchToken, SearchSession, SearchState, SubmitOutcome};
pub use upload::{UploadFile, collect_uploads};
