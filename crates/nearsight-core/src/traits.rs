use core::num::NonZeroUsize;

use async_trait::async_trait;

use crate::{Query, Result, ResultSet};

/// A vector search service that answers near-text queries.
///
/// Implementations normalize their wire format into a [`ResultSet`] and report
/// failures as errors; degrading failures into "no matches" is the caller's job.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Returns the unique identifier for this backend.
    fn name(&self) -> &'static str;

    /// Checks whether the backend is reachable and reports itself live.
    async fn is_available(&self) -> bool;

    /// Finds at most `limit` assets closest to `query`, most similar first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Network`] if the request cannot be sent or its body
    /// cannot be read, and [`crate::Error::Backend`] for non-success statuses or
    /// malformed envelopes.
    async fn near_text(&self, query: &Query, limit: NonZeroUsize) -> Result<ResultSet>;
}
