use core::num::NonZeroUsize;
use std::sync::Arc;

use nearsight_core::{Query, Result, ResultSet, SearchBackend};

/// Sends queries to a backend and normalizes failure into "no matches".
#[derive(Clone)]
pub struct QueryDispatcher {
    /// Backend answering the queries
    backend: Arc<dyn SearchBackend>,
    /// Maximum matches requested per query
    limit: NonZeroUsize,
}

impl QueryDispatcher {
    /// Creates a dispatcher with the default limit of one match.
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            backend,
            limit: NonZeroUsize::MIN,
        }
    }

    /// Sets the number of matches requested per query.
    #[must_use]
    pub fn with_limit(mut self, limit: NonZeroUsize) -> Self {
        self.limit = limit;
        self
    }

    /// Matches requested per query.
    pub fn limit(&self) -> NonZeroUsize {
        self.limit
    }

    /// Name of the underlying backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Whether the backend reports itself reachable.
    pub async fn is_available(&self) -> bool {
        self.backend.is_available().await
    }

    /// Searches and reports failures to the caller.
    ///
    /// A blank query resolves to an empty set without contacting the backend.
    ///
    /// # Errors
    /// Propagates the backend's network or backend error.
    pub async fn try_search(&self, query: &Query) -> Result<ResultSet> {
        if query.is_blank() {
            tracing::debug!("blank query, skipping dispatch");
            return Ok(ResultSet::empty());
        }

        let results = self.backend.near_text(query, self.limit).await?;
        tracing::debug!(
            backend = self.backend.name(),
            query = %query,
            matches = results.len(),
            "search completed"
        );
        Ok(results)
    }

    /// Searches, degrading any failure to an empty result set.
    pub async fn search(&self, query: &Query) -> ResultSet {
        match self.try_search(query).await {
            Ok(results) => results,
            Err(error) => {
                tracing::warn!(
                    backend = self.backend.name(),
                    query = %query,
                    kind = error.kind(),
                    %error,
                    "search failed, returning no matches"
                );
                ResultSet::empty()
            }
        }
    }
}
