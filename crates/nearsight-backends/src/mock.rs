//! Mock backend for exercising the dispatcher without a network.
//!
//! Replies are canned per query text and may be delayed, which lets tests
//! make an older query finish after a newer one.

use core::num::NonZeroUsize;
use core::result::Result as StdResult;
use core::time::Duration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nearsight_core::{Error, IgnoreLock as _, Query, Result, ResultSet, SearchBackend};
use tokio::time::sleep;

/// Failure a mock reply produces instead of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Behave like a refused connection.
    Network,
    /// Behave like a non-success status.
    Backend,
}

impl MockFailure {
    /// Builds the matching error.
    fn into_error(self, query: &Query) -> Error {
        match self {
            Self::Network => Error::Network(format!("mock connection refused for {query}")),
            Self::Backend => Error::Backend(format!("mock 500 for {query}")),
        }
    }
}

/// Canned reply for one query.
#[derive(Debug, Clone)]
struct MockReply {
    /// Results or failure.
    outcome: StdResult<ResultSet, MockFailure>,
    /// Time to wait before answering.
    delay: Duration,
}

/// Reply storage type
type ReplyMap = Arc<Mutex<HashMap<String, MockReply>>>;

/// Backend that answers from a table of canned replies.
#[derive(Clone, Default)]
pub struct MockBackend {
    /// Replies keyed by exact query text
    replies: ReplyMap,
    /// Queries seen, in call order
    call_history: Arc<Mutex<Vec<String>>>,
    /// Reported availability
    unavailable: bool,
}

impl MockBackend {
    /// Create a mock with no canned replies; unknown queries return no matches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `query` with `results` immediately.
    #[must_use]
    pub fn with_results(self, query: impl Into<String>, results: ResultSet) -> Self {
        self.insert(query.into(), Ok(results), Duration::ZERO)
    }

    /// Answer `query` with `results` after `delay`.
    #[must_use]
    pub fn with_delayed_results(
        self,
        query: impl Into<String>,
        results: ResultSet,
        delay: Duration,
    ) -> Self {
        self.insert(query.into(), Ok(results), delay)
    }

    /// Fail `query` with `failure`.
    #[must_use]
    pub fn with_failure(self, query: impl Into<String>, failure: MockFailure) -> Self {
        self.insert(query.into(), Err(failure), Duration::ZERO)
    }

    /// Report the backend as unavailable.
    #[must_use]
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Get the call history (list of all queries made).
    #[must_use]
    pub fn get_call_history(&self) -> Vec<String> {
        self.call_history.lock_ignore_poison().clone()
    }

    /// Get the number of calls made.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_history.lock_ignore_poison().len()
    }

    fn insert(
        self,
        query: String,
        outcome: StdResult<ResultSet, MockFailure>,
        delay: Duration,
    ) -> Self {
        self.replies
            .lock_ignore_poison()
            .insert(query, MockReply { outcome, delay });
        self
    }
}

#[async_trait]
impl SearchBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn is_available(&self) -> bool {
        !self.unavailable
    }

    async fn near_text(&self, query: &Query, limit: NonZeroUsize) -> Result<ResultSet> {
        self.call_history
            .lock_ignore_poison()
            .push(query.text.clone());

        let reply = self.replies.lock_ignore_poison().get(&query.text).cloned();
        let Some(reply) = reply else {
            return Ok(ResultSet::empty());
        };

        if !reply.delay.is_zero() {
            sleep(reply.delay).await;
        }

        match reply.outcome {
            Ok(results) => Ok(results.into_vec().into_iter().take(limit.get()).collect()),
            Err(failure) => Err(failure.into_error(query)),
        }
    }
}
