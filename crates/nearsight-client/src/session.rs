use core::fmt;
use std::sync::Mutex;

use nearsight_core::{IgnoreLock as _, MatchRecord, Query, ResultSet};

use crate::QueryDispatcher;

/// Sequence number taken when a query is dispatched; later dispatches get larger tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DispatchToken(u64);

impl DispatchToken {
    /// Raw sequence number.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DispatchToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "#{}", self.0)
    }
}

/// What the UI currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchState {
    /// Nothing submitted yet.
    #[default]
    Idle,
    /// Waiting for the response to `query`.
    Loading {
        /// Token of the in-flight dispatch
        token: DispatchToken,
        /// Query being searched
        query: Query,
    },
    /// Results for `query` arrived.
    Loaded {
        /// Token of the dispatch that produced the results
        token: DispatchToken,
        /// Query searched
        query: Query,
        /// Matches in relevance order
        results: ResultSet,
    },
    /// The search for `query` failed; there are no results to show.
    Failed {
        /// Token of the failed dispatch
        token: DispatchToken,
        /// Query searched
        query: Query,
        /// Diagnostic for the error channel
        reason: String,
    },
}

impl SearchState {
    /// Token of the dispatch this state belongs to.
    pub fn token(&self) -> Option<DispatchToken> {
        match self {
            Self::Idle => None,
            Self::Loading { token, .. } | Self::Loaded { token, .. } | Self::Failed { token, .. } => {
                Some(*token)
            }
        }
    }

    /// Results to render; empty unless loaded.
    pub fn results(&self) -> ResultSet {
        match self {
            Self::Loaded { results, .. } => results.clone(),
            Self::Idle | Self::Loading { .. } | Self::Failed { .. } => ResultSet::empty(),
        }
    }
}

/// Result of [`SearchSession::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The response was the latest and now drives the state.
    Applied(DispatchToken),
    /// A newer query was submitted meanwhile; the response was discarded.
    Stale(DispatchToken),
    /// The query was blank; nothing was dispatched and the state is unchanged.
    Ignored,
}

/// Guarded session data; the latest token and the state change together.
#[derive(Debug, Default)]
struct Inner {
    /// Last token issued
    latest: u64,
    /// Current state
    state: SearchState,
}

/// Search state for one UI, applying only the newest query's response.
pub struct SearchSession {
    /// Dispatcher performing the searches
    dispatcher: QueryDispatcher,
    /// Token counter and state
    inner: Mutex<Inner>,
}

impl SearchSession {
    /// Creates an idle session.
    pub fn new(dispatcher: QueryDispatcher) -> Self {
        Self {
            dispatcher,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Dispatcher used by this session.
    pub fn dispatcher(&self) -> &QueryDispatcher {
        &self.dispatcher
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SearchState {
        self.inner.lock_ignore_poison().state.clone()
    }

    /// Results currently shown; empty unless the latest search succeeded.
    pub fn results(&self) -> ResultSet {
        self.inner.lock_ignore_poison().state.results()
    }

    /// Most relevant match currently shown.
    pub fn top(&self) -> Option<MatchRecord> {
        self.results().into_vec().into_iter().next()
    }

    /// Token of the most recent dispatch, if any.
    pub fn latest_token(&self) -> Option<DispatchToken> {
        let inner = self.inner.lock_ignore_poison();
        (inner.latest > 0).then_some(DispatchToken(inner.latest))
    }

    /// Submits a query and applies its outcome if no newer query was submitted meanwhile.
    ///
    /// Dropping the returned future abandons the search; the state stays `Loading`
    /// for that token until the next submit replaces it.
    pub async fn submit(&self, query: &Query) -> SubmitOutcome {
        if query.is_blank() {
            tracing::debug!("blank query ignored");
            return SubmitOutcome::Ignored;
        }

        let token = self.begin(query);
        let outcome = self.dispatcher.try_search(query).await;

        let mut inner = self.inner.lock_ignore_poison();
        if inner.latest != token.0 {
            tracing::debug!(
                %token,
                latest = inner.latest,
                query = %query,
                "discarding stale search response"
            );
            return SubmitOutcome::Stale(token);
        }

        inner.state = match outcome {
            Ok(results) => SearchState::Loaded {
                token,
                query: query.clone(),
                results,
            },
            Err(error) => {
                tracing::warn!(
                    %token,
                    query = %query,
                    kind = error.kind(),
                    %error,
                    "search failed, clearing results"
                );
                SearchState::Failed {
                    token,
                    query: query.clone(),
                    reason: error.to_string(),
                }
            }
        };
        drop(inner);
        SubmitOutcome::Applied(token)
    }

    /// Issues the next token and enters `Loading`.
    fn begin(&self, query: &Query) -> DispatchToken {
        let mut inner = self.inner.lock_ignore_poison();
        inner.latest += 1;
        let token = DispatchToken(inner.latest);
        inner.state = SearchState::Loading {
            token,
            query: query.clone(),
        };
        tracing::debug!(%token, query = %query, "search dispatched");
        token
    }
}
