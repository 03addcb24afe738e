//! Query controller: turns settled queries into provider requests and
//! publishes the resulting [`QueryState`].
//!
//! Searches are never cancelled. Each one takes the next request id when it
//! starts, and only the most recently issued request may write results,
//! error or loading state. Responses that arrive for an older request are
//! discarded (their search is still recorded).
//!
//! Recording runs as a detached task. Its failures are logged and never
//! reach the published state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::analytics::{RecordOutcome, SearchAnalytics};
use crate::metrics::{
    PROVIDER_DURATION, RECORDINGS_TOTAL, SEARCHES_TOTAL, SEARCH_FAILURES, SEARCH_RESULTS,
    STALE_RESPONSES,
};
use crate::provider::{CatalogError, CatalogItem, CatalogQuery, MovieCatalog};

/// Shown for transport failures and non-success statuses.
pub const FETCH_ERROR_MESSAGE: &str = "Error fetching movies, please try again";

/// Shown when the provider flags a failure without a message.
pub const PROVIDER_ERROR_MESSAGE: &str = "Failed to fetch movies";

/// Why a search produced no results.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Transport failure or non-success status.
    #[error("Fetch failed: {0}")]
    Fetch(#[source] CatalogError),

    /// The provider answered but flagged the request as failed.
    #[error("Provider error: {}", .message.as_deref().unwrap_or(PROVIDER_ERROR_MESSAGE))]
    Provider { message: Option<String> },
}

impl From<CatalogError> for SearchError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Rejected { message } => Self::Provider { message },
            other => Self::Fetch(other),
        }
    }
}

impl SearchError {
    /// Message safe to show the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Fetch(_) => FETCH_ERROR_MESSAGE.to_string(),
            Self::Provider { message } => message
                .clone()
                .unwrap_or_else(|| PROVIDER_ERROR_MESSAGE.to_string()),
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::Provider { .. } => "provider",
        }
    }
}

/// Everything the presentation layer needs to render a search.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryState {
    /// What the user has typed so far.
    pub raw_input: String,
    /// The settled query of the latest search.
    pub debounced_query: String,
    pub results: Vec<CatalogItem>,
    pub is_loading: bool,
    pub error_message: Option<String>,
    /// Id of the search this state belongs to (0 before the first search).
    pub request_id: u64,
}

/// What a single `search` call did.
#[derive(Debug)]
pub struct SearchOutcome {
    pub request_id: u64,
    /// False when a newer search had started and this response was discarded.
    pub applied: bool,
    /// Number of results, or why there were none.
    pub result: Result<usize, SearchError>,
    /// Recording task, when the search was recorded.
    pub recording: Option<JoinHandle<()>>,
}

/// Drives searches and owns the query state.
pub struct QueryController {
    catalog: Arc<dyn MovieCatalog>,
    analytics: SearchAnalytics,
    state: watch::Sender<QueryState>,
    sequence: AtomicU64,
}

impl QueryController {
    pub fn new(catalog: Arc<dyn MovieCatalog>, analytics: SearchAnalytics) -> Self {
        let (state, _) = watch::channel(QueryState::default());
        Self {
            catalog,
            analytics,
            state,
            sequence: AtomicU64::new(0),
        }
    }

    /// Receive every state change.
    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.state.subscribe()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> QueryState {
        self.state.borrow().clone()
    }

    /// Track the raw (not yet settled) input.
    pub fn set_raw_input(&self, input: &str) {
        self.state.send_if_modified(|state| {
            if state.raw_input == input {
                return false;
            }
            state.raw_input = input.to_string();
            true
        });
    }

    /// Run one search for a settled query. The empty query asks for the
    /// popular listing.
    pub async fn search(&self, query: &str) -> SearchOutcome {
        let request_id = self.reserve_request_id();
        self.run_search(request_id, query).await
    }

    /// Take the next request id. Ids order searches by when they were
    /// issued, not by when their task first runs.
    pub fn reserve_request_id(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Run a search under an id obtained from [`Self::reserve_request_id`].
    pub async fn run_search(&self, request_id: u64, query: &str) -> SearchOutcome {
        let catalog_query = CatalogQuery::from_input(query);
        let mode = catalog_query.mode();

        SEARCHES_TOTAL.with_label_values(&[mode]).inc();
        debug!("Search #{} ({}) for {:?}", request_id, mode, query);

        self.state.send_if_modified(|state| {
            // A newer search may already have started
            if request_id < state.request_id {
                return false;
            }
            state.request_id = request_id;
            state.debounced_query = query.to_string();
            state.is_loading = true;
            state.error_message = None;
            true
        });
        let loading = LoadingGuard {
            state: &self.state,
            request_id,
        };

        let started = Instant::now();
        let fetched = self.catalog.fetch(&catalog_query).await;
        PROVIDER_DURATION
            .with_label_values(&[mode, if fetched.is_ok() { "success" } else { "error" }])
            .observe(started.elapsed().as_secs_f64());

        let result = fetched.map_err(SearchError::from);
        if let Err(e) = &result {
            SEARCH_FAILURES.with_label_values(&[e.kind()]).inc();
            warn!("Search #{} for {:?} failed: {}", request_id, query, e);
        }

        let applied = self.state.send_if_modified(|state| {
            if state.request_id != request_id {
                return false;
            }
            match &result {
                Ok(items) => {
                    state.results = items.clone();
                    state.error_message = None;
                }
                Err(e) => {
                    state.results.clear();
                    state.error_message = Some(e.user_message());
                }
            }
            true
        });
        if !applied {
            STALE_RESPONSES.inc();
            debug!(
                "Discarding response to search #{} for {:?}: newer search in flight",
                request_id, query
            );
        }

        let recording = match &result {
            Ok(items) => {
                SEARCH_RESULTS
                    .with_label_values(&[mode])
                    .observe(items.len() as f64);
                match (query.is_empty(), items.first()) {
                    (false, Some(top)) => Some(self.spawn_recording(query, top)),
                    _ => None,
                }
            }
            Err(_) => None,
        };

        drop(loading);

        SearchOutcome {
            request_id,
            applied,
            result: result.map(|items| items.len()),
            recording,
        }
    }

    fn spawn_recording(&self, term: &str, top: &CatalogItem) -> JoinHandle<()> {
        let analytics = self.analytics.clone();
        let term = term.to_string();
        let movie_id = top.id;
        let poster_url = self.catalog.poster_url(top).unwrap_or_default();

        tokio::spawn(async move {
            match analytics
                .record_occurrence(&term, movie_id, &poster_url)
                .await
            {
                Ok(RecordOutcome::Created) => {
                    RECORDINGS_TOTAL.with_label_values(&["created"]).inc();
                    info!("First search recorded for {:?}", term);
                }
                Ok(RecordOutcome::Incremented { count }) => {
                    RECORDINGS_TOTAL.with_label_values(&["incremented"]).inc();
                    debug!("Search for {:?} recorded (count {})", term, count);
                }
                Err(e) => {
                    RECORDINGS_TOTAL.with_label_values(&["failed"]).inc();
                    error!("Failed to record search for {:?}: {}", term, e);
                }
            }
        })
    }
}

/// Clears the loading flag when a search ends, including when its future
/// is dropped mid-request.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<QueryState>,
    request_id: u64,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let request_id = self.request_id;
        self.state.send_if_modified(|state| {
            if state.request_id != request_id || !state.is_loading {
                return false;
            }
            state.is_loading = false;
            true
        });
    }
}
