//! Search counting on top of a [`DocumentStore`].
//!
//! Every successful keyword search bumps a per-term counter document; the
//! trending list is the top of those counters.
//!
//! `record_occurrence` is a read-then-write and is not transactional. Two
//! sessions recording the same term at the same time can both read `count = N`
//! and both write `N + 1`. Counts are therefore approximate (never decreasing,
//! possibly under-counted), which is enough for a popularity ranking.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::metrics::STORE_OPERATIONS;
use crate::store::{unique_id, Document, DocumentData, DocumentStore, Query, StoreError};

/// Size of the trending list.
pub const TRENDING_LIMIT: usize = 5;

/// Field names of a search record document.
pub mod fields {
    pub const SEARCH_TERM: &str = "searchTerm";
    pub const COUNT: &str = "count";
    pub const MOVIE_ID: &str = "movie_id";
    pub const POSTER_URL: &str = "poster_url";
}

/// Per-term search counter as stored remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    /// Store document ID.
    pub document_id: String,
    /// The searched term (unique per record).
    pub search_term: String,
    /// Number of recorded searches (>= 1).
    pub count: u64,
    /// Provider ID of the top result when the record was created.
    pub movie_id: u64,
    /// Poster of that result.
    pub poster_url: String,
}

impl TryFrom<Document> for SearchRecord {
    type Error = StoreError;

    fn try_from(document: Document) -> Result<Self, Self::Error> {
        let invalid = |what: &str| {
            StoreError::InvalidDocument(format!("{}: {}", document.id, what))
        };

        let search_term = document
            .get_str(fields::SEARCH_TERM)
            .ok_or_else(|| invalid("missing searchTerm"))?
            .to_string();
        let count = document
            .data
            .get(fields::COUNT)
            .and_then(Value::as_u64)
            .ok_or_else(|| invalid("missing or negative count"))?;
        let movie_id = document
            .data
            .get(fields::MOVIE_ID)
            .and_then(Value::as_u64)
            .ok_or_else(|| invalid("missing movie_id"))?;
        let poster_url = document
            .get_str(fields::POSTER_URL)
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            document_id: document.id,
            search_term,
            count,
            movie_id,
            poster_url,
        })
    }
}

/// What `record_occurrence` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// First search for the term; a record with count 1 was created.
    Created,
    /// Existing record updated to this count.
    Incremented { count: u64 },
}

/// Search counting client.
#[derive(Clone)]
pub struct SearchAnalytics {
    store: Arc<dyn DocumentStore>,
}

impl SearchAnalytics {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Count one search for `term`, creating its record on first use.
    pub async fn record_occurrence(
        &self,
        term: &str,
        movie_id: u64,
        poster_url: &str,
    ) -> Result<RecordOutcome, StoreError> {
        let existing = observe(
            "list",
            self.store
                .list_documents(&[Query::equal(fields::SEARCH_TERM, term)])
                .await,
        )?;

        if existing.documents.len() > 1 {
            warn!(
                "{} records share search term {:?}; updating the first",
                existing.documents.len(),
                term
            );
        }

        match existing.documents.into_iter().next() {
            Some(document) => {
                let current = document
                    .data
                    .get(fields::COUNT)
                    .and_then(Value::as_u64)
                    .ok_or_else(|| {
                        StoreError::InvalidDocument(format!("{}: missing count", document.id))
                    })?;
                let count = current + 1;

                observe(
                    "update",
                    self.store
                        .update_document(&document.id, object(json!({ fields::COUNT: count })))
                        .await,
                )?;

                debug!("Search count for {:?} is now {}", term, count);
                Ok(RecordOutcome::Incremented { count })
            }
            None => {
                let data = object(json!({
                    fields::SEARCH_TERM: term,
                    fields::COUNT: 1,
                    fields::MOVIE_ID: movie_id,
                    fields::POSTER_URL: poster_url,
                }));

                observe(
                    "create",
                    self.store.create_document(&unique_id(), data).await,
                )?;

                debug!("Created search record for {:?}", term);
                Ok(RecordOutcome::Created)
            }
        }
    }

    /// The most searched terms, highest count first.
    ///
    /// Equal counts keep the store's default order. Documents that do not
    /// parse as records are skipped after the store applied the limit, so a
    /// malformed document among the top five shortens the list rather than
    /// letting the sixth record in.
    pub async fn fetch_top_trending(&self) -> Result<Vec<SearchRecord>, StoreError> {
        let list = observe(
            "list",
            self.store
                .list_documents(&[
                    Query::limit(TRENDING_LIMIT),
                    Query::order_desc(fields::COUNT),
                ])
                .await,
        )?;

        let records = list
            .documents
            .into_iter()
            .filter_map(|document| match SearchRecord::try_from(document) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping malformed search record: {}", e);
                    None
                }
            })
            .take(TRENDING_LIMIT)
            .collect();

        Ok(records)
    }

    /// Backend name of the underlying store.
    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }
}

fn observe<T>(operation: &str, result: Result<T, StoreError>) -> Result<T, StoreError> {
    let outcome = match &result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    STORE_OPERATIONS
        .with_label_values(&[operation, outcome])
        .inc();
    result
}

fn object(value: Value) -> DocumentData {
    match value {
        Value::Object(map) => map,
        _ => DocumentData::new(),
    }
}
