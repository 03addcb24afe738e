//! Mock movie catalog for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::provider::{CatalogError, CatalogItem, CatalogQuery, MovieCatalog};

/// Mock implementation of the MovieCatalog trait.
///
/// Provides controllable behavior for testing:
/// - Popular listing and keyword search over a configurable movie list
/// - Track requests for assertions
/// - Simulate transport failures, provider rejections and slow responses
///
/// # Example
///
/// ```rust,ignore
/// use cinetrend_core::testing::{MockMovieCatalog, fixtures};
///
/// let catalog = MockMovieCatalog::new();
/// catalog.set_movies(vec![fixtures::dune()]).await;
///
/// let items = catalog.fetch(&CatalogQuery::Keyword("dune".into())).await?;
/// assert_eq!(items.len(), 1);
/// assert_eq!(catalog.recorded_queries().await.len(), 1);
/// ```
#[derive(Debug)]
pub struct MockMovieCatalog {
    /// Movies in popularity order.
    movies: Arc<RwLock<Vec<CatalogItem>>>,
    /// Recorded requests.
    queries: Arc<RwLock<Vec<CatalogQuery>>>,
    /// If set, the next request will fail with this error.
    next_error: Arc<RwLock<Option<CatalogError>>>,
    /// Response delay per raw input ("" for the popular listing).
    delays: Arc<RwLock<HashMap<String, Duration>>>,
}

impl Default for MockMovieCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMovieCatalog {
    /// Create a new empty mock catalog.
    pub fn new() -> Self {
        Self {
            movies: Arc::new(RwLock::new(Vec::new())),
            queries: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            delays: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Replace the movie list.
    pub async fn set_movies(&self, movies: Vec<CatalogItem>) {
        *self.movies.write().await = movies;
    }

    /// Add a movie at the end of the popularity order.
    pub async fn add_movie(&self, movie: CatalogItem) {
        self.movies.write().await.push(movie);
    }

    /// Delay responses for `input` ("" for the popular listing).
    pub async fn set_delay(&self, input: &str, delay: Duration) {
        self.delays.write().await.insert(input.to_string(), delay);
    }

    // =========================================================================
    // Request Recording
    // =========================================================================

    /// Get all recorded requests.
    pub async fn recorded_queries(&self) -> Vec<CatalogQuery> {
        self.queries.read().await.clone()
    }

    /// Get the number of requests performed.
    pub async fn query_count(&self) -> usize {
        self.queries.read().await.len()
    }

    // =========================================================================
    // Error Injection
    // =========================================================================

    /// Configure the next request to fail with the given error.
    pub async fn set_next_error(&self, error: CatalogError) {
        *self.next_error.write().await = Some(error);
    }

    /// Configure the next request to come back flagged as failed by the provider.
    pub async fn reject_next(&self, message: Option<&str>) {
        self.set_next_error(CatalogError::Rejected {
            message: message.map(String::from),
        })
        .await;
    }

    /// Clear any pending error.
    pub async fn clear_next_error(&self) {
        *self.next_error.write().await = None;
    }
}

#[async_trait]
impl MovieCatalog for MockMovieCatalog {
    async fn fetch(&self, query: &CatalogQuery) -> Result<Vec<CatalogItem>, CatalogError> {
        self.queries.write().await.push(query.clone());

        let (input, needle) = match query {
            CatalogQuery::Popular => (String::new(), None),
            CatalogQuery::Keyword(term) => (term.clone(), Some(term.to_lowercase())),
        };

        // Error is taken at request time, before any delay
        let error = self.next_error.write().await.take();

        let delay = self.delays.read().await.get(&input).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = error {
            return Err(err);
        }

        let movies = self.movies.read().await;
        let results = match needle {
            None => movies.clone(),
            Some(needle) => movies
                .iter()
                .filter(|m| m.title.to_lowercase().contains(&needle))
                .cloned()
                .collect(),
        };

        Ok(results)
    }
}
