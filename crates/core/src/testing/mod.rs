//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the two external service
//! traits, allowing the whole search pipeline to be exercised without a
//! metadata provider or a document store.
//!
//! # Example
//!
//! ```rust,ignore
//! use cinetrend_core::testing::{fixtures, MockDocumentStore, MockMovieCatalog};
//!
//! let catalog = MockMovieCatalog::new();
//! let store = MockDocumentStore::new();
//!
//! // Configure mock responses
//! catalog.set_movies(vec![fixtures::dune()]).await;
//! store.insert_raw("doc-1", "alien", 3).await;
//!
//! // Use in a QueryController or SearchSession...
//! ```

mod mock_document_store;
mod mock_movie_catalog;

pub use mock_document_store::MockDocumentStore;
pub use mock_movie_catalog::MockMovieCatalog;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::provider::CatalogItem;

    /// Create a test movie with reasonable defaults.
    pub fn movie(id: u64, title: &str, year: u32) -> CatalogItem {
        CatalogItem {
            id,
            title: title.to_string(),
            poster_path: Some(format!("/{}.jpg", title.to_lowercase().replace(' ', "-"))),
            release_date: Some(format!("{}-06-15", year)),
            original_language: Some("en".to_string()),
            vote_average: Some(7.5),
            popularity: Some(100.0),
            overview: Some(format!("A movie about {}.", title.to_lowercase())),
            vote_count: Some(1000),
        }
    }

    /// Dune (2021).
    pub fn dune() -> CatalogItem {
        CatalogItem {
            poster_path: Some("/d5NXSklXo0qyIYkgV94XAgMIckC.jpg".to_string()),
            vote_average: Some(7.8),
            ..movie(438631, "Dune", 2021)
        }
    }

    /// A small popular listing with Dune first.
    pub fn popular_movies() -> Vec<CatalogItem> {
        vec![
            dune(),
            movie(348, "Alien", 1979),
            movie(949, "Heat", 1995),
            movie(693134, "Dune: Part Two", 2024),
        ]
    }
}
