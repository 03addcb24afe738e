//! Metadata provider integration.
//!
//! The provider answers two kinds of listing: the default "popular" listing
//! shown before the user types anything, and a keyword search. TMDB is the
//! only implementation; tests use `testing::MockMovieCatalog`.

mod tmdb;
mod types;

pub use tmdb::{TmdbClient, TmdbConfig};
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

/// Image base used for poster URLs when the provider does not override it.
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p";

/// Poster size stored with search records and shown on cards.
pub const POSTER_SIZE: &str = "w500";

/// Errors that can occur when talking to the metadata provider.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded, please wait before retrying")]
    RateLimitExceeded,

    /// API returned a non-success status.
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// The response arrived but the provider flagged it as a failure.
    #[error("Provider rejected the request: {}", .message.as_deref().unwrap_or("no message"))]
    Rejected { message: Option<String> },

    /// Client not configured (missing or invalid API key).
    #[error("Client not configured: {0}")]
    NotConfigured(String),
}

/// A movie listing source.
#[async_trait]
pub trait MovieCatalog: Send + Sync {
    /// Run a listing request.
    async fn fetch(&self, query: &CatalogQuery) -> Result<Vec<CatalogItem>, CatalogError>;

    /// Base URL for poster images.
    fn image_base_url(&self) -> &str {
        DEFAULT_IMAGE_BASE_URL
    }

    /// Absolute poster URL for an item, if it has a poster.
    fn poster_url(&self, item: &CatalogItem) -> Option<String> {
        item.poster_path
            .as_deref()
            .map(|path| poster_url(self.image_base_url(), path))
    }
}

/// Join an image base and a provider poster path.
pub fn poster_url(image_base_url: &str, poster_path: &str) -> String {
    let base = image_base_url.trim_end_matches('/');
    let path = poster_path.trim_start_matches('/');
    format!("{}/{}/{}", base, POSTER_SIZE, path)
}
