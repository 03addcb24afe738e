//! Remote document store access.
//!
//! The store is consumed as a generic collection of JSON documents with a
//! tiny query vocabulary (`equal`, `orderDesc`, `limit`). Search counting
//! lives one level up in `analytics`; nothing here knows about search terms.

mod appwrite;
mod sqlite;
mod types;

pub use appwrite::{AppwriteConfig, AppwriteStore};
pub use sqlite::{SqliteDocumentStore, SqliteStoreConfig};
pub use types::*;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{StoreBackend, StoreConfig};

/// Errors from document store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Store API returned a non-success status.
    #[error("Store API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Document not found.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// A document with the same ID already exists.
    #[error("Document already exists: {0}")]
    Conflict(String),

    /// Failed to parse a store response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// A document lacks a field the caller needs.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Local database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Store not configured.
    #[error("Store not configured: {0}")]
    NotConfigured(String),
}

impl StoreError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HttpError(_) => "http",
            Self::ApiError { .. } => "api",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::ParseError(_) => "parse",
            Self::InvalidDocument(_) => "invalid_document",
            Self::Database(_) => "database",
            Self::NotConfigured(_) => "not_configured",
        }
    }
}

/// A collection of JSON documents.
///
/// Implementations address a single collection; the database/collection
/// identifiers are part of their configuration.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// List documents matching all `queries`, in the order the queries ask for.
    /// Without an order query the store's default order applies.
    async fn list_documents(&self, queries: &[Query]) -> Result<DocumentList, StoreError>;

    /// Create a document with the given ID.
    async fn create_document(
        &self,
        document_id: &str,
        data: DocumentData,
    ) -> Result<Document, StoreError>;

    /// Merge `data` into an existing document.
    async fn update_document(
        &self,
        document_id: &str,
        data: DocumentData,
    ) -> Result<Document, StoreError>;

    /// Backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Build the configured backend.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match config.backend {
        StoreBackend::Appwrite => {
            let appwrite = config.appwrite.clone().ok_or_else(|| {
                StoreError::NotConfigured("[store.appwrite] section is missing".to_string())
            })?;
            Ok(Arc::new(AppwriteStore::new(appwrite)?))
        }
        StoreBackend::Sqlite => {
            let sqlite = config.sqlite.as_ref().ok_or_else(|| {
                StoreError::NotConfigured("[store.sqlite] section is missing".to_string())
            })?;
            Ok(Arc::new(SqliteDocumentStore::new(&sqlite.path)?))
        }
    }
}

/// Generate a fresh document ID.
pub fn unique_id() -> String {
    // Appwrite IDs: at most 36 chars of [a-zA-Z0-9._-], not starting with a special char
    uuid::Uuid::new_v4().simple().to_string()
}
