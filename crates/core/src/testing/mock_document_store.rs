//! Mock document store for testing.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Barrier, RwLock};

use crate::store::{
    apply_queries, Document, DocumentData, DocumentList, DocumentStore, Query, StoreError,
};

/// Mock implementation of the DocumentStore trait.
///
/// Documents are kept in insertion order, which is the default order for
/// listing and for breaking ties when sorting.
///
/// Provides controllable behavior for testing:
/// - Inspect and seed stored documents
/// - Count create/update calls
/// - Simulate one-off or persistent failures and latency
/// - Hold concurrent list calls at a barrier to reproduce read-then-write races
#[derive(Debug)]
pub struct MockDocumentStore {
    documents: Arc<RwLock<Vec<Document>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<StoreError>>>,
    /// Fail every operation while set.
    failing: Arc<RwLock<bool>>,
    latency: Arc<RwLock<Option<Duration>>>,
    /// Barrier and the number of list calls still to hold at it.
    list_barrier: Arc<RwLock<Option<(Arc<Barrier>, usize)>>>,
    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

impl Default for MockDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDocumentStore {
    /// Create a new empty mock store.
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            failing: Arc::new(RwLock::new(false)),
            latency: Arc::new(RwLock::new(None)),
            list_barrier: Arc::new(RwLock::new(None)),
            list_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
        }
    }

    // =========================================================================
    // Seeding and Inspection
    // =========================================================================

    /// Append a document as-is.
    pub async fn insert_document(&self, document: Document) {
        self.documents.write().await.push(document);
    }

    /// Append a search record document.
    pub async fn insert_raw(&self, id: &str, term: &str, count: u64) {
        let Value::Object(data) = json!({
            "searchTerm": term,
            "count": count,
            "movie_id": 1,
            "poster_url": "",
        }) else {
            unreachable!()
        };
        self.insert_document(Document {
            id: id.to_string(),
            data,
        })
        .await;
    }

    /// All documents in insertion order.
    pub async fn documents(&self) -> Vec<Document> {
        self.documents.read().await.clone()
    }

    /// Find a document by the value of its `searchTerm` field.
    pub async fn find_by_term(&self, term: &str) -> Option<Document> {
        self.documents
            .read()
            .await
            .iter()
            .find(|d| d.get_str("searchTerm") == Some(term))
            .cloned()
    }

    pub async fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub async fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub async fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Behavior Control
    // =========================================================================

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: StoreError) {
        *self.next_error.write().await = Some(error);
    }

    /// Fail every operation until turned off.
    pub async fn set_failing(&self, failing: bool) {
        *self.failing.write().await = failing;
    }

    /// Delay every operation.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write().await = latency;
    }

    /// Make the next `parties` list calls wait for each other after reading.
    pub async fn set_list_barrier(&self, parties: usize) {
        *self.list_barrier.write().await = Some((Arc::new(Barrier::new(parties)), parties));
    }

    async fn begin(&self) -> Result<(), StoreError> {
        let latency = *self.latency.read().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        if *self.failing.read().await {
            return Err(StoreError::ApiError {
                status: 503,
                message: "store unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn take_barrier(&self) -> Option<Arc<Barrier>> {
        let mut slot = self.list_barrier.write().await;
        let (barrier, remaining) = slot.as_mut()?;
        let barrier = barrier.clone();
        *remaining -= 1;
        if *remaining == 0 {
            *slot = None;
        }
        Some(barrier)
    }
}

#[async_trait]
impl DocumentStore for MockDocumentStore {
    async fn list_documents(&self, queries: &[Query]) -> Result<DocumentList, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.begin().await?;

        let snapshot = self.documents.read().await.clone();
        let list = apply_queries(snapshot, queries);

        if let Some(barrier) = self.take_barrier().await {
            barrier.wait().await;
        }

        Ok(list)
    }

    async fn create_document(
        &self,
        document_id: &str,
        data: DocumentData,
    ) -> Result<Document, StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.begin().await?;

        let mut documents = self.documents.write().await;
        if documents.iter().any(|d| d.id == document_id) {
            return Err(StoreError::Conflict(document_id.to_string()));
        }

        let document = Document {
            id: document_id.to_string(),
            data,
        };
        documents.push(document.clone());
        Ok(document)
    }

    async fn update_document(
        &self,
        document_id: &str,
        data: DocumentData,
    ) -> Result<Document, StoreError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.begin().await?;

        let mut documents = self.documents.write().await;
        let document = documents
            .iter_mut()
            .find(|d| d.id == document_id)
            .ok_or_else(|| StoreError::NotFound(document_id.to_string()))?;

        document.data.extend(data);
        Ok(document.clone())
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_update_list() {
        let store = MockDocumentStore::new();
        let Value::Object(data) = json!({ "searchTerm": "dune", "count": 1 }) else {
            unreachable!()
        };
        store.create_document("a", data).await.unwrap();

        let Value::Object(patch) = json!({ "count": 2 }) else {
            unreachable!()
        };
        let updated = store.update_document("a", patch).await.unwrap();
        assert_eq!(updated.get_i64("count"), Some(2));
        assert_eq!(updated.get_str("searchTerm"), Some("dune"));

        let list = store
            .list_documents(&[Query::equal("searchTerm", "dune")])
            .await
            .unwrap();
        assert_eq!(list.total, 1);
        assert_eq!(store.list_calls().await, 1);
    }

    #[tokio::test]
    async fn test_failing_mode() {
        let store = MockDocumentStore::new();
        store.set_failing(true).await;
        assert!(store.list_documents(&[]).await.is_err());
        assert!(store.list_documents(&[]).await.is_err());

        store.set_failing(false).await;
        assert!(store.list_documents(&[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts() {
        let store = MockDocumentStore::new();
        store.insert_raw("a", "dune", 1).await;
        let result = store.create_document("a", DocumentData::new()).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_barrier_releases_after_parties() {
        let store = MockDocumentStore::new();
        store.set_list_barrier(2).await;

        let (a, b) = tokio::join!(store.list_documents(&[]), store.list_documents(&[]));
        assert!(a.is_ok() && b.is_ok());

        // Barrier is gone; a single call does not block
        store.list_documents(&[]).await.unwrap();
    }
}
