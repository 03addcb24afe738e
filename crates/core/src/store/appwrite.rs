//! Appwrite Databases REST client.
//!
//! Talks to one collection through the v1 documents API. Queries are sent
//! as repeated `queries[]` parameters in Appwrite's JSON query syntax.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::types::{Document, DocumentData, DocumentList, Query};
use super::{DocumentStore, StoreError};

/// Appwrite connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppwriteConfig {
    /// API endpoint (default: https://cloud.appwrite.io/v1).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Project ID.
    pub project_id: String,
    /// Database ID.
    pub database_id: String,
    /// Collection holding the search counts.
    pub collection_id: String,
    /// Server API key. Optional when the collection permits anonymous access.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://cloud.appwrite.io/v1".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Document store backed by an Appwrite collection.
pub struct AppwriteStore {
    client: Client,
    documents_url: String,
    project_id: String,
    api_key: Option<String>,
}

impl AppwriteStore {
    /// Create a new Appwrite store client.
    pub fn new(config: AppwriteConfig) -> Result<Self, StoreError> {
        if config.project_id.is_empty()
            || config.database_id.is_empty()
            || config.collection_id.is_empty()
        {
            return Err(StoreError::NotConfigured(
                "Appwrite project, database and collection IDs are required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let documents_url = format!(
            "{}/databases/{}/collections/{}/documents",
            config.endpoint.trim_end_matches('/'),
            urlencoding::encode(&config.database_id),
            urlencoding::encode(&config.collection_id),
        );

        Ok(Self {
            client,
            documents_url,
            project_id: config.project_id,
            api_key: config.api_key.filter(|k| !k.is_empty()),
        })
    }

    /// URL of the collection's documents resource.
    pub fn documents_url(&self) -> &str {
        &self.documents_url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("X-Appwrite-Project", &self.project_id);
        match &self.api_key {
            Some(key) => request.header("X-Appwrite-Key", key),
            None => request,
        }
    }

    async fn check(response: Response, document_id: Option<&str>) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<AppwriteErrorBody>(&body)
            .map(|e| e.message)
            .unwrap_or(body);

        Err(match (status.as_u16(), document_id) {
            (404, Some(id)) => StoreError::NotFound(id.to_string()),
            (409, Some(id)) => StoreError::Conflict(id.to_string()),
            (status, _) => StoreError::ApiError { status, message },
        })
    }

    async fn parse_document(response: Response) -> Result<Document, StoreError> {
        response
            .json()
            .await
            .map_err(|e| StoreError::ParseError(format!("Failed to parse document: {}", e)))
    }
}

#[async_trait]
impl DocumentStore for AppwriteStore {
    async fn list_documents(&self, queries: &[Query]) -> Result<DocumentList, StoreError> {
        let params: Vec<(&str, String)> = queries.iter().map(|q| ("queries[]", q.to_json())).collect();

        debug!("Appwrite list: {} queries", params.len());

        let response = self
            .authorize(self.client.get(&self.documents_url))
            .query(&params)
            .send()
            .await?;

        Self::check(response, None)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::ParseError(format!("Failed to parse document list: {}", e)))
    }

    async fn create_document(
        &self,
        document_id: &str,
        data: DocumentData,
    ) -> Result<Document, StoreError> {
        debug!("Appwrite create: id={}", document_id);

        let response = self
            .authorize(self.client.post(&self.documents_url))
            .json(&json!({ "documentId": document_id, "data": data }))
            .send()
            .await?;

        Self::parse_document(Self::check(response, Some(document_id)).await?).await
    }

    async fn update_document(
        &self,
        document_id: &str,
        data: DocumentData,
    ) -> Result<Document, StoreError> {
        debug!("Appwrite update: id={}", document_id);

        let url = format!("{}/{}", self.documents_url, urlencoding::encode(document_id));
        let response = self
            .authorize(self.client.patch(&url))
            .json(&json!({ "data": data }))
            .send()
            .await?;

        Self::parse_document(Self::check(response, Some(document_id)).await?).await
    }

    fn backend_name(&self) -> &'static str {
        "appwrite"
    }
}

#[derive(Debug, Deserialize)]
struct AppwriteErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppwriteConfig {
        AppwriteConfig {
            endpoint: "https://appwrite.test/v1/".to_string(),
            project_id: "proj".to_string(),
            database_id: "db".to_string(),
            collection_id: "metrics".to_string(),
            api_key: None,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_documents_url() {
        let store = AppwriteStore::new(config()).unwrap();
        assert_eq!(
            store.documents_url(),
            "https://appwrite.test/v1/databases/db/collections/metrics/documents"
        );
        assert_eq!(store.backend_name(), "appwrite");
    }

    #[test]
    fn test_new_requires_identifiers() {
        let mut cfg = config();
        cfg.collection_id.clear();
        assert!(matches!(
            AppwriteStore::new(cfg),
            Err(StoreError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_empty_api_key_is_ignored() {
        let mut cfg = config();
        cfg.api_key = Some(String::new());
        let store = AppwriteStore::new(cfg).unwrap();
        assert!(store.api_key.is_none());
    }

    #[test]
    fn test_parse_list_response() {
        let body = r#"{
            "total": 2,
            "documents": [
                {"$id": "a1", "$collectionId": "metrics", "searchTerm": "dune", "count": 7, "movie_id": 438631, "poster_url": "https://image.tmdb.org/t/p/w500/x.jpg"},
                {"$id": "b2", "$collectionId": "metrics", "searchTerm": "alien", "count": 3, "movie_id": 348, "poster_url": ""}
            ]
        }"#;
        let list: DocumentList = serde_json::from_str(body).unwrap();
        assert_eq!(list.total, 2);
        assert_eq!(list.documents[0].id, "a1");
        assert_eq!(list.documents[1].get_i64("count"), Some(3));
        assert!(!list.documents[0].data.contains_key("$collectionId"));
    }

    #[test]
    fn test_parse_error_body() {
        let body = r#"{"message":"Collection with the requested ID could not be found.","code":404,"type":"collection_not_found","version":"1.6.0"}"#;
        let parsed: AppwriteErrorBody = serde_json::from_str(body).unwrap();
        assert!(parsed.message.starts_with("Collection"));
    }
}
