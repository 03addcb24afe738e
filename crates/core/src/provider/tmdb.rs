//! TMDB (The Movie Database) API client.
//!
//! Uses the v4 read access token as a bearer credential against the v3 API.
//! TMDB itself never sets the `Response`/`Error` pair, but proxies in front
//! of it do, so it is honoured as a logical failure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{CatalogItem, CatalogQuery};
use super::{CatalogError, MovieCatalog, DEFAULT_IMAGE_BASE_URL};

const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

/// TMDB API client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbConfig {
    /// TMDB read access token (required).
    pub api_key: String,
    /// Base URL (default: https://api.themoviedb.org/3).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Image base URL for posters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base_url: Option<String>,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

/// TMDB API client.
pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
    image_base_url: String,
}

impl TmdbClient {
    /// Create a new TMDB client.
    pub fn new(config: TmdbConfig) -> Result<Self, CatalogError> {
        if config.api_key.is_empty() {
            return Err(CatalogError::NotConfigured(
                "TMDB API key is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let base_url = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let image_base_url = config
            .image_base_url
            .unwrap_or_else(|| DEFAULT_IMAGE_BASE_URL.to_string());

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key,
            image_base_url,
        })
    }

    /// Build the request URL for a listing.
    pub fn endpoint(&self, query: &CatalogQuery) -> String {
        match query {
            CatalogQuery::Popular => {
                format!("{}/discover/movie?sort_by=popularity.desc", self.base_url)
            }
            CatalogQuery::Keyword(term) => format!(
                "{}/search/movie?query={}",
                self.base_url,
                urlencoding::encode(term)
            ),
        }
    }
}

#[async_trait]
impl MovieCatalog for TmdbClient {
    async fn fetch(&self, query: &CatalogQuery) -> Result<Vec<CatalogItem>, CatalogError> {
        let url = self.endpoint(query);

        debug!("TMDB {} listing: {:?}", query.mode(), query);

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == 401 {
            return Err(CatalogError::NotConfigured(
                "Invalid TMDB API key".to_string(),
            ));
        }
        if status == 429 {
            return Err(CatalogError::RateLimitExceeded);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let listing: TmdbListResponse = response.json().await.map_err(|e| {
            CatalogError::ParseError(format!("Failed to parse movie listing: {}", e))
        })?;

        listing.into_items()
    }

    fn image_base_url(&self) -> &str {
        &self.image_base_url
    }
}

// ============================================================================
// TMDB API Response Types (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct TmdbListResponse {
    #[serde(default)]
    results: Option<Vec<TmdbMovieResult>>,
    #[serde(default, rename = "Response")]
    response: Option<String>,
    #[serde(default, rename = "Error")]
    error: Option<String>,
}

impl TmdbListResponse {
    fn into_items(self) -> Result<Vec<CatalogItem>, CatalogError> {
        if self.response.as_deref() == Some("False") {
            return Err(CatalogError::Rejected {
                message: self.error.filter(|e| !e.is_empty()),
            });
        }

        Ok(self
            .results
            .unwrap_or_default()
            .into_iter()
            .map(Into::into)
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct TmdbMovieResult {
    id: u64,
    #[serde(default)]
    title: String,
    poster_path: Option<String>,
    release_date: Option<String>,
    original_language: Option<String>,
    vote_average: Option<f64>,
    popularity: Option<f64>,
    overview: Option<String>,
    vote_count: Option<u64>,
}

impl From<TmdbMovieResult> for CatalogItem {
    fn from(r: TmdbMovieResult) -> Self {
        Self {
            id: r.id,
            title: r.title,
            poster_path: r.poster_path,
            // TMDB sends "" for unknown dates
            release_date: r.release_date.filter(|d| !d.is_empty()),
            original_language: r.original_language,
            vote_average: r.vote_average,
            popularity: r.popularity,
            overview: r.overview,
            vote_count: r.vote_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> TmdbClient {
        TmdbClient::new(TmdbConfig {
            api_key: "token".to_string(),
            base_url: Some("https://tmdb.test/3/".to_string()),
            image_base_url: None,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_new_requires_api_key() {
        let result = TmdbClient::new(TmdbConfig {
            api_key: String::new(),
            base_url: None,
            image_base_url: None,
            timeout_secs: 30,
        });
        assert!(matches!(result, Err(CatalogError::NotConfigured(_))));
    }

    #[test]
    fn test_popular_endpoint() {
        assert_eq!(
            client().endpoint(&CatalogQuery::Popular),
            "https://tmdb.test/3/discover/movie?sort_by=popularity.desc"
        );
    }

    #[test]
    fn test_keyword_endpoint_is_percent_encoded() {
        let url = client().endpoint(&CatalogQuery::Keyword("amélie & nino".to_string()));
        assert_eq!(
            url,
            "https://tmdb.test/3/search/movie?query=am%C3%A9lie%20%26%20nino"
        );
    }

    #[test]
    fn test_default_image_base() {
        let tmdb = client();
        assert_eq!(tmdb.image_base_url(), DEFAULT_IMAGE_BASE_URL);
    }

    #[test]
    fn test_parse_listing() {
        let body = r#"{
            "page": 1,
            "results": [
                {
                    "id": 438631,
                    "title": "Dune",
                    "poster_path": "/d5NXSklXo0qyIYkgV94XAgMIckC.jpg",
                    "release_date": "2021-09-15",
                    "original_language": "en",
                    "vote_average": 7.8,
                    "popularity": 120.5,
                    "overview": "Paul Atreides...",
                    "vote_count": 12000,
                    "adult": false
                },
                { "id": 1, "title": "No Date", "release_date": "" }
            ],
            "total_pages": 1
        }"#;
        let listing: TmdbListResponse = serde_json::from_str(body).unwrap();
        let items = listing.into_items().unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, 438631);
        assert_eq!(items[0].year(), Some(2021));
        assert!(items[1].release_date.is_none());
        assert!(items[1].poster_path.is_none());
    }

    #[test]
    fn test_parse_missing_results_is_empty() {
        let listing: TmdbListResponse = serde_json::from_str("{}").unwrap();
        assert!(listing.into_items().unwrap().is_empty());
    }

    #[test]
    fn test_parse_logical_failure() {
        let body = r#"{"Response": "False", "Error": "Invalid page"}"#;
        let listing: TmdbListResponse = serde_json::from_str(body).unwrap();
        match listing.into_items() {
            Err(CatalogError::Rejected { message }) => {
                assert_eq!(message.as_deref(), Some("Invalid page"))
            }
            other => panic!("Expected Rejected, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_logical_failure_without_message() {
        let body = r#"{"Response": "False", "results": []}"#;
        let listing: TmdbListResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(
            listing.into_items(),
            Err(CatalogError::Rejected { message: None })
        ));
    }

    // =========================================================================
    // HTTP behaviour against a local one-shot responder
    // =========================================================================

    /// Answer a single request with `status` and `body`, returning the base
    /// URL and the raw request text.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{}/3", addr), handle)
    }

    fn local_client(base_url: String) -> TmdbClient {
        TmdbClient::new(TmdbConfig {
            api_key: "token".to_string(),
            base_url: Some(base_url),
            image_base_url: None,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_sends_bearer_and_parses_results() {
        let (base_url, server) =
            serve_once("200 OK", r#"{"results":[{"id":949,"title":"Heat"}]}"#).await;

        let items = local_client(base_url)
            .fetch(&CatalogQuery::Keyword("heat".to_string()))
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Heat");

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /3/search/movie?query=heat "));
        assert!(request.contains("authorization: bearer token"));
        assert!(request.contains("accept: application/json"));
    }

    #[tokio::test]
    async fn test_fetch_unauthorized() {
        let (base_url, server) = serve_once("401 Unauthorized", "{}").await;
        let result = local_client(base_url).fetch(&CatalogQuery::Popular).await;
        assert!(matches!(result, Err(CatalogError::NotConfigured(_))));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_rate_limited() {
        let (base_url, server) = serve_once("429 Too Many Requests", "{}").await;
        let result = local_client(base_url).fetch(&CatalogQuery::Popular).await;
        assert!(matches!(result, Err(CatalogError::RateLimitExceeded)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_server_error_keeps_status() {
        let (base_url, server) = serve_once("503 Service Unavailable", "down").await;
        match local_client(base_url).fetch(&CatalogQuery::Popular).await {
            Err(CatalogError::ApiError { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "down");
            }
            other => panic!("Expected ApiError, got {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_http_error() {
        let result = local_client("http://127.0.0.1:1/3".to_string())
            .fetch(&CatalogQuery::Popular)
            .await;
        assert!(matches!(result, Err(CatalogError::HttpError(_))));
    }
}
