use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{handlers, middleware::metrics_middleware, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Trending searches
        .route("/trending", get(handlers::get_trending))
        // One search session per connection
        .route("/ws", get(ws::ws_handler))
        .route_layer(middleware::from_fn(metrics_middleware))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use cinetrend_core::{
        load_config_from_str,
        testing::{fixtures, MockDocumentStore, MockMovieCatalog},
        SearchAnalytics,
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    const TEST_CONFIG: &str = r#"
[tmdb]
api_key = "tmdb-secret-token"

[store.appwrite]
project_id = "proj"
database_id = "db"
collection_id = "metrics"
api_key = "appwrite-secret-key"
"#;

    async fn create_test_state(store: Arc<MockDocumentStore>) -> Arc<AppState> {
        let config = load_config_from_str(TEST_CONFIG).unwrap();
        let catalog = Arc::new(MockMovieCatalog::new());
        catalog.set_movies(fixtures::popular_movies()).await;
        Arc::new(AppState::new(config, catalog, SearchAnalytics::new(store)))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let state = create_test_state(Arc::new(MockDocumentStore::new())).await;
        let (status, body) = get_json(create_router(state), "/api/v1/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store"], "mock");
    }

    #[tokio::test]
    async fn test_config_redacts_secrets() {
        let state = create_test_state(Arc::new(MockDocumentStore::new())).await;
        let request = Request::builder()
            .uri("/api/v1/config")
            .body(Body::empty())
            .unwrap();
        let response = create_router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("tmdb-secret-token"));
        assert!(!text.contains("appwrite-secret-key"));

        let json: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["tmdb"]["api_key_configured"], true);
        assert_eq!(json["store"]["backend"], "appwrite");
        assert_eq!(json["store"]["appwrite"]["api_key_configured"], true);
        assert_eq!(json["search"]["debounce_ms"], 500);
    }

    #[tokio::test]
    async fn test_trending_ranked_by_count() {
        let store = Arc::new(MockDocumentStore::new());
        store.insert_raw("a", "alien", 2).await;
        store.insert_raw("b", "dune", 7).await;
        store.insert_raw("c", "heat", 4).await;
        let state = create_test_state(store).await;

        let (status, body) = get_json(create_router(state), "/api/v1/trending").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fresh"], true);

        let terms: Vec<&str> = body["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["search_term"].as_str().unwrap())
            .collect();
        assert_eq!(terms, vec!["dune", "heat", "alien"]);
        assert_eq!(body["entries"][0]["rank"], 1);
    }

    #[tokio::test]
    async fn test_trending_store_failure_keeps_previous_list() {
        let store = Arc::new(MockDocumentStore::new());
        store.insert_raw("a", "alien", 3).await;
        let state = create_test_state(store.clone()).await;
        let app = create_router(state);

        let (_, first) = get_json(app.clone(), "/api/v1/trending").await;
        assert_eq!(first["entries"].as_array().unwrap().len(), 1);

        store.set_failing(true).await;
        let (status, second) = get_json(app, "/api/v1/trending").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["fresh"], false);
        assert_eq!(second["entries"], first["entries"]);
    }

    #[tokio::test]
    async fn test_trending_empty_store() {
        let state = create_test_state(Arc::new(MockDocumentStore::new())).await;
        let (status, body) = get_json(create_router(state), "/api/v1/trending").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["entries"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let state = create_test_state(Arc::new(MockDocumentStore::new())).await;
        let app = create_router(state);

        // Touch an API route so HTTP metrics have samples
        let _ = get_json(app.clone(), "/api/v1/health").await;

        let request = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("cinetrend_http_requests_total"));
    }

    #[tokio::test]
    async fn test_ws_requires_upgrade() {
        let state = create_test_state(Arc::new(MockDocumentStore::new())).await;
        let request = Request::builder()
            .uri("/api/v1/ws")
            .body(Body::empty())
            .unwrap();

        let response = create_router(state).oneshot(request).await.unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let state = create_test_state(Arc::new(MockDocumentStore::new())).await;
        let request = Request::builder()
            .uri("/api/v1/movies")
            .body(Body::empty())
            .unwrap();

        let response = create_router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
