use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use cinetrend_core::{SanitizedConfig, TrendingEntry};
use tracing::{error, warn};

use crate::metrics::encode_metrics;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub store: String,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        store: state.store_backend().to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

#[derive(Serialize)]
pub struct TrendingResponse {
    pub entries: Vec<TrendingEntry>,
    /// False when the reload failed and the previous list was served.
    pub fresh: bool,
}

/// Reload and return the top searched terms.
///
/// A store failure never turns into an error status: the last list that
/// loaded successfully is returned instead (empty if none has yet).
pub async fn get_trending(State(state): State<Arc<AppState>>) -> Json<TrendingResponse> {
    let trending = state.trending();
    let fresh = trending.load().await;
    if !fresh {
        warn!("Serving previous trending list after failed reload");
    }
    Json(TrendingResponse {
        entries: trending.entries(),
        fresh,
    })
}

pub async fn metrics_handler() -> Response {
    match encode_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
