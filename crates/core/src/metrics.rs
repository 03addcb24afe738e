//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Search (provider requests, failures, stale responses)
//! - Analytics (document store operations, search recording)
//! - Trending (list loads)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Search Metrics
// =============================================================================

/// Searches issued by listing mode.
pub static SEARCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cinetrend_searches_total", "Total searches issued"),
        &["mode"], // "popular", "keyword"
    )
    .unwrap()
});

/// Failed searches by error kind.
pub static SEARCH_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cinetrend_search_failures_total", "Total failed searches"),
        &["kind"], // "fetch", "provider"
    )
    .unwrap()
});

/// Responses discarded because a newer search was issued.
pub static STALE_RESPONSES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "cinetrend_stale_responses_total",
        "Search responses discarded because a newer search was issued",
    )
    .unwrap()
});

/// Provider request duration in seconds.
pub static PROVIDER_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "cinetrend_provider_duration_seconds",
            "Duration of metadata provider requests",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["mode", "status"], // status: "success", "error"
    )
    .unwrap()
});

/// Results returned per successful search.
pub static SEARCH_RESULTS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "cinetrend_search_results",
            "Number of results returned per search",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 20.0, 50.0]),
        &["mode"],
    )
    .unwrap()
});

// =============================================================================
// Analytics Metrics
// =============================================================================

/// Document store operations by operation and result.
pub static STORE_OPERATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "cinetrend_store_operations_total",
            "Total document store operations",
        ),
        &["operation", "result"], // operation: "list", "create", "update"; result: "ok" or error kind
    )
    .unwrap()
});

/// Search recordings by outcome.
pub static RECORDINGS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cinetrend_recordings_total", "Total search recordings"),
        &["result"], // "created", "incremented", "failed"
    )
    .unwrap()
});

// =============================================================================
// Trending Metrics
// =============================================================================

/// Trending loads by result.
pub static TRENDING_LOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cinetrend_trending_loads_total", "Total trending list loads"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Entries in the most recently loaded trending list.
pub static TRENDING_ENTRIES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "cinetrend_trending_entries",
        "Entries in the last loaded trending list",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Search
        Box::new(SEARCHES_TOTAL.clone()),
        Box::new(SEARCH_FAILURES.clone()),
        Box::new(STALE_RESPONSES.clone()),
        Box::new(PROVIDER_DURATION.clone()),
        Box::new(SEARCH_RESULTS.clone()),
        // Analytics
        Box::new(STORE_OPERATIONS.clone()),
        Box::new(RECORDINGS_TOTAL.clone()),
        // Trending
        Box::new(TRENDING_LOADS.clone()),
        Box::new(TRENDING_ENTRIES.clone()),
    ]
}
