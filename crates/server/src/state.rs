use std::sync::Arc;

use cinetrend_core::{
    Config, MovieCatalog, SanitizedConfig, SearchAnalytics, SearchSession, SessionConfig,
    TrendingAggregator,
};

/// Shared application state
pub struct AppState {
    config: Config,
    catalog: Arc<dyn MovieCatalog>,
    analytics: SearchAnalytics,
    trending: Arc<TrendingAggregator>,
    session_config: SessionConfig,
}

impl AppState {
    pub fn new(config: Config, catalog: Arc<dyn MovieCatalog>, analytics: SearchAnalytics) -> Self {
        let session_config = SessionConfig::from(&config);
        let trending = Arc::new(TrendingAggregator::new(analytics.clone()));
        Self {
            config,
            catalog,
            analytics,
            trending,
            session_config,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// Server-wide trending list, served over plain HTTP.
    pub fn trending(&self) -> &Arc<TrendingAggregator> {
        &self.trending
    }

    pub fn store_backend(&self) -> &'static str {
        self.analytics.backend_name()
    }

    /// Start a search session for one client.
    pub fn start_session(&self) -> SearchSession {
        SearchSession::start(
            Arc::clone(&self.catalog),
            self.analytics.clone(),
            self.session_config.clone(),
        )
    }
}
