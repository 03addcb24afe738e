//! One interactive search session.
//!
//! A session owns a debouncer, a query controller and a trending
//! aggregator. On start it loads the trending list and runs the popular
//! listing; afterwards every settled input that differs from the previous
//! one becomes a search.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::analytics::SearchAnalytics;
use crate::config::Config;
use crate::controller::{QueryController, QueryState};
use crate::debounce::{Debouncer, DEFAULT_WINDOW};
use crate::provider::MovieCatalog;
use crate::trending::{TrendingAggregator, TrendingEntry};

/// Session timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub debounce: Duration,
    /// Trending reload period; `None` loads once per session.
    pub trending_refresh: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_WINDOW,
            trending_refresh: None,
        }
    }
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            debounce: Duration::from_millis(config.search.debounce_ms),
            trending_refresh: match config.trending.refresh_interval_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

/// A running search session.
pub struct SearchSession {
    controller: Arc<QueryController>,
    trending: Arc<TrendingAggregator>,
    input: Option<Debouncer<String>>,
    shutdown_tx: broadcast::Sender<()>,
    driver: JoinHandle<()>,
    background: Vec<JoinHandle<()>>,
}

impl SearchSession {
    /// Start a session. Must be called inside a tokio runtime.
    pub fn start(
        catalog: Arc<dyn MovieCatalog>,
        analytics: SearchAnalytics,
        config: SessionConfig,
    ) -> Self {
        let controller = Arc::new(QueryController::new(catalog, analytics.clone()));
        let trending = Arc::new(TrendingAggregator::new(analytics));
        let (shutdown_tx, _) = broadcast::channel(1);

        let mut background = Vec::new();
        let initial = Arc::clone(&trending);
        background.push(tokio::spawn(async move {
            initial.load().await;
        }));
        if let Some(period) = config.trending_refresh {
            background.push(trending.spawn_refresh(period, shutdown_tx.subscribe()));
        }

        let (input, settled) = Debouncer::spawn(config.debounce);
        let driver = tokio::spawn(drive(
            Arc::clone(&controller),
            settled,
            shutdown_tx.subscribe(),
        ));

        info!(
            "Search session started (debounce {:?}, trending refresh {:?})",
            config.debounce, config.trending_refresh
        );

        Self {
            controller,
            trending,
            input: Some(input),
            shutdown_tx,
            driver,
            background,
        }
    }

    /// Feed the current contents of the search box.
    pub fn input(&self, raw: &str) {
        self.controller.set_raw_input(raw);
        if let Some(input) = &self.input {
            if !input.push(raw.to_string()) {
                warn!("Search input received after the session stopped");
            }
        }
    }

    pub fn state(&self) -> QueryState {
        self.controller.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<QueryState> {
        self.controller.subscribe()
    }

    pub fn trending(&self) -> Vec<TrendingEntry> {
        self.trending.entries()
    }

    pub fn subscribe_trending(&self) -> watch::Receiver<Vec<TrendingEntry>> {
        self.trending.subscribe()
    }

    /// Reload the trending list now.
    pub async fn reload_trending(&self) -> bool {
        self.trending.load().await
    }

    /// Stop accepting input and wait for in-flight searches (and their
    /// recordings) to finish.
    pub async fn shutdown(mut self) {
        self.input.take();
        let _ = self.shutdown_tx.send(());

        if let Err(e) = (&mut self.driver).await {
            warn!("Search driver ended abnormally: {}", e);
        }
        for task in self.background.drain(..) {
            if let Err(e) = task.await {
                warn!("Trending task ended abnormally: {}", e);
            }
        }
        info!("Search session stopped");
    }
}

async fn drive(
    controller: Arc<QueryController>,
    mut settled: mpsc::UnboundedReceiver<String>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut searches = JoinSet::new();
    let mut last = String::new();

    // Popular listing before any keystroke
    spawn_search(&mut searches, &controller, last.clone());

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("Search driver received shutdown signal");
                break;
            }
            next = settled.recv() => match next {
                Some(query) if query == last => {
                    debug!("Settled query {:?} unchanged, not searching", query);
                }
                Some(query) => {
                    last = query.clone();
                    spawn_search(&mut searches, &controller, query);
                }
                None => break,
            },
            Some(_) = searches.join_next(), if !searches.is_empty() => {}
        }
    }

    // Searches are never cancelled
    while searches.join_next().await.is_some() {}
}

fn spawn_search(searches: &mut JoinSet<()>, controller: &Arc<QueryController>, query: String) {
    let controller = Arc::clone(controller);
    let request_id = controller.reserve_request_id();
    searches.spawn(async move {
        let outcome = controller.run_search(request_id, &query).await;
        if let Some(recording) = outcome.recording {
            if let Err(e) = recording.await {
                warn!("Recording for {:?} ended abnormally: {}", query, e);
            }
        }
    });
}
