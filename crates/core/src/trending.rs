//! Trending searches.
//!
//! The list is loaded once when a session starts. Periodic refresh is opt-in
//! (`trending.refresh_interval_secs`); without it the list is only as fresh
//! as the session.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::analytics::{SearchAnalytics, SearchRecord};
use crate::metrics::{TRENDING_ENTRIES, TRENDING_LOADS};

/// A trending search ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingEntry {
    /// 1-based position.
    pub rank: usize,
    pub search_term: String,
    pub count: u64,
    pub movie_id: u64,
    pub poster_url: String,
}

impl TrendingEntry {
    /// Rank records in the order given.
    pub fn rank_all(records: Vec<SearchRecord>) -> Vec<Self> {
        records
            .into_iter()
            .enumerate()
            .map(|(i, record)| Self {
                rank: i + 1,
                search_term: record.search_term,
                count: record.count,
                movie_id: record.movie_id,
                poster_url: record.poster_url,
            })
            .collect()
    }
}

/// Holds the current trending list and reloads it on demand.
pub struct TrendingAggregator {
    analytics: SearchAnalytics,
    entries: watch::Sender<Vec<TrendingEntry>>,
}

impl TrendingAggregator {
    pub fn new(analytics: SearchAnalytics) -> Self {
        let (entries, _) = watch::channel(Vec::new());
        Self { analytics, entries }
    }

    /// Receive every list replacement.
    pub fn subscribe(&self) -> watch::Receiver<Vec<TrendingEntry>> {
        self.entries.subscribe()
    }

    /// Current list (empty until the first successful load).
    pub fn entries(&self) -> Vec<TrendingEntry> {
        self.entries.borrow().clone()
    }

    /// Fetch the list and replace the current one. On failure the current
    /// list is kept. Returns whether the load succeeded.
    pub async fn load(&self) -> bool {
        match self.analytics.fetch_top_trending().await {
            Ok(records) => {
                let entries = TrendingEntry::rank_all(records);
                TRENDING_LOADS.with_label_values(&["success"]).inc();
                TRENDING_ENTRIES.set(entries.len() as i64);
                debug!("Loaded {} trending searches", entries.len());
                self.entries.send_replace(entries);
                true
            }
            Err(e) => {
                TRENDING_LOADS.with_label_values(&["failed"]).inc();
                error!("Failed to load trending searches: {}", e);
                false
            }
        }
    }

    /// Reload every `period` until shutdown. The first reload happens one
    /// period from now.
    pub fn spawn_refresh(
        self: &Arc<Self>,
        period: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let aggregator = Arc::clone(self);

        tokio::spawn(async move {
            info!("Trending refresh every {:?}", period);
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Trending refresh received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        aggregator.load().await;
                    }
                }
            }
        })
    }
}
