use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::provider::TmdbConfig;
use crate::store::{AppwriteConfig, SqliteStoreConfig};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub tmdb: TmdbConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub trending: TrendingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Document store configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Which backend holds the search counts.
    #[serde(default)]
    pub backend: StoreBackend,
    /// Appwrite settings (required when backend = "appwrite")
    #[serde(default)]
    pub appwrite: Option<AppwriteConfig>,
    /// SQLite settings (required when backend = "sqlite")
    #[serde(default)]
    pub sqlite: Option<SqliteStoreConfig>,
}

/// Available document store backends
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Appwrite,
    Sqlite,
}

/// Keystroke handling
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Quiet period after the last keystroke before a query is issued (milliseconds).
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// Trending list loading
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TrendingConfig {
    /// Reload interval in seconds. 0 loads once per session.
    #[serde(default)]
    pub refresh_interval_secs: u64,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub tmdb: SanitizedTmdbConfig,
    pub store: SanitizedStoreConfig,
    pub search: SearchConfig,
    pub trending: TrendingConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTmdbConfig {
    pub base_url: Option<String>,
    pub api_key_configured: bool,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStoreConfig {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appwrite: Option<SanitizedAppwriteConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sqlite_path: Option<PathBuf>,
}

/// Appwrite config with the server key hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAppwriteConfig {
    pub endpoint: String,
    pub project_id: String,
    pub database_id: String,
    pub collection_id: String,
    pub api_key_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            tmdb: SanitizedTmdbConfig {
                base_url: config.tmdb.base_url.clone(),
                api_key_configured: !config.tmdb.api_key.is_empty(),
                timeout_secs: config.tmdb.timeout_secs,
            },
            store: SanitizedStoreConfig {
                backend: match config.store.backend {
                    StoreBackend::Appwrite => "appwrite".to_string(),
                    StoreBackend::Sqlite => "sqlite".to_string(),
                },
                appwrite: config
                    .store
                    .appwrite
                    .as_ref()
                    .map(|a| SanitizedAppwriteConfig {
                        endpoint: a.endpoint.clone(),
                        project_id: a.project_id.clone(),
                        database_id: a.database_id.clone(),
                        collection_id: a.collection_id.clone(),
                        api_key_configured: a.api_key.as_deref().is_some_and(|k| !k.is_empty()),
                    }),
                sqlite_path: config.store.sqlite.as_ref().map(|s| s.path.clone()),
            },
            search: config.search.clone(),
            trending: config.trending.clone(),
        }
    }
}
