pub mod analytics;
pub mod config;
pub mod controller;
pub mod debounce;
pub mod metrics;
pub mod provider;
pub mod session;
pub mod store;
pub mod testing;
pub mod trending;

pub use analytics::{RecordOutcome, SearchAnalytics, SearchRecord, TRENDING_LIMIT};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, SanitizedConfig, StoreBackend,
};
pub use controller::{
    QueryController, QueryState, SearchError, SearchOutcome, FETCH_ERROR_MESSAGE,
    PROVIDER_ERROR_MESSAGE,
};
pub use debounce::Debouncer;
pub use provider::{CatalogError, CatalogItem, CatalogQuery, MovieCatalog, TmdbClient, TmdbConfig};
pub use session::{SearchSession, SessionConfig};
pub use store::{
    create_store, AppwriteConfig, AppwriteStore, DocumentStore, SqliteDocumentStore, SqliteStoreConfig,
    StoreError,
};
pub use trending::{TrendingAggregator, TrendingEntry};
