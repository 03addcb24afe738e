use super::{
    types::{Config, StoreBackend},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - TMDB API key is present
/// - The selected store backend has its section, with no blank identifiers
/// - Debounce window and server port are not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.tmdb.api_key.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "tmdb.api_key is required".to_string(),
        ));
    }

    match config.store.backend {
        StoreBackend::Appwrite => {
            let Some(appwrite) = &config.store.appwrite else {
                return Err(ConfigError::ValidationError(
                    "store.appwrite section is required when backend = \"appwrite\"".to_string(),
                ));
            };
            for (field, value) in [
                ("endpoint", &appwrite.endpoint),
                ("project_id", &appwrite.project_id),
                ("database_id", &appwrite.database_id),
                ("collection_id", &appwrite.collection_id),
            ] {
                if value.trim().is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "store.appwrite.{} cannot be empty",
                        field
                    )));
                }
            }
        }
        StoreBackend::Sqlite => {
            if config.store.sqlite.is_none() {
                return Err(ConfigError::ValidationError(
                    "store.sqlite section is required when backend = \"sqlite\"".to_string(),
                ));
            }
        }
    }

    if config.search.debounce_ms == 0 {
        return Err(ConfigError::ValidationError(
            "search.debounce_ms cannot be 0".to_string(),
        ));
    }

    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    Ok(())
}
