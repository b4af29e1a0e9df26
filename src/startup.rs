use std::sync::Arc;

use crate::backend::database::DatabaseBackendConfig;
use crate::backend::{Backend, BackendFactory, DatabaseType, TreasuryBackend};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// Connect to the selected database and make sure its schema exists
pub async fn initialize_db(db: DatabaseType, url: &str) -> AppResult<Arc<dyn TreasuryBackend>> {
    initialize_with(&DatabaseBackendConfig::new(db, url.to_string())).await
}

/// Open (or create) an embedded SQLite database
///
/// Accepts `:memory:`, `sqlite::memory:`, `sqlite:path` or a bare path.
pub async fn initialize_sqlite(url: &str) -> AppResult<Arc<dyn TreasuryBackend>> {
    initialize_db(DatabaseType::SQLite, url).await
}

/// Initialize the backend described by the `backend` section of the configuration
pub async fn initialize_from_config(config: &AppConfig) -> AppResult<Arc<dyn TreasuryBackend>> {
    if config.backend.backend_type != "database" {
        return Err(AppError::Configuration(format!(
            "Unsupported backend type: {}",
            config.backend.backend_type
        )));
    }

    initialize_with(&config.database()?.to_backend_config()).await
}

async fn initialize_with(config: &DatabaseBackendConfig) -> AppResult<Arc<dyn TreasuryBackend>> {
    config
        .validate()
        .map_err(|e| AppError::Configuration(format!("Invalid backend config: {}", e)))?;

    let backend = BackendFactory::create(config).await?;
    backend.health_check().await?;
    backend.init_schema().await?;

    tracing::info!(
        database = %config.database_type,
        max_connections = config.effective_max_connections(),
        "database initialized"
    );
    Ok(backend)
}
