//! Database abstraction layer
//!
//! Shared business logic for the vault operations lives in the processor
//! modules; each engine supplies an adapter that only knows its SQL dialect.
//!
//! # Architecture
//!
//! ```text
//! Common logic (user_vault.rs, group_vault.rs, directory.rs)
//!     ↓
//! Database-specific implementations
//!     ├── postgres/ (PostgreSQL-specific code)
//!     └── sqlite/   (SQLite-specific code)
//! ```

pub mod config;
pub mod directory;
pub mod group_vault;
pub mod postgres;
pub mod sqlite;
pub mod user_vault;

use crate::error::AppError;

pub use config::DatabaseBackendConfig;
pub use directory::DirectoryProcessor;
pub use group_vault::{GroupVaultProcessor, GroupWriter, PreparedGroupData, UnifiedGroupVaultOps};
pub use user_vault::{PreparedUserData, UnifiedUserVaultOps, UserVaultProcessor, UserWriter};

pub use postgres::PostgresBackend;
pub use sqlite::SqliteBackend;

pub const ORGANIZATIONS_TABLE: &str = "treasury_organizations";
pub const IDENTITY_PROVIDERS_TABLE: &str = "treasury_identity_providers";
pub const USERS_TABLE: &str = "treasury_users";
pub const GROUPS_TABLE: &str = "treasury_groups";
pub const MEMBERSHIPS_TABLE: &str = "treasury_group_memberships";

/// Outcome of an upsert through the vault processors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultAction {
    Inserted,
    Updated,
}

/// Map errors raised while inserting or updating a record
///
/// Unique violations become `Conflict`, dangling references `BadRequest`.
pub fn map_write_error(error: sqlx::Error, resource_type: &str) -> AppError {
    if let Some(db_error) = error.as_database_error() {
        let message = db_error.message().to_lowercase();
        match db_error.kind() {
            sqlx::error::ErrorKind::UniqueViolation => {
                return if message.contains("email") {
                    AppError::Conflict("Email already exists in organization".to_string())
                } else if message.contains("name") {
                    AppError::Conflict(format!("{} name already exists", resource_type))
                } else {
                    AppError::Conflict(format!("{} already exists", resource_type))
                };
            }
            sqlx::error::ErrorKind::ForeignKeyViolation => {
                return AppError::BadRequest(format!(
                    "{} references a record that does not exist",
                    resource_type
                ));
            }
            _ => {}
        }
    }

    AppError::Database(format!("Failed to write {}: {}", resource_type, error))
}

/// Map errors raised while deleting a record
pub fn map_delete_error(error: sqlx::Error, resource_type: &str) -> AppError {
    if let Some(db_error) = error.as_database_error() {
        if matches!(db_error.kind(), sqlx::error::ErrorKind::ForeignKeyViolation) {
            return AppError::Conflict(format!("{} is still referenced", resource_type));
        }
    }

    AppError::Database(format!("Failed to delete {}: {}", resource_type, error))
}

/// Parse an identifier stored as TEXT
pub(crate) fn parse_uuid(value: &str) -> Result<uuid::Uuid, AppError> {
    uuid::Uuid::parse_str(value)
        .map_err(|e| AppError::Database(format!("Invalid identifier '{}' in database: {}", value, e)))
}
