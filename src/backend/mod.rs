use crate::error::AppResult;
use crate::models::{Group, IdentityProvider, Organization, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

pub mod database;

use database::{DatabaseBackendConfig, PreparedGroupData, PreparedUserData};

/// Supported database backend types
///
/// `PostgreSQL` is the server-based engine, `SQLite` the embedded file engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseType {
    #[serde(rename = "pg", alias = "postgres", alias = "postgresql")]
    PostgreSQL,
    #[serde(rename = "sqlite")]
    SQLite,
}

impl DatabaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "pg",
            Self::SQLite => "sqlite",
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pg" | "postgres" | "postgresql" => Ok(Self::PostgreSQL),
            "sqlite" => Ok(Self::SQLite),
            other => Err(format!("Unsupported database type: {}", other)),
        }
    }
}

/// Core backend abstraction
///
/// Connection lifecycle shared by every storage engine.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Connect and initialize the storage backend
    async fn connect(config: &DatabaseBackendConfig) -> AppResult<Self>
    where
        Self: Sized;

    /// Check if the storage backend is healthy and accessible
    async fn health_check(&self) -> AppResult<()>;

    /// Create tables and indexes if they do not exist yet
    async fn init_schema(&self) -> AppResult<()>;

    fn database_type(&self) -> DatabaseType;

    /// Clean up resources when storage is no longer needed
    async fn cleanup(&self) -> AppResult<()> {
        Ok(())
    }
}

/// User storage operations
///
/// Users are always returned with their organization and identity provider
/// hydrated and without any credential material.
#[async_trait]
pub trait UserBackend: Backend {
    /// Insert or replace a prepared user record, returning the stored user
    async fn vault_user(&self, data: &PreparedUserData) -> AppResult<User>;

    async fn find_user_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Find a user by email within an organization (case-insensitive)
    async fn find_user_by_email(
        &self,
        organization_id: Uuid,
        email: &str,
    ) -> AppResult<Option<User>>;

    async fn find_users_by_organization(&self, organization_id: Uuid) -> AppResult<Vec<User>>;

    /// Stored password hash for a user, if any
    async fn find_password_hash(&self, id: Uuid) -> AppResult<Option<String>>;

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()>;

    /// Delete a user and its memberships
    async fn delete_user(&self, id: Uuid) -> AppResult<bool>;
}

/// Group storage operations, including membership management
#[async_trait]
pub trait GroupBackend: Backend {
    /// Insert or replace a prepared group record and its member set
    async fn vault_group(&self, data: &PreparedGroupData) -> AppResult<Group>;

    async fn find_group_by_id(&self, id: Uuid) -> AppResult<Option<Group>>;

    async fn find_groups_by_organization(&self, organization_id: Uuid) -> AppResult<Vec<Group>>;

    /// Find groups that contain a specific user as a member
    async fn find_groups_by_user_id(&self, user_id: Uuid) -> AppResult<Vec<Group>>;

    /// Returns false when the user already was a member
    async fn add_member(&self, group_id: Uuid, user_id: Uuid) -> AppResult<bool>;

    /// Returns false when the user was not a member
    async fn remove_member(&self, group_id: Uuid, user_id: Uuid) -> AppResult<bool>;

    async fn delete_group(&self, id: Uuid) -> AppResult<bool>;
}

/// Organization and identity provider directory
#[async_trait]
pub trait DirectoryBackend: Backend {
    async fn create_organization(&self, organization: &Organization) -> AppResult<Organization>;

    async fn find_organization_by_id(&self, id: Uuid) -> AppResult<Option<Organization>>;

    async fn list_organizations(&self) -> AppResult<Vec<Organization>>;

    /// Fails with `Conflict` while users or groups still reference the organization
    async fn delete_organization(&self, id: Uuid) -> AppResult<bool>;

    async fn create_identity_provider(&self, idp: &IdentityProvider)
        -> AppResult<IdentityProvider>;

    async fn find_identity_provider_by_id(&self, id: Uuid) -> AppResult<Option<IdentityProvider>>;

    async fn list_identity_providers(&self) -> AppResult<Vec<IdentityProvider>>;

    /// Fails with `Conflict` while users still reference the provider
    async fn delete_identity_provider(&self, id: Uuid) -> AppResult<bool>;
}

/// Combined backend interface for every resource type
pub trait TreasuryBackend: UserBackend + GroupBackend + DirectoryBackend {}

impl<T> TreasuryBackend for T where T: UserBackend + GroupBackend + DirectoryBackend {}

/// Factory for creating backend instances
pub struct BackendFactory;

impl BackendFactory {
    pub async fn create(config: &DatabaseBackendConfig) -> AppResult<Arc<dyn TreasuryBackend>> {
        let backend = Self::create_backend(config).await?;
        Ok(Arc::from(backend))
    }

    pub async fn create_backend(
        config: &DatabaseBackendConfig,
    ) -> AppResult<Box<dyn TreasuryBackend>> {
        match config.database_type {
            DatabaseType::PostgreSQL => {
                let backend = database::postgres::PostgresBackend::connect(config).await?;
                Ok(Box::new(backend))
            }
            DatabaseType::SQLite => {
                let backend = database::sqlite::SqliteBackend::connect(config).await?;
                Ok(Box::new(backend))
            }
        }
    }
}
