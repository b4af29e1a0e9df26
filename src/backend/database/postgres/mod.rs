use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

pub mod directory_impl;
pub mod group_impl;
pub mod schema;
pub mod user_impl;

pub use directory_impl::PostgresDirectory;
pub use group_impl::{PostgresGroupReader, PostgresGroupWriter};
pub use user_impl::{PostgresUserReader, PostgresUserWriter};

use crate::backend::database::{
    DatabaseBackendConfig, DirectoryProcessor, PreparedGroupData, PreparedUserData,
    UnifiedGroupVaultOps, UnifiedUserVaultOps,
};
use crate::backend::{Backend, DatabaseType, DirectoryBackend, GroupBackend, UserBackend};
use crate::error::{AppError, AppResult};
use crate::models::{Group, IdentityProvider, Organization, User};

/// PostgreSQL database backend implementation
///
/// Native UUID and JSONB columns; membership rows cascade with their
/// user or group.
pub struct PostgresBackend {
    pool: PgPool,
    user_vault_ops: UnifiedUserVaultOps<PostgresUserWriter>,
    user_reader: PostgresUserReader,
    group_vault_ops: UnifiedGroupVaultOps<PostgresGroupWriter>,
    group_reader: PostgresGroupReader,
    directory: PostgresDirectory,
}

impl PostgresBackend {
    pub fn new(pool: PgPool) -> Self {
        Self {
            user_vault_ops: UnifiedUserVaultOps::new(PostgresUserWriter::new(pool.clone())),
            user_reader: PostgresUserReader::new(pool.clone()),
            group_vault_ops: UnifiedGroupVaultOps::new(PostgresGroupWriter::new(pool.clone())),
            group_reader: PostgresGroupReader::new(pool.clone()),
            directory: PostgresDirectory::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Backend for PostgresBackend {
    async fn connect(config: &DatabaseBackendConfig) -> AppResult<Self> {
        config
            .validate()
            .map_err(|e| AppError::Configuration(format!("Invalid backend config: {}", e)))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.effective_max_connections())
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(&config.connection_url)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to PostgreSQL: {}", e)))?;

        tracing::debug!(
            max_connections = config.effective_max_connections(),
            "postgres pool established"
        );
        Ok(Self::new(pool))
    }

    async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Health check failed: {}", e)))?;

        Ok(())
    }

    async fn init_schema(&self) -> AppResult<()> {
        schema::init_schema(&self.pool).await
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    async fn cleanup(&self) -> AppResult<()> {
        self.pool.close().await;
        Ok(())
    }
}

#[async_trait]
impl UserBackend for PostgresBackend {
    async fn vault_user(&self, data: &PreparedUserData) -> AppResult<User> {
        self.user_vault_ops.vault_user(data).await?;
        self.user_reader
            .find_by_id(data.id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("User {} vanished after write", data.id)))
    }

    async fn find_user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        self.user_reader.find_by_id(id).await
    }

    async fn find_user_by_email(
        &self,
        organization_id: Uuid,
        email: &str,
    ) -> AppResult<Option<User>> {
        self.user_reader.find_by_email(organization_id, email).await
    }

    async fn find_users_by_organization(&self, organization_id: Uuid) -> AppResult<Vec<User>> {
        self.user_reader.find_by_organization(organization_id).await
    }

    async fn find_password_hash(&self, id: Uuid) -> AppResult<Option<String>> {
        self.user_reader.find_password_hash(id).await
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        self.user_reader.record_login(id, at).await
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<bool> {
        self.user_reader.delete(id).await
    }
}

#[async_trait]
impl GroupBackend for PostgresBackend {
    async fn vault_group(&self, data: &PreparedGroupData) -> AppResult<Group> {
        self.group_vault_ops.vault_group(data).await?;
        self.group_reader
            .find_by_id(data.id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Group {} vanished after write", data.id)))
    }

    async fn find_group_by_id(&self, id: Uuid) -> AppResult<Option<Group>> {
        self.group_reader.find_by_id(id).await
    }

    async fn find_groups_by_organization(&self, organization_id: Uuid) -> AppResult<Vec<Group>> {
        self.group_reader.find_by_organization(organization_id).await
    }

    async fn find_groups_by_user_id(&self, user_id: Uuid) -> AppResult<Vec<Group>> {
        self.group_reader.find_by_user_id(user_id).await
    }

    async fn add_member(&self, group_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        self.group_reader.add_member(group_id, user_id).await
    }

    async fn remove_member(&self, group_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        self.group_reader.remove_member(group_id, user_id).await
    }

    async fn delete_group(&self, id: Uuid) -> AppResult<bool> {
        self.group_reader.delete(id).await
    }
}

#[async_trait]
impl DirectoryBackend for PostgresBackend {
    async fn create_organization(&self, organization: &Organization) -> AppResult<Organization> {
        let prepared = DirectoryProcessor::prepare_organization(organization)?;
        self.directory.insert_organization(&prepared).await?;
        Ok(prepared)
    }

    async fn find_organization_by_id(&self, id: Uuid) -> AppResult<Option<Organization>> {
        self.directory.find_organization(id).await
    }

    async fn list_organizations(&self) -> AppResult<Vec<Organization>> {
        self.directory.list_organizations().await
    }

    async fn delete_organization(&self, id: Uuid) -> AppResult<bool> {
        self.directory.delete_organization(id).await
    }

    async fn create_identity_provider(
        &self,
        idp: &IdentityProvider,
    ) -> AppResult<IdentityProvider> {
        let prepared = DirectoryProcessor::prepare_identity_provider(idp)?;
        self.directory.insert_identity_provider(&prepared).await?;
        Ok(prepared)
    }

    async fn find_identity_provider_by_id(&self, id: Uuid) -> AppResult<Option<IdentityProvider>> {
        self.directory.find_identity_provider(id).await
    }

    async fn list_identity_providers(&self) -> AppResult<Vec<IdentityProvider>> {
        self.directory.list_identity_providers().await
    }

    async fn delete_identity_provider(&self, id: Uuid) -> AppResult<bool> {
        self.directory.delete_identity_provider(id).await
    }
}
