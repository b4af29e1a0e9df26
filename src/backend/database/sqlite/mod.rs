use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

pub mod directory_impl;
pub mod group_impl;
pub mod schema;
pub mod user_impl;

pub use directory_impl::SqliteDirectory;
pub use group_impl::{SqliteGroupReader, SqliteGroupWriter};
pub use user_impl::{SqliteUserReader, SqliteUserWriter};

use crate::backend::database::{
    DatabaseBackendConfig, DirectoryProcessor, PreparedGroupData, PreparedUserData,
    UnifiedGroupVaultOps, UnifiedUserVaultOps,
};
use crate::backend::{Backend, DatabaseType, DirectoryBackend, GroupBackend, UserBackend};
use crate::error::{AppError, AppResult};
use crate::models::{Group, IdentityProvider, Organization, User};

/// SQLite database backend implementation
///
/// Embedded engine; a missing database file is created on connect and
/// `:memory:` keeps everything in a single pooled connection.
pub struct SqliteBackend {
    pool: SqlitePool,
    user_vault_ops: UnifiedUserVaultOps<SqliteUserWriter>,
    user_reader: SqliteUserReader,
    group_vault_ops: UnifiedGroupVaultOps<SqliteGroupWriter>,
    group_reader: SqliteGroupReader,
    directory: SqliteDirectory,
}

impl SqliteBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            user_vault_ops: UnifiedUserVaultOps::new(SqliteUserWriter::new(pool.clone())),
            user_reader: SqliteUserReader::new(pool.clone()),
            group_vault_ops: UnifiedGroupVaultOps::new(SqliteGroupWriter::new(pool.clone())),
            group_reader: SqliteGroupReader::new(pool.clone()),
            directory: SqliteDirectory::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn connect_options(config: &DatabaseBackendConfig) -> AppResult<SqliteConnectOptions> {
        let options = if config.is_memory_database() {
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
                AppError::Configuration(format!("Invalid SQLite connection string: {}", e))
            })?
        } else {
            SqliteConnectOptions::new()
                .filename(config.sqlite_path())
                .create_if_missing(true)
        };

        Ok(options.foreign_keys(true))
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn connect(config: &DatabaseBackendConfig) -> AppResult<Self> {
        config
            .validate()
            .map_err(|e| AppError::Configuration(format!("Invalid backend config: {}", e)))?;

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.effective_max_connections())
            .acquire_timeout(Duration::from_secs(config.connection_timeout));

        if config.is_memory_database() {
            // Closing the last connection discards the database
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(Self::connect_options(config)?)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to SQLite: {}", e)))?;

        tracing::debug!(path = config.sqlite_path(), "sqlite pool established");
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
        DatabaseType::SQLite
    }

    async fn cleanup(&self) -> AppResult<()> {
        self.pool.close().await;
        Ok(())
    }
}

#[async_trait]
impl UserBackend for SqliteBackend {
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
impl GroupBackend for SqliteBackend {
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
impl DirectoryBackend for SqliteBackend {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::database::UserVaultProcessor;
    use crate::password::{PasswordAlgorithm, PasswordManager};

    async fn backend() -> SqliteBackend {
        let backend = SqliteBackend::connect(&DatabaseBackendConfig::memory_sqlite())
            .await
            .unwrap();
        backend.init_schema().await.unwrap();
        backend
    }

    async fn seed(backend: &SqliteBackend) -> (Organization, IdentityProvider) {
        let org = backend
            .create_organization(&Organization::new("Acme"))
            .await
            .unwrap();
        let idp = backend
            .create_identity_provider(&IdentityProvider::local("local"))
            .await
            .unwrap();
        (org, idp)
    }

    #[tokio::test]
    async fn test_memory_database_survives_pool_idle() {
        let backend = backend().await;
        backend.health_check().await.unwrap();
        let (org, _) = seed(&backend).await;

        let found = backend.find_organization_by_id(org.id).await.unwrap();
        assert_eq!(found.map(|o| o.name), Some("Acme".to_string()));
        assert_eq!(backend.database_type(), DatabaseType::SQLite);
    }

    #[tokio::test]
    async fn test_user_round_trip_hydrates_references() {
        let backend = backend().await;
        let (org, idp) = seed(&backend).await;
        let passwords = PasswordManager::new(PasswordAlgorithm::Bcrypt);

        let user = User::new(
            Uuid::nil(),
            "Alice",
            "Alice@Acme.test",
            Organization::reference(org.id),
            IdentityProvider::reference(idp.id),
        )
        .with_password("Secret123!");
        let prepared = UserVaultProcessor::prepare_user_for_vault(&user, &passwords).unwrap();

        let stored = backend.vault_user(&prepared).await.unwrap();
        assert_eq!(stored.email, "alice@acme.test");
        assert_eq!(stored.organization.name, "Acme");
        assert_eq!(stored.idp.name, "local");
        assert_eq!(stored.version, 1);
        assert!(stored.password.is_none());

        let hash = backend.find_password_hash(stored.id).await.unwrap().unwrap();
        assert!(passwords.verify_password("Secret123!", &hash).unwrap());

        let by_email = backend
            .find_user_by_email(org.id, "ALICE@acme.test")
            .await
            .unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(stored.id));
    }

    #[tokio::test]
    async fn test_membership_changes_bump_group_version() {
        let backend = backend().await;
        let (org, idp) = seed(&backend).await;
        let passwords = PasswordManager::new(PasswordAlgorithm::Bcrypt);

        let user = User::new(
            Uuid::nil(),
            "Bob",
            "bob@acme.test",
            Organization::reference(org.id),
            IdentityProvider::reference(idp.id),
        );
        let user = backend
            .vault_user(&UserVaultProcessor::prepare_user_for_vault(&user, &passwords).unwrap())
            .await
            .unwrap();

        let group = Group::new(org.id, "admins").with_roles(["admin"]);
        let prepared =
            crate::backend::database::GroupVaultProcessor::prepare_group_for_vault(&group).unwrap();
        let group = backend.vault_group(&prepared).await.unwrap();
        assert_eq!(group.version, 1);

        assert!(backend.add_member(group.id, user.id).await.unwrap());
        assert!(!backend.add_member(group.id, user.id).await.unwrap());

        let reloaded = backend.find_group_by_id(group.id).await.unwrap().unwrap();
        assert_eq!(reloaded.members, vec![user.id]);
        assert_eq!(reloaded.version, 2);

        let groups = backend.find_groups_by_user_id(user.id).await.unwrap();
        assert_eq!(groups.len(), 1);

        assert!(backend.delete_user(user.id).await.unwrap());
        let reloaded = backend.find_group_by_id(group.id).await.unwrap().unwrap();
        assert!(reloaded.members.is_empty());
    }

    #[tokio::test]
    async fn test_referenced_organization_cannot_be_deleted() {
        let backend = backend().await;
        let (org, _) = seed(&backend).await;

        let group = Group::new(org.id, "staff");
        let prepared =
            crate::backend::database::GroupVaultProcessor::prepare_group_for_vault(&group).unwrap();
        backend.vault_group(&prepared).await.unwrap();

        let err = backend.delete_organization(org.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
