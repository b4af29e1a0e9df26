use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::VaultAction;
use crate::error::{AppError, AppResult};
use crate::models::User;
use crate::password::PasswordManager;

/// User data ready for the database: validated, normalized, password hashed
#[derive(Debug, Clone)]
pub struct PreparedUserData {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub idp_id: Uuid,
    pub name: String,
    pub email: String,
    /// `None` keeps the stored hash on update
    pub password_hash: Option<String>,
    pub active: bool,
    /// Version the caller last saw
    pub expected_version: i64,
    pub timestamp: DateTime<Utc>,
}

/// Database-specific adapter for user vault operations
#[async_trait]
pub trait UserWriter: Send + Sync {
    async fn current_user_version(&self, id: Uuid) -> AppResult<Option<i64>>;

    /// Insert a new user row with version 1
    async fn execute_user_insert(&self, data: &PreparedUserData) -> AppResult<()>;

    /// Replace the row if its version still equals `expected_version`,
    /// bumping the version. Returns false when no row matched.
    async fn execute_user_update(&self, data: &PreparedUserData) -> AppResult<bool>;
}

/// Shared business logic for user vault operations
pub struct UserVaultProcessor;

impl UserVaultProcessor {
    /// Prepare user data for storage
    ///
    /// - Validation of name, email and references
    /// - ID generation for new records
    /// - Email normalization
    /// - Password hashing
    pub fn prepare_user_for_vault(
        user: &User,
        passwords: &PasswordManager,
    ) -> AppResult<PreparedUserData> {
        Self::validate_user(user)?;

        let id = if user.is_new() { Uuid::new_v4() } else { user.id };

        let password_hash = match user.password.as_deref() {
            Some(password) if passwords.is_hashed_password(password) => {
                Some(password.to_string())
            }
            Some(password) => Some(passwords.hash_password(password)?),
            None => None,
        };

        Ok(PreparedUserData {
            id,
            organization_id: user.organization.id,
            idp_id: user.idp.id,
            name: user.name.trim().to_string(),
            email: Self::normalize_email(&user.email),
            password_hash,
            active: user.active,
            expected_version: user.version,
            timestamp: Utc::now(),
        })
    }

    pub fn validate_user(user: &User) -> AppResult<()> {
        if user.name.trim().is_empty() {
            return Err(AppError::BadRequest("User name cannot be empty".to_string()));
        }

        let email = Self::normalize_email(&user.email);
        if !email_address::EmailAddress::is_valid(&email) {
            return Err(AppError::BadRequest(format!(
                "Invalid email address: {}",
                user.email
            )));
        }

        if user.organization.id.is_nil() {
            return Err(AppError::BadRequest(
                "User must reference an organization".to_string(),
            ));
        }

        if user.idp.id.is_nil() {
            return Err(AppError::BadRequest(
                "User must reference an identity provider".to_string(),
            ));
        }

        Ok(())
    }

    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }
}

/// Unified user vault operations using the adapter pattern
pub struct UnifiedUserVaultOps<T: UserWriter> {
    writer: T,
}

impl<T: UserWriter> UnifiedUserVaultOps<T> {
    pub fn new(writer: T) -> Self {
        Self { writer }
    }

    /// Insert the user when its id is unknown, otherwise replace it under
    /// optimistic version control
    pub async fn vault_user(&self, data: &PreparedUserData) -> AppResult<VaultAction> {
        match self.writer.current_user_version(data.id).await? {
            None => {
                self.writer.execute_user_insert(data).await?;
                Ok(VaultAction::Inserted)
            }
            Some(current) if current != data.expected_version => {
                tracing::debug!(
                    user_id = %data.id,
                    current,
                    expected = data.expected_version,
                    "user version mismatch"
                );
                Err(AppError::PreconditionFailed)
            }
            Some(_) => {
                if self.writer.execute_user_update(data).await? {
                    Ok(VaultAction::Updated)
                } else {
                    // Row changed between the version read and the update
                    Err(AppError::PreconditionFailed)
                }
            }
        }
    }
}
