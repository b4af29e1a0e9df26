//! Storage and authentication contract
//!
//! [`Treasury`] layers the cross-record rules (references exist, members
//! share the group's organization, credential checks) on top of a
//! [`TreasuryBackend`], which only knows how to persist single records.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::backend::database::{GroupVaultProcessor, UserVaultProcessor};
use crate::backend::{DirectoryBackend, GroupBackend, TreasuryBackend, UserBackend};
use crate::error::{AppError, AppResult};
use crate::models::{AuthorizationDecision, Credentials, Group, User};
use crate::password::PasswordManager;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

#[async_trait]
pub trait TreasuryDb: Send + Sync {
    /// Insert or update a user; the record is refreshed from storage on success
    async fn user_vault(&self, user: &mut User) -> AppResult<()>;

    /// Insert or update a group and its member set
    async fn group_vault(&self, group: &mut Group) -> AppResult<()>;

    async fn authenticate_user(&self, credentials: &Credentials) -> AppResult<User>;

    async fn authorize_user(&self, user_id: Uuid, role: &str) -> AppResult<AuthorizationDecision>;
}

/// Default [`TreasuryDb`] implementation over any storage backend
#[derive(Clone)]
pub struct Treasury {
    backend: Arc<dyn TreasuryBackend>,
    passwords: Arc<PasswordManager>,
}

impl Treasury {
    pub fn new(backend: Arc<dyn TreasuryBackend>, passwords: PasswordManager) -> Self {
        Self {
            backend,
            passwords: Arc::new(passwords),
        }
    }

    pub fn backend(&self) -> &Arc<dyn TreasuryBackend> {
        &self.backend
    }

    pub fn passwords(&self) -> &PasswordManager {
        &self.passwords
    }

    pub async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.backend
            .find_user_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    pub async fn get_group(&self, id: Uuid) -> AppResult<Group> {
        self.backend
            .find_group_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Group {} not found", id)))
    }

    /// Add a user to a group of the same organization
    pub async fn add_member(&self, group_id: Uuid, user_id: Uuid) -> AppResult<Group> {
        let group = self.get_group(group_id).await?;
        self.check_member(&group, user_id).await?;

        if self.backend.add_member(group_id, user_id).await? {
            tracing::info!(group_id = %group_id, user_id = %user_id, "member added");
        }
        self.get_group(group_id).await
    }

    pub async fn remove_member(&self, group_id: Uuid, user_id: Uuid) -> AppResult<Group> {
        let removed = self.backend.remove_member(group_id, user_id).await?;
        if !removed {
            // Distinguish a missing group from a missing membership
            self.get_group(group_id).await?;
            return Err(AppError::NotFound(format!(
                "User {} is not a member of group {}",
                user_id, group_id
            )));
        }

        tracing::info!(group_id = %group_id, user_id = %user_id, "member removed");
        self.get_group(group_id).await
    }

    async fn check_user_references(&self, user: &User) -> AppResult<()> {
        if user.organization.id.is_nil() || user.idp.id.is_nil() {
            // Reported with a precise message by the processor
            return Ok(());
        }

        if self
            .backend
            .find_organization_by_id(user.organization.id)
            .await?
            .is_none()
        {
            return Err(AppError::BadRequest(format!(
                "Organization {} does not exist",
                user.organization.id
            )));
        }

        if self
            .backend
            .find_identity_provider_by_id(user.idp.id)
            .await?
            .is_none()
        {
            return Err(AppError::BadRequest(format!(
                "Identity provider {} does not exist",
                user.idp.id
            )));
        }

        if !user.is_new() {
            if let Some(existing) = self.backend.find_user_by_id(user.id).await? {
                if existing.organization.id != user.organization.id {
                    return Err(AppError::BadRequest(
                        "Users cannot move between organizations".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    async fn check_group_references(&self, group: &Group) -> AppResult<()> {
        if group.organization_id.is_nil() {
            return Ok(());
        }

        if self
            .backend
            .find_organization_by_id(group.organization_id)
            .await?
            .is_none()
        {
            return Err(AppError::BadRequest(format!(
                "Organization {} does not exist",
                group.organization_id
            )));
        }

        if !group.id.is_nil() {
            if let Some(existing) = self.backend.find_group_by_id(group.id).await? {
                if existing.organization_id != group.organization_id {
                    return Err(AppError::BadRequest(
                        "Groups cannot move between organizations".to_string(),
                    ));
                }
            }
        }

        for member in &group.members {
            self.check_member(group, *member).await?;
        }

        Ok(())
    }

    async fn check_member(&self, group: &Group, user_id: Uuid) -> AppResult<()> {
        match self.backend.find_user_by_id(user_id).await? {
            None => Err(AppError::BadRequest(format!(
                "Member {} does not exist",
                user_id
            ))),
            Some(user) if user.organization.id != group.organization_id => {
                Err(AppError::BadRequest(format!(
                    "Member {} belongs to another organization",
                    user_id
                )))
            }
            Some(_) => Ok(()),
        }
    }
}

#[async_trait]
impl TreasuryDb for Treasury {
    async fn user_vault(&self, user: &mut User) -> AppResult<()> {
        UserVaultProcessor::validate_user(user)?;
        self.check_user_references(user).await?;

        let prepared = UserVaultProcessor::prepare_user_for_vault(user, &self.passwords)?;
        let stored = self.backend.vault_user(&prepared).await?;

        tracing::info!(
            user_id = %stored.id,
            organization_id = %stored.organization.id,
            version = stored.version,
            "user vaulted"
        );

        *user = stored;
        Ok(())
    }

    async fn group_vault(&self, group: &mut Group) -> AppResult<()> {
        let prepared = GroupVaultProcessor::prepare_group_for_vault(group)?;
        self.check_group_references(group).await?;

        let stored = self.backend.vault_group(&prepared).await?;

        tracing::info!(
            group_id = %stored.id,
            organization_id = %stored.organization_id,
            version = stored.version,
            members = stored.members.len(),
            "group vaulted"
        );

        *group = stored;
        Ok(())
    }

    async fn authenticate_user(&self, credentials: &Credentials) -> AppResult<User> {
        let invalid = || AppError::Unauthorized(INVALID_CREDENTIALS.to_string());

        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(invalid());
        }

        let Some(user) = self
            .backend
            .find_user_by_email(credentials.organization_id, &credentials.email)
            .await?
        else {
            tracing::debug!(organization_id = %credentials.organization_id, "authentication failed: unknown user");
            return Err(invalid());
        };

        if !user.idp.is_local() {
            return Err(AppError::Unauthorized(format!(
                "User authenticates through identity provider '{}'",
                user.idp.name
            )));
        }

        let Some(hash) = self.backend.find_password_hash(user.id).await? else {
            tracing::debug!(user_id = %user.id, "authentication failed: no credential");
            return Err(invalid());
        };

        if !self.passwords.verify_password(&credentials.password, &hash)? {
            tracing::debug!(user_id = %user.id, "authentication failed: password mismatch");
            return Err(invalid());
        }

        if !user.active {
            tracing::debug!(user_id = %user.id, "authentication failed: inactive user");
            return Err(invalid());
        }

        let now = Utc::now();
        self.backend.record_login(user.id, now).await?;
        tracing::info!(user_id = %user.id, "user authenticated");

        Ok(User {
            last_login_at: Some(now),
            ..user
        })
    }

    async fn authorize_user(&self, user_id: Uuid, role: &str) -> AppResult<AuthorizationDecision> {
        let user = self.get_user(user_id).await?;

        if !user.active {
            return Ok(AuthorizationDecision::denied(user_id, role, "User is inactive"));
        }

        let groups: Vec<Uuid> = self
            .backend
            .find_groups_by_user_id(user_id)
            .await?
            .into_iter()
            .filter(|g| g.organization_id == user.organization.id && g.has_role(role))
            .map(|g| g.id)
            .collect();

        let decision = if groups.is_empty() {
            AuthorizationDecision::denied(user_id, role, "No group grants this role")
        } else {
            AuthorizationDecision::granted(user_id, role, groups)
        };

        tracing::debug!(
            user_id = %user_id,
            role,
            granted = decision.granted,
            "authorization decided"
        );
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::database::{DatabaseBackendConfig, SqliteBackend};
    use crate::backend::Backend;
    use crate::models::{IdentityProvider, Organization};
    use crate::password::PasswordAlgorithm;

    async fn treasury() -> (Treasury, Organization, IdentityProvider) {
        let backend = SqliteBackend::connect(&DatabaseBackendConfig::memory_sqlite())
            .await
            .unwrap();
        backend.init_schema().await.unwrap();
        let org = backend
            .create_organization(&Organization::new("Acme"))
            .await
            .unwrap();
        let idp = backend
            .create_identity_provider(&IdentityProvider::local("local"))
            .await
            .unwrap();

        let treasury = Treasury::new(
            Arc::new(backend),
            PasswordManager::new(PasswordAlgorithm::Argon2id),
        );
        (treasury, org, idp)
    }

    fn alice(org: &Organization, idp: &IdentityProvider) -> User {
        User::new(
            Uuid::nil(),
            "Alice",
            "alice@acme.test",
            Organization::reference(org.id),
            IdentityProvider::reference(idp.id),
        )
        .with_password("Secret123!")
    }

    #[tokio::test]
    async fn test_user_vault_refreshes_record() {
        let (treasury, org, idp) = treasury().await;
        let mut user = alice(&org, &idp);

        treasury.user_vault(&mut user).await.unwrap();
        assert!(!user.id.is_nil());
        assert_eq!(user.version, 1);
        assert!(user.password.is_none());
        assert_eq!(user.organization.name, "Acme");

        user.name = "Alice Liddell".to_string();
        treasury.user_vault(&mut user).await.unwrap();
        assert_eq!(user.version, 2);
    }

    #[tokio::test]
    async fn test_unknown_organization_is_rejected() {
        let (treasury, _, idp) = treasury().await;
        let mut user = alice(&Organization::reference(Uuid::new_v4()), &idp);

        let err = treasury.user_vault(&mut user).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_authentication_failures_are_uniform() {
        let (treasury, org, idp) = treasury().await;
        let mut user = alice(&org, &idp);
        treasury.user_vault(&mut user).await.unwrap();

        let attempt = |email: &str, password: &str| Credentials {
            organization_id: org.id,
            email: email.to_string(),
            password: password.to_string(),
        };

        let ok = treasury
            .authenticate_user(&attempt("ALICE@acme.test", "Secret123!"))
            .await
            .unwrap();
        assert_eq!(ok.id, user.id);
        assert!(ok.last_login_at.is_some());

        for credentials in [
            attempt("alice@acme.test", "wrong"),
            attempt("nobody@acme.test", "Secret123!"),
        ] {
            let err = treasury.authenticate_user(&credentials).await.unwrap_err();
            assert_eq!(err.to_string(), "Unauthorized: Invalid credentials");
        }
    }

    #[tokio::test]
    async fn test_member_from_other_organization_is_rejected() {
        let (treasury, org, idp) = treasury().await;
        let other = treasury
            .backend()
            .create_organization(&Organization::new("Globex"))
            .await
            .unwrap();

        let mut outsider = alice(&other, &idp);
        treasury.user_vault(&mut outsider).await.unwrap();

        let mut group = Group::new(org.id, "admins").with_members([outsider.id]);
        let err = treasury.group_vault(&mut group).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
