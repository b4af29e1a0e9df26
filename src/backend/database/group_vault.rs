use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::VaultAction;
use crate::error::{AppError, AppResult};
use crate::models::Group;

/// Group data ready for the database, with members split out for the
/// membership table
#[derive(Debug, Clone)]
pub struct PreparedGroupData {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub roles: Vec<String>,
    pub members: Vec<Uuid>,
    pub expected_version: i64,
    pub timestamp: DateTime<Utc>,
}

/// Database-specific adapter for group vault operations
///
/// Implementations write the group row and its membership set in one
/// transaction.
#[async_trait]
pub trait GroupWriter: Send + Sync {
    async fn current_group_version(&self, id: Uuid) -> AppResult<Option<i64>>;

    async fn execute_group_insert(&self, data: &PreparedGroupData) -> AppResult<()>;

    /// Replace row and member set if the version still matches
    async fn execute_group_update(&self, data: &PreparedGroupData) -> AppResult<bool>;
}

/// Shared business logic for group vault operations
pub struct GroupVaultProcessor;

impl GroupVaultProcessor {
    pub fn prepare_group_for_vault(group: &Group) -> AppResult<PreparedGroupData> {
        let name = group.name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("Group name cannot be empty".to_string()));
        }

        if group.organization_id.is_nil() {
            return Err(AppError::BadRequest(
                "Group must reference an organization".to_string(),
            ));
        }

        let id = if group.id.is_nil() {
            Uuid::new_v4()
        } else {
            group.id
        };

        Ok(PreparedGroupData {
            id,
            organization_id: group.organization_id,
            name: name.to_string(),
            description: group
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            roles: Self::normalize_roles(&group.roles)?,
            members: Self::dedup_members(&group.members),
            expected_version: group.version,
            timestamp: Utc::now(),
        })
    }

    /// Trim roles, reject blanks and drop duplicates keeping first occurrence
    pub fn normalize_roles(roles: &[String]) -> AppResult<Vec<String>> {
        let mut normalized: Vec<String> = Vec::with_capacity(roles.len());
        for role in roles {
            let role = role.trim();
            if role.is_empty() {
                return Err(AppError::BadRequest("Role names cannot be empty".to_string()));
            }
            if !normalized.iter().any(|r| r == role) {
                normalized.push(role.to_string());
            }
        }
        Ok(normalized)
    }

    pub fn dedup_members(members: &[Uuid]) -> Vec<Uuid> {
        let mut unique: Vec<Uuid> = Vec::with_capacity(members.len());
        for member in members {
            if !unique.contains(member) {
                unique.push(*member);
            }
        }
        unique
    }
}

/// Unified group vault operations using the adapter pattern
pub struct UnifiedGroupVaultOps<T: GroupWriter> {
    writer: T,
}

impl<T: GroupWriter> UnifiedGroupVaultOps<T> {
    pub fn new(writer: T) -> Self {
        Self { writer }
    }

    pub async fn vault_group(&self, data: &PreparedGroupData) -> AppResult<VaultAction> {
        match self.writer.current_group_version(data.id).await? {
            None => {
                self.writer.execute_group_insert(data).await?;
                Ok(VaultAction::Inserted)
            }
            Some(current) if current != data.expected_version => {
                tracing::debug!(
                    group_id = %data.id,
                    current,
                    expected = data.expected_version,
                    "group version mismatch"
                );
                Err(AppError::PreconditionFailed)
            }
            Some(_) => {
                if self.writer.execute_group_update(data).await? {
                    Ok(VaultAction::Updated)
                } else {
                    Err(AppError::PreconditionFailed)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_group_for_vault() {
        let member = Uuid::new_v4();
        let group = Group::new(Uuid::new_v4(), " Admins ")
            .with_roles([" admin ", "audit", "admin"])
            .with_members([member, member]);

        let prepared = GroupVaultProcessor::prepare_group_for_vault(&group).unwrap();

        assert!(!prepared.id.is_nil());
        assert_eq!(prepared.name, "Admins");
        assert_eq!(prepared.roles, vec!["admin", "audit"]);
        assert_eq!(prepared.members, vec![member]);
        assert!(prepared.description.is_none());
    }

    #[test]
    fn test_existing_id_is_kept() {
        let mut group = Group::new(Uuid::new_v4(), "ops");
        group.id = Uuid::new_v4();
        group.version = 3;
        group.description = Some("  ".to_string());

        let prepared = GroupVaultProcessor::prepare_group_for_vault(&group).unwrap();
        assert_eq!(prepared.id, group.id);
        assert_eq!(prepared.expected_version, 3);
        assert!(prepared.description.is_none());
    }

    #[test]
    fn test_invalid_groups() {
        assert!(GroupVaultProcessor::prepare_group_for_vault(&Group::new(Uuid::new_v4(), " ")).is_err());
        assert!(GroupVaultProcessor::prepare_group_for_vault(&Group::new(Uuid::nil(), "ops")).is_err());
        assert!(GroupVaultProcessor::prepare_group_for_vault(
            &Group::new(Uuid::new_v4(), "ops").with_roles(["admin", " "])
        )
        .is_err());
    }
}
