use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{IdentityProvider, IdentityProviderKind, Organization};

/// Shared validation for organization and identity provider records
pub struct DirectoryProcessor;

impl DirectoryProcessor {
    pub fn prepare_organization(organization: &Organization) -> AppResult<Organization> {
        let name = organization.name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest(
                "Organization name cannot be empty".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(Organization {
            id: Self::assign_id(organization.id),
            name: name.to_string(),
            created_at: Some(now),
            updated_at: Some(now),
        })
    }

    pub fn prepare_identity_provider(idp: &IdentityProvider) -> AppResult<IdentityProvider> {
        let name = idp.name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest(
                "Identity provider name cannot be empty".to_string(),
            ));
        }

        let issuer = idp
            .issuer
            .as_deref()
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .map(str::to_string);

        if idp.kind == IdentityProviderKind::Federated && issuer.is_none() {
            return Err(AppError::BadRequest(
                "Federated identity providers require an issuer".to_string(),
            ));
        }

        Ok(IdentityProvider {
            id: Self::assign_id(idp.id),
            name: name.to_string(),
            kind: idp.kind,
            issuer,
            created_at: Some(Utc::now()),
        })
    }

    fn assign_id(id: Uuid) -> Uuid {
        if id.is_nil() {
            Uuid::new_v4()
        } else {
            id
        }
    }
}
