use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Tenant boundary: every user and group belongs to exactly one organization
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Organization {
    #[serde(default)]
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Organization {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::nil(),
            name: name.into(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Reference to an already stored organization by id only
    pub fn reference(id: Uuid) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

/// Where a user's identity is asserted
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IdentityProviderKind {
    /// Credentials are held and verified by this store
    #[default]
    Local,
    /// Identity is asserted by an external issuer
    Federated,
}

impl IdentityProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Federated => "federated",
        }
    }
}

impl fmt::Display for IdentityProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "federated" => Ok(Self::Federated),
            other => Err(format!("Unknown identity provider kind: {}", other)),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct IdentityProvider {
    #[serde(default)]
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: IdentityProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl IdentityProvider {
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn federated(name: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: IdentityProviderKind::Federated,
            issuer: Some(issuer.into()),
            ..Default::default()
        }
    }

    pub fn reference(id: Uuid) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn is_local(&self) -> bool {
        self.kind == IdentityProviderKind::Local
    }
}

fn default_active() -> bool {
    true
}

/// User record with its organization and identity provider embedded by value
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    #[serde(default)]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub organization: Organization,
    pub idp: IdentityProvider,
    /// Write-only: accepted on input, never serialized
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub version: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        email: impl Into<String>,
        organization: Organization,
        idp: IdentityProvider,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            organization,
            idp,
            password: None,
            active: true,
            version: 0,
            created_at: None,
            updated_at: None,
            last_login_at: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn is_new(&self) -> bool {
        self.id.is_nil()
    }
}

impl Default for User {
    fn default() -> Self {
        Self::new(
            Uuid::nil(),
            String::new(),
            String::new(),
            Organization::default(),
            IdentityProvider::default(),
        )
    }
}

/// Named set of users inside one organization carrying the roles it grants
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Group {
    #[serde(default)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub members: Vec<Uuid>,
    #[serde(default)]
    pub version: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Group {
    pub fn new(organization_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            organization_id,
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_members(mut self, members: impl IntoIterator<Item = Uuid>) -> Self {
        self.members = members.into_iter().collect();
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Credentials {
    pub organization_id: Uuid,
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuthorizationDecision {
    pub user_id: Uuid,
    pub role: String,
    pub granted: bool,
    /// Groups through which the role is held
    #[serde(default)]
    pub groups: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuthorizationDecision {
    pub fn granted(user_id: Uuid, role: impl Into<String>, groups: Vec<Uuid>) -> Self {
        Self {
            user_id,
            role: role.into(),
            granted: true,
            groups,
            reason: None,
        }
    }

    pub fn denied(user_id: Uuid, role: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            user_id,
            role: role.into(),
            granted: false,
            groups: Vec::new(),
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub total_results: usize,
    pub resources: Vec<T>,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(resources: Vec<T>) -> Self {
        Self {
            total_results: resources.len(),
            resources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_fields_readable() {
        let id = Uuid::new_v4();
        let org = Organization::new("Acme");
        let idp = IdentityProvider::local("local");
        let user = User::new(id, "Alice", "alice@acme.test", org.clone(), idp.clone());

        assert_eq!(user.id, id);
        assert_eq!(user.name, "Alice");
        assert_eq!(user.email, "alice@acme.test");
        assert_eq!(user.organization, org);
        assert_eq!(user.idp, idp);
        assert!(user.active);
        assert!(!user.is_new());
    }

    #[test]
    fn test_password_is_write_only() {
        let user = User::default().with_password("Secret123!");
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());

        let parsed: User = serde_json::from_value(serde_json::json!({
            "name": "Bob",
            "email": "bob@acme.test",
            "organization": { "id": Uuid::nil() },
            "idp": { "id": Uuid::nil() },
            "password": "Secret123!"
        }))
        .unwrap();
        assert_eq!(parsed.password.as_deref(), Some("Secret123!"));
        assert!(parsed.active);
        assert!(parsed.is_new());
    }

    #[test]
    fn test_idp_kind_parsing() {
        assert_eq!(
            "LOCAL".parse::<IdentityProviderKind>().unwrap(),
            IdentityProviderKind::Local
        );
        assert_eq!(
            "federated".parse::<IdentityProviderKind>().unwrap(),
            IdentityProviderKind::Federated
        );
        assert!("saml".parse::<IdentityProviderKind>().is_err());
    }

    #[test]
    fn test_group_roles() {
        let group = Group::new(Uuid::new_v4(), "admins").with_roles(["admin", "audit"]);
        assert!(group.has_role("admin"));
        assert!(!group.has_role("Admin"));
    }
}
