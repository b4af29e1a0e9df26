use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::backend::database::{
    map_delete_error, map_write_error, parse_uuid, IDENTITY_PROVIDERS_TABLE, ORGANIZATIONS_TABLE,
};
use crate::error::{AppError, AppResult};
use crate::models::{IdentityProvider, Organization};

/// Organization and identity provider storage for SQLite
pub struct SqliteDirectory {
    pool: SqlitePool,
}

impl SqliteDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert_organization(&self, organization: &Organization) -> AppResult<()> {
        let sql = format!(
            "INSERT INTO {} (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            ORGANIZATIONS_TABLE
        );

        sqlx::query(&sql)
            .bind(organization.id.to_string())
            .bind(&organization.name)
            .bind(organization.created_at)
            .bind(organization.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "Organization"))?;

        Ok(())
    }

    pub async fn find_organization(&self, id: Uuid) -> AppResult<Option<Organization>> {
        let sql = format!("SELECT * FROM {} WHERE id = ?1", ORGANIZATIONS_TABLE);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to find organization: {}", e)))?;

        row.as_ref().map(organization_from_row).transpose()
    }

    pub async fn list_organizations(&self) -> AppResult<Vec<Organization>> {
        let sql = format!("SELECT * FROM {} ORDER BY name", ORGANIZATIONS_TABLE);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to list organizations: {}", e)))?;

        rows.iter().map(organization_from_row).collect()
    }

    pub async fn delete_organization(&self, id: Uuid) -> AppResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", ORGANIZATIONS_TABLE);
        let result = sqlx::query(&sql)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| map_delete_error(e, "Organization"))?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn insert_identity_provider(&self, idp: &IdentityProvider) -> AppResult<()> {
        let sql = format!(
            "INSERT INTO {} (id, name, kind, issuer, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            IDENTITY_PROVIDERS_TABLE
        );

        sqlx::query(&sql)
            .bind(idp.id.to_string())
            .bind(&idp.name)
            .bind(idp.kind.as_str())
            .bind(&idp.issuer)
            .bind(idp.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "Identity provider"))?;

        Ok(())
    }

    pub async fn find_identity_provider(&self, id: Uuid) -> AppResult<Option<IdentityProvider>> {
        let sql = format!("SELECT * FROM {} WHERE id = ?1", IDENTITY_PROVIDERS_TABLE);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to find identity provider: {}", e)))?;

        row.as_ref().map(identity_provider_from_row).transpose()
    }

    pub async fn list_identity_providers(&self) -> AppResult<Vec<IdentityProvider>> {
        let sql = format!("SELECT * FROM {} ORDER BY name", IDENTITY_PROVIDERS_TABLE);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to list identity providers: {}", e))
            })?;

        rows.iter().map(identity_provider_from_row).collect()
    }

    pub async fn delete_identity_provider(&self, id: Uuid) -> AppResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", IDENTITY_PROVIDERS_TABLE);
        let result = sqlx::query(&sql)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| map_delete_error(e, "Identity provider"))?;

        Ok(result.rows_affected() > 0)
    }
}

fn organization_from_row(row: &SqliteRow) -> AppResult<Organization> {
    let id: String = row.try_get("id")?;
    Ok(Organization {
        id: parse_uuid(&id)?,
        name: row.try_get("name")?,
        created_at: Some(row.try_get("created_at")?),
        updated_at: Some(row.try_get("updated_at")?),
    })
}

fn identity_provider_from_row(row: &SqliteRow) -> AppResult<IdentityProvider> {
    let id: String = row.try_get("id")?;
    let kind: String = row.try_get("kind")?;
    Ok(IdentityProvider {
        id: parse_uuid(&id)?,
        name: row.try_get("name")?,
        kind: kind.parse().map_err(AppError::Database)?,
        issuer: row.try_get("issuer")?,
        created_at: Some(row.try_get("created_at")?),
    })
}
