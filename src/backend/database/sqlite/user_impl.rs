use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::backend::database::user_vault::{PreparedUserData, UserVaultProcessor, UserWriter};
use crate::backend::database::{
    map_delete_error, map_write_error, parse_uuid, IDENTITY_PROVIDERS_TABLE, MEMBERSHIPS_TABLE,
    ORGANIZATIONS_TABLE, USERS_TABLE,
};
use crate::error::{AppError, AppResult};
use crate::models::{IdentityProvider, Organization, User};

/// SQLite-specific implementation of UserWriter
pub struct SqliteUserWriter {
    pool: SqlitePool,
}

impl SqliteUserWriter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserWriter for SqliteUserWriter {
    async fn current_user_version(&self, id: Uuid) -> AppResult<Option<i64>> {
        let sql = format!("SELECT version FROM {} WHERE id = ?1", USERS_TABLE);

        sqlx::query_scalar::<_, i64>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to read user version: {}", e)))
    }

    async fn execute_user_insert(&self, data: &PreparedUserData) -> AppResult<()> {
        let sql = format!(
            "INSERT INTO {} (id, organization_id, idp_id, name, email, password_hash, active, version, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)",
            USERS_TABLE
        );

        sqlx::query(&sql)
            .bind(data.id.to_string())
            .bind(data.organization_id.to_string())
            .bind(data.idp_id.to_string())
            .bind(&data.name)
            .bind(&data.email)
            .bind(&data.password_hash)
            .bind(data.active)
            .bind(data.timestamp)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "User"))?;

        Ok(())
    }

    async fn execute_user_update(&self, data: &PreparedUserData) -> AppResult<bool> {
        let sql = format!(
            "UPDATE {} SET organization_id = ?2, idp_id = ?3, name = ?4, email = ?5, \
             password_hash = COALESCE(?6, password_hash), active = ?7, version = version + 1, updated_at = ?8 \
             WHERE id = ?1 AND version = ?9",
            USERS_TABLE
        );

        let result = sqlx::query(&sql)
            .bind(data.id.to_string())
            .bind(data.organization_id.to_string())
            .bind(data.idp_id.to_string())
            .bind(&data.name)
            .bind(&data.email)
            .bind(&data.password_hash)
            .bind(data.active)
            .bind(data.timestamp)
            .bind(data.expected_version)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "User"))?;

        Ok(result.rows_affected() > 0)
    }
}

/// SQLite-specific user queries
pub struct SqliteUserReader {
    pool: SqlitePool,
}

impl SqliteUserReader {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// SELECT joining the organization and identity provider of each user
    fn select_sql(where_clause: &str) -> String {
        format!(
            r#"
            SELECT
                u.id, u.name, u.email, u.active, u.version,
                u.created_at, u.updated_at, u.last_login_at,
                o.id AS org_id, o.name AS org_name,
                o.created_at AS org_created_at, o.updated_at AS org_updated_at,
                i.id AS idp_id, i.name AS idp_name, i.kind AS idp_kind,
                i.issuer AS idp_issuer, i.created_at AS idp_created_at
            FROM {} u
            INNER JOIN {} o ON o.id = u.organization_id
            INNER JOIN {} i ON i.id = u.idp_id
            WHERE {}
            ORDER BY u.created_at, u.id
            "#,
            USERS_TABLE, ORGANIZATIONS_TABLE, IDENTITY_PROVIDERS_TABLE, where_clause
        )
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query(&Self::select_sql("u.id = ?1"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to find user: {}", e)))?;

        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn find_by_email(&self, organization_id: Uuid, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(&Self::select_sql(
            "u.organization_id = ?1 AND u.email = ?2",
        ))
        .bind(organization_id.to_string())
        .bind(UserVaultProcessor::normalize_email(email))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to find user by email: {}", e)))?;

        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn find_by_organization(&self, organization_id: Uuid) -> AppResult<Vec<User>> {
        let rows = sqlx::query(&Self::select_sql("u.organization_id = ?1"))
            .bind(organization_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to list users: {}", e)))?;

        rows.iter().map(user_from_row).collect()
    }

    pub async fn find_password_hash(&self, id: Uuid) -> AppResult<Option<String>> {
        let sql = format!("SELECT password_hash FROM {} WHERE id = ?1", USERS_TABLE);

        let hash: Option<Option<String>> = sqlx::query_scalar(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to read credential: {}", e)))?;

        Ok(hash.flatten())
    }

    pub async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        let sql = format!("UPDATE {} SET last_login_at = ?2 WHERE id = ?1", USERS_TABLE);

        sqlx::query(&sql)
            .bind(id.to_string())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to record login: {}", e)))?;

        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query(&format!("DELETE FROM {} WHERE user_id = ?1", MEMBERSHIPS_TABLE))
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_delete_error(e, "User membership"))?;

        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?1", USERS_TABLE))
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_delete_error(e, "User"))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit user delete: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}

fn user_from_row(row: &SqliteRow) -> AppResult<User> {
    let id: String = row.try_get("id")?;
    let org_id: String = row.try_get("org_id")?;
    let idp_id: String = row.try_get("idp_id")?;
    let idp_kind: String = row.try_get("idp_kind")?;

    Ok(User {
        id: parse_uuid(&id)?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        organization: Organization {
            id: parse_uuid(&org_id)?,
            name: row.try_get("org_name")?,
            created_at: Some(row.try_get("org_created_at")?),
            updated_at: Some(row.try_get("org_updated_at")?),
        },
        idp: IdentityProvider {
            id: parse_uuid(&idp_id)?,
            name: row.try_get("idp_name")?,
            kind: idp_kind.parse().map_err(AppError::Database)?,
            issuer: row.try_get("idp_issuer")?,
            created_at: Some(row.try_get("idp_created_at")?),
        },
        password: None,
        active: row.try_get("active")?,
        version: row.try_get("version")?,
        created_at: Some(row.try_get("created_at")?),
        updated_at: Some(row.try_get("updated_at")?),
        last_login_at: row.try_get("last_login_at")?,
    })
}
