use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::backend::database::group_vault::{GroupWriter, PreparedGroupData};
use crate::backend::database::{
    map_delete_error, map_write_error, parse_uuid, GROUPS_TABLE, MEMBERSHIPS_TABLE,
};
use crate::error::{AppError, AppResult};
use crate::models::Group;

/// SQLite-specific implementation of GroupWriter
pub struct SqliteGroupWriter {
    pool: SqlitePool,
}

impl SqliteGroupWriter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn replace_members(
        tx: &mut Transaction<'_, Sqlite>,
        data: &PreparedGroupData,
    ) -> AppResult<()> {
        sqlx::query(&format!("DELETE FROM {} WHERE group_id = ?1", MEMBERSHIPS_TABLE))
            .bind(data.id.to_string())
            .execute(&mut **tx)
            .await
            .map_err(|e| map_write_error(e, "Group membership"))?;

        let insert = format!(
            "INSERT INTO {} (group_id, user_id, created_at) VALUES (?1, ?2, ?3)",
            MEMBERSHIPS_TABLE
        );
        for member in &data.members {
            sqlx::query(&insert)
                .bind(data.id.to_string())
                .bind(member.to_string())
                .bind(data.timestamp)
                .execute(&mut **tx)
                .await
                .map_err(|e| map_write_error(e, "Group membership"))?;
        }

        Ok(())
    }
}

#[async_trait]
impl GroupWriter for SqliteGroupWriter {
    async fn current_group_version(&self, id: Uuid) -> AppResult<Option<i64>> {
        let sql = format!("SELECT version FROM {} WHERE id = ?1", GROUPS_TABLE);

        sqlx::query_scalar::<_, i64>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to read group version: {}", e)))
    }

    async fn execute_group_insert(&self, data: &PreparedGroupData) -> AppResult<()> {
        let roles = serde_json::to_string(&data.roles)?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let sql = format!(
            "INSERT INTO {} (id, organization_id, name, description, roles, version, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
            GROUPS_TABLE
        );
        sqlx::query(&sql)
            .bind(data.id.to_string())
            .bind(data.organization_id.to_string())
            .bind(&data.name)
            .bind(&data.description)
            .bind(roles)
            .bind(data.timestamp)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, "Group"))?;

        Self::replace_members(&mut tx, data).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit group insert: {}", e)))
    }

    async fn execute_group_update(&self, data: &PreparedGroupData) -> AppResult<bool> {
        let roles = serde_json::to_string(&data.roles)?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let sql = format!(
            "UPDATE {} SET organization_id = ?2, name = ?3, description = ?4, roles = ?5, \
             version = version + 1, updated_at = ?6 WHERE id = ?1 AND version = ?7",
            GROUPS_TABLE
        );
        let result = sqlx::query(&sql)
            .bind(data.id.to_string())
            .bind(data.organization_id.to_string())
            .bind(&data.name)
            .bind(&data.description)
            .bind(roles)
            .bind(data.timestamp)
            .bind(data.expected_version)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, "Group"))?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| AppError::Database(format!("Failed to rollback: {}", e)))?;
            return Ok(false);
        }

        Self::replace_members(&mut tx, data).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit group update: {}", e)))?;

        Ok(true)
    }
}

/// SQLite-specific group queries
pub struct SqliteGroupReader {
    pool: SqlitePool,
}

impl SqliteGroupReader {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Group>> {
        let sql = format!("SELECT * FROM {} WHERE id = ?1", GROUPS_TABLE);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to find group: {}", e)))?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_organization(&self, organization_id: Uuid) -> AppResult<Vec<Group>> {
        let sql = format!(
            "SELECT * FROM {} WHERE organization_id = ?1 ORDER BY created_at, id",
            GROUPS_TABLE
        );
        let rows = sqlx::query(&sql)
            .bind(organization_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to list groups: {}", e)))?;

        self.hydrate_all(&rows).await
    }

    pub async fn find_by_user_id(&self, user_id: Uuid) -> AppResult<Vec<Group>> {
        let sql = format!(
            "SELECT g.* FROM {} g INNER JOIN {} m ON m.group_id = g.id \
             WHERE m.user_id = ?1 ORDER BY g.created_at, g.id",
            GROUPS_TABLE, MEMBERSHIPS_TABLE
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to find groups for user: {}", e)))?;

        self.hydrate_all(&rows).await
    }

    /// Insert one membership row, bumping the group version when it was new
    pub async fn add_member(&self, group_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let result = sqlx::query(&format!(
            "INSERT OR IGNORE INTO {} (group_id, user_id, created_at) VALUES (?1, ?2, ?3)",
            MEMBERSHIPS_TABLE
        ))
        .bind(group_id.to_string())
        .bind(user_id.to_string())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, "Group membership"))?;

        let added = result.rows_affected() > 0;
        if added {
            Self::touch(&mut tx, group_id, now).await?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit membership: {}", e)))?;

        Ok(added)
    }

    pub async fn remove_member(&self, group_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE group_id = ?1 AND user_id = ?2",
            MEMBERSHIPS_TABLE
        ))
        .bind(group_id.to_string())
        .bind(user_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_delete_error(e, "Group membership"))?;

        let removed = result.rows_affected() > 0;
        if removed {
            Self::touch(&mut tx, group_id, now).await?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit membership: {}", e)))?;

        Ok(removed)
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query(&format!("DELETE FROM {} WHERE group_id = ?1", MEMBERSHIPS_TABLE))
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_delete_error(e, "Group membership"))?;

        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?1", GROUPS_TABLE))
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_delete_error(e, "Group"))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit group delete: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn touch(
        tx: &mut Transaction<'_, Sqlite>,
        group_id: Uuid,
        now: chrono::DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(&format!(
            "UPDATE {} SET version = version + 1, updated_at = ?2 WHERE id = ?1",
            GROUPS_TABLE
        ))
        .bind(group_id.to_string())
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::Database(format!("Failed to update group version: {}", e)))?;

        Ok(())
    }

    async fn members_of(&self, group_id: &str) -> AppResult<Vec<Uuid>> {
        let sql = format!(
            "SELECT user_id FROM {} WHERE group_id = ?1 ORDER BY created_at, user_id",
            MEMBERSHIPS_TABLE
        );
        let ids: Vec<String> = sqlx::query_scalar(&sql)
            .bind(group_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to load members: {}", e)))?;

        ids.iter().map(|id| parse_uuid(id)).collect()
    }

    async fn hydrate(&self, row: &SqliteRow) -> AppResult<Group> {
        let id: String = row.try_get("id")?;
        let organization_id: String = row.try_get("organization_id")?;
        let roles: String = row.try_get("roles")?;

        Ok(Group {
            id: parse_uuid(&id)?,
            organization_id: parse_uuid(&organization_id)?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            roles: serde_json::from_str(&roles)?,
            members: self.members_of(&id).await?,
            version: row.try_get("version")?,
            created_at: Some(row.try_get("created_at")?),
            updated_at: Some(row.try_get("updated_at")?),
        })
    }

    async fn hydrate_all(&self, rows: &[SqliteRow]) -> AppResult<Vec<Group>> {
        let mut groups = Vec::with_capacity(rows.len());
        for row in rows {
            groups.push(self.hydrate(row).await?);
        }
        Ok(groups)
    }
}
