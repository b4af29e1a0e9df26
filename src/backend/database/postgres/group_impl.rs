use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::backend::database::group_vault::{GroupWriter, PreparedGroupData};
use crate::backend::database::{
    map_delete_error, map_write_error, GROUPS_TABLE, MEMBERSHIPS_TABLE,
};
use crate::error::{AppError, AppResult};
use crate::models::Group;

/// Member ids aggregated per group, ordered by join time
fn select_sql(where_clause: &str) -> String {
    format!(
        r#"
        SELECT g.id, g.organization_id, g.name, g.description, g.roles, g.version,
               g.created_at, g.updated_at,
               COALESCE(
                   (SELECT array_agg(m.user_id ORDER BY m.created_at, m.user_id)
                    FROM {memberships} m WHERE m.group_id = g.id),
                   ARRAY[]::uuid[]
               ) AS members
        FROM {groups} g
        WHERE {where_clause}
        ORDER BY g.created_at, g.id
        "#,
        memberships = MEMBERSHIPS_TABLE,
        groups = GROUPS_TABLE,
        where_clause = where_clause
    )
}

/// PostgreSQL-specific implementation of GroupWriter
pub struct PostgresGroupWriter {
    pool: PgPool,
}

impl PostgresGroupWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn replace_members(
        tx: &mut Transaction<'_, Postgres>,
        data: &PreparedGroupData,
    ) -> AppResult<()> {
        sqlx::query(&format!("DELETE FROM {} WHERE group_id = $1", MEMBERSHIPS_TABLE))
            .bind(data.id)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_write_error(e, "Group membership"))?;

        if data.members.is_empty() {
            return Ok(());
        }

        sqlx::query(&format!(
            "INSERT INTO {} (group_id, user_id, created_at) SELECT $1, member, $3 FROM UNNEST($2::uuid[]) AS member",
            MEMBERSHIPS_TABLE
        ))
        .bind(data.id)
        .bind(&data.members)
        .bind(data.timestamp)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_write_error(e, "Group membership"))?;

        Ok(())
    }
}

#[async_trait]
impl GroupWriter for PostgresGroupWriter {
    async fn current_group_version(&self, id: Uuid) -> AppResult<Option<i64>> {
        let sql = format!("SELECT version FROM {} WHERE id = $1", GROUPS_TABLE);

        sqlx::query_scalar::<_, i64>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to read group version: {}", e)))
    }

    async fn execute_group_insert(&self, data: &PreparedGroupData) -> AppResult<()> {
        let roles = serde_json::to_value(&data.roles)?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let sql = format!(
            "INSERT INTO {} (id, organization_id, name, description, roles, version, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, 1, $6, $6)",
            GROUPS_TABLE
        );
        sqlx::query(&sql)
            .bind(data.id)
            .bind(data.organization_id)
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
        let roles = serde_json::to_value(&data.roles)?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let sql = format!(
            "UPDATE {} SET organization_id = $2, name = $3, description = $4, roles = $5, \
             version = version + 1, updated_at = $6 WHERE id = $1 AND version = $7",
            GROUPS_TABLE
        );
        let result = sqlx::query(&sql)
            .bind(data.id)
            .bind(data.organization_id)
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

/// PostgreSQL-specific group queries
pub struct PostgresGroupReader {
    pool: PgPool,
}

impl PostgresGroupReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Group>> {
        let row = sqlx::query(&select_sql("g.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to find group: {}", e)))?;

        row.as_ref().map(group_from_row).transpose()
    }

    pub async fn find_by_organization(&self, organization_id: Uuid) -> AppResult<Vec<Group>> {
        let rows = sqlx::query(&select_sql("g.organization_id = $1"))
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to list groups: {}", e)))?;

        rows.iter().map(group_from_row).collect()
    }

    pub async fn find_by_user_id(&self, user_id: Uuid) -> AppResult<Vec<Group>> {
        let where_clause = format!(
            "EXISTS (SELECT 1 FROM {} x WHERE x.group_id = g.id AND x.user_id = $1)",
            MEMBERSHIPS_TABLE
        );
        let rows = sqlx::query(&select_sql(&where_clause))
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to find groups for user: {}", e)))?;

        rows.iter().map(group_from_row).collect()
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
            "INSERT INTO {} (group_id, user_id, created_at) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            MEMBERSHIPS_TABLE
        ))
        .bind(group_id)
        .bind(user_id)
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
            "DELETE FROM {} WHERE group_id = $1 AND user_id = $2",
            MEMBERSHIPS_TABLE
        ))
        .bind(group_id)
        .bind(user_id)
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

    /// Memberships go with the group through ON DELETE CASCADE
    pub async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = $1", GROUPS_TABLE);
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_delete_error(e, "Group"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn touch(
        tx: &mut Transaction<'_, Postgres>,
        group_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(&format!(
            "UPDATE {} SET version = version + 1, updated_at = $2 WHERE id = $1",
            GROUPS_TABLE
        ))
        .bind(group_id)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::Database(format!("Failed to update group version: {}", e)))?;

        Ok(())
    }
}

fn group_from_row(row: &PgRow) -> AppResult<Group> {
    let roles: serde_json::Value = row.try_get("roles")?;

    Ok(Group {
        id: row.try_get("id")?,
        organization_id: row.try_get("organization_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        roles: serde_json::from_value(roles)?,
        members: row.try_get("members")?,
        version: row.try_get("version")?,
        created_at: Some(row.try_get("created_at")?),
        updated_at: Some(row.try_get("updated_at")?),
    })
}
