use crate::backend::database::{
    GROUPS_TABLE, IDENTITY_PROVIDERS_TABLE, MEMBERSHIPS_TABLE, ORGANIZATIONS_TABLE, USERS_TABLE,
};
use crate::error::{AppError, AppResult};
use sqlx::SqlitePool;

/// Initialize the database schema for SQLite
///
/// Identifiers are stored as TEXT, timestamps as DATETIME and group roles
/// as a JSON array in TEXT.
pub async fn init_schema(pool: &SqlitePool) -> AppResult<()> {
    let tables = [
        (
            ORGANIZATIONS_TABLE,
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    created_at DATETIME NOT NULL,
                    updated_at DATETIME NOT NULL
                )
                "#,
                ORGANIZATIONS_TABLE
            ),
        ),
        (
            IDENTITY_PROVIDERS_TABLE,
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    kind TEXT NOT NULL CHECK (kind IN ('local', 'federated')),
                    issuer TEXT,
                    created_at DATETIME NOT NULL
                )
                "#,
                IDENTITY_PROVIDERS_TABLE
            ),
        ),
        (
            USERS_TABLE,
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id TEXT PRIMARY KEY,
                    organization_id TEXT NOT NULL REFERENCES {} (id),
                    idp_id TEXT NOT NULL REFERENCES {} (id),
                    name TEXT NOT NULL,
                    email TEXT NOT NULL,
                    password_hash TEXT,
                    active BOOLEAN NOT NULL DEFAULT 1,
                    version INTEGER NOT NULL DEFAULT 1,
                    created_at DATETIME NOT NULL,
                    updated_at DATETIME NOT NULL,
                    last_login_at DATETIME
                )
                "#,
                USERS_TABLE, ORGANIZATIONS_TABLE, IDENTITY_PROVIDERS_TABLE
            ),
        ),
        (
            GROUPS_TABLE,
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id TEXT PRIMARY KEY,
                    organization_id TEXT NOT NULL REFERENCES {} (id),
                    name TEXT NOT NULL,
                    description TEXT,
                    roles TEXT NOT NULL DEFAULT '[]',
                    version INTEGER NOT NULL DEFAULT 1,
                    created_at DATETIME NOT NULL,
                    updated_at DATETIME NOT NULL
                )
                "#,
                GROUPS_TABLE, ORGANIZATIONS_TABLE
            ),
        ),
        (
            MEMBERSHIPS_TABLE,
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    group_id TEXT NOT NULL REFERENCES {} (id) ON DELETE CASCADE,
                    user_id TEXT NOT NULL REFERENCES {} (id) ON DELETE CASCADE,
                    created_at DATETIME NOT NULL,
                    PRIMARY KEY (group_id, user_id)
                )
                "#,
                MEMBERSHIPS_TABLE, GROUPS_TABLE, USERS_TABLE
            ),
        ),
    ];

    for (table, sql) in &tables {
        sqlx::query(sql)
            .execute(pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to create {} table: {}", table, e)))?;
    }

    create_indexes(pool).await?;

    tracing::debug!("sqlite schema initialized");
    Ok(())
}

/// Uniqueness and lookup indexes
async fn create_indexes(pool: &SqlitePool) -> AppResult<()> {
    let indexes = [
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_organizations_name ON {} (LOWER(name))",
            ORGANIZATIONS_TABLE
        ),
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_identity_providers_name ON {} (LOWER(name))",
            IDENTITY_PROVIDERS_TABLE
        ),
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_users_org_email ON {} (organization_id, email)",
            USERS_TABLE
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_users_idp_id ON {} (idp_id)",
            USERS_TABLE
        ),
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_groups_org_name ON {} (organization_id, LOWER(name))",
            GROUPS_TABLE
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_memberships_user_id ON {} (user_id)",
            MEMBERSHIPS_TABLE
        ),
    ];

    for sql in &indexes {
        sqlx::query(sql)
            .execute(pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to create index: {}", e)))?;
    }

    Ok(())
}

/// Drop all tables (for cleanup/testing)
pub async fn drop_schema(pool: &SqlitePool) -> AppResult<()> {
    // Reverse dependency order
    for table in [
        MEMBERSHIPS_TABLE,
        GROUPS_TABLE,
        USERS_TABLE,
        IDENTITY_PROVIDERS_TABLE,
        ORGANIZATIONS_TABLE,
    ] {
        let sql = format!("DROP TABLE IF EXISTS {}", table);
        sqlx::query(&sql)
            .execute(pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to drop table {}: {}", table, e)))?;
    }

    Ok(())
}
