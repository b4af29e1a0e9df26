use crate::backend::database::{
    GROUPS_TABLE, IDENTITY_PROVIDERS_TABLE, MEMBERSHIPS_TABLE, ORGANIZATIONS_TABLE, USERS_TABLE,
};
use crate::error::{AppError, AppResult};
use sqlx::PgPool;

/// Initialize the database schema for PostgreSQL
///
/// Identifiers are native UUIDs, group roles a JSONB array.
pub async fn init_schema(pool: &PgPool) -> AppResult<()> {
    let organizations_sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
        ORGANIZATIONS_TABLE
    );

    sqlx::query(&organizations_sql)
        .execute(pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to create organizations table: {}", e)))?;

    let idps_sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('local', 'federated')),
            issuer TEXT,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
        IDENTITY_PROVIDERS_TABLE
    );

    sqlx::query(&idps_sql).execute(pool).await.map_err(|e| {
        AppError::Database(format!("Failed to create identity providers table: {}", e))
    })?;

    let users_sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id UUID PRIMARY KEY,
            organization_id UUID NOT NULL REFERENCES {} (id),
            idp_id UUID NOT NULL REFERENCES {} (id),
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            password_hash TEXT,
            active BOOLEAN NOT NULL DEFAULT TRUE,
            version BIGINT NOT NULL DEFAULT 1,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            last_login_at TIMESTAMP WITH TIME ZONE
        )
        "#,
        USERS_TABLE, ORGANIZATIONS_TABLE, IDENTITY_PROVIDERS_TABLE
    );

    sqlx::query(&users_sql)
        .execute(pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to create users table: {}", e)))?;

    let groups_sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id UUID PRIMARY KEY,
            organization_id UUID NOT NULL REFERENCES {} (id),
            name TEXT NOT NULL,
            description TEXT,
            roles JSONB NOT NULL DEFAULT '[]'::jsonb,
            version BIGINT NOT NULL DEFAULT 1,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
        GROUPS_TABLE, ORGANIZATIONS_TABLE
    );

    sqlx::query(&groups_sql)
        .execute(pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to create groups table: {}", e)))?;

    let memberships_sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            group_id UUID NOT NULL REFERENCES {} (id) ON DELETE CASCADE,
            user_id UUID NOT NULL REFERENCES {} (id) ON DELETE CASCADE,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            PRIMARY KEY (group_id, user_id)
        )
        "#,
        MEMBERSHIPS_TABLE, GROUPS_TABLE, USERS_TABLE
    );

    sqlx::query(&memberships_sql)
        .execute(pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to create memberships table: {}", e)))?;

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
            "CREATE INDEX IF NOT EXISTS idx_groups_roles ON {} USING GIN (roles)",
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
pub async fn drop_schema(pool: &PgPool) -> AppResult<()> {
    let sql = format!(
        "DROP TABLE IF EXISTS {}, {}, {}, {}, {} CASCADE",
        MEMBERSHIPS_TABLE, GROUPS_TABLE, USERS_TABLE, IDENTITY_PROVIDERS_TABLE, ORGANIZATIONS_TABLE
    );

    sqlx::query(&sql)
        .execute(pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to drop schema: {}", e)))?;

    Ok(())
}
