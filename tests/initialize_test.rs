use treasury::backend::{Backend, DatabaseType};
use treasury::config::AppConfig;
use treasury::{initialize_db, initialize_from_config, initialize_sqlite, AppError};
use uuid::Uuid;

mod common;

fn temp_db_path() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("treasury-{}.db", Uuid::new_v4()))
}

#[tokio::test]
async fn test_sqlite_memory_urls() {
    for url in [":memory:", "sqlite::memory:", "sqlite://:memory:"] {
        let backend = initialize_sqlite(url).await.unwrap();
        backend.health_check().await.unwrap();
        assert_eq!(backend.database_type(), DatabaseType::SQLite);
    }
}

#[tokio::test]
async fn test_sqlite_creates_missing_file() {
    let path = temp_db_path();
    assert!(!path.exists());

    let backend = initialize_sqlite(path.to_str().unwrap()).await.unwrap();
    backend.cleanup().await.unwrap();
    assert!(path.exists());

    // Reopening an existing database is fine as well
    let prefixed = format!("sqlite:{}", path.display());
    let backend = initialize_db(DatabaseType::SQLite, &prefixed).await.unwrap();
    backend.health_check().await.unwrap();
    backend.cleanup().await.unwrap();

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_unusable_urls_fail() {
    for url in ["", "   ", "sqlite:"] {
        let err = initialize_sqlite(url).await.err().unwrap();
        assert!(matches!(err, AppError::Configuration(_)), "url {:?}", url);
    }

    for url in ["sqlite::memory:", "whatever", "mysql://localhost/db"] {
        let err = initialize_db(DatabaseType::PostgreSQL, url)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Configuration(_)), "url {:?}", url);
    }

    let missing_dir = std::env::temp_dir()
        .join(format!("treasury-missing-{}", Uuid::new_v4()))
        .join("nested/treasury.db");
    let err = initialize_sqlite(missing_dir.to_str().unwrap())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, AppError::Database(_)));
}

#[tokio::test]
async fn test_postgres_initializer() {
    let (url, _container) = common::postgres_url().await;

    let backend = initialize_db(DatabaseType::PostgreSQL, &url).await.unwrap();
    assert_eq!(backend.database_type(), DatabaseType::PostgreSQL);
    backend.health_check().await.unwrap();

    // Schema creation is idempotent
    let again = initialize_db(DatabaseType::PostgreSQL, &url).await.unwrap();
    again.health_check().await.unwrap();
}

#[tokio::test]
async fn test_initialize_from_config() {
    let config = AppConfig::from_yaml(
        r#"
server:
  host: "127.0.0.1"
  port: 3000
backend:
  type: database
  database:
    type: sqlite
    url: ":memory:"
"#,
    )
    .unwrap();

    let backend = initialize_from_config(&config).await.unwrap();
    assert_eq!(backend.database_type(), DatabaseType::SQLite);
}
