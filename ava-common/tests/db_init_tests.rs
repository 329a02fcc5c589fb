//! Database initialization tests
//!
//! - Database file and parent directory are created on first run
//! - Re-opening an existing database is idempotent
//! - All tables and indexes exist after init

use ava_common::db::init::{init_database, init_memory_database};
use tempfile::TempDir;

async fn table_names(pool: &sqlx::SqlitePool) -> Vec<String> {
    sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .fetch_all(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("ava.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("ava.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO tenants (id, name, created_at) VALUES ('t1', 'Clinic', '2024-01-01T00:00:00.000000Z')")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tenants")
        .fetch_one(&pool2.unwrap())
        .await
        .unwrap();
    assert_eq!(count, 1, "Existing rows must survive re-initialization");
}

#[tokio::test]
async fn test_schema_tables_exist() {
    let pool = init_memory_database().await.unwrap();
    let tables = table_names(&pool).await;

    for expected in ["assistant_configs", "calls", "tenants", "users"] {
        assert!(tables.iter().any(|t| t == expected), "missing table {expected}: {tables:?}");
    }
}

#[tokio::test]
async fn test_calls_indexes_exist() {
    let pool = init_memory_database().await.unwrap();
    let indexes: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'calls'",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert!(indexes.iter().any(|i| i == "idx_calls_tenant_started"));
    assert!(indexes.iter().any(|i| i == "idx_calls_assistant"));
}

#[tokio::test]
async fn test_memory_database_is_shared_across_queries() {
    let pool = init_memory_database().await.unwrap();

    sqlx::query("INSERT INTO users (id, created_at) VALUES ('u1', '2024-01-01T00:00:00.000000Z')")
        .execute(&pool)
        .await
        .unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}
