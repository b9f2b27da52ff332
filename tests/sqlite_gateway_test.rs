//! End-to-end tests against a real SQLite database.
//!
//! These exercise the full stack: classification, policy, the sqlx backend,
//! row decoding, and the row cap.

use sql_gateway_mcp::config::{Config, DriverKind};
use sql_gateway_mcp::db::{DbPool, SqlxBackend};
use sql_gateway_mcp::gateway::{DenyReason, Gateway, SecurityMode};
use sql_gateway_mcp::models::ExecutionRequest;
use std::sync::Arc;
use tempfile::TempDir;

fn sqlite_config(dir: &TempDir, mode: SecurityMode, max_result_rows: usize) -> Config {
    Config {
        driver: DriverKind::Sqlite,
        database: Some(dir.path().join("gateway.db").to_string_lossy().into_owned()),
        security_mode: mode,
        max_result_rows,
        ..Config::default_config()
    }
}

async fn connect_gateway(config: &Config) -> Gateway<SqlxBackend> {
    let pool = DbPool::connect(config).await.unwrap();
    Gateway::new(SqlxBackend::new(pool), Arc::new(config.policy()))
}

/// Create a table and seed it with `rows` rows, one statement at a time.
async fn seed(gateway: &Gateway<SqlxBackend>, rows: usize) {
    let result = gateway
        .handle(&ExecutionRequest::new(
            "CREATE TABLE items (id INTEGER PRIMARY KEY, label TEXT NOT NULL)",
        ))
        .await;
    assert!(result.success, "create table failed: {:?}", result.error);

    for i in 0..rows {
        let result = gateway
            .handle(&ExecutionRequest::new(format!(
                "INSERT INTO items (label) VALUES ('item-{}')",
                i
            )))
            .await;
        assert!(result.success, "insert failed: {:?}", result.error);
        assert_eq!(result.rows_affected, Some(1));
    }
}

#[tokio::test]
async fn test_select_returns_decoded_rows() {
    let dir = tempfile::tempdir().unwrap();
    let config = sqlite_config(&dir, SecurityMode::FullAccess, 500);
    let gateway = connect_gateway(&config).await;
    seed(&gateway, 3).await;

    let result = gateway
        .handle(&ExecutionRequest::new(
            "SELECT id, label FROM items ORDER BY id",
        ))
        .await;

    assert!(result.success);
    assert_eq!(result.row_count, 3);
    assert!(!result.truncated);
    assert_eq!(result.rows[0]["id"], serde_json::json!(1));
    assert_eq!(result.rows[0]["label"], serde_json::json!("item-0"));
}

#[tokio::test]
async fn test_row_cap_truncates_large_result() {
    let dir = tempfile::tempdir().unwrap();
    let config = sqlite_config(&dir, SecurityMode::FullAccess, 25);
    let gateway = connect_gateway(&config).await;
    seed(&gateway, 40).await;

    let result = gateway
        .handle(&ExecutionRequest::new("SELECT * FROM items"))
        .await;

    assert!(result.success);
    assert_eq!(result.row_count, 25);
    assert!(result.truncated);
}

#[tokio::test]
async fn test_exact_cap_not_marked_truncated() {
    let dir = tempfile::tempdir().unwrap();
    let config = sqlite_config(&dir, SecurityMode::FullAccess, 25);
    let gateway = connect_gateway(&config).await;
    seed(&gateway, 25).await;

    let result = gateway
        .handle(&ExecutionRequest::new("SELECT * FROM items"))
        .await;

    assert_eq!(result.row_count, 25);
    assert!(!result.truncated);
}

#[tokio::test]
async fn test_readonly_mode_denies_writes_to_existing_db() {
    let dir = tempfile::tempdir().unwrap();

    // Seed through a writable gateway first
    let writable = sqlite_config(&dir, SecurityMode::FullAccess, 500);
    let gateway = connect_gateway(&writable).await;
    seed(&gateway, 2).await;

    let readonly = sqlite_config(&dir, SecurityMode::Readonly, 500);
    let gateway = connect_gateway(&readonly).await;

    let denied = gateway
        .handle(&ExecutionRequest::new(
            "INSERT INTO items (label) VALUES ('nope')",
        ))
        .await;
    assert!(!denied.success);
    assert_eq!(
        denied.error.unwrap().deny_reason,
        Some(DenyReason::ModeForbidden)
    );

    let read = gateway
        .handle(&ExecutionRequest::new("SELECT count(*) AS n FROM items"))
        .await;
    assert!(read.success);
    assert_eq!(read.rows[0]["n"], serde_json::json!(2));
}

#[tokio::test]
async fn test_limited_write_allows_update_denies_delete() {
    let dir = tempfile::tempdir().unwrap();
    let full = sqlite_config(&dir, SecurityMode::FullAccess, 500);
    let gateway = connect_gateway(&full).await;
    seed(&gateway, 2).await;

    let limited = sqlite_config(&dir, SecurityMode::LimitedWrite, 500);
    let gateway = connect_gateway(&limited).await;

    let update = gateway
        .handle(&ExecutionRequest::new(
            "UPDATE items SET label = 'renamed' WHERE id = 1",
        ))
        .await;
    assert!(update.success);
    assert_eq!(update.rows_affected, Some(1));

    let delete = gateway
        .handle(&ExecutionRequest::new("DELETE FROM items"))
        .await;
    assert_eq!(
        delete.error.unwrap().deny_reason,
        Some(DenyReason::ModeForbidden)
    );
}

#[tokio::test]
async fn test_database_error_surfaces_without_retry() {
    let dir = tempfile::tempdir().unwrap();
    let config = sqlite_config(&dir, SecurityMode::FullAccess, 500);
    let gateway = connect_gateway(&config).await;

    let result = gateway
        .handle(&ExecutionRequest::new("SELECT * FROM missing_table"))
        .await;

    assert!(!result.success);
    assert_eq!(result.retries, 0);
    let detail = result.error.unwrap();
    assert!(detail.message.contains("missing_table"));
}
