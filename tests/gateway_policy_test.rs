//! Integration tests for policy enforcement through the gateway pipeline.
//!
//! These tests verify that denied statements never touch the backend and
//! that allowed statements execute with the expected result shape.

mod common;

use common::{MockBackend, Step, policy};
use sql_gateway_mcp::gateway::{DenyReason, Gateway, SecurityMode};
use sql_gateway_mcp::models::{ErrorKind, ExecutionRequest};

#[tokio::test]
async fn test_readonly_denies_destructive_without_db_call() {
    let backend = MockBackend::new(vec![Step::Affected(1)]);
    let gateway = Gateway::new(backend.clone(), policy(SecurityMode::Readonly, "SALES", 3));

    let request = ExecutionRequest::new("DELETE FROM orders WHERE id = 1").with_schema("SALES");
    let result = gateway.handle(&request).await;

    assert!(!result.success);
    let detail = result.error.unwrap();
    assert_eq!(detail.kind, ErrorKind::PolicyDenied);
    assert_eq!(detail.deny_reason, Some(DenyReason::ModeForbidden));
    assert_eq!(backend.connect_count(), 0);
}

#[tokio::test]
async fn test_schema_outside_allow_list_denied() {
    let backend = MockBackend::new(vec![Step::Rows(1)]);
    let gateway = Gateway::new(backend.clone(), policy(SecurityMode::Readonly, "SALES", 3));

    let request = ExecutionRequest::new("SELECT * FROM ledger").with_schema("FINANCE");
    let result = gateway.handle(&request).await;

    assert_eq!(
        result.error.unwrap().deny_reason,
        Some(DenyReason::SchemaForbidden)
    );
    assert_eq!(backend.connect_count(), 0);
}

#[tokio::test]
async fn test_limited_write_executes_insert_on_wildcard() {
    let backend = MockBackend::new(vec![Step::Affected(1)]);
    let gateway = Gateway::new(backend.clone(), policy(SecurityMode::LimitedWrite, "*", 3));

    let request = ExecutionRequest::new("INSERT INTO audit_log (msg) VALUES ('hi')");
    let result = gateway.handle(&request).await;

    assert!(result.success);
    assert_eq!(result.rows_affected, Some(1));
    assert_eq!(result.retries, 0);
    assert_eq!(backend.connect_count(), 1);
}

#[tokio::test]
async fn test_limited_write_still_denies_destructive() {
    let backend = MockBackend::new(vec![Step::Affected(1)]);
    let gateway = Gateway::new(backend.clone(), policy(SecurityMode::LimitedWrite, "*", 3));

    let request = ExecutionRequest::new("DROP TABLE audit_log");
    let result = gateway.handle(&request).await;

    assert_eq!(
        result.error.unwrap().deny_reason,
        Some(DenyReason::ModeForbidden)
    );
    assert_eq!(backend.connect_count(), 0);
}

#[tokio::test]
async fn test_readonly_denies_data_modifying_cte() {
    let backend = MockBackend::new(vec![Step::Affected(1)]);
    let gateway = Gateway::new(backend.clone(), policy(SecurityMode::Readonly, "*", 3));

    let request =
        ExecutionRequest::new("WITH cte AS (SELECT 1) INSERT INTO t SELECT x FROM cte");
    let result = gateway.handle(&request).await;

    assert!(!result.success);
    assert_eq!(
        result.error.unwrap().deny_reason,
        Some(DenyReason::ModeForbidden)
    );
    assert_eq!(backend.connect_count(), 0);
}

#[tokio::test]
async fn test_limited_write_executes_data_modifying_cte() {
    let backend = MockBackend::new(vec![Step::Affected(4)]);
    let gateway = Gateway::new(backend.clone(), policy(SecurityMode::LimitedWrite, "*", 3));

    let request =
        ExecutionRequest::new("WITH cte AS (SELECT 1) INSERT INTO t SELECT x FROM cte");
    let result = gateway.handle(&request).await;

    assert!(result.success);
    assert_eq!(result.rows_affected, Some(4));
    assert_eq!(backend.connect_count(), 1);
}

#[tokio::test]
async fn test_multi_statement_denied_as_unclassifiable() {
    let backend = MockBackend::new(vec![Step::Rows(1)]);
    let gateway = Gateway::new(backend.clone(), policy(SecurityMode::LimitedWrite, "*", 3));

    let request = ExecutionRequest::new("SELECT 1; SELECT 2");
    let result = gateway.handle(&request).await;

    assert_eq!(
        result.error.unwrap().deny_reason,
        Some(DenyReason::Unclassifiable)
    );
    assert_eq!(backend.connect_count(), 0);
}

#[tokio::test]
async fn test_full_access_executes_unclassifiable() {
    let backend = MockBackend::new(vec![Step::Rows(2)]);
    let gateway = Gateway::new(backend.clone(), policy(SecurityMode::FullAccess, "*", 3));

    let request = ExecutionRequest::new("VACUUM");
    let result = gateway.handle(&request).await;

    assert!(result.success);
    assert_eq!(backend.connect_count(), 1);
}

#[tokio::test]
async fn test_denial_is_deterministic_across_repeats() {
    let backend = MockBackend::new(vec![]);
    let gateway = Gateway::new(backend.clone(), policy(SecurityMode::Readonly, "SALES", 3));

    for _ in 0..5 {
        let request = ExecutionRequest::new("UPDATE t SET x = 1").with_schema("SALES");
        let result = gateway.handle(&request).await;
        assert_eq!(
            result.error.unwrap().deny_reason,
            Some(DenyReason::ModeForbidden)
        );
    }
    assert_eq!(backend.connect_count(), 0);
}

#[tokio::test]
async fn test_row_cap_marks_truncation() {
    let backend = MockBackend::new(vec![Step::Rows(10_000)]);
    let gateway = Gateway::new(backend, policy(SecurityMode::Readonly, "*", 3));

    let request = ExecutionRequest::new("SELECT * FROM big_table");
    let result = gateway.handle(&request).await;

    assert!(result.success);
    assert_eq!(result.row_count, 500);
    assert!(result.truncated);
}

#[tokio::test]
async fn test_result_under_cap_not_truncated() {
    let backend = MockBackend::new(vec![Step::Rows(42)]);
    let gateway = Gateway::new(backend, policy(SecurityMode::Readonly, "*", 3));

    let request = ExecutionRequest::new("SELECT * FROM small_table");
    let result = gateway.handle(&request).await;

    assert!(result.success);
    assert_eq!(result.row_count, 42);
    assert!(!result.truncated);
}
