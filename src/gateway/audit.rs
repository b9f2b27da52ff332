//! Audit logging for gateway decisions and outcomes.
//!
//! The sink is infallible and synchronous from the caller's point of view:
//! it hands structured events to `tracing` under the `audit` target and
//! never reports a failure back into the execution path. When query logging
//! is disabled every call is a no-op.

use tracing::info;
use uuid::Uuid;

use crate::gateway::classifier::StatementClass;
use crate::gateway::policy::DenyReason;
use crate::models::ExecutionResult;

/// Longest SQL prefix included in an audit record.
const SQL_PREVIEW_LEN: usize = 200;

#[derive(Debug, Clone)]
pub struct AuditSink {
    enabled: bool,
}

impl AuditSink {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a request the policy layer rejected.
    pub fn record_denial(
        &self,
        request_id: Uuid,
        class: StatementClass,
        reason: DenyReason,
        sql: &str,
    ) {
        if !self.enabled {
            return;
        }
        info!(
            target: "audit",
            request_id = %request_id,
            class = %class,
            reason = %reason,
            sql = %preview(sql),
            "Request denied"
        );
    }

    /// Record a completed execution, successful or failed.
    ///
    /// `flagged` marks statements that passed only because full access
    /// admits unclassifiable input.
    pub fn record_outcome(
        &self,
        request_id: Uuid,
        class: StatementClass,
        flagged: bool,
        sql: &str,
        result: &ExecutionResult,
    ) {
        if !self.enabled {
            return;
        }
        info!(
            target: "audit",
            request_id = %request_id,
            class = %class,
            flagged = flagged,
            sql = %preview(sql),
            success = result.success,
            row_count = result.row_count,
            truncated = result.truncated,
            rows_affected = result.rows_affected,
            retries = result.retries,
            elapsed_ms = result.execution_time_ms,
            "Request completed"
        );
    }
}

/// Truncate SQL for logging without splitting a UTF-8 character.
fn preview(sql: &str) -> &str {
    if sql.len() <= SQL_PREVIEW_LEN {
        return sql;
    }
    let mut end = SQL_PREVIEW_LEN;
    while !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
