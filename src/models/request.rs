//! Request and result models for gateway executions.
//!
//! These are the wire types exchanged with MCP clients. Rows are plain JSON
//! maps so any driver's output serializes uniformly.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::gateway::policy::DenyReason;

/// A single SQL execution submitted to the gateway.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub sql: String,
    /// Target schema; falls back to the configured default when absent.
    pub schema: Option<String>,
    /// Correlates audit records with the originating call.
    pub request_id: Uuid,
}

impl ExecutionRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            schema: None,
            request_id: Uuid::new_v4(),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

/// Wire-level error category carried in [`ErrorDetail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PolicyDenied,
    ConnectionTimeout,
    QueryTimeout,
    RetriesExhausted,
    DatabaseError,
    Internal,
}

/// Structured error information on a failed [`ExecutionResult`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    /// Present only when `kind` is `policy_denied`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deny_reason: Option<DenyReason>,
    pub message: String,
}

impl From<&GatewayError> for ErrorDetail {
    fn from(err: &GatewayError) -> Self {
        Self {
            kind: err.kind(),
            deny_reason: err.deny_reason(),
            message: err.to_string(),
        }
    }
}

/// Outcome of a gateway execution, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionResult {
    pub success: bool,
    /// Result rows, capped at the configured maximum.
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    pub row_count: usize,
    /// True when the result was cut off at the row cap. Not an error.
    pub truncated: bool,
    /// Rows affected, for write statements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
    /// Number of retried attempts before the final outcome.
    pub retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    pub execution_time_ms: u64,
}

impl ExecutionResult {
    /// A successful row-returning result.
    pub fn rows(
        rows: Vec<serde_json::Map<String, JsonValue>>,
        truncated: bool,
        retries: u32,
        execution_time_ms: u64,
    ) -> Self {
        let row_count = rows.len();
        Self {
            success: true,
            rows,
            row_count,
            truncated,
            rows_affected: None,
            retries,
            error: None,
            execution_time_ms,
        }
    }

    /// A successful write result.
    pub fn write(rows_affected: u64, retries: u32, execution_time_ms: u64) -> Self {
        Self {
            success: true,
            rows: Vec::new(),
            row_count: 0,
            truncated: false,
            rows_affected: Some(rows_affected),
            retries,
            error: None,
            execution_time_ms,
        }
    }

    /// A failed result carrying the error taxonomy.
    pub fn failure(err: &GatewayError, retries: u32, execution_time_ms: u64) -> Self {
        Self {
            success: false,
            rows: Vec::new(),
            row_count: 0,
            truncated: false,
            rows_affected: None,
            retries,
            error: Some(ErrorDetail::from(err)),
            execution_time_ms,
        }
    }

    pub fn is_denied(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(|e| e.kind == ErrorKind::PolicyDenied)
    }
}
