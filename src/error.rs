//! Error types for the SQL gateway.
//!
//! All fallible paths use `thiserror`-derived [`GatewayError`]. The variants
//! mirror the distinctions the gateway must preserve end to end: a policy
//! denial is not a database error, a connection timeout is not a query
//! timeout, and a transient failure that survived every retry is reported as
//! such rather than as its last underlying cause.

use thiserror::Error;

use crate::gateway::policy::DenyReason;
use crate::models::ErrorKind;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Policy denied ({reason}): {detail}")]
    PolicyDenied { reason: DenyReason, detail: String },

    #[error("Connection timeout: no connection within {elapsed_secs}s")]
    ConnectionTimeout { elapsed_secs: u64 },

    #[error("Query timeout: statement exceeded {elapsed_secs}s")]
    QueryTimeout { elapsed_secs: u64 },

    #[error("Transient failure: {message}")]
    Transient { message: String },

    #[error("Retries exhausted after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// Create a policy denial with a human-readable detail.
    pub fn denied(reason: DenyReason, detail: impl Into<String>) -> Self {
        Self::PolicyDenied {
            reason,
            detail: detail.into(),
        }
    }

    /// Create a connection timeout error.
    pub fn connection_timeout(elapsed_secs: u64) -> Self {
        Self::ConnectionTimeout { elapsed_secs }
    }

    /// Create a query timeout error.
    pub fn query_timeout(elapsed_secs: u64) -> Self {
        Self::QueryTimeout { elapsed_secs }
    }

    /// Create a transient failure (candidate for retry).
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the coordinator may consider another attempt for this error.
    ///
    /// Query timeouts are excluded: the statement may already have reached
    /// the server, so repeating it is never safe to assume.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::ConnectionTimeout { .. })
    }

    /// The wire-level kind reported in [`crate::models::ErrorDetail`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PolicyDenied { .. } => ErrorKind::PolicyDenied,
            Self::ConnectionTimeout { .. } => ErrorKind::ConnectionTimeout,
            Self::QueryTimeout { .. } => ErrorKind::QueryTimeout,
            Self::Transient { .. } | Self::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
            Self::Database { .. } => ErrorKind::DatabaseError,
            Self::InvalidInput { .. } | Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// The deny reason, for policy denials only.
    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Self::PolicyDenied { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// Convert sqlx errors to GatewayError.
///
/// Connectivity-shaped failures become `Transient` so the retry loop can see
/// them; errors reported by the server itself become `Database` and are
/// surfaced immediately.
impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => {
                GatewayError::invalid_input(format!("connection configuration: {}", msg))
            }
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                GatewayError::database(db_err.message().to_string(), code)
            }
            sqlx::Error::PoolTimedOut => GatewayError::transient("connection pool acquire timed out"),
            sqlx::Error::PoolClosed => GatewayError::transient("connection pool is closed"),
            sqlx::Error::Io(io_err) => GatewayError::transient(format!("I/O error: {}", io_err)),
            sqlx::Error::Tls(tls_err) => GatewayError::transient(format!("TLS error: {}", tls_err)),
            sqlx::Error::Protocol(msg) => {
                GatewayError::transient(format!("protocol error: {}", msg))
            }
            sqlx::Error::WorkerCrashed => GatewayError::transient("database worker crashed"),
            sqlx::Error::ColumnNotFound(col) => {
                GatewayError::database(format!("column not found: {}", col), None)
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => GatewayError::internal(format!(
                "column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                GatewayError::internal(format!("failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => GatewayError::internal(format!("decode error: {}", source)),
            sqlx::Error::TypeNotFound { type_name } => {
                GatewayError::database(format!("type not found: {}", type_name), None)
            }
            sqlx::Error::RowNotFound => GatewayError::database("no rows returned".to_string(), None),
            _ => GatewayError::internal(format!("unexpected database error: {}", err)),
        }
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Convert GatewayError to MCP ErrorData for semantic error categorization.
impl From<GatewayError> for rmcp::ErrorData {
    fn from(err: GatewayError) -> Self {
        let detail = serde_json::json!({
            "kind": err.kind(),
            "denyReason": err.deny_reason(),
        });
        match &err {
            // Caller-correctable conditions -> invalid_params
            GatewayError::PolicyDenied { .. } | GatewayError::InvalidInput { .. } => {
                rmcp::ErrorData::invalid_params(err.to_string(), Some(detail))
            }
            GatewayError::Database {
                message, sql_state, ..
            } => {
                let msg = match sql_state {
                    Some(code) => format!("{} (SQLSTATE: {})", message, code),
                    None => message.clone(),
                };
                rmcp::ErrorData::invalid_params(msg, Some(detail))
            }

            // Infrastructure conditions -> internal_error
            GatewayError::ConnectionTimeout { .. }
            | GatewayError::QueryTimeout { .. }
            | GatewayError::Transient { .. }
            | GatewayError::RetriesExhausted { .. }
            | GatewayError::Internal { .. } => {
                rmcp::ErrorData::internal_error(err.to_string(), Some(detail))
            }
        }
    }
}
