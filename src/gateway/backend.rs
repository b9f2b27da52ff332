//! The outbound driver contract.
//!
//! The execution coordinator talks to the database through this pair of
//! traits and nothing else. The sqlx-backed implementation lives in
//! [`crate::db`]; tests substitute a scripted backend. Keeping the seam this
//! narrow is what lets the retry and timeout logic be verified without a
//! running database server.

use std::future::Future;
use std::time::Duration;

use serde_json::Value as JsonValue;

use crate::error::GatewayResult;

/// A set of rows fetched from the database, bounded at the fetch limit.
pub type FetchedRows = Vec<serde_json::Map<String, JsonValue>>;

/// Source of database sessions.
pub trait Backend: Send + Sync {
    type Session: Session;

    /// Acquire a session, failing with
    /// [`crate::error::GatewayError::ConnectionTimeout`] if none is
    /// available within `timeout`.
    fn connect(
        &self,
        timeout: Duration,
    ) -> impl Future<Output = GatewayResult<Self::Session>> + Send;
}

/// A live database session.
///
/// Dropping a session releases its underlying connection; the coordinator
/// relies on this for cleanup on every exit path, including timeouts.
pub trait Session: Send {
    /// Run a row-returning statement, fetching at most `fetch_limit` rows.
    fn fetch(
        &mut self,
        sql: &str,
        fetch_limit: usize,
    ) -> impl Future<Output = GatewayResult<FetchedRows>> + Send;

    /// Run a non-returning statement, yielding the affected row count.
    fn execute(&mut self, sql: &str) -> impl Future<Output = GatewayResult<u64>> + Send;
}
