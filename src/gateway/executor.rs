//! Execution coordination: connections, timeouts, retries, row caps.
//!
//! The coordinator owns every temporal concern of an execution. One attempt
//! is a scoped session acquisition followed by the statement under a query
//! timeout; the session is dropped on every exit path, so the underlying
//! connection is always released. Retries are an explicit loop with a
//! counted attempt budget and capped exponential backoff, never hidden
//! inside a driver.

use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::PolicyConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::backend::{Backend, FetchedRows, Session};

const BACKOFF_BASE: Duration = Duration::from_millis(100);
const BACKOFF_CAP: Duration = Duration::from_secs(2);

/// Which failures may be retried for a given statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryScope {
    /// Every transient failure is a retry candidate. Safe only for
    /// statements with no side effects.
    AllTransient,
    /// Only failures that occurred before the statement was handed to the
    /// database. Once submitted, a statement with side effects must not be
    /// repeated.
    ConnectOnly,
}

/// Outcome of a coordinated execution.
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub rows: FetchedRows,
    pub truncated: bool,
    pub rows_affected: Option<u64>,
    /// Retried attempts before this outcome; 0 means first attempt worked.
    pub retries: u32,
}

/// Terminal failure of a coordinated execution.
///
/// The retry count travels with the error so callers report how many
/// attempts were spent even when the final cause is a timeout.
#[derive(Debug)]
pub struct ExecutionFailure {
    pub error: GatewayError,
    /// Retried attempts before giving up; 0 means the first attempt failed
    /// and no retry was allowed.
    pub retries: u32,
}

/// A failed attempt, tagged with whether the statement reached the server.
struct AttemptError {
    error: GatewayError,
    submitted: bool,
}

impl AttemptError {
    fn before_submit(error: GatewayError) -> Self {
        Self {
            error,
            submitted: false,
        }
    }

    fn after_submit(error: GatewayError) -> Self {
        Self {
            error,
            submitted: true,
        }
    }
}

pub struct ExecutionCoordinator<B: Backend> {
    backend: B,
    connect_timeout: Duration,
    query_timeout: Duration,
    max_retries: u32,
    max_result_rows: usize,
}

impl<B: Backend> ExecutionCoordinator<B> {
    pub fn new(backend: B, policy: &PolicyConfig) -> Self {
        Self {
            backend,
            connect_timeout: policy.connect_timeout,
            query_timeout: policy.query_timeout,
            max_retries: policy.max_retries,
            max_result_rows: policy.max_result_rows,
        }
    }

    /// Run a row-returning statement. Results beyond the configured row cap
    /// are discarded and the outcome is marked truncated.
    pub async fn fetch(
        &self,
        sql: &str,
        scope: RetryScope,
    ) -> Result<ExecutionOutcome, ExecutionFailure> {
        self.run(sql, scope, false).await
    }

    /// Run a statement for its side effects, reporting affected rows.
    pub async fn execute(
        &self,
        sql: &str,
        scope: RetryScope,
    ) -> Result<ExecutionOutcome, ExecutionFailure> {
        self.run(sql, scope, true).await
    }

    async fn run(
        &self,
        sql: &str,
        scope: RetryScope,
        is_write: bool,
    ) -> Result<ExecutionOutcome, ExecutionFailure> {
        let mut retries = 0u32;
        let mut delay = BACKOFF_BASE;

        loop {
            let attempt = if is_write {
                self.attempt_execute(sql).await
            } else {
                self.attempt_fetch(sql).await
            };

            match attempt {
                Ok(mut outcome) => {
                    outcome.retries = retries;
                    return Ok(outcome);
                }
                Err(AttemptError { error, submitted }) => {
                    let retry_allowed = error.is_transient()
                        && match scope {
                            RetryScope::AllTransient => true,
                            RetryScope::ConnectOnly => !submitted,
                        };

                    if !retry_allowed || retries >= self.max_retries {
                        return Err(ExecutionFailure {
                            error: finalize(error, retries),
                            retries,
                        });
                    }

                    retries += 1;
                    warn!(
                        error = %error,
                        retry = retries,
                        max_retries = self.max_retries,
                        backoff_ms = delay.as_millis() as u64,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(BACKOFF_CAP);
                }
            }
        }
    }

    async fn attempt_fetch(&self, sql: &str) -> Result<ExecutionOutcome, AttemptError> {
        let mut session = self
            .backend
            .connect(self.connect_timeout)
            .await
            .map_err(AttemptError::before_submit)?;

        // Fetch one past the cap so truncation is detectable without a count
        let fetch_limit = self.max_result_rows + 1;
        let mut rows = match timeout(self.query_timeout, session.fetch(sql, fetch_limit)).await {
            Ok(Ok(rows)) => rows,
            Ok(Err(e)) => return Err(AttemptError::after_submit(e)),
            Err(_) => {
                // Dropping the session releases the connection mid-query
                return Err(AttemptError::after_submit(GatewayError::query_timeout(
                    self.query_timeout.as_secs(),
                )));
            }
        };

        let truncated = rows.len() > self.max_result_rows;
        if truncated {
            rows.truncate(self.max_result_rows);
            debug!(cap = self.max_result_rows, "Result truncated at row cap");
        }

        Ok(ExecutionOutcome {
            rows,
            truncated,
            rows_affected: None,
            retries: 0,
        })
    }

    async fn attempt_execute(&self, sql: &str) -> Result<ExecutionOutcome, AttemptError> {
        let mut session = self
            .backend
            .connect(self.connect_timeout)
            .await
            .map_err(AttemptError::before_submit)?;

        let rows_affected = match timeout(self.query_timeout, session.execute(sql)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(AttemptError::after_submit(e)),
            Err(_) => {
                return Err(AttemptError::after_submit(GatewayError::query_timeout(
                    self.query_timeout.as_secs(),
                )));
            }
        };

        Ok(ExecutionOutcome {
            rows: Vec::new(),
            truncated: false,
            rows_affected: Some(rows_affected),
            retries: 0,
        })
    }
}

/// Shape the terminal error after the retry budget is spent or bypassed.
///
/// Transient failures become `RetriesExhausted` with a total attempt count;
/// connection and query timeouts keep their own identities so the caller can
/// tell which budget was blown.
fn finalize(error: GatewayError, retries: u32) -> GatewayError {
    match error {
        GatewayError::Transient { message } => GatewayError::RetriesExhausted {
            attempts: retries + 1,
            message,
        },
        other => other,
    }
}
