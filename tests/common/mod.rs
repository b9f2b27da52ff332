//! Shared test fixtures: a scripted backend and policy builders.

use sql_gateway_mcp::config::PolicyConfig;
use sql_gateway_mcp::error::{GatewayError, GatewayResult};
use sql_gateway_mcp::gateway::{Backend, FetchedRows, SchemaAllowList, SecurityMode, Session};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Backend whose connection attempts resolve from a scripted list of steps.
///
/// Each connect consumes the next step. `ConnectTimeout` fails the connect
/// itself; every other step produces a session that behaves accordingly.
#[derive(Clone)]
pub struct MockBackend {
    script: Arc<Vec<Step>>,
    cursor: Arc<AtomicUsize>,
    connects: Arc<AtomicUsize>,
}

#[derive(Clone)]
pub enum Step {
    ConnectTimeout,
    TransientOnQuery,
    Rows(usize),
    Affected(u64),
}

pub struct MockSession {
    step: Step,
}

impl MockBackend {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script: Arc::new(script),
            cursor: Arc::new(AtomicUsize::new(0)),
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of times the coordinator reached the backend.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Backend for MockBackend {
    type Session = MockSession;

    async fn connect(&self, timeout: Duration) -> GatewayResult<MockSession> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .get(idx)
            .cloned()
            .unwrap_or(Step::TransientOnQuery);
        match step {
            Step::ConnectTimeout => Err(GatewayError::connection_timeout(timeout.as_secs())),
            other => Ok(MockSession { step: other }),
        }
    }
}

impl Session for MockSession {
    async fn fetch(&mut self, _sql: &str, fetch_limit: usize) -> GatewayResult<FetchedRows> {
        match &self.step {
            Step::Rows(n) => {
                let produced = (*n).min(fetch_limit);
                Ok((0..produced)
                    .map(|i| {
                        let mut row = serde_json::Map::new();
                        row.insert("n".to_string(), serde_json::Value::from(i));
                        row
                    })
                    .collect())
            }
            Step::TransientOnQuery => Err(GatewayError::transient("connection reset")),
            Step::Affected(_) | Step::ConnectTimeout => unreachable!(),
        }
    }

    async fn execute(&mut self, _sql: &str) -> GatewayResult<u64> {
        match &self.step {
            Step::Affected(n) => Ok(*n),
            Step::TransientOnQuery => Err(GatewayError::transient("connection reset")),
            Step::Rows(_) | Step::ConnectTimeout => unreachable!(),
        }
    }
}

/// Policy with short timeouts so retry tests finish quickly.
pub fn policy(
    security_mode: SecurityMode,
    allowed_schemas: &str,
    max_retries: u32,
) -> Arc<PolicyConfig> {
    Arc::new(PolicyConfig {
        security_mode,
        allowed_schemas: SchemaAllowList::parse(allowed_schemas),
        default_schema: None,
        max_result_rows: 500,
        connect_timeout: Duration::from_secs(1),
        query_timeout: Duration::from_millis(500),
        max_retries,
        query_log_enabled: false,
    })
}
