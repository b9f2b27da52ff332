//! The gateway facade: classify, evaluate, execute, audit.
//!
//! [`Gateway::handle`] is the single entry point every tool uses. A denied
//! request never reaches the execution coordinator, so no connection is
//! acquired for it.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::config::PolicyConfig;
use crate::error::GatewayError;
use crate::gateway::audit::AuditSink;
use crate::gateway::backend::Backend;
use crate::gateway::classifier::{StatementClass, classify};
use crate::gateway::executor::{ExecutionCoordinator, RetryScope};
use crate::gateway::policy::{PolicyDecision, evaluate};
use crate::models::{ExecutionRequest, ExecutionResult};

pub struct Gateway<B: Backend> {
    policy: Arc<PolicyConfig>,
    coordinator: ExecutionCoordinator<B>,
    audit: AuditSink,
}

impl<B: Backend> Gateway<B> {
    pub fn new(backend: B, policy: Arc<PolicyConfig>) -> Self {
        let coordinator = ExecutionCoordinator::new(backend, &policy);
        let audit = AuditSink::new(policy.query_log_enabled);
        Self {
            policy,
            coordinator,
            audit,
        }
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Run one request through the full pipeline.
    ///
    /// Always returns an [`ExecutionResult`]; failures are carried in its
    /// error field rather than as an `Err`, so callers get a uniform shape
    /// for denials, timeouts, and database errors alike.
    pub async fn handle(&self, request: &ExecutionRequest) -> ExecutionResult {
        let start = Instant::now();
        let class = classify(&request.sql);
        debug!(request_id = %request.request_id, class = %class, "Classified statement");

        let audit_flagged =
            match evaluate(class, request.schema.as_deref(), &self.policy) {
                PolicyDecision::Deny { reason, detail } => {
                    self.audit
                        .record_denial(request.request_id, class, reason, &request.sql);
                    let err = GatewayError::denied(reason, detail);
                    return ExecutionResult::failure(&err, 0, elapsed_ms(start));
                }
                PolicyDecision::Allow { audit_flagged } => audit_flagged,
            };

        // Reads may repeat freely; anything else retries only failures that
        // happened before the statement reached the server.
        let scope = match class {
            StatementClass::Read => RetryScope::AllTransient,
            _ => RetryScope::ConnectOnly,
        };

        let outcome = match class {
            StatementClass::Read | StatementClass::Unknown => {
                self.coordinator.fetch(&request.sql, scope).await
            }
            StatementClass::Write | StatementClass::Destructive => {
                self.coordinator.execute(&request.sql, scope).await
            }
        };

        let result = match outcome {
            Ok(outcome) => match outcome.rows_affected {
                Some(n) => ExecutionResult::write(n, outcome.retries, elapsed_ms(start)),
                None => ExecutionResult::rows(
                    outcome.rows,
                    outcome.truncated,
                    outcome.retries,
                    elapsed_ms(start),
                ),
            },
            Err(failure) => {
                ExecutionResult::failure(&failure.error, failure.retries, elapsed_ms(start))
            }
        };

        self.audit
            .record_outcome(request.request_id, class, audit_flagged, &request.sql, &result);
        result
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
