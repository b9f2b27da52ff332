//! The query safety gateway core.
//!
//! The pipeline is classify -> evaluate -> execute -> audit, assembled by
//! [`facade::Gateway`]. The classifier and policy engine are pure functions;
//! the coordinator owns timeouts and retries behind the [`backend`] seam.

pub mod audit;
pub mod backend;
pub mod classifier;
pub mod executor;
pub mod facade;
pub mod policy;

pub use audit::AuditSink;
pub use backend::{Backend, FetchedRows, Session};
pub use classifier::{StatementClass, classify};
pub use executor::{ExecutionCoordinator, ExecutionFailure, ExecutionOutcome, RetryScope};
pub use facade::Gateway;
pub use policy::{DenyReason, PolicyDecision, SchemaAllowList, SecurityMode, evaluate};
