//! Data models for the SQL gateway.

pub mod request;

// Re-export commonly used types
pub use request::{ErrorDetail, ErrorKind, ExecutionRequest, ExecutionResult};
