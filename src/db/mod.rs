//! Database access layer.
//!
//! - Connection pooling and the sqlx backend implementation
//! - Row decoding into JSON
//! - Catalog introspection SQL

pub mod catalog;
pub mod pool;
pub mod types;

pub use pool::{DbPool, DbSession, SqlxBackend};
pub use types::RowToJson;
