//! SQL Gateway MCP Server Library
//!
//! This library provides MCP (Model Context Protocol) tools for AI assistants
//! to run SQL against a single database (SQLite, PostgreSQL, MySQL) behind a
//! policy gateway that classifies statements and enforces a security mode and
//! schema allow-list before anything reaches the database.

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod mcp;
pub mod models;

pub use config::Config;
pub use error::GatewayError;
pub use gateway::Gateway;
pub use mcp::GatewayService;
