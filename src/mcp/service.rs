//! MCP service implementation using rmcp.
//!
//! This module defines the GatewayService struct with all SQL tools exposed
//! via the MCP protocol. Every statement, including catalog introspection,
//! goes through the gateway pipeline so policy and audit apply uniformly.

use crate::config::DriverKind;
use crate::db::{DbPool, SqlxBackend, catalog};
use crate::gateway::Gateway;
use crate::models::{ExecutionRequest, ExecutionResult};
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    schemars::JsonSchema,
    tool, tool_handler, tool_router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Input for the execute_sql tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteSqlInput {
    /// SQL statement to execute
    pub sql: String,
    /// Target schema for allow-list evaluation (falls back to DEFAULT_SCHEMA)
    #[serde(default)]
    pub schema: Option<String>,
}

/// Input for the list_tables tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    /// Schema to list tables from (defaults to the connection's schema)
    #[serde(default)]
    pub schema: Option<String>,
}

/// Input for the describe_table tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DescribeTableInput {
    /// Table name to describe
    pub table: String,
    /// Schema containing the table (defaults to the connection's schema)
    #[serde(default)]
    pub schema: Option<String>,
}

/// Output for the test_connection tool.
#[derive(Debug, Serialize, JsonSchema)]
pub struct TestConnectionOutput {
    /// Whether the probe query succeeded
    pub connected: bool,
    /// Database driver in use
    pub driver: String,
    /// Server version string, when the probe succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    /// Probe round-trip time in milliseconds
    pub latency_ms: u64,
}

/// Output for the security_info tool.
#[derive(Debug, Serialize, JsonSchema)]
pub struct SecurityInfoOutput {
    /// Active security mode
    pub security_mode: String,
    /// Schema allow-list ("*" means any schema)
    pub allowed_schemas: String,
    /// Schema assumed when a request does not name one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_schema: Option<String>,
    /// Maximum rows returned per query before truncation
    pub max_result_rows: usize,
    /// Connection acquisition timeout in seconds
    pub connect_timeout_secs: u64,
    /// Per-statement execution timeout in seconds
    pub query_timeout_secs: u64,
    /// Maximum retry attempts after the initial one
    pub max_retries: u32,
    /// Whether executed statements are written to the audit log
    pub query_log_enabled: bool,
    /// Database driver in use
    pub driver: String,
}

#[derive(Clone)]
pub struct GatewayService {
    /// Shared gateway pipeline for all SQL execution
    gateway: Arc<Gateway<SqlxBackend>>,
    /// Pool handle for connectivity probes
    pool: DbPool,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl GatewayService {
    /// Create a new GatewayService instance.
    ///
    /// # Arguments
    ///
    /// * `gateway` - Shared gateway pipeline for SQL execution
    /// * `pool` - Pool handle, used only for the connectivity probe
    pub fn new(gateway: Arc<Gateway<SqlxBackend>>, pool: DbPool) -> Self {
        Self {
            gateway,
            pool,
            tool_router: Self::tool_router(),
        }
    }

    fn driver(&self) -> DriverKind {
        self.pool.driver()
    }

    /// Validate SQL input - ensure it is provided and non-empty.
    fn validate_sql(&self, provided: &str) -> Result<String, McpError> {
        let trimmed = provided.trim();
        if trimmed.is_empty() {
            Err(McpError::invalid_params(
                "sql is required and must not be empty.",
                None,
            ))
        } else {
            Ok(trimmed.to_string())
        }
    }

    /// Run a catalog statement through the gateway pipeline.
    async fn run_catalog(&self, sql: String, schema: Option<String>) -> Json<ExecutionResult> {
        let mut request = ExecutionRequest::new(sql);
        if let Some(schema) = schema {
            request = request.with_schema(schema);
        }
        Json(self.gateway.handle(&request).await)
    }
}

#[tool_router]
impl GatewayService {
    #[tool(
        description = "Execute a SQL statement through the safety gateway.\nStatements are classified (read/write/destructive) and checked against the server's security mode and schema allow-list before execution.\nDenied statements never reach the database; the result carries the denial reason.\nResults are capped at the configured row limit; `truncated: true` signals more rows exist."
    )]
    async fn execute_sql(
        &self,
        Parameters(input): Parameters<ExecuteSqlInput>,
    ) -> Result<Json<ExecutionResult>, McpError> {
        let sql = self.validate_sql(&input.sql)?;
        let mut request = ExecutionRequest::new(sql);
        if let Some(schema) = input.schema {
            request = request.with_schema(schema);
        }
        Ok(Json(self.gateway.handle(&request).await))
    }

    #[tool(
        description = "Test database connectivity.\nRuns a version probe against the configured database and reports round-trip latency."
    )]
    async fn test_connection(&self) -> Json<TestConnectionOutput> {
        let start = Instant::now();
        let server_version = self.pool.server_version().await;
        Json(TestConnectionOutput {
            connected: server_version.is_some(),
            driver: self.driver().to_string(),
            server_version,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    #[tool(
        description = "Show the gateway's active security configuration.\nReturns the security mode, schema allow-list, row cap, timeouts, and retry budget.\nNo database access is performed."
    )]
    async fn security_info(&self) -> Json<SecurityInfoOutput> {
        let policy = self.gateway.policy();
        Json(SecurityInfoOutput {
            security_mode: policy.security_mode.to_string(),
            allowed_schemas: policy.allowed_schemas.to_string(),
            default_schema: policy.default_schema.clone(),
            max_result_rows: policy.max_result_rows,
            connect_timeout_secs: policy.connect_timeout.as_secs(),
            query_timeout_secs: policy.query_timeout.as_secs(),
            max_retries: policy.max_retries,
            query_log_enabled: policy.query_log_enabled,
            driver: self.driver().to_string(),
        })
    }

    #[tool(
        description = "List all schemas visible to the connection.\nThe query runs through the gateway, so the schema allow-list still applies."
    )]
    async fn list_schemas(&self) -> Json<ExecutionResult> {
        let sql = catalog::list_schemas_sql(self.driver());
        self.run_catalog(sql, None).await
    }

    #[tool(
        description = "List all tables and views in a schema.\nCan filter by schema name; defaults to the connection's current schema."
    )]
    async fn list_tables(
        &self,
        Parameters(input): Parameters<ListTablesInput>,
    ) -> Json<ExecutionResult> {
        let sql = catalog::list_tables_sql(self.driver(), input.schema.as_deref());
        self.run_catalog(sql, input.schema).await
    }

    #[tool(
        description = "Describe the columns of a table.\nReturns column names, data types, nullability, and defaults in ordinal order."
    )]
    async fn describe_table(
        &self,
        Parameters(input): Parameters<DescribeTableInput>,
    ) -> Result<Json<ExecutionResult>, McpError> {
        let table = input.table.trim();
        if table.is_empty() {
            return Err(McpError::invalid_params(
                "table is required and must not be empty.",
                None,
            ));
        }
        let sql = catalog::describe_table_sql(self.driver(), table, input.schema.as_deref());
        Ok(self.run_catalog(sql, input.schema).await)
    }
}

#[tool_handler]
impl ServerHandler for GatewayService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "sql-gateway-mcp".to_owned(),
                title: Some("SQL Safety Gateway".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "SQL execution tools guarded by a safety gateway.\n\
                \n\
                ## Workflow\n\
                1. Call `security_info` to see the active security mode and schema allow-list\n\
                2. Use `list_schemas`, `list_tables`, and `describe_table` to explore the database\n\
                3. Run statements with `execute_sql`\n\
                \n\
                ## Security Modes\n\
                - **readonly**: only SELECT and other read statements are executed\n\
                - **limited_write**: reads plus INSERT/UPDATE; destructive statements (DELETE,\n\
                  DROP, TRUNCATE, ALTER, ...) are denied\n\
                - **full_access**: everything is executed, including statements the gateway\n\
                  cannot classify\n\
                \n\
                ## Denials\n\
                A denied statement returns `success: false` with a `deny_reason` of\n\
                `mode_forbidden`, `schema_forbidden`, or `unclassifiable`. Denied statements\n\
                never reach the database.\n\
                \n\
                ## Result Limits\n\
                Row results are capped server-side. When `truncated: true`, narrow the query\n\
                with WHERE or LIMIT to see the rest."
                    .to_string(),
            ),
        }
    }
}
