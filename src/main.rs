//! SQL Gateway MCP Server - Main entry point.
//!
//! This server exposes MCP (Model Context Protocol) tools for AI assistants
//! to run SQL against a single database behind a policy gateway.

use rmcp::{ServiceExt, transport::stdio};
use sql_gateway_mcp::config::Config;
use sql_gateway_mcp::db::{DbPool, SqlxBackend};
use sql_gateway_mcp::gateway::Gateway;
use sql_gateway_mcp::mcp::GatewayService;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr; stdout is reserved for the MCP stdio transport.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    // Initialize logging
    init_tracing(&config);

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        eprintln!();
        eprintln!("Usage: sql-gateway-mcp [--driver postgres|mysql|sqlite]");
        eprintln!();
        eprintln!("Configuration is read from the environment:");
        eprintln!("  HOST, PORT, USERNAME, PASSWORD, DATABASE");
        eprintln!("  SECURITY_MODE   readonly | limited_write | full_access");
        eprintln!("  ALLOWED_SCHEMAS comma-separated schema names, or *");
        eprintln!("  MAX_RESULT_ROWS, CONNECT_TIMEOUT, QUERY_TIMEOUT, MAX_RETRIES");
        eprintln!("  ENABLE_QUERY_LOG  true to log every executed statement");
        std::process::exit(1);
    }

    info!(
        driver = %config.driver,
        security_mode = %config.security_mode,
        allowed_schemas = %config.policy().allowed_schemas,
        "Starting SQL Gateway MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Connect the pool up front so a bad configuration fails at startup
    let pool = DbPool::connect(&config).await?;
    if let Some(version) = pool.server_version().await {
        info!(version = %version, "Connected to database");
    }

    let backend = SqlxBackend::new(pool.clone());
    let gateway = Arc::new(Gateway::new(backend, Arc::new(config.policy())));
    let service = GatewayService::new(gateway, pool.clone());

    info!("Starting MCP server with stdio transport");
    let running_service = service
        .serve(stdio())
        .await
        .map_err(|e| format!("Failed to start stdio transport: {}", e))?;

    let shutdown_requested = tokio::select! {
        result = running_service.waiting() => {
            match result {
                Ok(_quit_reason) => {
                    info!("Stdio transport completed normally");
                }
                Err(e) => {
                    error!(error = %e, "Stdio transport error");
                    pool.close().await;
                    return Err(format!("Stdio transport error: {}", e).into());
                }
            }
            false
        }
        _ = wait_for_signal() => {
            info!("Shutdown signal received (send again to force exit)");
            true
        }
    };

    if shutdown_requested {
        // Spawn a task to listen for second signal and force exit
        tokio::spawn(async {
            wait_for_signal().await;
            warn!("Received second signal, forcing immediate exit");
            std::process::exit(1);
        });
    }

    info!("Closing database connections");
    pool.close().await;

    if shutdown_requested {
        // Force exit since stdio may still be blocking on stdin
        // tokio::select! cannot interrupt blocking stdin reads
        info!("Exiting process");
        std::process::exit(0);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
}
