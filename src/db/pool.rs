//! Connection pooling and the sqlx-backed gateway backend.
//!
//! Driver-specific pools (MySqlPool, PgPool, SqlitePool) are wrapped in a
//! [`DbPool`] enum to keep full type support. [`SqlxBackend`] adapts the
//! pool to the gateway's [`Backend`]/[`Session`] contract: one session is
//! one pooled connection, released when the session drops.

use std::str::FromStr;
use std::time::Duration;

use futures_util::StreamExt;
use sqlx::pool::PoolConnection;
use sqlx::{
    Executor, MySql, MySqlPool, PgPool, Postgres, Sqlite, SqlitePool,
    mysql::{MySqlConnectOptions, MySqlPoolOptions},
    postgres::PgPoolOptions,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::{debug, info, warn};

use crate::config::{Config, DriverKind};
use crate::db::types::RowToJson;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::backend::{Backend, FetchedRows, Session};
use crate::gateway::policy::SecurityMode;

const MAX_CONNECTIONS: u32 = 10;
const MAX_CONNECTIONS_SQLITE: u32 = 1;

/// Database-specific connection pool.
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl DbPool {
    /// Build and eagerly connect the pool described by the configuration.
    pub async fn connect(config: &Config) -> GatewayResult<Self> {
        let url = config
            .connection_url()
            .map_err(GatewayError::invalid_input)?;
        let acquire_timeout = config.connect_timeout_duration();

        info!(driver = %config.driver, host = %config.host, "Connecting to database");

        match config.driver {
            DriverKind::Mysql => {
                let options = MySqlConnectOptions::from_str(&url)
                    .map_err(|e| {
                        GatewayError::invalid_input(format!("invalid MySQL connection URL: {}", e))
                    })?
                    .charset("utf8mb4");
                let pool = MySqlPoolOptions::new()
                    .min_connections(1)
                    .max_connections(MAX_CONNECTIONS)
                    .acquire_timeout(acquire_timeout)
                    .connect_with(options)
                    .await?;
                Ok(DbPool::MySql(pool))
            }
            DriverKind::Postgres => {
                let pool = PgPoolOptions::new()
                    .min_connections(1)
                    .max_connections(MAX_CONNECTIONS)
                    .acquire_timeout(acquire_timeout)
                    .connect(&url)
                    .await?;
                Ok(DbPool::Postgres(pool))
            }
            DriverKind::Sqlite => {
                let mut options = SqliteConnectOptions::from_str(&url).map_err(|e| {
                    GatewayError::invalid_input(format!("invalid SQLite connection URL: {}", e))
                })?;
                // Readonly mode is enforced at the file level too
                if config.security_mode == SecurityMode::Readonly {
                    options = options.read_only(true);
                } else {
                    options = options.create_if_missing(true);
                }
                let pool = SqlitePoolOptions::new()
                    .min_connections(1)
                    .max_connections(MAX_CONNECTIONS_SQLITE)
                    .acquire_timeout(acquire_timeout)
                    .connect_with(options)
                    .await?;
                Ok(DbPool::Sqlite(pool))
            }
        }
    }

    pub fn driver(&self) -> DriverKind {
        match self {
            DbPool::MySql(_) => DriverKind::Mysql,
            DbPool::Postgres(_) => DriverKind::Postgres,
            DbPool::Sqlite(_) => DriverKind::Sqlite,
        }
    }

    /// Report the server version, for startup logging only.
    pub async fn server_version(&self) -> Option<String> {
        let result = match self {
            DbPool::MySql(pool) => {
                sqlx::query_scalar::<_, String>("SELECT version()")
                    .fetch_one(pool)
                    .await
            }
            DbPool::Postgres(pool) => {
                sqlx::query_scalar::<_, String>("SELECT version()")
                    .fetch_one(pool)
                    .await
            }
            DbPool::Sqlite(pool) => {
                sqlx::query_scalar::<_, String>("SELECT sqlite_version()")
                    .fetch_one(pool)
                    .await
            }
        };
        match result {
            Ok(version) => {
                debug!(version = %version, "Got server version");
                Some(version)
            }
            Err(e) => {
                warn!(error = %e, "Failed to get server version");
                None
            }
        }
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        match self {
            DbPool::MySql(pool) => pool.close().await,
            DbPool::Postgres(pool) => pool.close().await,
            DbPool::Sqlite(pool) => pool.close().await,
        }
    }
}

/// The sqlx implementation of the gateway backend contract.
#[derive(Debug, Clone)]
pub struct SqlxBackend {
    pool: DbPool,
}

impl SqlxBackend {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl Backend for SqlxBackend {
    type Session = DbSession;

    async fn connect(&self, timeout: Duration) -> GatewayResult<DbSession> {
        let acquire = async {
            match &self.pool {
                DbPool::MySql(pool) => pool.acquire().await.map(DbSession::MySql),
                DbPool::Postgres(pool) => pool.acquire().await.map(DbSession::Postgres),
                DbPool::Sqlite(pool) => pool.acquire().await.map(DbSession::Sqlite),
            }
        };
        match tokio::time::timeout(timeout, acquire).await {
            Ok(Ok(session)) => Ok(session),
            Ok(Err(sqlx::Error::PoolTimedOut)) => {
                Err(GatewayError::connection_timeout(timeout.as_secs()))
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(GatewayError::connection_timeout(timeout.as_secs())),
        }
    }
}

/// One pooled connection. Dropping it returns the connection to the pool.
pub enum DbSession {
    MySql(PoolConnection<MySql>),
    Postgres(PoolConnection<Postgres>),
    Sqlite(PoolConnection<Sqlite>),
}

impl Session for DbSession {
    async fn fetch(&mut self, sql: &str, fetch_limit: usize) -> GatewayResult<FetchedRows> {
        match self {
            DbSession::MySql(conn) => {
                let mut stream = (&mut **conn).fetch(sql);
                let mut rows = Vec::new();
                while let Some(row) = stream.next().await {
                    rows.push(row?.to_json_map());
                    if rows.len() >= fetch_limit {
                        break;
                    }
                }
                Ok(rows)
            }
            DbSession::Postgres(conn) => {
                let mut stream = (&mut **conn).fetch(sql);
                let mut rows = Vec::new();
                while let Some(row) = stream.next().await {
                    rows.push(row?.to_json_map());
                    if rows.len() >= fetch_limit {
                        break;
                    }
                }
                Ok(rows)
            }
            DbSession::Sqlite(conn) => {
                let mut stream = (&mut **conn).fetch(sql);
                let mut rows = Vec::new();
                while let Some(row) = stream.next().await {
                    rows.push(row?.to_json_map());
                    if rows.len() >= fetch_limit {
                        break;
                    }
                }
                Ok(rows)
            }
        }
    }

    async fn execute(&mut self, sql: &str) -> GatewayResult<u64> {
        match self {
            DbSession::MySql(conn) => {
                let result = (&mut **conn).execute(sql).await?;
                Ok(result.rows_affected())
            }
            DbSession::Postgres(conn) => {
                let result = (&mut **conn).execute(sql).await?;
                Ok(result.rows_affected())
            }
            DbSession::Sqlite(conn) => {
                let result = (&mut **conn).execute(sql).await?;
                Ok(result.rows_affected())
            }
        }
    }
}
