use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::connection::SqliteConnection;
use crate::error::RepoError;
use crate::executor::ConnectionManager;
use crate::pool::{Pool, PoolConfig};

/// Options for opening `SQLite` connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteOptions {
    pub db_path: PathBuf,
    /// How long a connection retries when the database file is locked by another writer.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Batch run on every newly opened connection (pragmas, schema for in-memory databases).
    #[serde(default)]
    pub init_sql: Option<String>,
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            busy_timeout_ms: default_busy_timeout_ms(),
            init_sql: None,
        }
    }

    #[must_use]
    pub fn with_init_sql(mut self, sql: impl Into<String>) -> Self {
        self.init_sql = Some(sql.into());
        self
    }

    #[must_use]
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn init_sql(mut self, sql: impl Into<String>) -> Self {
        self.opts.init_sql = Some(sql.into());
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts = self.opts.with_busy_timeout(timeout);
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Build a pool of `SQLite` connections.
    ///
    /// # Errors
    /// Returns `RepoError::InvalidArgument` if the pool configuration is invalid.
    pub fn build(self, config: PoolConfig) -> Result<Pool<SqliteManager>, RepoError> {
        Pool::new(SqliteManager::new(self.finish()), config)
    }
}

/// Opens `SQLite` connections for a [`Pool`].
///
/// Statements run against these connections should be rendered with
/// [`PlaceholderStyle::Sqlite`](crate::types::PlaceholderStyle::Sqlite).
#[derive(Debug, Clone)]
pub struct SqliteManager {
    options: SqliteOptions,
}

impl SqliteManager {
    #[must_use]
    pub fn new(options: SqliteOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &SqliteOptions {
        &self.options
    }
}

fn open_blocking(options: &SqliteOptions) -> Result<Connection, RepoError> {
    let conn_err = |e: rusqlite::Error| {
        RepoError::Connection(format!(
            "sqlite open of {} failed: {e}",
            options.db_path.display()
        ))
    };
    let conn = Connection::open(&options.db_path).map_err(conn_err)?;
    conn.busy_timeout(Duration::from_millis(options.busy_timeout_ms))
        .map_err(conn_err)?;
    if let Some(sql) = &options.init_sql {
        conn.execute_batch(sql).map_err(conn_err)?;
    }
    Ok(conn)
}

#[async_trait]
impl ConnectionManager for SqliteManager {
    type Connection = SqliteConnection;

    async fn connect(&self) -> Result<SqliteConnection, RepoError> {
        let options = self.options.clone();
        let conn = tokio::task::spawn_blocking(move || open_blocking(&options))
            .await
            .map_err(|e| RepoError::Connection(format!("sqlite open task failed: {e}")))??;
        tracing::debug!(path = %self.options.db_path.display(), "opened sqlite connection");
        Ok(SqliteConnection::new(conn))
    }
}
