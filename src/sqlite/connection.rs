use async_trait::async_trait;
use rusqlite::Connection;

use super::query::execute_statement;
use crate::error::RepoError;
use crate::executor::{ExecOutcome, Executor};
use crate::query_builder::RenderedStatement;

/// One `SQLite` connection. Statements run on the blocking thread pool.
pub struct SqliteConnection {
    conn: Option<Connection>,
}

impl SqliteConnection {
    pub(crate) fn new(conn: Connection) -> Self {
        Self { conn: Some(conn) }
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("open", &self.conn.is_some())
            .finish()
    }
}

#[async_trait]
impl Executor for SqliteConnection {
    async fn execute(&mut self, statement: &RenderedStatement) -> Result<ExecOutcome, RepoError> {
        let conn = self.conn.take().ok_or_else(|| {
            RepoError::Connection("sqlite connection lost by an earlier failed task".into())
        })?;
        let statement = statement.clone();
        let (conn, outcome) = tokio::task::spawn_blocking(move || {
            let outcome = execute_statement(&conn, &statement);
            (conn, outcome)
        })
        .await
        .map_err(|e| RepoError::Connection(format!("sqlite worker task failed: {e}")))?;
        self.conn = Some(conn);
        outcome
    }
}
