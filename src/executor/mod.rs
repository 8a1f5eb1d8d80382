//! The narrow capability surface between the core and a storage backend.

use async_trait::async_trait;

use crate::error::RepoError;
use crate::query_builder::RenderedStatement;
use crate::results::ResultSet;
use crate::types::RowValues;

/// What a backend reports back for one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    /// Rows produced by a SELECT; an empty set is a successful result.
    Rows(ResultSet),
    /// Number of rows touched by an UPDATE or DELETE.
    Affected(usize),
    /// Identifier generated by an INSERT.
    Inserted(RowValues),
}

impl ExecOutcome {
    /// # Errors
    /// Returns `RepoError::QueryExecution` if the backend produced a different kind of outcome.
    pub fn into_rows(self) -> Result<ResultSet, RepoError> {
        match self {
            ExecOutcome::Rows(rows) => Ok(rows),
            other => Err(unexpected("rows", &other)),
        }
    }

    /// # Errors
    /// Returns `RepoError::QueryExecution` if the backend produced a different kind of outcome.
    pub fn into_affected(self) -> Result<usize, RepoError> {
        match self {
            ExecOutcome::Affected(n) => Ok(n),
            other => Err(unexpected("an affected-row count", &other)),
        }
    }

    /// # Errors
    /// Returns `RepoError::QueryExecution` if the backend produced a different kind of outcome.
    pub fn into_inserted(self) -> Result<RowValues, RepoError> {
        match self {
            ExecOutcome::Inserted(id) => Ok(id),
            other => Err(unexpected("a generated id", &other)),
        }
    }
}

fn unexpected(wanted: &str, got: &ExecOutcome) -> RepoError {
    let got = match got {
        ExecOutcome::Rows(_) => "rows",
        ExecOutcome::Affected(_) => "an affected-row count",
        ExecOutcome::Inserted(_) => "a generated id",
    };
    RepoError::QueryExecution(format!("backend returned {got}, expected {wanted}"))
}

/// Runs one rendered statement on one physical connection.
///
/// Implementations report failures as `Err`; the caller decides what that means for the
/// connection. `bindings[i]` belongs to placeholder `i + 1` in `text`.
#[async_trait]
pub trait Executor: Send {
    async fn execute(&mut self, statement: &RenderedStatement) -> Result<ExecOutcome, RepoError>;
}

/// Opens new physical connections on behalf of the pool.
#[async_trait]
pub trait ConnectionManager: Send + Sync + 'static {
    type Connection: Executor + Send + 'static;

    async fn connect(&self) -> Result<Self::Connection, RepoError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_accessors_check_kind() {
        assert_eq!(ExecOutcome::Affected(3).into_affected().unwrap(), 3);
        assert!(ExecOutcome::Affected(3).into_rows().is_err());
        assert_eq!(
            ExecOutcome::Inserted(RowValues::Int(9)).into_inserted().unwrap(),
            RowValues::Int(9)
        );
        let err = ExecOutcome::Rows(ResultSet::default())
            .into_inserted()
            .unwrap_err();
        assert!(matches!(err, RepoError::QueryExecution(_)));
    }
}
