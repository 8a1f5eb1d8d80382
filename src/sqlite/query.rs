use rusqlite::{Connection, params_from_iter};

use super::params::{convert_params, sqlite_value_to_row_value};
use crate::error::RepoError;
use crate::executor::ExecOutcome;
use crate::query_builder::{RenderedStatement, Verb};
use crate::results::ResultSet;

fn exec_err(e: &rusqlite::Error) -> RepoError {
    RepoError::QueryExecution(e.to_string())
}

/// Build a result set from a SELECT.
///
/// # Errors
/// Returns `RepoError::QueryExecution` if preparing, binding or stepping fails.
pub fn build_result_set(
    conn: &Connection,
    sql: &str,
    params: &[rusqlite::types::Value],
) -> Result<ResultSet, RepoError> {
    let mut stmt = conn.prepare(sql).map_err(|e| exec_err(&e))?;
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let column_count = column_names.len();
    let mut result_set = ResultSet::new(column_names);

    let mut rows = stmt
        .query(params_from_iter(params.iter()))
        .map_err(|e| exec_err(&e))?;
    while let Some(row) = rows.next().map_err(|e| exec_err(&e))? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            let value: rusqlite::types::Value = row.get(i).map_err(|e| exec_err(&e))?;
            values.push(sqlite_value_to_row_value(value));
        }
        result_set.add_row_values(values)?;
    }

    Ok(result_set)
}

/// Run one rendered statement synchronously on `conn`.
///
/// # Errors
/// Returns `RepoError::QueryExecution` for any SQLite failure.
pub fn execute_statement(
    conn: &Connection,
    statement: &RenderedStatement,
) -> Result<ExecOutcome, RepoError> {
    let params = convert_params(&statement.bindings);
    match statement.verb {
        Verb::Select => build_result_set(conn, &statement.text, &params).map(ExecOutcome::Rows),
        Verb::Insert => {
            conn.execute(&statement.text, params_from_iter(params.iter()))
                .map_err(|e| exec_err(&e))?;
            Ok(ExecOutcome::Inserted(crate::types::RowValues::Int(
                conn.last_insert_rowid(),
            )))
        }
        Verb::Update | Verb::Delete => conn
            .execute(&statement.text, params_from_iter(params.iter()))
            .map(ExecOutcome::Affected)
            .map_err(|e| exec_err(&e)),
    }
}
