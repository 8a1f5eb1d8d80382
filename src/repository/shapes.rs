//! Fixed statement shapes behind each repository operation.
//!
//! Every function builds a fresh [`QueryBuilder`] and returns an immutable [`Statement`], so no
//! clause state survives between calls.

use chrono::{NaiveDateTime, TimeDelta};

use super::config::RepositoryConfig;
use crate::error::RepoError;
use crate::query_builder::{QueryBuilder, Statement};
use crate::types::RowValues;

/// Number of rows `find_featured` returns.
pub const FEATURED_LIMIT: i64 = 10;

fn select(config: &RepositoryConfig, fields: &[&str]) -> QueryBuilder {
    QueryBuilder::table(&config.table).select(config.columns.columns(fields))
}

fn col<'a>(config: &'a RepositoryConfig, field: &'a str) -> &'a str {
    config.columns.column(field)
}

/// `SELECT … ORDER BY id ASC`
pub fn find_all(config: &RepositoryConfig, fields: &[&str]) -> Result<Statement, RepoError> {
    select(config, fields)
        .order_by(col(config, "id"), "ASC")
        .finish()
}

/// `SELECT … WHERE id = ? LIMIT 1`
pub fn find_by_id(
    config: &RepositoryConfig,
    fields: &[&str],
    id: RowValues,
) -> Result<Statement, RepoError> {
    select(config, fields)
        .where_eq(col(config, "id"), id)
        .limit(1)
        .finish()
}

/// `SELECT … WHERE category = ? ORDER BY id ASC`
pub fn find_by_category(
    config: &RepositoryConfig,
    fields: &[&str],
    category: &str,
) -> Result<Statement, RepoError> {
    select(config, fields)
        .where_eq(col(config, "category"), category)
        .order_by(col(config, "id"), "ASC")
        .finish()
}

/// `SELECT … WHERE featured = true ORDER BY rating DESC LIMIT 10`
pub fn find_featured(config: &RepositoryConfig, fields: &[&str]) -> Result<Statement, RepoError> {
    select(config, fields)
        .where_eq(col(config, "featured"), true)
        .order_by(col(config, "rating"), "DESC")
        .limit(FEATURED_LIMIT)
        .finish()
}

/// Rows created before this instant are due for archiving.
///
/// # Errors
/// Returns `RepoError::InvalidArgument` if the retention period reaches past the earliest
/// representable timestamp.
pub fn archive_cutoff(
    config: &RepositoryConfig,
    now: NaiveDateTime,
) -> Result<NaiveDateTime, RepoError> {
    TimeDelta::try_days(i64::from(config.retention_days))
        .and_then(|retention| now.checked_sub_signed(retention))
        .ok_or_else(|| {
            RepoError::InvalidArgument(format!(
                "retention_days {} reaches past the earliest representable timestamp",
                config.retention_days
            ))
        })
}

/// `UPDATE … SET archived = true WHERE created_at < ?`
pub fn archive_before(
    config: &RepositoryConfig,
    cutoff: NaiveDateTime,
) -> Result<Statement, RepoError> {
    QueryBuilder::table(&config.table)
        .update([(col(config, "archived"), true)])
        .where_op(col(config, "created_at"), "<", cutoff)
        .finish()
}

/// `INSERT INTO … (…) VALUES (…)`
pub fn create(
    config: &RepositoryConfig,
    assignments: Vec<(&'static str, RowValues)>,
) -> Result<Statement, RepoError> {
    QueryBuilder::table(&config.table)
        .insert(
            assignments
                .into_iter()
                .map(|(field, value)| (col(config, field).to_string(), value)),
        )
        .finish()
}

/// `DELETE FROM … WHERE id = ?`
pub fn delete_by_id(config: &RepositoryConfig, id: RowValues) -> Result<Statement, RepoError> {
    QueryBuilder::table(&config.table)
        .delete()
        .where_eq(col(config, "id"), id)
        .finish()
}
