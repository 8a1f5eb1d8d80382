use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::RepoError;
use crate::query_builder::check_identifier;
use crate::types::PlaceholderStyle;

/// Domain field name → backend column name.
///
/// Fields without an entry map to a column of the same name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping(BTreeMap<String, String>);

impl ColumnMapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, field: impl Into<String>, column: impl Into<String>) -> Self {
        self.0.insert(field.into(), column.into());
        self
    }

    /// Backend column for a domain field.
    #[must_use]
    pub fn column<'a>(&'a self, field: &'a str) -> &'a str {
        self.0.get(field).map_or(field, String::as_str)
    }

    /// Map every field to its column, preserving order.
    #[must_use]
    pub fn columns(&self, fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| self.column(f).to_string()).collect()
    }

    /// # Errors
    /// Returns `RepoError::InvalidArgument` if any mapped column is not a plain identifier.
    pub fn validate(&self) -> Result<(), RepoError> {
        self.0
            .values()
            .try_for_each(|column| check_identifier("column", column))
    }
}

/// Longest accepted retention period, about ten thousand years.
pub const MAX_RETENTION_DAYS: u32 = 3_650_000;

fn default_retention_days() -> u32 {
    365
}

/// Where a repository's records live and how its fixed-shape operations are parameterized.
///
/// ```rust
/// use sql_repository::prelude::*;
///
/// let config: RepositoryConfig = serde_json::from_str(
///     r#"{"table": "products", "columns": {"created_at": "createdAt"}, "retention_days": 30}"#,
/// )?;
/// assert_eq!(config.columns.column("created_at"), "createdAt");
/// assert_eq!(config.columns.column("rating"), "rating");
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub table: String,
    #[serde(default)]
    pub columns: ColumnMapping,
    /// Rows created more than this many days ago are archived by `archive_old`.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default)]
    pub placeholder_style: PlaceholderStyle,
}

impl RepositoryConfig {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: ColumnMapping::default(),
            retention_days: default_retention_days(),
            placeholder_style: PlaceholderStyle::default(),
        }
    }

    #[must_use]
    pub fn columns(mut self, columns: ColumnMapping) -> Self {
        self.columns = columns;
        self
    }

    #[must_use]
    pub fn retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    #[must_use]
    pub fn placeholder_style(mut self, style: PlaceholderStyle) -> Self {
        self.placeholder_style = style;
        self
    }

    /// # Errors
    /// Returns `RepoError::InvalidArgument` for a bad table or column name, or a retention
    /// period above [`MAX_RETENTION_DAYS`].
    pub fn validate(&self) -> Result<(), RepoError> {
        check_identifier("table", &self.table)?;
        if self.retention_days > MAX_RETENTION_DAYS {
            return Err(RepoError::InvalidArgument(format!(
                "retention_days must be at most {MAX_RETENTION_DAYS}, got {}",
                self.retention_days
            )));
        }
        self.columns.validate()
    }
}
