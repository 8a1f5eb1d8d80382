use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::config::ColumnMapping;
use crate::error::RepoError;
use crate::results::CustomDbRow;
use crate::types::RowValues;

/// A raw row viewed through a [`ColumnMapping`], addressed by domain field name.
pub struct MappedRow<'a> {
    row: &'a CustomDbRow,
    mapping: &'a ColumnMapping,
}

impl<'a> MappedRow<'a> {
    #[must_use]
    pub fn new(row: &'a CustomDbRow, mapping: &'a ColumnMapping) -> Self {
        Self { row, mapping }
    }

    /// # Errors
    /// Returns `RepoError::RowMapping` if the mapped column is absent from the row.
    pub fn value(&self, field: &str) -> Result<&'a RowValues, RepoError> {
        let column = self.mapping.column(field);
        self.row.get(column).ok_or_else(|| {
            RepoError::RowMapping(format!("column {column} (field {field}) missing from row"))
        })
    }

    fn typed<T>(
        &self,
        field: &str,
        expected: &str,
        convert: impl FnOnce(&'a RowValues) -> Option<T>,
    ) -> Result<T, RepoError> {
        let value = self.value(field)?;
        convert(value).ok_or_else(|| {
            RepoError::RowMapping(format!("field {field}: expected {expected}, got {value:?}"))
        })
    }

    /// # Errors
    /// Returns `RepoError::RowMapping` if the column is missing or not an integer.
    pub fn int(&self, field: &str) -> Result<i64, RepoError> {
        self.typed(field, "an integer", RowValues::as_int)
    }

    /// # Errors
    /// Returns `RepoError::RowMapping` if the column is missing or not text.
    pub fn text(&self, field: &str) -> Result<String, RepoError> {
        self.typed(field, "text", |v| v.as_text().map(str::to_string))
    }

    /// # Errors
    /// Returns `RepoError::RowMapping` if the column is missing or not boolean-like.
    pub fn bool(&self, field: &str) -> Result<bool, RepoError> {
        self.typed(field, "a boolean", RowValues::as_bool)
    }

    /// # Errors
    /// Returns `RepoError::RowMapping` if the column is missing or not numeric.
    pub fn float(&self, field: &str) -> Result<f64, RepoError> {
        self.typed(field, "a number", RowValues::as_float)
    }

    /// # Errors
    /// Returns `RepoError::RowMapping` if the column is missing or not a timestamp.
    pub fn timestamp(&self, field: &str) -> Result<NaiveDateTime, RepoError> {
        self.typed(field, "a timestamp", RowValues::as_timestamp)
    }
}

/// A domain type a repository reads and writes.
pub trait Record: Sized + Send + Sync {
    /// Domain fields projected by every SELECT, in order. Must include `id`.
    const FIELDS: &'static [&'static str];

    /// # Errors
    /// Returns `RepoError::RowMapping` when the row does not fit the record.
    fn from_row(row: &MappedRow<'_>) -> Result<Self, RepoError>;

    /// Field/value pairs written by `create`; the generated `id` is left out.
    fn to_assignments(&self) -> Vec<(&'static str, RowValues)>;
}

/// Catalogue entry used by the stock repository shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// `None` until the backend has assigned one.
    pub id: Option<i64>,
    pub name: String,
    pub category: String,
    pub featured: bool,
    pub rating: f64,
    pub created_at: NaiveDateTime,
    pub archived: bool,
}

impl Record for Product {
    const FIELDS: &'static [&'static str] = &[
        "id",
        "name",
        "category",
        "featured",
        "rating",
        "created_at",
        "archived",
    ];

    fn from_row(row: &MappedRow<'_>) -> Result<Self, RepoError> {
        Ok(Self {
            id: Some(row.int("id")?),
            name: row.text("name")?,
            category: row.text("category")?,
            featured: row.bool("featured")?,
            rating: row.float("rating")?,
            created_at: row.timestamp("created_at")?,
            archived: row.bool("archived")?,
        })
    }

    fn to_assignments(&self) -> Vec<(&'static str, RowValues)> {
        vec![
            ("name", RowValues::from(self.name.as_str())),
            ("category", RowValues::from(self.category.as_str())),
            ("featured", RowValues::Bool(self.featured)),
            ("rating", RowValues::Float(self.rating)),
            ("created_at", RowValues::Timestamp(self.created_at)),
            ("archived", RowValues::Bool(self.archived)),
        ]
    }
}
