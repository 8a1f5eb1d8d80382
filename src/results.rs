use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RepoError;
use crate::types::RowValues;

/// A single raw row as produced by an executor.
///
/// Column names and the name → index lookup are shared with every other row of the same
/// result set.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomDbRow {
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
    /// The values for this row, in column order
    pub values: Vec<RowValues>,
}

impl CustomDbRow {
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Get the index of a column by name
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        self.column_index.get(column_name).copied()
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }
}

/// Rows returned by a SELECT.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
    /// The rows returned by the query
    pub results: Vec<CustomDbRow>,
}

impl ResultSet {
    /// Start an empty result set with the given column layout.
    #[must_use]
    pub fn new(column_names: Vec<String>) -> Self {
        let column_index = column_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect::<HashMap<_, _>>();
        Self {
            column_names: Arc::new(column_names),
            column_index: Arc::new(column_index),
            results: Vec::new(),
        }
    }

    /// Append a row.
    ///
    /// # Errors
    /// Returns `RepoError::QueryExecution` if the row's arity does not match the column layout.
    pub fn add_row_values(&mut self, values: Vec<RowValues>) -> Result<(), RepoError> {
        if values.len() != self.column_names.len() {
            return Err(RepoError::QueryExecution(format!(
                "row has {} values but the result set has {} columns",
                values.len(),
                self.column_names.len()
            )));
        }
        self.results.push(CustomDbRow {
            column_names: Arc::clone(&self.column_names),
            column_index: Arc::clone(&self.column_index),
            values,
        });
        Ok(())
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
