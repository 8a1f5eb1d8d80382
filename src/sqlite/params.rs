use rusqlite::types::Value;

use crate::types::RowValues;

/// Convert a single bound value to a rusqlite `Value`.
///
/// SQLite has no boolean, timestamp or JSON storage class: booleans become `0`/`1` and
/// timestamps and JSON are stored as text. Timestamps use `YYYY-MM-DD HH:MM:SS[.fff]`, which
/// sorts and compares correctly as text.
#[must_use]
pub fn row_value_to_sqlite_value(value: &RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(json) => Value::Text(json.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Convert a rusqlite `Value` read from a row back into a `RowValues`.
#[must_use]
pub fn sqlite_value_to_row_value(value: Value) -> RowValues {
    match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    }
}

/// Bindings in placeholder order.
pub(crate) fn convert_params(bindings: &[RowValues]) -> Vec<Value> {
    bindings.iter().map(row_value_to_sqlite_value).collect()
}
