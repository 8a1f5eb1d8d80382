//! `SQLite` backend built on `rusqlite`.
//!
//! - `config`: options and the [`SqliteManager`] that opens connections for a pool
//! - `connection`: the [`SqliteConnection`] executor
//! - `params`: value conversion between [`RowValues`](crate::types::RowValues) and `SQLite`
//! - `query`: statement execution and result extraction

pub mod config;
pub mod connection;
pub mod params;
pub mod query;

pub use config::{SqliteManager, SqliteOptions, SqliteOptionsBuilder};
pub use connection::SqliteConnection;
pub use params::{row_value_to_sqlite_value, sqlite_value_to_row_value};
pub use query::{build_result_set, execute_statement};
