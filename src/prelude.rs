//! Convenient imports for common functionality.

pub use crate::error::RepoError;
pub use crate::executor::{ConnectionManager, ExecOutcome, Executor};
pub use crate::observer::{Event, NoopObserver, Observer, TracingObserver};
pub use crate::pool::{
    ConnectionState, Pool, PoolBuilder, PoolConfig, PoolMetrics, PoolStatus, PooledConnection,
};
pub use crate::query_builder::{Operator, QueryBuilder, RenderedStatement, Statement, Verb};
pub use crate::repository::{
    ColumnMapping, MappedRow, Product, Record, Repository, RepositoryConfig,
};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::types::{PlaceholderStyle, RowValues, SortDirection};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteConnection, SqliteManager, SqliteOptions, SqliteOptionsBuilder};
