//! Connection pooling, a validated SQL query builder and a configurable repository over them.
//!
//! ```no_run
//! # #[cfg(feature = "sqlite")]
//! # async fn demo() -> Result<(), sql_repository::RepoError> {
//! use sql_repository::prelude::*;
//! use sql_repository::sqlite::{SqliteManager, SqliteOptions};
//!
//! let pool = Pool::new(SqliteManager::new(SqliteOptions::new("shop.db")), PoolConfig::default())?;
//! let config = RepositoryConfig::new("products").placeholder_style(PlaceholderStyle::Sqlite);
//! let products: Repository<_, Product> = Repository::new(&pool, config)?;
//! let featured = products.find_featured().await?;
//! # let _ = featured;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod executor;
pub mod observer;
pub mod pool;
pub mod prelude;
pub mod query_builder;
pub mod repository;
pub mod results;
pub mod types;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::RepoError;
pub use executor::{ConnectionManager, ExecOutcome, Executor};
pub use pool::{Pool, PoolBuilder, PoolConfig, PooledConnection};
pub use query_builder::{QueryBuilder, RenderedStatement, Statement};
pub use repository::{Product, Record, Repository, RepositoryConfig};
pub use results::{CustomDbRow, ResultSet};
pub use types::{PlaceholderStyle, RowValues, SortDirection};
