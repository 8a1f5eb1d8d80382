//! Domain-facing façade over a [`Pool`] and the statement shapes in [`shapes`].
//!
//! Every operation follows the same protocol: build the statement, check a connection out,
//! execute, and give the connection back on every path. A failed execution marks the
//! connection broken before it is released so the pool discards it.

mod config;
mod record;
pub mod shapes;

pub use config::{ColumnMapping, MAX_RETENTION_DAYS, RepositoryConfig};
pub use record::{MappedRow, Product, Record};

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};

use crate::error::RepoError;
use crate::executor::{ConnectionManager, ExecOutcome};
use crate::observer::{Event, Observer};
use crate::pool::Pool;
use crate::query_builder::Statement;
use crate::results::ResultSet;
use crate::types::RowValues;

pub struct Repository<M: ConnectionManager, T: Record> {
    pool: Pool<M>,
    config: RepositoryConfig,
    observer: Arc<dyn Observer>,
    _record: PhantomData<fn() -> T>,
}

impl<M: ConnectionManager, T: Record> Clone for Repository<M, T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            config: self.config.clone(),
            observer: Arc::clone(&self.observer),
            _record: PhantomData,
        }
    }
}

impl<M: ConnectionManager, T: Record> Repository<M, T> {
    /// Create a repository sharing `pool`; events go to the pool's observer.
    ///
    /// # Errors
    /// Returns `RepoError::InvalidArgument` if the table or a mapped column is not a valid
    /// identifier.
    pub fn new(pool: &Pool<M>, config: RepositoryConfig) -> Result<Self, RepoError> {
        Self::with_observer(pool, config, pool.observer())
    }

    /// # Errors
    /// See [`new`](Self::new).
    pub fn with_observer(
        pool: &Pool<M>,
        config: RepositoryConfig,
        observer: Arc<dyn Observer>,
    ) -> Result<Self, RepoError> {
        config.validate()?;
        Ok(Self {
            pool: pool.clone(),
            config,
            observer,
            _record: PhantomData,
        })
    }

    #[must_use]
    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Every record, ordered by id.
    ///
    /// # Errors
    /// Pool errors (`PoolExhausted`, `PoolClosed`, connect failures), `QueryExecution`, or
    /// `RowMapping` if a row does not fit `T`.
    pub async fn find_all(&self) -> Result<Vec<T>, RepoError> {
        let statement = shapes::find_all(&self.config, T::FIELDS)?;
        let rows = self.run(&statement).await?.into_rows()?;
        self.map_rows(&rows)
    }

    /// The record with the given id, or `None` when nothing matches.
    ///
    /// # Errors
    /// See [`find_all`](Self::find_all).
    pub async fn find_by_id(&self, id: impl Into<RowValues>) -> Result<Option<T>, RepoError> {
        let statement = shapes::find_by_id(&self.config, T::FIELDS, id.into())?;
        let rows = self.run(&statement).await?.into_rows()?;
        Ok(self.map_rows(&rows)?.into_iter().next())
    }

    /// # Errors
    /// See [`find_all`](Self::find_all).
    pub async fn find_by_category(&self, category: &str) -> Result<Vec<T>, RepoError> {
        let statement = shapes::find_by_category(&self.config, T::FIELDS, category)?;
        let rows = self.run(&statement).await?.into_rows()?;
        self.map_rows(&rows)
    }

    /// Up to ten featured records, best rated first.
    ///
    /// # Errors
    /// See [`find_all`](Self::find_all).
    pub async fn find_featured(&self) -> Result<Vec<T>, RepoError> {
        let statement = shapes::find_featured(&self.config, T::FIELDS)?;
        let rows = self.run(&statement).await?.into_rows()?;
        self.map_rows(&rows)
    }

    /// Archive records older than the configured retention period. Returns the number of rows
    /// updated.
    ///
    /// # Errors
    /// `InvalidArgument` if the retention period cannot be subtracted from the current time,
    /// otherwise pool errors or `QueryExecution`.
    pub async fn archive_old(&self) -> Result<usize, RepoError> {
        let cutoff = shapes::archive_cutoff(&self.config, Utc::now().naive_utc())?;
        self.archive_before(cutoff).await
    }

    async fn archive_before(&self, cutoff: NaiveDateTime) -> Result<usize, RepoError> {
        let statement = shapes::archive_before(&self.config, cutoff)?;
        self.run(&statement).await?.into_affected()
    }

    /// Insert a record and return the identifier the backend generated for it.
    ///
    /// # Errors
    /// Pool errors or `QueryExecution`.
    pub async fn create(&self, record: &T) -> Result<RowValues, RepoError> {
        let statement = shapes::create(&self.config, record.to_assignments())?;
        self.run(&statement).await?.into_inserted()
    }

    /// Returns the number of rows deleted (0 or 1).
    ///
    /// # Errors
    /// Pool errors or `QueryExecution`.
    pub async fn delete_by_id(&self, id: impl Into<RowValues>) -> Result<usize, RepoError> {
        let statement = shapes::delete_by_id(&self.config, id.into())?;
        self.run(&statement).await?.into_affected()
    }

    async fn run(&self, statement: &Statement) -> Result<ExecOutcome, RepoError> {
        let rendered = statement.render(self.config.placeholder_style);
        self.observer
            .on_event(&Event::StatementBuilt { statement: &rendered });

        let mut conn = self.pool.acquire().await?;
        match conn.execute(&rendered).await {
            Ok(outcome) => {
                conn.release();
                Ok(outcome)
            }
            Err(error) => {
                conn.mark_broken();
                self.observer.on_event(&Event::ExecutionFailed {
                    connection_id: conn.id(),
                    statement: &rendered,
                    error: &error,
                });
                conn.release();
                Err(match error {
                    RepoError::QueryExecution(_) => error,
                    other => RepoError::QueryExecution(other.to_string()),
                })
            }
        }
    }

    fn map_rows(&self, rows: &ResultSet) -> Result<Vec<T>, RepoError> {
        rows.results
            .iter()
            .map(|row| T::from_row(&MappedRow::new(row, &self.config.columns)))
            .collect()
    }
}
