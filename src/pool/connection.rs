use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use super::{IdleConn, Shared};
use crate::error::RepoError;
use crate::executor::{ConnectionManager, ExecOutcome, Executor};
use crate::query_builder::RenderedStatement;

/// Lifecycle of one pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Parked in the pool, ready to be handed out.
    Idle,
    /// Held by exactly one caller.
    InUse,
    /// Held by a caller that reported an unrecoverable failure; will be discarded on release.
    Broken,
    /// Discarded by the pool; never handed out again.
    Closed,
}

/// A connection checked out of a [`Pool`](super::Pool).
///
/// Dropping the handle releases it, so every exit path of the borrowing scope gives the
/// connection back. [`release`](Self::release) does the same explicitly and reports where the
/// connection went.
pub struct PooledConnection<M: ConnectionManager> {
    shared: Arc<Shared<M>>,
    id: u64,
    conn: Option<M::Connection>,
    broken: bool,
    acquired_at: Instant,
}

impl<M: ConnectionManager> PooledConnection<M> {
    pub(super) fn new(shared: Arc<Shared<M>>, idle: IdleConn<M::Connection>) -> Self {
        Self {
            shared,
            id: idle.id,
            conn: Some(idle.conn),
            broken: false,
            acquired_at: Instant::now(),
        }
    }

    /// Pool-unique identifier of the underlying connection.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        if self.broken {
            ConnectionState::Broken
        } else {
            ConnectionState::InUse
        }
    }

    /// Flag the connection as unusable. It stays checked out until released, and is then
    /// closed instead of returning to the idle set.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Direct access to the backend connection.
    pub fn connection_mut(&mut self) -> Option<&mut M::Connection> {
        self.conn.as_mut()
    }

    /// Run a statement on this connection.
    ///
    /// # Errors
    /// Returns the backend's error unchanged, or `RepoError::IllegalState` if the handle was
    /// already marked broken.
    pub async fn execute(&mut self, statement: &RenderedStatement) -> Result<ExecOutcome, RepoError> {
        if self.broken {
            return Err(RepoError::IllegalState(format!(
                "connection {} is marked broken",
                self.id
            )));
        }
        match self.conn.as_mut() {
            Some(conn) => conn.execute(statement).await,
            None => Err(RepoError::IllegalState(format!(
                "connection {} was already released",
                self.id
            ))),
        }
    }

    /// Give the connection back to the pool.
    ///
    /// Returns [`ConnectionState::Idle`] when the connection was kept for reuse (parked or
    /// handed straight to a waiter) and [`ConnectionState::Closed`] when it was discarded
    /// because it was broken or the pool is closed.
    pub fn release(mut self) -> ConnectionState {
        self.check_in()
    }

    fn check_in(&mut self) -> ConnectionState {
        match self.conn.take() {
            Some(conn) => {
                tracing::trace!(
                    connection_id = self.id,
                    held_ms = u64::try_from(self.acquired_at.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "checking connection in"
                );
                self.shared.check_in(
                    IdleConn {
                        id: self.id,
                        conn,
                    },
                    self.broken,
                )
            }
            None => ConnectionState::Closed,
        }
    }
}

impl<M: ConnectionManager> Drop for PooledConnection<M> {
    fn drop(&mut self) {
        self.check_in();
    }
}

impl<M: ConnectionManager> fmt::Debug for PooledConnection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
