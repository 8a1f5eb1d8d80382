//! Observability hook invoked at fixed points of the acquire/execute/release cycle.
//!
//! Business logic never logs directly; it reports an [`Event`] and the installed
//! [`Observer`] decides what to do with it. [`TracingObserver`] is the default.

use std::time::Duration;

use crate::error::RepoError;
use crate::query_builder::RenderedStatement;

/// Points in a call's lifecycle that are reported to the observer.
#[derive(Debug)]
pub enum Event<'a> {
    StatementBuilt {
        statement: &'a RenderedStatement,
    },
    ConnectionAcquired {
        connection_id: u64,
        waited: Duration,
    },
    ConnectionReleased {
        connection_id: u64,
        /// The handle was broken and has been discarded instead of returned to the idle set.
        discarded: bool,
    },
    ExecutionFailed {
        connection_id: u64,
        statement: &'a RenderedStatement,
        error: &'a RepoError,
    },
}

pub trait Observer: Send + Sync {
    fn on_event(&self, event: &Event<'_>);
}

/// Forwards every event to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_event(&self, event: &Event<'_>) {
        match event {
            Event::StatementBuilt { statement } => tracing::debug!(
                verb = %statement.verb,
                sql = %statement.text,
                bindings = statement.bindings.len(),
                "statement built"
            ),
            Event::ConnectionAcquired {
                connection_id,
                waited,
            } => tracing::trace!(connection_id, ?waited, "connection acquired"),
            Event::ConnectionReleased {
                connection_id,
                discarded,
            } => tracing::trace!(connection_id, discarded, "connection released"),
            Event::ExecutionFailed {
                connection_id,
                statement,
                error,
            } => tracing::warn!(
                connection_id,
                sql = %statement.text,
                error = %error,
                "statement execution failed"
            ),
        }
    }
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn on_event(&self, _event: &Event<'_>) {}
}
