//! In-memory fake backend for exercising pools and repositories without a database.
//!
//! Outcomes are scripted in FIFO order; when the script is empty the fake answers with an empty
//! success shaped after the statement's verb.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RepoError;
use crate::executor::{ConnectionManager, ExecOutcome, Executor};
use crate::query_builder::{RenderedStatement, Verb};
use crate::results::ResultSet;
use crate::types::RowValues;

#[derive(Default)]
struct FakeState {
    script: VecDeque<Result<ExecOutcome, RepoError>>,
    executed: Vec<RenderedStatement>,
    opened: u64,
    failing_connects: usize,
    connect_delay: Option<Duration>,
    next_insert_id: i64,
}

/// Shared handle to the fake; clones observe the same script and log.
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn manager(&self) -> FakeManager {
        FakeManager {
            backend: self.clone(),
        }
    }

    /// Queue the outcome of the next executed statement.
    pub fn push_outcome(&self, outcome: Result<ExecOutcome, RepoError>) {
        self.lock().script.push_back(outcome);
    }

    /// Queue a row set for the next executed statement.
    pub fn push_rows(&self, columns: &[&str], rows: Vec<Vec<RowValues>>) {
        let mut rs = ResultSet::new(columns.iter().map(|c| (*c).to_string()).collect());
        for row in rows {
            if let Err(e) = rs.add_row_values(row) {
                self.push_outcome(Err(e));
                return;
            }
        }
        self.push_outcome(Ok(ExecOutcome::Rows(rs)));
    }

    /// Make the next statement fail the way a dropped connection would.
    pub fn push_failure(&self, message: &str) {
        self.push_outcome(Err(RepoError::QueryExecution(message.to_string())));
    }

    /// Make the next `n` connection attempts fail.
    pub fn fail_connects(&self, n: usize) {
        self.lock().failing_connects = n;
    }

    /// Delay every connection attempt.
    pub fn set_connect_delay(&self, delay: Duration) {
        self.lock().connect_delay = Some(delay);
    }

    /// Statements executed so far, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<RenderedStatement> {
        self.lock().executed.clone()
    }

    #[must_use]
    pub fn connections_opened(&self) -> u64 {
        self.lock().opened
    }
}

pub struct FakeManager {
    backend: FakeBackend,
}

#[async_trait]
impl ConnectionManager for FakeManager {
    type Connection = FakeConnection;

    async fn connect(&self) -> Result<FakeConnection, RepoError> {
        let delay = self.backend.lock().connect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.backend.lock();
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(RepoError::Connection("fake backend refused connection".into()));
        }
        state.opened += 1;
        Ok(FakeConnection {
            serial: state.opened,
            backend: self.backend.clone(),
        })
    }
}

pub struct FakeConnection {
    serial: u64,
    backend: FakeBackend,
}

impl FakeConnection {
    /// Order in which the fake opened this connection, starting at 1.
    #[must_use]
    pub fn serial(&self) -> u64 {
        self.serial
    }
}

#[async_trait]
impl Executor for FakeConnection {
    async fn execute(&mut self, statement: &RenderedStatement) -> Result<ExecOutcome, RepoError> {
        let mut state = self.backend.lock();
        state.executed.push(statement.clone());
        if let Some(outcome) = state.script.pop_front() {
            return outcome;
        }
        Ok(match statement.verb {
            Verb::Select => ExecOutcome::Rows(ResultSet::default()),
            Verb::Update | Verb::Delete => ExecOutcome::Affected(0),
            Verb::Insert => {
                state.next_insert_id += 1;
                ExecOutcome::Inserted(RowValues::Int(state.next_insert_id))
            }
        })
    }
}
