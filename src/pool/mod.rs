//! Bounded connection pool with FIFO waiters.
//!
//! All bookkeeping (idle set, waiter queue, counters) lives behind one mutex and every
//! transition happens while it is held, so acquire, release, mark-broken and close are atomic
//! with respect to each other. The lock is never held across an `.await`.
//!
//! A released connection goes straight to the oldest waiter if there is one, otherwise onto a
//! LIFO idle stack so the most recently used connection is handed out next. When a broken
//! connection is discarded its slot is offered to the oldest waiter, which opens a replacement.

mod config;
mod connection;
mod status;

pub use config::{PoolBuilder, PoolConfig};
pub use connection::{ConnectionState, PooledConnection};
pub use status::{PoolMetrics, PoolStatus};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{Notify, oneshot};

use crate::error::RepoError;
use crate::executor::ConnectionManager;
use crate::observer::{Event, Observer, TracingObserver};
use status::MetricsInner;

pub(crate) struct IdleConn<C> {
    pub(crate) id: u64,
    pub(crate) conn: C,
}

/// What a waiter is woken with.
enum Grant<C> {
    /// An existing connection.
    Reuse(IdleConn<C>),
    /// A free slot; the waiter opens the connection itself.
    Create,
}

struct Waiter<C> {
    id: u64,
    tx: oneshot::Sender<Grant<C>>,
}

struct State<C> {
    config: PoolConfig,
    idle: Vec<IdleConn<C>>,
    /// Checked-out connections plus slots reserved for connections being opened.
    in_use: usize,
    waiters: VecDeque<Waiter<C>>,
    next_waiter_id: u64,
    next_connection_id: u64,
    used: bool,
    closed: bool,
    metrics: MetricsInner,
}

impl<C> State<C> {
    fn total(&self) -> usize {
        self.idle.len() + self.in_use
    }

    /// Hand a grant to the oldest waiter still listening, or park it.
    ///
    /// Waiters whose receiver is gone (timed out or cancelled) are skipped and the grant is
    /// offered to the next one. A `Create` grant nobody takes simply leaves the slot free.
    fn dispatch(&mut self, mut grant: Grant<C>) {
        if self.closed {
            if let Grant::Reuse(conn) = grant {
                self.metrics.connections_closed += 1;
                drop(conn);
            }
            return;
        }
        while let Some(waiter) = self.waiters.pop_front() {
            match waiter.tx.send(grant) {
                Ok(()) => {
                    self.in_use += 1;
                    return;
                }
                Err(returned) => grant = returned,
            }
        }
        if let Grant::Reuse(conn) = grant {
            self.idle.push(conn);
        }
    }
}

pub(crate) struct Shared<M: ConnectionManager> {
    manager: M,
    state: Mutex<State<M::Connection>>,
    drained: Notify,
    observer: Arc<dyn Observer>,
    created_at: Instant,
}

impl<M: ConnectionManager> Shared<M> {
    fn lock(&self) -> MutexGuard<'_, State<M::Connection>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Give back a slot or connection that was counted in `in_use`.
    fn give_back(&self, state: &mut State<M::Connection>, grant: Grant<M::Connection>) {
        state.in_use -= 1;
        state.dispatch(grant);
        if state.closed && state.in_use == 0 {
            self.drained.notify_waiters();
        }
    }

    pub(crate) fn check_in(&self, conn: IdleConn<M::Connection>, broken: bool) -> ConnectionState {
        let id = conn.id;
        let discarded = {
            let mut state = self.lock();
            let discard = broken || state.closed;
            if discard {
                state.metrics.connections_closed += 1;
                if broken {
                    state.metrics.broken_discarded += 1;
                }
                drop(conn);
                self.give_back(&mut state, Grant::Create);
            } else {
                self.give_back(&mut state, Grant::Reuse(conn));
            }
            discard
        };

        if broken {
            tracing::debug!(connection_id = id, "discarded broken connection");
        }
        self.observer.on_event(&Event::ConnectionReleased {
            connection_id: id,
            discarded,
        });

        if discarded {
            ConnectionState::Closed
        } else {
            ConnectionState::Idle
        }
    }
}

/// Removes a queued waiter whose `acquire` gave up (timeout or cancellation).
///
/// If a grant was sent in the meantime it is taken back out of the channel and given to the
/// next waiter, so an abandoned wait never swallows a connection.
struct WaitGuard<'a, M: ConnectionManager> {
    shared: &'a Shared<M>,
    id: u64,
    rx: oneshot::Receiver<Grant<M::Connection>>,
    armed: bool,
}

impl<M: ConnectionManager> Drop for WaitGuard<'_, M> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let shared = self.shared;
        let id = self.id;
        let mut state = shared.lock();
        let queued = state.waiters.len();
        state.waiters.retain(|w| w.id != id);
        if state.waiters.len() == queued {
            // already dequeued: a grant may be sitting in the channel
            self.rx.close();
            if let Ok(grant) = self.rx.try_recv() {
                shared.give_back(&mut state, grant);
            }
        }
    }
}

/// A slot counted in `in_use` while its connection is being opened.
struct SlotReservation<'a, M: ConnectionManager> {
    shared: &'a Shared<M>,
    armed: bool,
}

impl<M: ConnectionManager> Drop for SlotReservation<'_, M> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.shared.lock();
            self.shared.give_back(&mut state, Grant::Create);
        }
    }
}

enum Checkout<C> {
    Ready(Grant<C>),
    Wait(u64, oneshot::Receiver<Grant<C>>),
}

/// A bounded pool of connections opened by a [`ConnectionManager`].
///
/// Cloning is cheap and every clone refers to the same pool.
pub struct Pool<M: ConnectionManager> {
    shared: Arc<Shared<M>>,
}

impl<M: ConnectionManager> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<M: ConnectionManager> std::fmt::Debug for Pool<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool").field("status", &self.status()).finish()
    }
}

impl<M: ConnectionManager> Pool<M> {
    /// Create a pool that reports to the default [`TracingObserver`].
    ///
    /// # Errors
    /// Returns `RepoError::InvalidArgument` if the configuration is invalid.
    pub fn new(manager: M, config: PoolConfig) -> Result<Self, RepoError> {
        Self::with_observer(manager, config, Arc::new(TracingObserver))
    }

    /// # Errors
    /// Returns `RepoError::InvalidArgument` if the configuration is invalid.
    pub fn with_observer(
        manager: M,
        config: PoolConfig,
        observer: Arc<dyn Observer>,
    ) -> Result<Self, RepoError> {
        config.validate()?;
        tracing::info!(
            max_size = config.max_size,
            acquire_timeout = ?config.acquire_timeout,
            "connection pool created"
        );
        let shared = Shared {
            manager,
            state: Mutex::new(State {
                config,
                idle: Vec::new(),
                in_use: 0,
                waiters: VecDeque::new(),
                next_waiter_id: 0,
                next_connection_id: 1,
                used: false,
                closed: false,
                metrics: MetricsInner::default(),
            }),
            drained: Notify::new(),
            observer,
            created_at: Instant::now(),
        };
        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    /// Change size and timeout before the pool is first used.
    ///
    /// # Errors
    /// Returns `RepoError::IllegalState` once any `acquire` has happened or the pool is closed,
    /// and `RepoError::InvalidArgument` if `max_size` is zero.
    pub fn configure(&self, max_size: usize, acquire_timeout: Duration) -> Result<(), RepoError> {
        let config = PoolConfig::new(max_size, acquire_timeout);
        config.validate()?;
        let mut state = self.shared.lock();
        if state.used || state.closed {
            return Err(RepoError::IllegalState(
                "pool can only be configured before its first acquire".into(),
            ));
        }
        state.config = config;
        Ok(())
    }

    #[must_use]
    pub fn config(&self) -> PoolConfig {
        self.shared.lock().config.clone()
    }

    pub(crate) fn observer(&self) -> Arc<dyn Observer> {
        Arc::clone(&self.shared.observer)
    }

    /// Check out a connection.
    ///
    /// Reuses the most recently released idle connection, opens a new one while below
    /// `max_size`, and otherwise queues behind earlier waiters until a connection is released.
    /// `acquire_timeout` bounds the whole call, queueing and connecting included. Dropping the
    /// returned future while it waits removes the caller from the queue.
    ///
    /// # Errors
    /// - `RepoError::PoolExhausted` when the timeout elapses.
    /// - `RepoError::PoolClosed` when the pool is, or gets, closed.
    /// - Whatever the manager returns when opening a new connection fails.
    pub async fn acquire(&self) -> Result<PooledConnection<M>, RepoError> {
        let started = Instant::now();
        let shared = &*self.shared;

        let (checkout, timeout) = {
            let mut state = shared.lock();
            if state.closed {
                state.metrics.checkouts_failed += 1;
                return Err(RepoError::PoolClosed);
            }
            state.used = true;
            let checkout = if let Some(conn) = state.idle.pop() {
                state.in_use += 1;
                Checkout::Ready(Grant::Reuse(conn))
            } else if state.total() < state.config.max_size {
                state.in_use += 1;
                Checkout::Ready(Grant::Create)
            } else {
                let id = state.next_waiter_id;
                state.next_waiter_id += 1;
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(Waiter { id, tx });
                Checkout::Wait(id, rx)
            };
            (checkout, state.config.acquire_timeout)
        };
        let remaining = || timeout.saturating_sub(started.elapsed());
        let exhausted = || {
            shared.lock().metrics.checkouts_failed += 1;
            RepoError::PoolExhausted(format!(
                "no connection became available within {timeout:?}"
            ))
        };

        let grant = match checkout {
            Checkout::Ready(grant) => grant,
            Checkout::Wait(id, rx) => {
                let mut guard = WaitGuard {
                    shared,
                    id,
                    rx,
                    armed: true,
                };
                match tokio::time::timeout(remaining(), &mut guard.rx).await {
                    Ok(Ok(grant)) => {
                        guard.armed = false;
                        grant
                    }
                    Ok(Err(_)) => {
                        guard.armed = false;
                        shared.lock().metrics.checkouts_failed += 1;
                        return Err(RepoError::PoolClosed);
                    }
                    Err(_) => {
                        drop(guard);
                        return Err(exhausted());
                    }
                }
            }
        };

        let idle = match grant {
            Grant::Reuse(conn) => conn,
            // a connect still pending at the deadline is dropped, freeing its slot
            Grant::Create => match tokio::time::timeout(remaining(), Self::open(shared)).await {
                Ok(opened) => opened?,
                Err(_) => {
                    tracing::warn!(?timeout, "connect did not finish within acquire timeout");
                    return Err(exhausted());
                }
            },
        };

        let waited = started.elapsed();
        shared.lock().metrics.checkouts_successful += 1;
        shared.observer.on_event(&Event::ConnectionAcquired {
            connection_id: idle.id,
            waited,
        });
        Ok(PooledConnection::new(Arc::clone(&self.shared), idle))
    }

    /// Open a connection into a slot already counted in `in_use`.
    async fn open(shared: &Shared<M>) -> Result<IdleConn<M::Connection>, RepoError> {
        let mut reservation = SlotReservation {
            shared,
            armed: true,
        };
        match shared.manager.connect().await {
            Ok(conn) => {
                reservation.armed = false;
                let mut state = shared.lock();
                let id = state.next_connection_id;
                state.next_connection_id += 1;
                state.metrics.connections_created += 1;
                tracing::debug!(connection_id = id, "opened connection");
                Ok(IdleConn { id, conn })
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to open connection");
                drop(reservation);
                shared.lock().metrics.checkouts_failed += 1;
                Err(e)
            }
        }
    }

    /// Check out an idle connection without waiting or opening a new one.
    ///
    /// # Errors
    /// Returns `RepoError::PoolClosed` if the pool is closed.
    pub fn try_acquire(&self) -> Result<Option<PooledConnection<M>>, RepoError> {
        let idle = {
            let mut state = self.shared.lock();
            if state.closed {
                return Err(RepoError::PoolClosed);
            }
            state.used = true;
            let Some(conn) = state.idle.pop() else {
                return Ok(None);
            };
            state.in_use += 1;
            state.metrics.checkouts_successful += 1;
            conn
        };
        self.shared.observer.on_event(&Event::ConnectionAcquired {
            connection_id: idle.id,
            waited: Duration::ZERO,
        });
        Ok(Some(PooledConnection::new(Arc::clone(&self.shared), idle)))
    }

    /// Same as [`PooledConnection::release`].
    pub fn release(&self, conn: PooledConnection<M>) -> ConnectionState {
        conn.release()
    }

    /// Same as [`PooledConnection::mark_broken`].
    pub fn mark_broken(&self, conn: &mut PooledConnection<M>) {
        conn.mark_broken();
    }

    /// Shut the pool down.
    ///
    /// Idle connections close immediately and queued waiters fail with `PoolClosed`.
    /// Connections still checked out close when they are released; see [`drain`](Self::drain).
    pub fn close(&self) {
        let (idle, waiters, in_use) = {
            let mut state = self.shared.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            let idle = std::mem::take(&mut state.idle);
            let waiters = std::mem::take(&mut state.waiters);
            state.metrics.connections_closed += idle.len() as u64;
            (idle, waiters, state.in_use)
        };
        tracing::info!(
            closed_idle = idle.len(),
            failed_waiters = waiters.len(),
            still_in_use = in_use,
            "connection pool closed"
        );
        drop(idle);
        drop(waiters);
        if in_use == 0 {
            self.shared.drained.notify_waiters();
        }
    }

    /// Wait until the pool is closed and every checked-out connection has been released.
    pub async fn drain(&self) {
        loop {
            let notified = self.shared.drained.notified();
            {
                let state = self.shared.lock();
                if state.closed && state.in_use == 0 {
                    return;
                }
            }
            notified.await;
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.shared.lock();
        PoolStatus {
            idle: state.idle.len(),
            in_use: state.in_use,
            waiting: state.waiters.len(),
            max_size: state.config.max_size,
            closed: state.closed,
        }
    }

    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let state = self.shared.lock();
        PoolMetrics {
            connections_created: state.metrics.connections_created,
            connections_closed: state.metrics.connections_closed,
            checkouts_successful: state.metrics.checkouts_successful,
            checkouts_failed: state.metrics.checkouts_failed,
            broken_discarded: state.metrics.broken_discarded,
            uptime: self.shared.created_at.elapsed(),
        }
    }
}
