use std::time::{Duration, Instant};

use sql_repository::pool::{ConnectionState, Pool, PoolConfig};
use sql_repository::test_utils::{FakeBackend, FakeManager};
use sql_repository::RepoError;

fn pool(backend: &FakeBackend, max_size: usize, timeout_ms: u64) -> Pool<FakeManager> {
    Pool::new(
        backend.manager(),
        PoolConfig::new(max_size, Duration::from_millis(timeout_ms)),
    )
    .unwrap()
}

async fn wait_for_waiters(pool: &Pool<FakeManager>, n: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while pool.status().waiting != n {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("waiters never queued");
}

#[tokio::test]
async fn extra_caller_waits_until_a_release() {
    let backend = FakeBackend::new();
    let pool = pool(&backend, 2, 2_000);

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    assert_ne!(a.id(), b.id());

    let p = pool.clone();
    let third = tokio::spawn(async move { p.acquire().await });
    wait_for_waiters(&pool, 1).await;
    assert!(!third.is_finished());

    let released_id = a.id();
    assert_eq!(a.release(), ConnectionState::Idle);

    let c = third.await.unwrap().unwrap();
    assert_eq!(c.id(), released_id);
    assert_eq!(backend.connections_opened(), 2);
    assert_eq!(pool.status().in_use, 2);
    drop(b);
    drop(c);
    assert_eq!(pool.status().idle, 2);
}

#[tokio::test]
async fn waiters_are_served_in_arrival_order() {
    let backend = FakeBackend::new();
    let pool = pool(&backend, 1, 2_000);
    let held = pool.acquire().await.unwrap();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    for n in 0..3 {
        let p = pool.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let conn = p.acquire().await.unwrap();
            tx.send(n).unwrap();
            conn.release();
        });
        wait_for_waiters(&pool, n + 1).await;
    }

    held.release();
    let mut order = Vec::new();
    for _ in 0..3 {
        order.push(rx.recv().await.unwrap());
    }
    assert_eq!(order, vec![0, 1, 2]);
}

#[tokio::test]
async fn idle_connections_are_reused_most_recent_first() {
    let backend = FakeBackend::new();
    let pool = pool(&backend, 3, 100);

    let mut a = pool.acquire().await.unwrap();
    let mut b = pool.acquire().await.unwrap();
    let (a_id, b_id) = (a.id(), b.id());
    assert_eq!(a.connection_mut().map(|c| c.serial()), Some(1));
    assert_eq!(b.connection_mut().map(|c| c.serial()), Some(2));
    a.release();
    b.release();

    let mut first = pool.acquire().await.unwrap();
    let second = pool.acquire().await.unwrap();
    assert_eq!(first.id(), b_id);
    assert_eq!(second.id(), a_id);
    // the same physical connection comes back, not a replacement
    assert_eq!(first.connection_mut().map(|c| c.serial()), Some(2));
    assert_eq!(backend.connections_opened(), 2);
}

#[tokio::test]
async fn broken_connection_is_never_handed_out_again() {
    let backend = FakeBackend::new();
    let pool = pool(&backend, 1, 100);

    let mut conn = pool.acquire().await.unwrap();
    let broken_id = conn.id();
    pool.mark_broken(&mut conn);
    assert_eq!(conn.state(), ConnectionState::Broken);
    assert_eq!(pool.release(conn), ConnectionState::Closed);

    for _ in 0..3 {
        let next = pool.acquire().await.unwrap();
        assert_ne!(next.id(), broken_id);
    }
    assert_eq!(pool.metrics().broken_discarded, 1);
    assert_eq!(backend.connections_opened(), 2);
}

#[tokio::test]
async fn discarding_a_broken_connection_lets_a_waiter_open_a_new_one() {
    let backend = FakeBackend::new();
    let pool = pool(&backend, 1, 2_000);

    let mut held = pool.acquire().await.unwrap();
    let p = pool.clone();
    let waiter = tokio::spawn(async move { p.acquire().await });
    wait_for_waiters(&pool, 1).await;

    held.mark_broken();
    let broken_id = held.id();
    held.release();

    let fresh = waiter.await.unwrap().unwrap();
    assert_ne!(fresh.id(), broken_id);
    assert_eq!(pool.status().total(), 1);
}

#[tokio::test]
async fn acquire_times_out_when_exhausted() {
    let backend = FakeBackend::new();
    let pool = pool(&backend, 1, 50);
    let _held = pool.acquire().await.unwrap();

    let started = Instant::now();
    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, RepoError::PoolExhausted(_)));
    assert!(err.is_retryable());
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert_eq!(pool.status().waiting, 0);
    assert_eq!(pool.metrics().checkouts_failed, 1);
}

#[tokio::test]
async fn slow_connect_counts_against_the_acquire_timeout() {
    let backend = FakeBackend::new();
    backend.set_connect_delay(Duration::from_secs(10));
    let pool = pool(&backend, 1, 50);

    let started = Instant::now();
    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, RepoError::PoolExhausted(_)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(pool.status().total(), 0);
    assert_eq!(pool.metrics().checkouts_failed, 1);

    backend.set_connect_delay(Duration::ZERO);
    assert!(pool.acquire().await.is_ok());
}

#[tokio::test]
async fn cancelled_waiter_leaves_the_queue() {
    let backend = FakeBackend::new();
    let pool = pool(&backend, 1, 5_000);
    let held = pool.acquire().await.unwrap();

    let p = pool.clone();
    let waiter = tokio::spawn(async move { p.acquire().await });
    wait_for_waiters(&pool, 1).await;
    waiter.abort();
    assert!(waiter.await.unwrap_err().is_cancelled());
    assert_eq!(pool.status().waiting, 0);

    held.release();
    let status = pool.status();
    assert_eq!((status.idle, status.in_use), (1, 0));
}

#[tokio::test]
async fn waiter_cancelled_after_its_grant_returns_the_connection() {
    let backend = FakeBackend::new();
    let pool = pool(&backend, 1, 5_000);
    let held = pool.acquire().await.unwrap();
    let held_id = held.id();

    let p = pool.clone();
    let waiter = tokio::spawn(async move { p.acquire().await });
    wait_for_waiters(&pool, 1).await;

    // the grant is sent to the waiter, which is cancelled before it can run again
    held.release();
    assert_eq!(pool.status().waiting, 0);
    waiter.abort();
    assert!(waiter.await.unwrap_err().is_cancelled());

    let status = pool.status();
    assert_eq!((status.idle, status.in_use), (1, 0));
    assert_eq!(pool.acquire().await.unwrap().id(), held_id);
}

#[tokio::test]
async fn grant_to_cancelled_waiter_moves_on_to_the_next() {
    let backend = FakeBackend::new();
    let pool = pool(&backend, 1, 5_000);
    let held = pool.acquire().await.unwrap();
    let held_id = held.id();

    let p = pool.clone();
    let first = tokio::spawn(async move { p.acquire().await });
    wait_for_waiters(&pool, 1).await;
    let p = pool.clone();
    let second = tokio::spawn(async move { p.acquire().await.map(|conn| conn.id()) });
    wait_for_waiters(&pool, 2).await;

    held.release();
    first.abort();
    assert!(first.await.unwrap_err().is_cancelled());

    assert_eq!(second.await.unwrap().unwrap(), held_id);
    let status = pool.status();
    assert_eq!((status.idle, status.in_use, status.waiting), (1, 0, 0));
}

#[tokio::test]
async fn close_fails_waiters_and_closes_released_connections() {
    let backend = FakeBackend::new();
    let pool = pool(&backend, 1, 5_000);
    let held = pool.acquire().await.unwrap();

    let p = pool.clone();
    let waiter = tokio::spawn(async move { p.acquire().await });
    wait_for_waiters(&pool, 1).await;

    pool.close();
    assert!(pool.is_closed());
    assert_eq!(waiter.await.unwrap().unwrap_err(), RepoError::PoolClosed);
    assert_eq!(pool.acquire().await.unwrap_err(), RepoError::PoolClosed);
    assert!(matches!(pool.try_acquire(), Err(RepoError::PoolClosed)));

    let p = pool.clone();
    let drained = tokio::spawn(async move { p.drain().await });
    tokio::task::yield_now().await;
    assert!(!drained.is_finished());

    assert_eq!(held.release(), ConnectionState::Closed);
    tokio::time::timeout(Duration::from_secs(2), drained)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pool.status().total(), 0);
}

#[tokio::test]
async fn configure_only_before_first_use() {
    let backend = FakeBackend::new();
    let pool = pool(&backend, 1, 50);

    pool.configure(4, Duration::from_millis(200)).unwrap();
    assert_eq!(pool.config().max_size, 4);
    assert!(matches!(
        pool.configure(0, Duration::from_millis(10)),
        Err(RepoError::InvalidArgument(_))
    ));

    pool.acquire().await.unwrap().release();
    assert!(matches!(
        pool.configure(8, Duration::from_millis(200)),
        Err(RepoError::IllegalState(_))
    ));
    assert_eq!(pool.config().max_size, 4);
}

#[tokio::test]
async fn failed_connect_frees_its_slot() {
    let backend = FakeBackend::new();
    let pool = pool(&backend, 1, 100);
    backend.fail_connects(1);

    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, RepoError::Connection(_)));
    assert_eq!(pool.status().total(), 0);

    let conn = pool.acquire().await.unwrap();
    assert_eq!(conn.id(), 1);
}

#[tokio::test]
async fn abandoned_connect_frees_its_slot() {
    let backend = FakeBackend::new();
    backend.set_connect_delay(Duration::from_secs(10));
    let pool = pool(&backend, 1, 100);

    let p = pool.clone();
    let slow = tokio::spawn(async move { p.acquire().await });
    tokio::time::timeout(Duration::from_secs(2), async {
        while pool.status().in_use == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    slow.abort();
    let _ = slow.await;
    assert_eq!(pool.status().in_use, 0);
}

#[tokio::test]
async fn try_acquire_only_takes_idle_connections() {
    let backend = FakeBackend::new();
    let pool = pool(&backend, 2, 100);
    assert!(pool.try_acquire().unwrap().is_none());

    let conn = pool.acquire().await.unwrap();
    let id = conn.id();
    conn.release();
    let again = pool.try_acquire().unwrap().unwrap();
    assert_eq!(again.id(), id);
    assert!(pool.try_acquire().unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn total_never_exceeds_max_under_contention() {
    let backend = FakeBackend::new();
    let pool = pool(&backend, 3, 5_000);

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let p = pool.clone();
        tasks.push(tokio::spawn(async move {
            let conn = p.acquire().await.unwrap();
            let status = p.status();
            assert!(status.total() <= status.max_size);
            tokio::task::yield_now().await;
            conn.release();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    assert!(backend.connections_opened() <= 3);
    assert_eq!(pool.metrics().checkouts_successful, 20);
}
