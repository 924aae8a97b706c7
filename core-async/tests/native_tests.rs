//! Integration tests for the core-async facade.

use core_async::{sync, task, time, SingleFlight};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_task_spawn() {
    let handle = task::spawn(async { 42 });
    let result = handle.await.unwrap();
    assert_eq!(result, 42);
}

#[tokio::test]
async fn test_task_abort() {
    let handle = task::spawn(async {
        time::sleep(time::Duration::from_secs(60)).await;
    });
    handle.abort();
    let err = handle.await.unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_success() {
    let result = time::timeout(time::Duration::from_millis(100), async {
        time::sleep(time::Duration::from_millis(10)).await;
        42
    })
    .await;

    assert_eq!(result.unwrap(), 42);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_failure() {
    let result = time::timeout(time::Duration::from_millis(10), async {
        time::sleep(time::Duration::from_millis(100)).await;
        42
    })
    .await;

    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_steady_interval_ticks() {
    let start = time::Instant::now();
    let mut ticker = time::steady_interval(time::Duration::from_secs(1));

    // First tick completes immediately.
    ticker.tick().await;
    ticker.tick().await;
    ticker.tick().await;

    assert_eq!(start.elapsed(), time::Duration::from_secs(2));
}

#[tokio::test]
async fn test_mutex() {
    let mutex = Arc::new(sync::Mutex::new(0));
    let mutex_clone = mutex.clone();

    let handle = task::spawn(async move {
        let mut guard = mutex_clone.lock().await;
        *guard += 1;
    });

    handle.await.unwrap();

    let guard = mutex.lock().await;
    assert_eq!(*guard, 1);
}

#[tokio::test]
async fn test_watch_channel() {
    let (tx, mut rx) = sync::watch::channel(0u32);
    tx.send(5).unwrap();
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_single_flight_across_tasks() {
    let flight = Arc::new(SingleFlight::<u64>::new());
    let started = Arc::new(AtomicUsize::new(0));

    let spawn_caller = |flight: Arc<SingleFlight<u64>>, started: Arc<AtomicUsize>| {
        task::spawn(async move {
            flight
                .run(move || async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    time::sleep(time::Duration::from_secs(1)).await;
                    99
                })
                .await
        })
    };

    let a = spawn_caller(flight.clone(), started.clone());
    let b = spawn_caller(flight.clone(), started.clone());

    assert_eq!(a.await.unwrap(), 99);
    assert_eq!(b.await.unwrap(), 99);
    assert_eq!(started.load(Ordering::SeqCst), 1);
}

#[test]
fn test_build_runtime_hosts_core_tasks() {
    let runtime = core_async::runtime::build_runtime(0).unwrap();
    assert!(core_async::runtime::current().is_none());

    let value = runtime.block_on(async {
        assert!(core_async::runtime::current().is_some());
        task::spawn(async { 7 }).await.unwrap()
    });
    assert_eq!(value, 7);
}
