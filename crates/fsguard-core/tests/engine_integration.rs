//! Integration tests for the engine under concurrent load

use std::io;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fsguard_core::retry::{RetryPolicy, StatsObserver};
use fsguard_core::{Engine, EngineConfig, Primitive};
use futures::future::join_all;
use tempfile::TempDir;

fn create_test_engine(capacity: usize) -> Engine {
    Engine::builder()
        .with_capacity(capacity)
        .with_policy(RetryPolicy::default().with_base_delay(Duration::from_millis(1)))
        .build()
}

/// Tracks how many operations overlap
#[derive(Default)]
struct ConcurrencyGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyGauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_never_exceeds_capacity() {
    let engine = create_test_engine(3);
    let gauge = Arc::new(ConcurrencyGauge::default());

    let handles: Vec<_> = (0..24)
        .map(|i| {
            let gauge = gauge.clone();
            let attempts = Arc::new(AtomicU32::new(0));
            engine.run_managed(move || {
                let gauge = gauge.clone();
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    gauge.enter();
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    gauge.exit();
                    // Every third operation fails once before succeeding
                    if i % 3 == 0 && attempt == 0 {
                        Err(io::Error::from(io::ErrorKind::WouldBlock))
                    } else {
                        Ok(i)
                    }
                }
            })
        })
        .collect();

    let results = join_all(handles).await;

    let mut values: Vec<_> = results
        .into_iter()
        .map(|settled| settled.unwrap().unwrap())
        .collect();
    values.sort_unstable();
    assert_eq!(values, (0..24).collect::<Vec<_>>());
    assert!(gauge.peak() <= 3, "peak concurrency {}", gauge.peak());
    assert_eq!(engine.active_count(), 0);
    assert_eq!(engine.queued_count(), 0);
}

#[tokio::test]
async fn test_queued_operations_start_in_order() {
    let engine = create_test_engine(1);
    let started = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let started = started.clone();
            engine.run_managed(move || {
                started.lock().unwrap().push(i);
                async { Ok::<_, io::Error>(()) }
            })
        })
        .collect();

    for result in join_all(handles).await {
        result.unwrap().unwrap();
    }

    assert_eq!(*started.lock().unwrap(), vec![0, 1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_failure_does_not_leak_slot() {
    let engine = create_test_engine(1);

    let failed = engine.run_managed(|| async {
        Err::<(), _>(io::Error::from(io::ErrorKind::PermissionDenied))
    });
    let after = engine.run_managed(|| async { Ok::<_, io::Error>("next") });

    assert_eq!(
        failed.await.unwrap().unwrap_err().kind(),
        io::ErrorKind::PermissionDenied
    );
    assert_eq!(after.await.unwrap().unwrap(), "next");
    assert_eq!(engine.active_count(), 0);
}

#[tokio::test]
async fn test_exhausted_operation_frees_slot_for_waiter() {
    let observer = Arc::new(StatsObserver::new());
    let engine = Engine::builder()
        .with_capacity(1)
        .with_policy(
            RetryPolicy::default()
                .with_max_attempts(3)
                .with_base_delay(Duration::from_millis(1)),
        )
        .with_observer(observer.clone())
        .build();

    let busy = engine.run_managed(|| async {
        Err::<(), _>(io::Error::new(io::ErrorKind::ResourceBusy, "locked"))
    });
    let waiter = engine.run_managed(|| async { Ok::<_, io::Error>(1) });
    assert_eq!(engine.queued_count(), 1);

    assert_eq!(busy.await.unwrap().unwrap_err().to_string(), "locked");
    assert_eq!(waiter.await.unwrap().unwrap(), 1);
    assert_eq!(observer.exhaustions(), 1);
    assert_eq!(observer.attempt_starts(), 4);
}

#[tokio::test]
async fn test_blocking_calls_bypass_admission() {
    let engine = create_test_engine(1);
    let holder = engine.admission().submit(async {
        tokio::time::sleep(Duration::from_millis(20)).await;
    });
    assert_eq!(engine.active_count(), 1);

    // Capacity is taken, yet blocking calls still run right away
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("direct.txt");
    engine.write_sync(&path, "direct").unwrap();
    assert_eq!(engine.read_to_string_sync(&path).unwrap(), "direct");
    assert_eq!(engine.active_count(), 1);
    assert_eq!(engine.queued_count(), 0);

    holder.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_file_writes_under_small_capacity() {
    let temp = TempDir::new().unwrap();
    let engine = Engine::new(EngineConfig {
        capacity: 4,
        ..EngineConfig::default()
    })
    .unwrap();

    let writes: Vec<_> = (0..50)
        .map(|i| engine.write(temp.path().join(format!("file-{i:02}.txt")), format!("{i}")))
        .collect();
    for result in join_all(writes).await {
        result.unwrap();
    }

    let entries = engine.read_dir(temp.path()).await.unwrap();
    assert_eq!(entries.len(), 50);
    assert_eq!(
        engine
            .read_to_string(temp.path().join("file-42.txt"))
            .await
            .unwrap(),
        "42"
    );
}

#[tokio::test]
async fn test_independent_engines_do_not_share_slots() {
    let first = create_test_engine(1);
    let second = create_test_engine(1);

    let blocker = first.admission().submit(async {
        tokio::time::sleep(Duration::from_millis(20)).await;
    });
    assert_eq!(first.active_count(), 1);

    let value = second
        .run_managed(|| async { Ok::<_, io::Error>(5) })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(value, 5);
    assert_eq!(second.active_count(), 0);

    blocker.await.unwrap();
}

#[test]
fn test_every_primitive_has_an_executor() {
    let managed = Primitive::ALL
        .iter()
        .filter(|p| p.executor() == fsguard_core::ExecutorKind::Managed)
        .count();
    assert_eq!(managed + 10, Primitive::ALL.len());
}
