//! End-to-end scenarios for coalescing, invalidation-as-barrier, and
//! cancellation semantics, matching the seed scenarios of the state
//! machine's testable-properties section.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use readthrough_cache::cache::ReadThroughCache;
use readthrough_cache::error::CacheError;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn coalesces_ten_concurrent_misses_into_one_lookup() {
    let calls = Arc::new(AtomicU32::new(0));
    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    let gate_rx = Arc::new(Mutex::new(gate_rx));

    let calls_for_lookup = Arc::clone(&calls);
    let cache: Arc<ReadThroughCache<String, i32>> = Arc::new(ReadThroughCache::new(
        move |_key: String, _ctx: std::sync::Arc<dyn readthrough_cache::cache::OperationContext>| {
            let calls = Arc::clone(&calls_for_lookup);
            let gate_rx = Arc::clone(&gate_rx);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                gate_rx.lock().expect("gate lock poisoned").recv().ok();
                Ok(Some(42))
            }
        },
        4,
        4,
    ));

    let waiters: Vec<_> = (0..10)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.acquire_async("a".to_string()).await })
        })
        .collect();

    // Give every spawned task a chance to register as a waiter before the
    // single in-flight lookup is allowed to finish.
    tokio::time::sleep(Duration::from_millis(50)).await;
    gate_tx.send(()).unwrap();

    let mut results = Vec::new();
    for waiter in waiters {
        results.push(waiter.await.unwrap().unwrap());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let first_timestamp = results[0].update_wall_clock_time();
    for handle in &results {
        assert_eq!(**handle, 42);
        assert_eq!(handle.update_wall_clock_time(), first_timestamp);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn invalidation_mid_flight_forces_exactly_one_retry() {
    let call_count = Arc::new(AtomicU32::new(0));
    let entered = Arc::new(tokio::sync::Notify::new());
    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    let gate_rx = Arc::new(Mutex::new(gate_rx));

    let call_count_for_lookup = Arc::clone(&call_count);
    let entered_for_lookup = Arc::clone(&entered);
    let cache: Arc<ReadThroughCache<String, String>> = Arc::new(ReadThroughCache::new(
        move |_key: String, _ctx: std::sync::Arc<dyn readthrough_cache::cache::OperationContext>| {
            let call_count = Arc::clone(&call_count_for_lookup);
            let entered = Arc::clone(&entered_for_lookup);
            let gate_rx = Arc::clone(&gate_rx);
            async move {
                let round = call_count.fetch_add(1, Ordering::SeqCst);
                if round == 0 {
                    entered.notify_one();
                    gate_rx.lock().expect("gate lock poisoned").recv().ok();
                    Ok(Some("v1".to_string()))
                } else {
                    Ok(Some("v2".to_string()))
                }
            }
        },
        4,
        4,
    ));

    let cache_for_waiter = Arc::clone(&cache);
    let waiter = tokio::spawn(async move { cache_for_waiter.acquire_async("a".to_string()).await });

    entered.notified().await;
    cache.invalidate(&"a".to_string());
    gate_tx.send(()).unwrap();

    let result = waiter.await.unwrap().unwrap();
    assert_eq!(*result, "v2");
    assert_eq!(call_count.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn insert_while_in_flight_is_visible_on_the_fast_path_immediately() {
    let round = Arc::new(AtomicU32::new(0));
    let entered = Arc::new(tokio::sync::Notify::new());
    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    let gate_rx = Arc::new(Mutex::new(gate_rx));

    let round_for_lookup = Arc::clone(&round);
    let entered_for_lookup = Arc::clone(&entered);
    let cache: Arc<ReadThroughCache<String, String>> = Arc::new(ReadThroughCache::new(
        move |_key: String, _ctx: std::sync::Arc<dyn readthrough_cache::cache::OperationContext>| {
            let round = Arc::clone(&round_for_lookup);
            let entered = Arc::clone(&entered_for_lookup);
            let gate_rx = Arc::clone(&gate_rx);
            async move {
                let n = round.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    entered.notify_one();
                    gate_rx.lock().expect("gate lock poisoned").recv().ok();
                    Ok(Some("v_old".to_string()))
                } else {
                    Ok(Some("v_retry".to_string()))
                }
            }
        },
        4,
        4,
    ));

    let cache_for_stale = Arc::clone(&cache);
    let stale_waiter =
        tokio::spawn(async move { cache_for_stale.acquire_async("b".to_string()).await });

    entered.notified().await;
    cache.insert_or_assign("b".to_string(), "v_new".to_string(), Utc::now());

    let fresh = cache.acquire_async("b".to_string()).await.unwrap();
    assert_eq!(*fresh, "v_new");
    assert_eq!(cache.stats().len(), 1);

    gate_tx.send(()).unwrap();
    stale_waiter.await.unwrap().ok();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn lookup_failure_is_not_cached() {
    let call_count = Arc::new(AtomicU32::new(0));
    let call_count_for_lookup = Arc::clone(&call_count);
    let cache: Arc<ReadThroughCache<String, String>> = Arc::new(ReadThroughCache::new(
        move |_key: String, _ctx: std::sync::Arc<dyn readthrough_cache::cache::OperationContext>| {
            let call_count = Arc::clone(&call_count_for_lookup);
            async move {
                call_count.fetch_add(1, Ordering::SeqCst);
                Err(CacheError::lookup_failed(anyhow::anyhow!("backing store unreachable")))
            }
        },
        4,
        4,
    ));

    let first = cache.acquire_async("c".to_string()).await.unwrap_err();
    assert!(matches!(first, CacheError::LookupFailed(_)));

    let second = cache.acquire_async("c".to_string()).await.unwrap_err();
    assert!(matches!(second, CacheError::LookupFailed(_)));

    assert_eq!(call_count.load(Ordering::SeqCst), 2);
    assert!(cache.stats().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn absent_lookup_result_is_not_cached() {
    let call_count = Arc::new(AtomicU32::new(0));
    let call_count_for_lookup = Arc::clone(&call_count);
    let cache: Arc<ReadThroughCache<String, String>> = Arc::new(ReadThroughCache::new(
        move |_key: String, _ctx: std::sync::Arc<dyn readthrough_cache::cache::OperationContext>| {
            let call_count = Arc::clone(&call_count_for_lookup);
            async move {
                call_count.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }
        },
        4,
        4,
    ));

    let first = cache.acquire_async("d".to_string()).await.unwrap();
    assert!(!first.is_present());

    let second = cache.acquire_async("d".to_string()).await.unwrap();
    assert!(!second.is_present());

    assert_eq!(call_count.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn zero_capacity_coalesces_but_never_retains_entries() {
    let calls = Arc::new(AtomicU32::new(0));
    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    let gate_rx = Arc::new(Mutex::new(gate_rx));

    let calls_for_lookup = Arc::clone(&calls);
    let cache: Arc<ReadThroughCache<String, i32>> = Arc::new(ReadThroughCache::new(
        move |_key: String, _ctx: std::sync::Arc<dyn readthrough_cache::cache::OperationContext>| {
            let calls = Arc::clone(&calls_for_lookup);
            let gate_rx = Arc::clone(&gate_rx);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                gate_rx.lock().expect("gate lock poisoned").recv().ok();
                Ok(Some(7))
            }
        },
        0,
        4,
    ));

    let waiters: Vec<_> = (0..5)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.acquire_async("z".to_string()).await })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(50)).await;
    gate_tx.send(()).unwrap();

    for waiter in waiters {
        assert_eq!(*waiter.await.unwrap().unwrap(), 7);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.stats().is_empty());

    gate_tx.send(()).unwrap();
    let again = cache.acquire_async("z".to_string()).await.unwrap();
    assert_eq!(*again, 7);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn quiescence_check_fails_while_a_lookup_is_outstanding() {
    let entered = Arc::new(tokio::sync::Notify::new());
    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    let gate_rx = Arc::new(Mutex::new(gate_rx));

    let entered_for_lookup = Arc::clone(&entered);
    let cache: Arc<ReadThroughCache<String, String>> = Arc::new(ReadThroughCache::new(
        move |_key: String, _ctx: std::sync::Arc<dyn readthrough_cache::cache::OperationContext>| {
            let entered = Arc::clone(&entered_for_lookup);
            let gate_rx = Arc::clone(&gate_rx);
            async move {
                entered.notify_one();
                gate_rx.lock().expect("gate lock poisoned").recv().ok();
                Ok(Some("value".to_string()))
            }
        },
        4,
        4,
    ));

    assert!(cache.assert_quiescent().is_ok());

    let cache_for_waiter = Arc::clone(&cache);
    let waiter = tokio::spawn(async move { cache_for_waiter.acquire_async("e".to_string()).await });

    entered.notified().await;
    assert!(matches!(
        cache.assert_quiescent(),
        Err(CacheError::ContractViolation(_))
    ));

    gate_tx.send(()).unwrap();
    waiter.await.unwrap().unwrap();

    assert!(cache.assert_quiescent().is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn insert_or_assign_then_acquire_returns_the_inserted_value() {
    let cache: Arc<ReadThroughCache<String, String>> = Arc::new(ReadThroughCache::new(
        |_key: String, _ctx: std::sync::Arc<dyn readthrough_cache::cache::OperationContext>| async move { panic!("lookup should not run: value was already inserted") },
        4,
        2,
    ));

    cache.insert_or_assign("k".to_string(), "v".to_string(), Utc::now());
    let handle = cache
        .acquire(Arc::new(readthrough_cache::cache::NullOperationContext), "k".to_string())
        .await
        .unwrap();
    assert_eq!(*handle, "v");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn invalidate_if_only_removes_matching_keys() {
    let cache: Arc<ReadThroughCache<String, i32>> = Arc::new(ReadThroughCache::new(
        |key: String, _ctx: std::sync::Arc<dyn readthrough_cache::cache::OperationContext>| async move { Ok(Some(key.len() as i32)) },
        8,
        2,
    ));

    cache.acquire_async("a:1".to_string()).await.unwrap();
    cache.acquire_async("a:2".to_string()).await.unwrap();
    cache.acquire_async("b:1".to_string()).await.unwrap();

    cache.invalidate_if(|k| k.starts_with("a:"));

    let entries = cache.stats();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, "b:1");
}
