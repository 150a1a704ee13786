//! End-to-end read-through behavior against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use seqache_storage::{
    derive_field_key, CacheOverrides, FailureStage, LifecycleEvent, QueryKind, ReadSource,
    ReadThroughCache, SeqacheConfig, SeqacheError, StoreAdapter,
};
use seqache_test_utils::{
    live_args_for, orders, raw_args_for, users, FaultyStore, InMemoryStore, MockExecutor,
    RecordingErrorSink, RecordingHooks,
};
use serde_json::json;

fn memory_cache() -> ReadThroughCache<InMemoryStore> {
    ReadThroughCache::new(Arc::new(InMemoryStore::new()), SeqacheConfig::default())
        .expect("default config is valid")
}

#[tokio::test]
async fn full_group_is_evicted_before_the_next_write() {
    let cache = memory_cache();
    let mut hooks = RecordingHooks::new();
    let wrapped = cache
        .wrap(
            orders(),
            CacheOverrides::default()
                .with_ttl(Duration::from_secs(60))
                .with_max_group_size(2),
            &mut hooks,
        )
        .unwrap();
    let executor = MockExecutor::returning(json!([{"id": 1}]));

    for id in 1..=3 {
        let outcome = wrapped
            .find_detailed(QueryKind::All, raw_args_for(id), &executor)
            .await
            .unwrap();
        assert_eq!(outcome.source, ReadSource::Miss);
        assert!(outcome.write_behind.unwrap().wait().await);
    }

    let fields = cache.store().field_keys(&wrapped.group_key()).await;
    let third = derive_field_key(&raw_args_for(3)).unwrap();
    assert_eq!(fields, vec![third.as_str().to_string()]);
    assert_eq!(cache.stats().evictions, 1);

    let ttl = cache.store().group_ttl(&wrapped.group_key()).await.unwrap();
    assert!(ttl <= Duration::from_secs(60));
}

#[tokio::test]
async fn executor_failure_propagates_without_caching() {
    let store = Arc::new(FaultyStore::new());
    let cache = ReadThroughCache::new(Arc::clone(&store), SeqacheConfig::default()).unwrap();
    let executor = MockExecutor::failing("connection reset by peer");

    let err = cache
        .read_through(
            cache.request(&orders(), QueryKind::All, raw_args_for(1)),
            &executor,
        )
        .await
        .unwrap_err();

    match err {
        SeqacheError::QueryExecution(e) => assert_eq!(e.reason(), "connection reset by peer"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.writes(), 0);
    assert!(!store.inner().contains_group(&cache.group_key(&orders())).await);
}

#[tokio::test]
async fn create_event_purges_cached_queries() {
    let cache = memory_cache();
    let mut hooks = RecordingHooks::new();
    let wrapped = cache
        .wrap(orders(), CacheOverrides::default(), &mut hooks)
        .unwrap();
    let executor = MockExecutor::returning(json!([{"id": 1, "status": "open"}]));
    for event in LifecycleEvent::ALL {
        assert_eq!(hooks.registered(event), 1, "no purge bound to {event}");
    }

    let outcome = wrapped
        .find_detailed(QueryKind::All, raw_args_for(1), &executor)
        .await
        .unwrap();
    outcome.write_behind.unwrap().wait().await;
    assert!(cache.store().contains_group(&wrapped.group_key()).await);

    assert_eq!(hooks.fire(LifecycleEvent::AfterCreate).await, vec![true]);
    assert!(!cache.store().contains_group(&wrapped.group_key()).await);

    // The next identical read goes back to the executor.
    let again = wrapped
        .find_detailed(QueryKind::All, raw_args_for(1), &executor)
        .await
        .unwrap();
    assert_eq!(again.source, ReadSource::Miss);
    assert_eq!(executor.calls(), 2);
}

#[tokio::test]
async fn repeated_read_is_served_from_cache() {
    let cache = memory_cache();
    let mut hooks = RecordingHooks::new();
    let wrapped = cache
        .wrap(orders(), CacheOverrides::default(), &mut hooks)
        .unwrap();
    let executor = MockExecutor::with_results(json!([]), json!({"id": 9}));

    let first = wrapped
        .find_detailed(QueryKind::One, raw_args_for(9), &executor)
        .await
        .unwrap();
    first.write_behind.unwrap().wait().await;

    let second = wrapped.find_one(raw_args_for(9), &executor).await.unwrap();
    assert_eq!(second, json!({"id": 9}));
    assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn live_queries_never_touch_the_store() {
    let store = Arc::new(FaultyStore::new());
    let cache = ReadThroughCache::new(Arc::clone(&store), SeqacheConfig::default()).unwrap();
    let mut hooks = RecordingHooks::new();
    let wrapped = cache
        .wrap(orders(), CacheOverrides::default(), &mut hooks)
        .unwrap();
    let executor = MockExecutor::returning(json!([{"id": 2}]));

    for _ in 0..3 {
        let value = wrapped.find_all(live_args_for(2), &executor).await.unwrap();
        assert_eq!(value, json!([{"id": 2}]));
    }

    assert_eq!(executor.calls(), 3);
    assert_eq!(store.writes(), 0);
    assert_eq!(cache.stats().passthroughs, 3);
}

#[tokio::test]
async fn unreachable_store_degrades_to_uncached_reads() {
    let store = Arc::new(FaultyStore::unavailable());
    let sink = RecordingErrorSink::new();
    let cache = ReadThroughCache::new(Arc::clone(&store), SeqacheConfig::default())
        .unwrap()
        .with_error_sink(sink.clone());
    let executor = MockExecutor::returning(json!([{"id": 3}]));

    let outcome = cache
        .read_through_detailed(
            cache.request(&orders(), QueryKind::All, raw_args_for(3)),
            &executor,
        )
        .await
        .unwrap();
    assert_eq!(outcome.source, ReadSource::Miss);
    assert_eq!(outcome.value, json!([{"id": 3}]));
    assert!(!outcome.write_behind.unwrap().wait().await);

    assert_eq!(sink.stages(), vec![FailureStage::Read, FailureStage::Evict]);
    let stats = cache.stats();
    assert_eq!(stats.store_errors, 1);
    assert_eq!(stats.write_failures, 1);
}

#[tokio::test]
async fn failed_write_is_not_surfaced() {
    let store = Arc::new(FaultyStore::new());
    store.set_fail_writes(true);
    let sink = RecordingErrorSink::new();
    let cache = ReadThroughCache::new(Arc::clone(&store), SeqacheConfig::default())
        .unwrap()
        .with_error_sink(sink.clone());
    let executor = MockExecutor::returning(json!({"id": 4}));

    let value = cache
        .read_through(
            cache.request(&orders(), QueryKind::One, raw_args_for(4)),
            &executor,
        )
        .await
        .unwrap();
    assert_eq!(value, json!({"id": 4}));

    // Let the detached write-behind run to completion.
    for _ in 0..50 {
        if !sink.failures().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(sink.stages(), vec![FailureStage::Evict]);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn failed_purge_reports_and_returns_false() {
    let store = Arc::new(FaultyStore::new());
    let sink = RecordingErrorSink::new();
    let cache = ReadThroughCache::new(Arc::clone(&store), SeqacheConfig::default())
        .unwrap()
        .with_error_sink(sink.clone());
    let group = cache.group_key(&orders());
    let field = derive_field_key(&raw_args_for(1)).unwrap();
    store.set_field(&group, &field, b"[]".to_vec()).await.unwrap();

    store.set_fail_deletes(true);
    assert!(!cache.purge(&orders()).await);
    assert_eq!(sink.stages(), vec![FailureStage::Purge]);
    assert!(store.inner().contains_group(&group).await);
}

#[tokio::test(start_paused = true)]
async fn cached_group_expires_after_ttl() {
    let cache = memory_cache();
    let mut hooks = RecordingHooks::new();
    let wrapped = cache
        .wrap(
            orders(),
            CacheOverrides::default().with_ttl(Duration::from_secs(60)),
            &mut hooks,
        )
        .unwrap();
    let executor = MockExecutor::returning(json!([{"id": 5}]));

    let first = wrapped
        .find_detailed(QueryKind::All, raw_args_for(5), &executor)
        .await
        .unwrap();
    first.write_behind.unwrap().wait().await;

    tokio::time::advance(Duration::from_secs(59)).await;
    let warm = wrapped
        .find_detailed(QueryKind::All, raw_args_for(5), &executor)
        .await
        .unwrap();
    assert_eq!(warm.source, ReadSource::Hit);

    tokio::time::advance(Duration::from_secs(2)).await;
    let cold = wrapped
        .find_detailed(QueryKind::All, raw_args_for(5), &executor)
        .await
        .unwrap();
    assert_eq!(cold.source, ReadSource::Miss);
    assert_eq!(executor.calls(), 2);
}

#[tokio::test]
async fn prefix_separates_caches_sharing_a_store() {
    let store = Arc::new(InMemoryStore::new());
    let blue = ReadThroughCache::new(
        Arc::clone(&store),
        SeqacheConfig::new().with_key_prefix("blue"),
    )
    .unwrap();
    let green = ReadThroughCache::new(
        Arc::clone(&store),
        SeqacheConfig::new().with_key_prefix("green"),
    )
    .unwrap();
    let executor = MockExecutor::returning(json!([1]));

    let outcome = blue
        .read_through_detailed(
            blue.request(&orders(), QueryKind::All, raw_args_for(1)),
            &executor,
        )
        .await
        .unwrap();
    outcome.write_behind.unwrap().wait().await;

    assert_eq!(blue.group_key(&orders()).as_str(), "blue:shop:orders");
    assert!(!green.purge(&orders()).await);
    assert!(store.contains_group(&blue.group_key(&orders())).await);
}

#[tokio::test]
async fn purge_only_touches_its_own_dataset() {
    let store = Arc::new(FaultyStore::new());
    let cache = ReadThroughCache::new(Arc::clone(&store), SeqacheConfig::default()).unwrap();
    let executor = MockExecutor::returning(json!([]));

    for dataset in [orders(), users()] {
        let outcome = cache
            .read_through_detailed(
                cache.request(&dataset, QueryKind::All, raw_args_for(1)),
                &executor,
            )
            .await
            .unwrap();
        assert!(outcome.write_behind.unwrap().wait().await);
    }

    assert!(cache.purge(&orders()).await);
    assert_eq!(store.deletes(), 1);
    assert!(!store.inner().contains_group(&cache.group_key(&orders())).await);
    assert!(store.inner().contains_group(&cache.group_key(&users())).await);
}

#[tokio::test(start_paused = true)]
async fn miss_returns_before_the_cache_write_lands() {
    let store = Arc::new(FaultyStore::new().with_write_delay(Duration::from_secs(5)));
    let cache = ReadThroughCache::new(Arc::clone(&store), SeqacheConfig::default()).unwrap();
    let executor = MockExecutor::returning(json!([{"id": 6}]));

    let outcome = cache
        .read_through_detailed(
            cache.request(&orders(), QueryKind::All, raw_args_for(6)),
            &executor,
        )
        .await
        .unwrap();
    assert_eq!(outcome.value, json!([{"id": 6}]));

    let handle = outcome.write_behind.unwrap();
    assert!(!handle.is_finished());
    assert_eq!(store.writes(), 0);

    assert!(handle.wait().await);
    assert_eq!(store.writes(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_misses_both_execute_and_last_write_wins() {
    let cache = memory_cache();
    let executor = MockExecutor::returning(json!([{"id": 7}]))
        .with_delay(Duration::from_millis(50));
    let request = || cache.request(&orders(), QueryKind::All, raw_args_for(7));

    let (first, second) = tokio::join!(
        cache.read_through_detailed(request(), &executor),
        cache.read_through_detailed(request(), &executor),
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(first.source, ReadSource::Miss);
    assert_eq!(second.source, ReadSource::Miss);
    assert_eq!(executor.calls(), 2);

    assert!(first.write_behind.unwrap().wait().await);
    assert!(second.write_behind.unwrap().wait().await);

    let fields = cache.store().field_keys(&cache.group_key(&orders())).await;
    assert_eq!(fields.len(), 1);
    assert_eq!(cache.stats().misses, 2);
}

#[test]
fn ttl_beyond_store_range_is_rejected() {
    let result = ReadThroughCache::new(
        Arc::new(InMemoryStore::new()),
        SeqacheConfig::new().with_ttl(Duration::from_secs(u64::MAX)),
    );
    assert!(matches!(result, Err(SeqacheError::Config(_))));
}
