//! seqache Test Utilities
//!
//! Centralized test infrastructure for the seqache workspace:
//! - Mock query executor with scripted results and call recording
//! - Store wrapper with switchable faults
//! - Recording error sink and lifecycle hook table
//! - Proptest generators for query arguments

// Re-export the in-memory store from its source crate
pub use seqache_storage::InMemoryStore;

// Re-export core types for convenience
pub use seqache_core::{
    CacheOverrides, Dataset, QueryArgs, QueryExecutionError, QueryKind, QueryRequest,
    SeqacheConfig, SeqacheError, SeqacheResult, StoreError,
};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use seqache_storage::{
    CacheFailure, ErrorSink, FailureStage, FieldKey, GroupKey, LifecycleEvent, LifecycleHooks,
    PurgeCallback, QueryExecutor, StoreAdapter,
};
use serde_json::{json, Value};

// ============================================================================
// MOCK EXECUTOR
// ============================================================================

/// Mock data-access layer.
///
/// Returns a fixed result per query kind, counts every call, and can be
/// switched to fail or to take a while.
#[derive(Debug)]
pub struct MockExecutor {
    results: HashMap<QueryKind, Value>,
    failure: Mutex<Option<String>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    log: Mutex<Vec<(QueryKind, QueryArgs)>>,
}

impl MockExecutor {
    /// Executor answering every kind with `result`.
    pub fn returning(result: Value) -> Self {
        let mut results = HashMap::new();
        results.insert(QueryKind::All, result.clone());
        results.insert(QueryKind::One, result);
        Self {
            results,
            failure: Mutex::new(None),
            delay: None,
            calls: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Executor answering `All` and `One` separately.
    pub fn with_results(all: Value, one: Value) -> Self {
        let mut executor = Self::returning(Value::Null);
        executor.results.insert(QueryKind::All, all);
        executor.results.insert(QueryKind::One, one);
        executor
    }

    /// Executor that fails every call with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        let executor = Self::returning(Value::Null);
        executor.fail_with(reason);
        executor
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.failure.lock().expect("failure lock") = Some(reason.into());
    }

    pub fn recover(&self) {
        *self.failure.lock().expect("failure lock") = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every `(kind, args)` the executor was called with, in order.
    pub fn recorded(&self) -> Vec<(QueryKind, QueryArgs)> {
        self.log.lock().expect("log lock").clone()
    }
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    async fn execute(
        &self,
        kind: QueryKind,
        args: &QueryArgs,
    ) -> Result<Value, QueryExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log
            .lock()
            .expect("log lock")
            .push((kind, args.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failure.lock().expect("failure lock").clone();
        match failure {
            Some(reason) => Err(QueryExecutionError::new(kind, reason)),
            None => Ok(self.results.get(&kind).cloned().unwrap_or(Value::Null)),
        }
    }
}

// ============================================================================
// FAULTY STORE
// ============================================================================

/// In-memory store with switchable transport faults and write counters.
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: InMemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
    write_delay: Option<Duration>,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store where every operation fails.
    pub fn unavailable() -> Self {
        let store = Self::default();
        store.set_fail_reads(true);
        store.set_fail_writes(true);
        store.set_fail_deletes(true);
        store
    }

    /// Sleep this long inside every `set_field`.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Fails HSET, HLEN and EXPIRE.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `set_field` calls.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of successful `delete_group` calls.
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::SeqCst)
    }

    fn check(flag: &AtomicBool, operation: &str) -> SeqacheResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::transport(operation, "connection refused").into())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StoreAdapter for FaultyStore {
    async fn get_field(
        &self,
        group: &GroupKey,
        field: &FieldKey,
    ) -> SeqacheResult<Option<Vec<u8>>> {
        Self::check(&self.fail_reads, "HGET")?;
        self.inner.get_field(group, field).await
    }

    async fn set_field(
        &self,
        group: &GroupKey,
        field: &FieldKey,
        value: Vec<u8>,
    ) -> SeqacheResult<()> {
        Self::check(&self.fail_writes, "HSET")?;
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.set_field(group, field, value).await?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn count_fields(&self, group: &GroupKey) -> SeqacheResult<u64> {
        Self::check(&self.fail_writes, "HLEN")?;
        self.inner.count_fields(group).await
    }

    async fn delete_group(&self, group: &GroupKey) -> SeqacheResult<bool> {
        Self::check(&self.fail_deletes, "DEL")?;
        let deleted = self.inner.delete_group(group).await?;
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(deleted)
    }

    async fn set_group_expiry(&self, group: &GroupKey, ttl: Duration) -> SeqacheResult<()> {
        Self::check(&self.fail_writes, "EXPIRE")?;
        self.inner.set_group_expiry(group, ttl).await
    }
}

// ============================================================================
// RECORDING SINK AND HOOKS
// ============================================================================

/// Error sink that keeps every reported failure.
#[derive(Debug, Default)]
pub struct RecordingErrorSink {
    failures: Mutex<Vec<CacheFailure>>,
}

impl RecordingErrorSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failures(&self) -> Vec<CacheFailure> {
        self.failures.lock().expect("sink lock").clone()
    }

    pub fn stages(&self) -> Vec<FailureStage> {
        self.failures().into_iter().map(|f| f.stage).collect()
    }
}

impl ErrorSink for RecordingErrorSink {
    fn report(&self, failure: &CacheFailure) {
        self.failures
            .lock()
            .expect("sink lock")
            .push(failure.clone());
    }
}

/// Stand-in for a data-access layer's hook registry.
#[derive(Default)]
pub struct RecordingHooks {
    callbacks: HashMap<LifecycleEvent, Vec<PurgeCallback>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of callbacks registered for `event`.
    pub fn registered(&self, event: LifecycleEvent) -> usize {
        self.callbacks.get(&event).map(Vec::len).unwrap_or(0)
    }

    /// Simulate a mutation: run every callback bound to `event`.
    pub async fn fire(&self, event: LifecycleEvent) -> Vec<bool> {
        let mut results = Vec::new();
        if let Some(callbacks) = self.callbacks.get(&event) {
            for callback in callbacks {
                results.push(callback().await);
            }
        }
        results
    }
}

impl LifecycleHooks for RecordingHooks {
    fn on_after(&mut self, event: LifecycleEvent, callback: PurgeCallback) {
        self.callbacks.entry(event).or_default().push(callback);
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub fn orders() -> Dataset {
    Dataset::new("shop", "orders")
}

pub fn users() -> Dataset {
    Dataset::new("shop", "users")
}

/// Cacheable arguments filtering on `id`.
pub fn raw_args_for(id: i64) -> QueryArgs {
    QueryArgs::new(vec![json!({"raw": true, "where": {"id": id}})])
}

/// Non-cacheable arguments filtering on `id`.
pub fn live_args_for(id: i64) -> QueryArgs {
    QueryArgs::new(vec![json!({"raw": false, "where": {"id": id}})])
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;

    /// Arbitrary JSON value of bounded depth, no floats.
    pub fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-zA-Z0-9 ]{0,12}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    /// Options object with a filter and the given raw flag.
    pub fn arb_options(raw: bool) -> impl Strategy<Value = Value> {
        (
            prop::collection::btree_map("[a-z_]{1,8}", arb_json(), 0..4),
            prop::option::of(1u32..500),
        )
            .prop_map(move |(filter, limit)| {
                let mut options = serde_json::Map::new();
                options.insert("raw".to_string(), Value::Bool(raw));
                options.insert(
                    "where".to_string(),
                    Value::Object(filter.into_iter().collect()),
                );
                if let Some(limit) = limit {
                    options.insert("limit".to_string(), json!(limit));
                }
                Value::Object(options)
            })
    }

    /// Query arguments: options followed by up to two extra positionals.
    pub fn arb_query_args(raw: bool) -> impl Strategy<Value = QueryArgs> {
        (arb_options(raw), prop::collection::vec(arb_json(), 0..2)).prop_map(
            |(options, rest)| {
                let mut values = vec![options];
                values.extend(rest);
                QueryArgs::new(values)
            },
        )
    }
}
