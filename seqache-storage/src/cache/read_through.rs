//! Read-through query cache.
//!
//! This module implements the core caching logic: look a query up by its
//! `(group, field)` key, fall back to the data-access layer on a miss, and
//! hand the result to a background write-behind step.
//!
//! The cache is an optimization, never a dependency. Store failures on the
//! read path degrade to a miss; failures on the write path are reported to
//! the [`ErrorSink`] and dropped. Only malformed input, unencodable
//! arguments and executor failures reach the caller.

use std::sync::Arc;

use seqache_core::{
    Dataset, QueryArgs, QueryKind, QueryRequest, SeqacheConfig, SeqacheError, SeqacheResult,
    SerializationError,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::keys::{derive_field_key, derive_group_key, FieldKey, GroupKey};
use super::stats::StatsRecorder;
use super::traits::{CacheStats, QueryExecutor, StoreAdapter};
use super::write_behind::{
    CacheFailure, ErrorSink, FailureStage, TracingErrorSink, WriteBehind, WriteBehindHandle,
};

/// How a read was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// Served from the store; the executor was not called.
    Hit,
    /// Cacheable query executed; a write-behind step was scheduled.
    Miss,
    /// Non-cacheable query executed; the store was not touched.
    Passthrough,
}

/// Result of a read plus what the cache did to produce it.
#[derive(Debug)]
pub struct ReadOutcome {
    pub value: Value,
    pub source: ReadSource,
    /// Present only for [`ReadSource::Miss`].
    pub write_behind: Option<WriteBehindHandle>,
}

/// Read-through cache over a hash-map key-value store.
///
/// # Runtime
///
/// A cacheable miss spawns its write-behind step with `tokio::spawn`, so
/// the read methods must be polled from within a Tokio runtime. Polling
/// them elsewhere panics on the first miss.
///
/// # Type Parameters
///
/// - `S`: The store adapter holding cached results
///
/// # Example
///
/// ```ignore
/// let cache = ReadThroughCache::new(Arc::new(InMemoryStore::new()), SeqacheConfig::default())?;
///
/// let orders = Dataset::new("shop", "orders");
/// let args = QueryArgs::new(vec![json!({"raw": true, "where": {"status": "open"}})]);
/// let rows = cache
///     .read_through(cache.request(&orders, QueryKind::All, args), &executor)
///     .await?;
/// ```
pub struct ReadThroughCache<S: StoreAdapter> {
    /// The store adapter.
    pub(crate) store: Arc<S>,
    /// Cache configuration.
    pub(crate) config: SeqacheConfig,
    /// Receiver for absorbed failures.
    pub(crate) sink: Arc<dyn ErrorSink>,
    pub(crate) stats: Arc<StatsRecorder>,
}

impl<S: StoreAdapter> ReadThroughCache<S> {
    /// Create a new read-through cache. Fails if the config is invalid.
    pub fn new(store: Arc<S>, config: SeqacheConfig) -> SeqacheResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            sink: Arc::new(TracingErrorSink),
            stats: Arc::new(StatsRecorder::default()),
        })
    }

    /// Create a new read-through cache with default configuration.
    pub fn with_defaults(store: Arc<S>) -> Self {
        Self {
            store,
            config: SeqacheConfig::default(),
            sink: Arc::new(TracingErrorSink),
            stats: Arc::new(StatsRecorder::default()),
        }
    }

    /// Replace the sink that receives absorbed failures.
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &SeqacheConfig {
        &self.config
    }

    /// Get a reference to the store adapter.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Group key of a dataset under this cache's prefix.
    pub fn group_key(&self, dataset: &Dataset) -> GroupKey {
        derive_group_key(&self.config.key_prefix, dataset)
    }

    /// Build a request using the configured ttl and group size.
    pub fn request(&self, dataset: &Dataset, kind: QueryKind, args: QueryArgs) -> QueryRequest {
        QueryRequest {
            dataset: dataset.clone(),
            kind,
            ttl: self.config.ttl(),
            max_group_size: self.config.max_group_size,
            args,
        }
    }

    /// Answer a query from the cache, or run it and cache the result.
    pub async fn read_through<E>(
        &self,
        request: QueryRequest,
        executor: &E,
    ) -> SeqacheResult<Value>
    where
        E: QueryExecutor + ?Sized,
    {
        Ok(self.read_through_detailed(request, executor).await?.value)
    }

    /// Like [`read_through`](Self::read_through), decoding into `T`.
    pub async fn read_through_as<T, E>(
        &self,
        request: QueryRequest,
        executor: &E,
    ) -> SeqacheResult<T>
    where
        T: DeserializeOwned,
        E: QueryExecutor + ?Sized,
    {
        let value = self.read_through(request, executor).await?;
        serde_json::from_value(value).map_err(|e| {
            SerializationError::Result {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Full read-through protocol, reporting how the value was obtained.
    ///
    /// 1. Validate the request.
    /// 2. Non-cacheable queries go straight to the executor.
    /// 3. Cacheable queries are looked up; a hit returns immediately.
    /// 4. On a miss the executor runs and a write-behind step is spawned.
    ///    The value is returned without waiting for it.
    pub async fn read_through_detailed<E>(
        &self,
        request: QueryRequest,
        executor: &E,
    ) -> SeqacheResult<ReadOutcome>
    where
        E: QueryExecutor + ?Sized,
    {
        request.validate()?;

        if !request.is_cacheable() {
            self.stats.passthrough();
            let value = self.execute(&request, executor).await?;
            tracing::trace!(
                dataset = %request.dataset,
                kind = %request.kind,
                "Bypassing cache for non-raw query"
            );
            return Ok(ReadOutcome {
                value,
                source: ReadSource::Passthrough,
                write_behind: None,
            });
        }

        let group = self.group_key(&request.dataset);
        let field = derive_field_key(&request.args)?;

        if let Some(value) = self.lookup(&group, &field).await {
            self.stats.hit();
            self.log_event("Returning cached result", &request);
            return Ok(ReadOutcome {
                value,
                source: ReadSource::Hit,
                write_behind: None,
            });
        }

        self.stats.miss();
        let value = self.execute(&request, executor).await?;

        let handle = WriteBehind {
            store: Arc::clone(&self.store),
            sink: Arc::clone(&self.sink),
            stats: Arc::clone(&self.stats),
            group,
            field,
            value: value.clone(),
            ttl: request.ttl,
            max_group_size: request.max_group_size,
            logging: self.config.logging,
        }
        .spawn();

        self.log_event("Returning un-cached result", &request);
        Ok(ReadOutcome {
            value,
            source: ReadSource::Miss,
            write_behind: Some(handle),
        })
    }

    /// Look a field up. Every failure is absorbed and reads as a miss.
    async fn lookup(&self, group: &GroupKey, field: &FieldKey) -> Option<Value> {
        let bytes = match self.store.get_field(group, field).await {
            Ok(bytes) => bytes?,
            Err(e) => {
                self.stats.store_error();
                self.absorb(FailureStage::Read, group, e);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                self.absorb(
                    FailureStage::Decode,
                    group,
                    SerializationError::Result {
                        reason: e.to_string(),
                    }
                    .into(),
                );
                None
            }
        }
    }

    async fn execute<E>(&self, request: &QueryRequest, executor: &E) -> SeqacheResult<Value>
    where
        E: QueryExecutor + ?Sized,
    {
        executor
            .execute(request.kind, &request.args)
            .await
            .map_err(|e| {
                tracing::error!(
                    dataset = %request.dataset,
                    kind = %request.kind,
                    error = %e,
                    "Query execution failed"
                );
                e.into()
            })
    }

    pub(crate) fn absorb(&self, stage: FailureStage, group: &GroupKey, error: SeqacheError) {
        self.sink.report(&CacheFailure {
            stage,
            group: group.clone(),
            error,
        });
    }

    fn log_event(&self, message: &str, request: &QueryRequest) {
        let filter = request
            .args
            .filter()
            .map(|f| f.to_string())
            .unwrap_or_default();
        if self.config.logging {
            tracing::info!(dataset = %request.dataset, filter = %filter, "{}", message);
        } else {
            tracing::trace!(dataset = %request.dataset, filter = %filter, "{}", message);
        }
    }
}

impl<S: StoreAdapter> Clone for ReadThroughCache<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            sink: Arc::clone(&self.sink),
            stats: Arc::clone(&self.stats),
        }
    }
}
