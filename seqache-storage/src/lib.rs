//! seqache Storage - Read-Through Query Cache
//!
//! Caches the results of plain-data read queries in a hash-map key-value
//! store and drops them when the underlying dataset changes. The
//! data-access layer and the store are external collaborators reached
//! through [`QueryExecutor`], [`LifecycleHooks`] and [`StoreAdapter`].

pub mod cache;

pub use cache::{
    canonical_json, derive_field_key, derive_group_key, enforce_capacity, CacheFailure,
    CacheStats, CachedDataset, ErrorSink, Eviction, FailureStage, FieldKey, GroupKey,
    InMemoryStore, LifecycleEvent, LifecycleHooks, PurgeCallback, QueryExecutor, ReadOutcome,
    ReadSource, ReadThroughCache, StoreAdapter, TracingErrorSink, WriteBehindHandle,
};

#[cfg(feature = "redis")]
pub use cache::RedisStore;

// Re-export core types for convenience
pub use seqache_core::{
    CacheOverrides, ConfigError, Dataset, InvalidQueryError, QueryArgs, QueryExecutionError,
    QueryKind, QueryRequest, SeqacheConfig, SeqacheError, SeqacheResult, SerializationError,
    StoreError,
};
