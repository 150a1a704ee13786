//! Read-through cache for read queries over a shared key-value store.
//!
//! Query results are cached per dataset in one hash-map bucket (the
//! group), one entry per distinct query (the field). The pieces:
//!
//! - [`keys`]: group and field key derivation
//! - [`traits`]: the [`StoreAdapter`] and [`QueryExecutor`] seams
//! - [`eviction`]: whole-group capacity enforcement
//! - [`write_behind`]: background population with an injectable [`ErrorSink`]
//! - [`read_through`]: the [`ReadThroughCache`] engine
//! - [`hooks`]: invalidation on mutation and the wrapped dataset handle
//!
//! # Example
//!
//! ```ignore
//! let cache = ReadThroughCache::new(store, SeqacheConfig::default())?;
//! let orders = cache.wrap(Dataset::new("shop", "orders"), CacheOverrides::default(), &mut hooks)?;
//!
//! // Only `raw: true` queries are cached.
//! let rows = orders
//!     .find_all(QueryArgs::new(vec![json!({"raw": true, "where": {"status": "open"}})]), &db)
//!     .await?;
//!
//! // A write through the data-access layer fires a lifecycle hook, which
//! // drops the whole `orders` group.
//! ```

pub mod eviction;
pub mod hooks;
pub mod keys;
pub mod memory_backend;
pub mod read_through;
#[cfg(feature = "redis")]
pub mod redis_backend;
mod stats;
pub mod traits;
pub mod write_behind;

pub use eviction::{enforce_capacity, Eviction};
pub use hooks::{CachedDataset, LifecycleEvent, LifecycleHooks, PurgeCallback};
pub use keys::{canonical_json, derive_field_key, derive_group_key, FieldKey, GroupKey};
pub use memory_backend::InMemoryStore;
pub use read_through::{ReadOutcome, ReadSource, ReadThroughCache};
#[cfg(feature = "redis")]
pub use redis_backend::RedisStore;
pub use traits::{CacheStats, QueryExecutor, StoreAdapter};
pub use write_behind::{CacheFailure, ErrorSink, FailureStage, TracingErrorSink, WriteBehindHandle};
