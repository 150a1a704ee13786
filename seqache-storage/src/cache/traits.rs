//! Store adapter and query executor traits.
//!
//! This module defines the two seams of the cache: the key-value store it
//! writes to and the data-access layer it reads through.

use std::time::Duration;

use async_trait::async_trait;
use seqache_core::{QueryArgs, QueryExecutionError, QueryKind, SeqacheResult};
use serde_json::Value;

use super::keys::{FieldKey, GroupKey};

/// Hash-map capability over an external key-value store.
///
/// Each group key names one hash; each field key names one entry in it.
/// Expiry is set per group, never per field.
///
/// # Errors
///
/// Transport failures are reported as `SeqacheError::Store`. A missing
/// field or group is not an error.
///
/// # Ordering
///
/// Operations issued by one caller against the same group must be
/// observed in issue order. Nothing stronger is assumed: there is no
/// cross-client transaction.
#[async_trait]
pub trait StoreAdapter: Send + Sync + 'static {
    /// Read one field of a group. `None` is a normal miss.
    async fn get_field(&self, group: &GroupKey, field: &FieldKey)
        -> SeqacheResult<Option<Vec<u8>>>;

    /// Write one field of a group, overwriting any previous value.
    async fn set_field(&self, group: &GroupKey, field: &FieldKey, value: Vec<u8>)
        -> SeqacheResult<()>;

    /// Number of fields currently held by a group.
    async fn count_fields(&self, group: &GroupKey) -> SeqacheResult<u64>;

    /// Drop a whole group. Returns true if anything was deleted.
    async fn delete_group(&self, group: &GroupKey) -> SeqacheResult<bool>;

    /// Reset the group's expiry. Seconds granularity.
    async fn set_group_expiry(&self, group: &GroupKey, ttl: Duration) -> SeqacheResult<()>;
}

/// The data-access layer's query runner.
///
/// Results must be plain data: whatever is returned here may be written to
/// the store and handed back on a later hit.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, kind: QueryKind, args: &QueryArgs)
        -> Result<Value, QueryExecutionError>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Cacheable reads answered from the store.
    pub hits: u64,
    /// Cacheable reads that went to the executor.
    pub misses: u64,
    /// Non-cacheable reads passed straight to the executor.
    pub passthroughs: u64,
    /// Whole-group evictions due to capacity.
    pub evictions: u64,
    /// Groups deleted by invalidation.
    pub purges: u64,
    /// Store failures absorbed on the read or purge path.
    pub store_errors: u64,
    /// Write-behind steps that failed.
    pub write_failures: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0) over cacheable reads.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            passthroughs: 500,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }
}
