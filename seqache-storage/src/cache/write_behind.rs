//! Background cache population.
//!
//! After a cacheable miss the result is stored by a separately spawned
//! task, so store latency never adds to query latency. The task owns its
//! inputs, reports every failure to an [`ErrorSink`], and never surfaces
//! an error to the caller.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use seqache_core::{SeqacheError, SeqacheResult, SerializationError};
use serde_json::Value;
use tokio::task::JoinHandle;

use super::eviction::{enforce_capacity, Eviction};
use super::keys::{FieldKey, GroupKey};
use super::stats::StatsRecorder;
use super::traits::StoreAdapter;

/// Where on the cache path a failure was absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureStage {
    /// Reading a field on the lookup path.
    Read,
    /// Decoding a stored value.
    Decode,
    /// Encoding a query result for storage.
    Encode,
    /// Counting or deleting during capacity enforcement.
    Evict,
    /// Writing the field.
    Write,
    /// Refreshing the group's expiry.
    Expire,
    /// Deleting a group on invalidation.
    Purge,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureStage::Read => "read",
            FailureStage::Decode => "decode",
            FailureStage::Encode => "encode",
            FailureStage::Evict => "evict",
            FailureStage::Write => "write",
            FailureStage::Expire => "expire",
            FailureStage::Purge => "purge",
        };
        f.write_str(name)
    }
}

/// A failure the cache swallowed instead of returning.
#[derive(Debug, Clone)]
pub struct CacheFailure {
    pub stage: FailureStage,
    pub group: GroupKey,
    pub error: SeqacheError,
}

/// Receiver for absorbed cache failures.
pub trait ErrorSink: Send + Sync {
    fn report(&self, failure: &CacheFailure);
}

/// Default sink: one `warn` event per failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, failure: &CacheFailure) {
        tracing::warn!(
            stage = %failure.stage,
            group = %failure.group,
            error = %failure.error,
            "Cache operation failed; continuing without cache"
        );
    }
}

/// Everything a write-behind step needs, owned.
pub(crate) struct WriteBehind<S: StoreAdapter> {
    pub(crate) store: Arc<S>,
    pub(crate) sink: Arc<dyn ErrorSink>,
    pub(crate) stats: Arc<StatsRecorder>,
    pub(crate) group: GroupKey,
    pub(crate) field: FieldKey,
    pub(crate) value: Value,
    pub(crate) ttl: Duration,
    pub(crate) max_group_size: u64,
    pub(crate) logging: bool,
}

impl<S: StoreAdapter> WriteBehind<S> {
    /// Spawn the step on the current runtime.
    pub(crate) fn spawn(self) -> WriteBehindHandle {
        WriteBehindHandle {
            inner: tokio::spawn(self.run()),
        }
    }

    async fn run(self) -> bool {
        match self.store_result().await {
            Ok(eviction) => {
                if eviction.is_evicted() {
                    self.stats.eviction();
                    if self.logging {
                        tracing::info!(group = %self.group, "Evicted full cache group");
                    }
                }
                true
            }
            Err((stage, error)) => {
                self.stats.write_failure();
                self.sink.report(&CacheFailure {
                    stage,
                    group: self.group.clone(),
                    error,
                });
                false
            }
        }
    }

    async fn store_result(&self) -> Result<Eviction, (FailureStage, SeqacheError)> {
        let bytes = serde_json::to_vec(&self.value).map_err(|e| {
            (
                FailureStage::Encode,
                SeqacheError::from(SerializationError::Result {
                    reason: e.to_string(),
                }),
            )
        })?;

        let eviction = staged(
            FailureStage::Evict,
            enforce_capacity(self.store.as_ref(), &self.group, self.max_group_size).await,
        )?;
        staged(
            FailureStage::Write,
            self.store.set_field(&self.group, &self.field, bytes).await,
        )?;
        staged(
            FailureStage::Expire,
            self.store.set_group_expiry(&self.group, self.ttl).await,
        )?;

        Ok(eviction)
    }
}

fn staged<T>(
    stage: FailureStage,
    result: SeqacheResult<T>,
) -> Result<T, (FailureStage, SeqacheError)> {
    result.map_err(|e| (stage, e))
}

/// Handle on a spawned write-behind step.
///
/// Dropping it detaches the task; awaiting [`WriteBehindHandle::wait`]
/// lets tests and shutdown paths observe completion.
#[derive(Debug)]
pub struct WriteBehindHandle {
    inner: JoinHandle<bool>,
}

impl WriteBehindHandle {
    /// Wait for the step. True if the result was stored and the expiry set.
    pub async fn wait(self) -> bool {
        match self.inner.await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!(error = %e, "Write-behind task did not complete");
                false
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}
