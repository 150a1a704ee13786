//! Invalidation on mutation.
//!
//! Any write to a dataset drops its whole cache group. The data-access
//! layer owns the lifecycle events; the cache only hands it a purge
//! callback per event through [`LifecycleHooks`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use seqache_core::{CacheOverrides, Dataset, QueryArgs, QueryKind, QueryRequest, SeqacheResult};
use serde_json::Value;

use super::keys::GroupKey;
use super::read_through::{ReadOutcome, ReadThroughCache};
use super::traits::{QueryExecutor, StoreAdapter};
use super::write_behind::FailureStage;

/// Post-mutation lifecycle events that invalidate a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    AfterCreate,
    AfterUpdate,
    AfterDestroy,
    AfterBulkCreate,
    AfterBulkUpdate,
    AfterBulkDestroy,
}

impl LifecycleEvent {
    /// Every event a wrapped dataset registers against.
    pub const ALL: [LifecycleEvent; 6] = [
        LifecycleEvent::AfterUpdate,
        LifecycleEvent::AfterBulkUpdate,
        LifecycleEvent::AfterCreate,
        LifecycleEvent::AfterBulkCreate,
        LifecycleEvent::AfterDestroy,
        LifecycleEvent::AfterBulkDestroy,
    ];

    pub fn is_bulk(&self) -> bool {
        matches!(
            self,
            LifecycleEvent::AfterBulkCreate
                | LifecycleEvent::AfterBulkUpdate
                | LifecycleEvent::AfterBulkDestroy
        )
    }

    /// Conventional hook name, e.g. `afterBulkUpdate`.
    pub fn hook_name(&self) -> &'static str {
        match self {
            LifecycleEvent::AfterCreate => "afterCreate",
            LifecycleEvent::AfterUpdate => "afterUpdate",
            LifecycleEvent::AfterDestroy => "afterDestroy",
            LifecycleEvent::AfterBulkCreate => "afterBulkCreate",
            LifecycleEvent::AfterBulkUpdate => "afterBulkUpdate",
            LifecycleEvent::AfterBulkDestroy => "afterBulkDestroy",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hook_name())
    }
}

/// Callback bound to one dataset. Resolves to true if a group was deleted.
pub type PurgeCallback = Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

/// Registration surface of the data-access layer.
pub trait LifecycleHooks {
    /// Run `callback` after every `event` on the bound dataset.
    fn on_after(&mut self, event: LifecycleEvent, callback: PurgeCallback);
}

impl<S: StoreAdapter> ReadThroughCache<S> {
    /// Drop every cached query of a dataset.
    ///
    /// Store failures are reported to the error sink and read as "nothing
    /// deleted"; they never propagate.
    pub async fn purge(&self, dataset: &Dataset) -> bool {
        let group = self.group_key(dataset);
        match self.store.delete_group(&group).await {
            Ok(deleted) => {
                if deleted {
                    self.stats.purge();
                    if self.config.logging {
                        tracing::info!(dataset = %dataset, group = %group, "Purged cache");
                    }
                }
                deleted
            }
            Err(e) => {
                self.stats.store_error();
                self.absorb(FailureStage::Purge, &group, e);
                false
            }
        }
    }

    /// A `'static` purge callback for `dataset`, suitable for lifecycle hooks.
    pub fn purge_callback(&self, dataset: &Dataset) -> PurgeCallback {
        let cache = self.clone();
        let dataset = dataset.clone();
        Arc::new(move || {
            let cache = cache.clone();
            let dataset = dataset.clone();
            async move { cache.purge(&dataset).await }.boxed()
        })
    }

    /// Bind a dataset to this cache.
    ///
    /// Resolves ttl and group size (override or config default), registers
    /// the purge callback on all six mutation events, and returns a handle
    /// whose reads go through the cache.
    pub fn wrap<H>(
        &self,
        dataset: Dataset,
        overrides: CacheOverrides,
        hooks: &mut H,
    ) -> SeqacheResult<CachedDataset<S>>
    where
        H: LifecycleHooks + ?Sized,
    {
        let (ttl, max_group_size) = self.config.resolve(&overrides);
        self.config
            .clone()
            .with_ttl(ttl)
            .with_max_group_size(max_group_size)
            .validate()?;

        for event in LifecycleEvent::ALL {
            hooks.on_after(event, self.purge_callback(&dataset));
        }

        Ok(CachedDataset {
            cache: self.clone(),
            dataset,
            ttl,
            max_group_size,
        })
    }
}

/// A dataset bound to a cache, with its resolved ttl and group size.
pub struct CachedDataset<S: StoreAdapter> {
    cache: ReadThroughCache<S>,
    dataset: Dataset,
    ttl: Duration,
    max_group_size: u64,
}

impl<S: StoreAdapter> CachedDataset<S> {
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_group_size(&self) -> u64 {
        self.max_group_size
    }

    pub fn group_key(&self) -> GroupKey {
        self.cache.group_key(&self.dataset)
    }

    pub fn request(&self, kind: QueryKind, args: QueryArgs) -> QueryRequest {
        QueryRequest {
            dataset: self.dataset.clone(),
            kind,
            ttl: self.ttl,
            max_group_size: self.max_group_size,
            args,
        }
    }

    pub async fn find_all<E>(&self, args: QueryArgs, executor: &E) -> SeqacheResult<Value>
    where
        E: QueryExecutor + ?Sized,
    {
        self.cache
            .read_through(self.request(QueryKind::All, args), executor)
            .await
    }

    pub async fn find_one<E>(&self, args: QueryArgs, executor: &E) -> SeqacheResult<Value>
    where
        E: QueryExecutor + ?Sized,
    {
        self.cache
            .read_through(self.request(QueryKind::One, args), executor)
            .await
    }

    pub async fn find_detailed<E>(
        &self,
        kind: QueryKind,
        args: QueryArgs,
        executor: &E,
    ) -> SeqacheResult<ReadOutcome>
    where
        E: QueryExecutor + ?Sized,
    {
        self.cache
            .read_through_detailed(self.request(kind, args), executor)
            .await
    }

    pub async fn purge(&self) -> bool {
        self.cache.purge(&self.dataset).await
    }
}

impl<S: StoreAdapter> Clone for CachedDataset<S> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            dataset: self.dataset.clone(),
            ttl: self.ttl,
            max_group_size: self.max_group_size,
        }
    }
}
