//! Lock-free counters behind [`CacheStats`].

use std::sync::atomic::{AtomicU64, Ordering};

use super::traits::CacheStats;

#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    passthroughs: AtomicU64,
    evictions: AtomicU64,
    purges: AtomicU64,
    store_errors: AtomicU64,
    write_failures: AtomicU64,
}

impl StatsRecorder {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn passthrough(&self) {
        self.passthroughs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn purge(&self) {
        self.purges.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            passthroughs: self.passthroughs.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            purges: self.purges.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}
