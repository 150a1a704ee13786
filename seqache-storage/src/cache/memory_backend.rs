//! In-process hash-map store.
//!
//! Mirrors the subset of Redis hash semantics the cache relies on
//! (HGET, HSET, HLEN, DEL, EXPIRE). Expiry is evaluated lazily against
//! `tokio::time::Instant`, so tests can drive it with a paused clock.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use seqache_core::{SeqacheResult, StoreError};
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::keys::{FieldKey, GroupKey};
use super::traits::StoreAdapter;

/// In-memory store for tests and single-process deployments.
///
/// Uses tokio::sync::RwLock for safe async access.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    /// Buckets indexed by group key.
    groups: RwLock<HashMap<String, Bucket>>,
}

#[derive(Debug, Default)]
struct Bucket {
    fields: HashMap<String, Vec<u8>>,
    expires_at: Option<Instant>,
}

impl Bucket {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl InMemoryStore {
    /// Create a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a live bucket exists for this group.
    pub async fn contains_group(&self, group: &GroupKey) -> bool {
        let groups = self.groups.read().await;
        groups
            .get(group.as_str())
            .is_some_and(|b| !b.is_expired(Instant::now()))
    }

    /// Remaining time to live of a group, if it has one.
    pub async fn group_ttl(&self, group: &GroupKey) -> Option<Duration> {
        let now = Instant::now();
        let groups = self.groups.read().await;
        groups
            .get(group.as_str())
            .filter(|b| !b.is_expired(now))
            .and_then(|b| b.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    /// Field keys of a live group, sorted.
    pub async fn field_keys(&self, group: &GroupKey) -> Vec<String> {
        let groups = self.groups.read().await;
        let mut keys: Vec<String> = groups
            .get(group.as_str())
            .filter(|b| !b.is_expired(Instant::now()))
            .map(|b| b.fields.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Drop an expired bucket so later reads see nothing.
    fn reap(groups: &mut HashMap<String, Bucket>, group: &str, now: Instant) {
        if groups.get(group).is_some_and(|b| b.is_expired(now)) {
            groups.remove(group);
        }
    }
}

#[async_trait]
impl StoreAdapter for InMemoryStore {
    async fn get_field(
        &self,
        group: &GroupKey,
        field: &FieldKey,
    ) -> SeqacheResult<Option<Vec<u8>>> {
        let groups = self.groups.read().await;
        Ok(groups
            .get(group.as_str())
            .filter(|b| !b.is_expired(Instant::now()))
            .and_then(|b| b.fields.get(field.as_str()).cloned()))
    }

    async fn set_field(
        &self,
        group: &GroupKey,
        field: &FieldKey,
        value: Vec<u8>,
    ) -> SeqacheResult<()> {
        let mut groups = self.groups.write().await;
        Self::reap(&mut groups, group.as_str(), Instant::now());
        groups
            .entry(group.as_str().to_string())
            .or_default()
            .fields
            .insert(field.as_str().to_string(), value);
        Ok(())
    }

    async fn count_fields(&self, group: &GroupKey) -> SeqacheResult<u64> {
        let groups = self.groups.read().await;
        Ok(groups
            .get(group.as_str())
            .filter(|b| !b.is_expired(Instant::now()))
            .map(|b| b.fields.len() as u64)
            .unwrap_or(0))
    }

    async fn delete_group(&self, group: &GroupKey) -> SeqacheResult<bool> {
        let mut groups = self.groups.write().await;
        Self::reap(&mut groups, group.as_str(), Instant::now());
        Ok(groups.remove(group.as_str()).is_some())
    }

    async fn set_group_expiry(&self, group: &GroupKey, ttl: Duration) -> SeqacheResult<()> {
        let now = Instant::now();
        let mut groups = self.groups.write().await;
        Self::reap(&mut groups, group.as_str(), now);
        // Like EXPIRE, a missing group is left alone.
        if let Some(bucket) = groups.get_mut(group.as_str()) {
            let expires_at = now
                .checked_add(Duration::from_secs(ttl.as_secs()))
                .ok_or_else(|| {
                    StoreError::transport(
                        "EXPIRE",
                        format!("ttl of {}s overflows the clock", ttl.as_secs()),
                    )
                })?;
            bucket.expires_at = Some(expires_at);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::keys::{derive_field_key, derive_group_key};
    use seqache_core::{Dataset, QueryArgs, SeqacheError};
    use serde_json::json;

    fn group() -> GroupKey {
        derive_group_key("seqache", &Dataset::new("shop", "orders"))
    }

    fn field(n: i64) -> FieldKey {
        derive_field_key(&QueryArgs::new(vec![json!({"where": {"id": n}})])).unwrap()
    }

    #[tokio::test]
    async fn test_set_get_count() {
        let store = InMemoryStore::new();
        let g = group();

        assert_eq!(store.get_field(&g, &field(1)).await.unwrap(), None);
        assert_eq!(store.count_fields(&g).await.unwrap(), 0);

        store.set_field(&g, &field(1), b"[1]".to_vec()).await.unwrap();
        store.set_field(&g, &field(2), b"[2]".to_vec()).await.unwrap();
        // Overwrite is idempotent on the count.
        store.set_field(&g, &field(2), b"[22]".to_vec()).await.unwrap();

        assert_eq!(store.count_fields(&g).await.unwrap(), 2);
        assert_eq!(
            store.get_field(&g, &field(2)).await.unwrap(),
            Some(b"[22]".to_vec())
        );
    }

    #[tokio::test]
    async fn test_delete_group_reports_presence() {
        let store = InMemoryStore::new();
        let g = group();

        assert!(!store.delete_group(&g).await.unwrap());
        store.set_field(&g, &field(1), b"1".to_vec()).await.unwrap();
        assert!(store.delete_group(&g).await.unwrap());
        assert!(!store.contains_group(&g).await);
    }

    #[tokio::test]
    async fn test_expiry_on_missing_group_is_noop() {
        let store = InMemoryStore::new();
        let g = group();

        store
            .set_group_expiry(&g, Duration::from_secs(10))
            .await
            .unwrap();
        assert!(!store.contains_group(&g).await);
        assert_eq!(store.group_ttl(&g).await, None);
    }

    #[tokio::test]
    async fn test_expiry_overflow_is_a_store_error() {
        let store = InMemoryStore::new();
        let g = group();
        store.set_field(&g, &field(1), b"1".to_vec()).await.unwrap();

        let err = store
            .set_group_expiry(&g, Duration::from_secs(u64::MAX))
            .await
            .unwrap_err();
        match err {
            SeqacheError::Store(StoreError::Transport { operation, .. }) => {
                assert_eq!(operation, "EXPIRE")
            }
            other => panic!("expected an EXPIRE transport error, got {other:?}"),
        }
        // The bucket keeps whatever expiry it had.
        assert_eq!(store.group_ttl(&g).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_expires_after_ttl() {
        let store = InMemoryStore::new();
        let g = group();

        store.set_field(&g, &field(1), b"1".to_vec()).await.unwrap();
        store
            .set_group_expiry(&g, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.group_ttl(&g).await, Some(Duration::from_secs(60)));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(store.count_fields(&g).await.unwrap(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.count_fields(&g).await.unwrap(), 0);
        assert_eq!(store.get_field(&g, &field(1)).await.unwrap(), None);
        assert!(!store.delete_group(&g).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_after_expiry_starts_fresh_bucket() {
        let store = InMemoryStore::new();
        let g = group();

        store.set_field(&g, &field(1), b"1".to_vec()).await.unwrap();
        store
            .set_group_expiry(&g, Duration::from_secs(5))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;

        store.set_field(&g, &field(2), b"2".to_vec()).await.unwrap();
        assert_eq!(store.field_keys(&g).await, vec![field(2).to_string()]);
        // The new bucket has no expiry until one is set.
        assert_eq!(store.group_ttl(&g).await, None);
    }
}
