//! Redis hash store.
//!
//! Each group is a Redis hash (HGET/HSET/HLEN), dropped with DEL and
//! expired with EXPIRE. The connection is a `ConnectionManager`, which is
//! cheap to clone and reconnects on its own, so concurrent cache
//! operations share it freely.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use seqache_core::{SeqacheResult, StoreError};

use super::keys::{FieldKey, GroupKey};
use super::traits::StoreAdapter;

/// Store adapter over an external Redis server.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(url: &str) -> SeqacheResult<Self> {
        let client = Client::open(url).map_err(|e| transport("OPEN", e))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| transport("CONNECT", e))?;
        Ok(Self { connection })
    }

    /// Wrap an existing connection manager.
    pub fn from_connection(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    /// Test the connection to Redis.
    pub async fn ping(&self) -> SeqacheResult<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| transport("PING", e))?;
        Ok(())
    }
}

fn transport(operation: &str, e: RedisError) -> StoreError {
    StoreError::transport(operation, e)
}

#[async_trait]
impl StoreAdapter for RedisStore {
    async fn get_field(
        &self,
        group: &GroupKey,
        field: &FieldKey,
    ) -> SeqacheResult<Option<Vec<u8>>> {
        let mut conn = self.connection.clone();
        let value: Option<Vec<u8>> = conn
            .hget(group.as_str(), field.as_str())
            .await
            .map_err(|e| transport("HGET", e))?;
        Ok(value)
    }

    async fn set_field(
        &self,
        group: &GroupKey,
        field: &FieldKey,
        value: Vec<u8>,
    ) -> SeqacheResult<()> {
        let mut conn = self.connection.clone();
        conn.hset::<_, _, _, ()>(group.as_str(), field.as_str(), value)
            .await
            .map_err(|e| transport("HSET", e))?;
        Ok(())
    }

    async fn count_fields(&self, group: &GroupKey) -> SeqacheResult<u64> {
        let mut conn = self.connection.clone();
        let count: u64 = conn
            .hlen(group.as_str())
            .await
            .map_err(|e| transport("HLEN", e))?;
        Ok(count)
    }

    async fn delete_group(&self, group: &GroupKey) -> SeqacheResult<bool> {
        let mut conn = self.connection.clone();
        let removed: u64 = conn
            .del(group.as_str())
            .await
            .map_err(|e| transport("DEL", e))?;
        Ok(removed > 0)
    }

    async fn set_group_expiry(&self, group: &GroupKey, ttl: Duration) -> SeqacheResult<()> {
        let mut conn = self.connection.clone();
        let seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        conn.expire::<_, ()>(group.as_str(), seconds)
            .await
            .map_err(|e| transport("EXPIRE", e))?;
        Ok(())
    }
}
