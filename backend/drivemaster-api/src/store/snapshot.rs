use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::StoreResult;
use crate::metrics::track_cache_operation;

/// Side channel for session checkpoints. Blobs are opaque to the store and
/// unrelated to attempt persistence. Every checkpoint belongs to one user: a
/// lookup under another user id misses.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, user_id: &str, checkpoint_id: &str, blob: &str) -> StoreResult<()>;

    async fn load(&self, user_id: &str, checkpoint_id: &str) -> StoreResult<Option<String>>;

    /// Forgets the checkpoint. `false` when there was nothing to remove.
    async fn delete(&self, user_id: &str, checkpoint_id: &str) -> StoreResult<bool>;
}

/// Redis-backed checkpoints that expire after `ttl_seconds`.
#[derive(Clone)]
pub struct RedisSnapshotStore {
    redis: ConnectionManager,
    ttl_seconds: u64,
}

impl RedisSnapshotStore {
    pub fn new(redis: ConnectionManager, ttl_seconds: u64) -> Self {
        Self { redis, ttl_seconds }
    }

    fn key(user_id: &str, checkpoint_id: &str) -> String {
        format!("drivemaster:checkpoint:{}:{}", user_id, checkpoint_id)
    }
}

#[async_trait]
impl SnapshotStore for RedisSnapshotStore {
    async fn save(&self, user_id: &str, checkpoint_id: &str, blob: &str) -> StoreResult<()> {
        let mut conn = self.redis.clone();
        let key = Self::key(user_id, checkpoint_id);

        track_cache_operation("setex", async {
            redis::cmd("SETEX")
                .arg(&key)
                .arg(self.ttl_seconds)
                .arg(blob)
                .query_async::<()>(&mut conn)
                .await
        })
        .await?;

        tracing::debug!("Checkpoint stored: {}", key);
        Ok(())
    }

    async fn load(&self, user_id: &str, checkpoint_id: &str) -> StoreResult<Option<String>> {
        let mut conn = self.redis.clone();
        let key = Self::key(user_id, checkpoint_id);

        let blob: Option<String> = track_cache_operation("get", async {
            redis::cmd("GET").arg(&key).query_async(&mut conn).await
        })
        .await?;

        Ok(blob)
    }

    async fn delete(&self, user_id: &str, checkpoint_id: &str) -> StoreResult<bool> {
        let mut conn = self.redis.clone();
        let key = Self::key(user_id, checkpoint_id);

        let removed: i64 = track_cache_operation("del", async {
            redis::cmd("DEL").arg(&key).query_async(&mut conn).await
        })
        .await?;

        Ok(removed > 0)
    }
}

/// Checkpoints keyed by `(user_id, checkpoint_id)`; they never expire.
#[derive(Default)]
pub struct MemorySnapshotStore {
    blobs: RwLock<HashMap<(String, String), String>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

fn memory_key(user_id: &str, checkpoint_id: &str) -> (String, String) {
    (user_id.to_string(), checkpoint_id.to_string())
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, user_id: &str, checkpoint_id: &str, blob: &str) -> StoreResult<()> {
        self.blobs
            .write()
            .await
            .insert(memory_key(user_id, checkpoint_id), blob.to_string());
        Ok(())
    }

    async fn load(&self, user_id: &str, checkpoint_id: &str) -> StoreResult<Option<String>> {
        Ok(self
            .blobs
            .read()
            .await
            .get(&memory_key(user_id, checkpoint_id))
            .cloned())
    }

    async fn delete(&self, user_id: &str, checkpoint_id: &str) -> StoreResult<bool> {
        Ok(self
            .blobs
            .write()
            .await
            .remove(&memory_key(user_id, checkpoint_id))
            .is_some())
    }
}
