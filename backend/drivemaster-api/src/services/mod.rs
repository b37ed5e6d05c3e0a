use mongodb::{Client as MongoClient, Database};
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::rules::GameRules;
use crate::store::{
    ContentStore, MongoStore, ProgressStore, RedisSnapshotStore, SnapshotStore,
};

pub mod game_engine;
pub mod gamification_service;
pub mod mastery_service;
pub mod question_selector;

use game_engine::GameEngine;
use gamification_service::GamificationService;
use mastery_service::MasteryService;

pub type SharedEngine = Arc<Mutex<GameEngine>>;

pub struct AppState {
    pub config: Config,
    pub content: Arc<dyn ContentStore>,
    pub progress: Arc<dyn ProgressStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub rules: Arc<GameRules>,
    /// Raw handles for health checks; absent when running on in-memory stores.
    pub mongo: Option<Database>,
    pub redis: Option<ConnectionManager>,
    sessions: Mutex<HashMap<String, SharedEngine>>,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);

        tracing::info!("Attempting to connect to Redis...");

        let redis = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        let mut conn = redis.clone();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        let store = Arc::new(MongoStore::new(mongo.clone()));
        let snapshots = Arc::new(RedisSnapshotStore::new(
            redis.clone(),
            config.checkpoint_ttl_seconds,
        ));

        let mut state = Self::with_stores(config, store.clone(), store, snapshots);
        state.mongo = Some(mongo);
        state.redis = Some(redis);
        Ok(state)
    }

    /// State over arbitrary stores, e.g. the in-memory ones.
    pub fn with_stores(
        config: Config,
        content: Arc<dyn ContentStore>,
        progress: Arc<dyn ProgressStore>,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Self {
        let rules = Arc::new(config.rules.clone());
        Self {
            config,
            content,
            progress,
            snapshots,
            rules,
            mongo: None,
            redis: None,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The user's engine, created on first use. Holding its lock serializes
    /// every session operation of that user. Only operations that can open a
    /// session should create one; see `existing_engine`.
    pub async fn engine_for(&self, user_id: &str) -> SharedEngine {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(user_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(GameEngine::new(
                    user_id,
                    self.content.clone(),
                    self.progress.clone(),
                    self.snapshots.clone(),
                    self.rules.clone(),
                )))
            })
            .clone()
    }

    /// The user's engine if one is registered. Never creates an entry.
    pub async fn existing_engine(&self, user_id: &str) -> Option<SharedEngine> {
        self.sessions.lock().await.get(user_id).cloned()
    }

    /// Drops the user's engine once it holds no session and no request is
    /// using it. Callers must release their own handle first.
    pub async fn release_if_idle(&self, user_id: &str) {
        let mut sessions = self.sessions.lock().await;
        let idle = sessions.get(user_id).is_some_and(|engine| {
            Arc::strong_count(engine) == 1
                && engine
                    .try_lock()
                    .is_ok_and(|engine| engine.game_state().is_none())
        });
        if idle {
            sessions.remove(user_id);
            tracing::debug!("Released idle engine for user {}", user_id);
        }
    }

    /// Number of registered engines.
    pub async fn engine_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub fn mastery_for(&self, user_id: &str) -> MasteryService {
        MasteryService::new(user_id, self.progress.clone(), self.rules.clone())
    }

    pub fn gamification_for(&self, user_id: &str) -> GamificationService {
        GamificationService::new(user_id, self.progress.clone(), self.rules.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemorySnapshotStore, MemoryStore};

    #[tokio::test]
    async fn engine_registry_reuses_engine_per_user() {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::with_stores(
            Config::default(),
            store.clone(),
            store,
            Arc::new(MemorySnapshotStore::new()),
        );

        let first = state.engine_for("u1").await;
        let again = state.engine_for("u1").await;
        let other = state.engine_for("u2").await;

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(other.lock().await.user_id(), "u2");
    }

    fn memory_state() -> AppState {
        let store = Arc::new(MemoryStore::new());
        AppState::with_stores(
            Config::default(),
            store.clone(),
            store,
            Arc::new(MemorySnapshotStore::new()),
        )
    }

    #[tokio::test]
    async fn lookups_do_not_register_engines() {
        let state = memory_state();

        assert!(state.existing_engine("u1").await.is_none());
        assert_eq!(state.engine_count().await, 0);
    }

    #[tokio::test]
    async fn idle_engines_are_released() {
        let state = memory_state();
        let engine = state.engine_for("u1").await;

        state.release_if_idle("u1").await;
        assert_eq!(state.engine_count().await, 1, "handle still held");

        drop(engine);
        state.release_if_idle("u1").await;
        assert_eq!(state.engine_count().await, 0);

        state.release_if_idle("nobody").await;
        assert_eq!(state.engine_count().await, 0);
    }
}
