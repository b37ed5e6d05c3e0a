//! Persistence seams used by the engine and the evaluator.
//!
//! Production runs on MongoDB (content, profiles, attempts) and Redis
//! (checkpoint snapshots); the in-memory implementations back tests and local
//! runs without infrastructure.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::models::content::{Journey, Question};
use crate::models::game::JourneyAttempt;
use crate::models::profile::{JourneyStats, ProfilePatch, UserProfile};
use crate::models::Stage;

pub mod memory;
pub mod mongo;
pub mod snapshot;

pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use snapshot::{MemorySnapshotStore, RedisSnapshotStore, SnapshotStore};

/// Read-only access to authored journeys and questions.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get_journey(&self, journey_id: &str) -> StoreResult<Option<Journey>>;

    /// Published journeys of a stage.
    async fn journeys_by_stage(&self, stage: Stage) -> StoreResult<Vec<Journey>>;

    async fn get_question(&self, question_id: &str) -> StoreResult<Option<Question>>;

    /// Active questions tagged with a stage.
    async fn questions_by_stage(&self, stage: Stage) -> StoreResult<Vec<Question>>;
}

/// Selects attempts of one user; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttemptFilter {
    pub journey_id: Option<String>,
    pub stage: Option<Stage>,
}

impl AttemptFilter {
    pub fn journey(journey_id: impl Into<String>) -> Self {
        Self {
            journey_id: Some(journey_id.into()),
            stage: None,
        }
    }

    pub fn stage(stage: Stage) -> Self {
        Self {
            journey_id: None,
            stage: Some(stage),
        }
    }

    pub fn matches(&self, attempt: &JourneyAttempt) -> bool {
        self.journey_id
            .as_deref()
            .is_none_or(|id| attempt.journey_id == id)
            && self.stage.is_none_or(|stage| attempt.stage == stage)
    }
}

/// Profiles and attempt history. Methods returning `Option`/`bool` report a
/// missing profile as `None`/`false` rather than an error; callers decide
/// whether that is fatal.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<UserProfile>>;

    /// Overwrites the patched fields. `false` when the profile does not exist.
    async fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> StoreResult<bool>;

    /// Adds one finished journey to the cumulative counters and returns the
    /// updated profile.
    async fn apply_journey_stats(
        &self,
        user_id: &str,
        stats: &JourneyStats,
    ) -> StoreResult<Option<UserProfile>>;

    /// Adds `delta` (may be negative) to the balance and returns the new one.
    /// Positive deltas count towards the earned total, negative ones towards
    /// the spent total. A positive resulting balance ends bankruptcy.
    async fn adjust_credits(&self, user_id: &str, delta: i64) -> StoreResult<Option<i64>>;

    /// Removes up to `amount` credits without taking the balance below zero
    /// and returns the new balance. A balance that is already negative is
    /// left alone.
    async fn deduct_credits(&self, user_id: &str, amount: i64) -> StoreResult<Option<i64>>;

    /// Flags the profile bankrupt and counts the bankruptcy. `false` when it
    /// already was, or the profile does not exist.
    async fn mark_bankrupt(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<bool>;

    /// Resets an empty balance to `credits` and clears the bankrupt flag, at
    /// most once per UTC day. `true` only when this call granted it.
    async fn recover_from_bankruptcy(
        &self,
        user_id: &str,
        credits: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Adds the badge unless already earned. `true` only when this call
    /// recorded it.
    async fn award_badge(
        &self,
        user_id: &str,
        badge_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Adds `unlocked` to the unlocked stages and stamps the mastery instant
    /// of `mastered`, unless `unlocked` is already present.
    async fn unlock_stage(
        &self,
        user_id: &str,
        unlocked: Stage,
        mastered: Stage,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Appends to the history; attempts are never rewritten.
    async fn append_attempt(&self, attempt: &JourneyAttempt) -> StoreResult<String>;

    async fn query_attempts(
        &self,
        user_id: &str,
        filter: &AttemptFilter,
    ) -> StoreResult<Vec<JourneyAttempt>>;
}
