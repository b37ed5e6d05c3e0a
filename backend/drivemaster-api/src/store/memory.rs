use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::{AttemptFilter, ContentStore, ProgressStore};
use crate::error::{StoreError, StoreResult};
use crate::models::content::{Journey, Question};
use crate::models::game::JourneyAttempt;
use crate::models::profile::{JourneyStats, ProfilePatch, UserProfile};
use crate::models::Stage;

/// In-process store holding content, profiles and attempts. Every profile
/// mutation happens under one write lock, so counter updates are atomic.
#[derive(Default)]
pub struct MemoryStore {
    journeys: RwLock<HashMap<String, Journey>>,
    questions: RwLock<HashMap<String, Question>>,
    profiles: RwLock<HashMap<String, UserProfile>>,
    attempts: RwLock<Vec<JourneyAttempt>>,
    fail_profile_writes: AtomicBool,
    fail_attempt_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_journey(&self, journey: Journey) {
        self.journeys
            .write()
            .await
            .insert(journey.id.clone(), journey);
    }

    pub async fn insert_question(&self, question: Question) {
        self.questions
            .write()
            .await
            .insert(question.id.clone(), question);
    }

    pub async fn insert_profile(&self, profile: UserProfile) {
        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile);
    }

    pub async fn attempt_count(&self) -> usize {
        self.attempts.read().await.len()
    }

    /// Makes every profile write fail, to exercise best-effort paths.
    pub fn set_fail_profile_writes(&self, fail: bool) {
        self.fail_profile_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_attempt_writes(&self, fail: bool) {
        self.fail_attempt_writes.store(fail, Ordering::SeqCst);
    }

    fn check_profile_writes(&self) -> StoreResult<()> {
        if self.fail_profile_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "profile writes disabled".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn get_journey(&self, journey_id: &str) -> StoreResult<Option<Journey>> {
        Ok(self.journeys.read().await.get(journey_id).cloned())
    }

    async fn journeys_by_stage(&self, stage: Stage) -> StoreResult<Vec<Journey>> {
        let mut journeys: Vec<Journey> = self
            .journeys
            .read()
            .await
            .values()
            .filter(|journey| journey.stage == stage && journey.is_published)
            .cloned()
            .collect();
        journeys.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(journeys)
    }

    async fn get_question(&self, question_id: &str) -> StoreResult<Option<Question>> {
        Ok(self.questions.read().await.get(question_id).cloned())
    }

    async fn questions_by_stage(&self, stage: Stage) -> StoreResult<Vec<Question>> {
        let mut questions: Vec<Question> = self
            .questions
            .read()
            .await
            .values()
            .filter(|question| question.stage == stage && question.is_active)
            .cloned()
            .collect();
        // HashMap order is random; keep seeded selection reproducible.
        questions.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(questions)
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<UserProfile>> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> StoreResult<bool> {
        self.check_profile_writes()?;
        let mut profiles = self.profiles.write().await;
        let Some(profile) = profiles.get_mut(user_id) else {
            return Ok(false);
        };
        patch.apply_to(profile);
        profile.updated_at = Some(Utc::now());
        Ok(true)
    }

    async fn apply_journey_stats(
        &self,
        user_id: &str,
        stats: &JourneyStats,
    ) -> StoreResult<Option<UserProfile>> {
        self.check_profile_writes()?;
        let mut profiles = self.profiles.write().await;
        Ok(profiles.get_mut(user_id).map(|profile| {
            profile.apply_stats(stats, Utc::now());
            profile.clone()
        }))
    }

    async fn adjust_credits(&self, user_id: &str, delta: i64) -> StoreResult<Option<i64>> {
        self.check_profile_writes()?;
        let mut profiles = self.profiles.write().await;
        Ok(profiles.get_mut(user_id).map(|profile| {
            profile.apply_credit_delta(delta);
            profile.updated_at = Some(Utc::now());
            profile.credits
        }))
    }

    async fn deduct_credits(&self, user_id: &str, amount: i64) -> StoreResult<Option<i64>> {
        self.check_profile_writes()?;
        let mut profiles = self.profiles.write().await;
        Ok(profiles.get_mut(user_id).map(|profile| {
            let deducted = amount.clamp(0, profile.credits.max(0));
            profile.apply_credit_delta(-deducted);
            profile.updated_at = Some(Utc::now());
            profile.credits
        }))
    }

    async fn mark_bankrupt(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        self.check_profile_writes()?;
        let mut profiles = self.profiles.write().await;
        let Some(profile) = profiles.get_mut(user_id) else {
            return Ok(false);
        };
        if profile.is_bankrupt {
            return Ok(false);
        }
        profile.is_bankrupt = true;
        profile.bankruptcy_count += 1;
        profile.last_bankruptcy_date = Some(at);
        profile.updated_at = Some(at);
        Ok(true)
    }

    async fn recover_from_bankruptcy(
        &self,
        user_id: &str,
        credits: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.check_profile_writes()?;
        let mut profiles = self.profiles.write().await;
        let Some(profile) = profiles.get_mut(user_id) else {
            return Ok(false);
        };
        if !profile.can_recover_from_bankruptcy(at) {
            return Ok(false);
        }
        profile.credits = credits;
        profile.is_bankrupt = false;
        profile.last_bankruptcy_recovery_date = Some(at);
        profile.total_bankruptcy_recoveries += 1;
        profile.updated_at = Some(at);
        Ok(true)
    }

    async fn award_badge(
        &self,
        user_id: &str,
        badge_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.check_profile_writes()?;
        let mut profiles = self.profiles.write().await;
        let Some(profile) = profiles.get_mut(user_id) else {
            return Ok(false);
        };
        if profile.has_badge(badge_id) {
            return Ok(false);
        }
        profile.badges.push(badge_id.to_string());
        profile.badge_earned_at.insert(badge_id.to_string(), at);
        profile.updated_at = Some(at);
        Ok(true)
    }

    async fn unlock_stage(
        &self,
        user_id: &str,
        unlocked: Stage,
        mastered: Stage,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.check_profile_writes()?;
        let mut profiles = self.profiles.write().await;
        let Some(profile) = profiles.get_mut(user_id) else {
            return Ok(false);
        };
        if profile.unlocked_stages.contains(&unlocked) {
            return Ok(false);
        }
        profile.unlocked_stages.push(unlocked);
        profile
            .mastery_dates
            .insert(mastered.as_str().to_string(), at);
        profile.updated_at = Some(at);
        Ok(true)
    }

    async fn append_attempt(&self, attempt: &JourneyAttempt) -> StoreResult<String> {
        if self.fail_attempt_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "attempt writes disabled".to_string(),
            ));
        }
        self.attempts.write().await.push(attempt.clone());
        Ok(attempt.id.clone())
    }

    async fn query_attempts(
        &self,
        user_id: &str,
        filter: &AttemptFilter,
    ) -> StoreResult<Vec<JourneyAttempt>> {
        Ok(self
            .attempts
            .read()
            .await
            .iter()
            .filter(|attempt| attempt.user_id == user_id && filter.matches(attempt))
            .cloned()
            .collect())
    }
}
