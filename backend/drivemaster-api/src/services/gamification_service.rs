use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};
use crate::models::mastery::{GamificationStats, StreakInfo};
use crate::models::profile::{ProfilePatch, UserProfile};
use crate::rules::GameRules;
use crate::store::ProgressStore;

/// Streak lengths (days) that pay a one-off bonus, with the bonus.
const STREAK_MILESTONES: [(u32, i64); 5] =
    [(7, 100), (30, 500), (90, 1500), (180, 3000), (365, 10000)];

/// Daily streak and credit balance for one user.
pub struct GamificationService {
    user_id: String,
    progress: Arc<dyn ProgressStore>,
    rules: Arc<GameRules>,
}

impl GamificationService {
    pub fn new(
        user_id: impl Into<String>,
        progress: Arc<dyn ProgressStore>,
        rules: Arc<GameRules>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            progress,
            rules,
        }
    }

    /// Records activity at `now`. Days are UTC calendar days: a second
    /// activity on the same day changes nothing, the following day extends
    /// the streak, a longer gap restarts it at 1. Every new active day pays
    /// the daily-login bonus, plus a milestone bonus when the extended streak
    /// lands on one.
    pub async fn check_daily_streak(&self, now: DateTime<Utc>) -> EngineResult<StreakInfo> {
        let profile = self.require_profile().await?;
        let today = now.date_naive();

        let last_day = profile.last_active_date.map(|date| date.date_naive());
        if last_day == Some(today) {
            return Ok(StreakInfo {
                current_streak: profile.current_streak,
                longest_streak: profile.longest_streak,
                last_active_date: profile.last_active_date,
                streak_bonus_earned: false,
                milestone_bonus: 0,
                next_streak_reward: next_streak_milestone(profile.current_streak),
            });
        }

        let continues = last_day.is_some_and(|day| (today - day).num_days() == 1);
        let current_streak = if continues {
            profile.current_streak + 1
        } else {
            1
        };
        let longest_streak = profile.longest_streak.max(current_streak);
        let milestone_bonus = if continues {
            streak_milestone_bonus(current_streak)
        } else {
            0
        };

        let patch = ProfilePatch {
            current_streak: Some(current_streak),
            longest_streak: Some(longest_streak),
            last_active_date: Some(now),
        };
        self.progress.update_profile(&self.user_id, &patch).await?;

        let bonus = self.rules.credits.daily_login + milestone_bonus;
        if bonus > 0 {
            self.progress.adjust_credits(&self.user_id, bonus).await?;
        }

        if milestone_bonus > 0 {
            tracing::info!(
                "User {} reached a {}-day streak (+{} credits)",
                self.user_id,
                current_streak,
                milestone_bonus
            );
        } else {
            tracing::debug!("User {} streak now {}", self.user_id, current_streak);
        }

        Ok(StreakInfo {
            current_streak,
            longest_streak,
            last_active_date: Some(now),
            streak_bonus_earned: true,
            milestone_bonus,
            next_streak_reward: next_streak_milestone(current_streak),
        })
    }

    pub async fn award_credits(&self, amount: i64) -> EngineResult<i64> {
        self.progress
            .adjust_credits(&self.user_id, amount)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("user profile {}", self.user_id)))
    }

    /// Removes up to `amount` credits; the balance never goes below zero.
    /// Emptying the balance declares bankruptcy.
    pub async fn deduct_credits(&self, amount: i64) -> EngineResult<i64> {
        let balance = self
            .progress
            .deduct_credits(&self.user_id, amount)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("user profile {}", self.user_id)))?;

        if balance == 0 && self.progress.mark_bankrupt(&self.user_id, Utc::now()).await? {
            tracing::info!("User {} went bankrupt", self.user_id);
        }
        Ok(balance)
    }

    pub async fn credit_balance(&self) -> EngineResult<i64> {
        Ok(self
            .progress
            .get_profile(&self.user_id)
            .await?
            .map(|profile| profile.credits)
            .unwrap_or(0))
    }

    /// A player with nothing left to stake. Unknown users count as bankrupt.
    pub async fn is_bankrupt(&self) -> EngineResult<bool> {
        Ok(self.credit_balance().await? <= 0)
    }

    /// Grants the recovery balance to a bankrupt player, once per UTC day.
    /// `false` when the player has credits, already recovered today, or has
    /// no profile.
    pub async fn offer_bankruptcy_recovery(&self, now: DateTime<Utc>) -> EngineResult<bool> {
        let credits = self.rules.credits.bankruptcy_recovery;
        let recovered = self
            .progress
            .recover_from_bankruptcy(&self.user_id, credits, now)
            .await?;
        if recovered {
            tracing::info!(
                "User {} recovered from bankruptcy with {} credits",
                self.user_id,
                credits
            );
        }
        Ok(recovered)
    }

    /// Records today's activity, then summarises the player's economy.
    pub async fn gamification_stats(&self, now: DateTime<Utc>) -> EngineResult<GamificationStats> {
        let streak = self.check_daily_streak(now).await?;
        let profile = self.require_profile().await?;

        Ok(GamificationStats {
            credits: profile.credits,
            total_credits_earned: profile.total_credits_earned,
            total_credits_spent: profile.total_credits_spent,
            current_streak: streak.current_streak,
            longest_streak: streak.longest_streak,
            badges: profile.badges,
            total_journeys: profile.total_journeys_completed,
            average_score: profile.average_score,
            bankruptcy_count: profile.bankruptcy_count,
            is_bankrupt: profile.is_bankrupt,
        })
    }

    async fn require_profile(&self) -> EngineResult<UserProfile> {
        self.progress
            .get_profile(&self.user_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("user profile {}", self.user_id)))
    }
}

/// Next milestone strictly above `streak`; 365 once every milestone is behind.
pub fn next_streak_milestone(streak: u32) -> u32 {
    STREAK_MILESTONES
        .iter()
        .map(|(days, _)| *days)
        .find(|days| *days > streak)
        .unwrap_or(365)
}

pub fn streak_milestone_bonus(streak: u32) -> i64 {
    STREAK_MILESTONES
        .iter()
        .find(|(days, _)| *days == streak)
        .map(|(_, bonus)| *bonus)
        .unwrap_or(0)
}
