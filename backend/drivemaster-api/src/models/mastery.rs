use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EventType, Stage};

/// Derived per-stage view, recomputed from attempt history on every call.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StageProgress {
    pub stage: Stage,
    /// Passed attempts.
    pub journeys_completed: u32,
    pub total_attempts: u32,
    pub average_score: f64,
    pub best_score: f64,
    pub is_unlocked: bool,
    pub is_mastered: bool,
    pub mastery_date: Option<DateTime<Utc>>,
    pub next_requirements: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MasteryResult {
    pub can_advance: bool,
    pub current_stage: Stage,
    pub next_stage: Option<Stage>,
    pub reason: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requirements_left: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BadgeCategory {
    Journey,
    Mastery,
    Streak,
    Achievement,
}

/// Badge as shown to a player: earned with its award instant, or unearned with
/// a progress counter.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Badge {
    pub badge_id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: BadgeCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earned_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<u32>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeakArea {
    pub event_type: EventType,
    pub correct: u32,
    pub total: u32,
    /// Percent.
    pub accuracy: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StreakInfo {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_active_date: Option<DateTime<Utc>>,
    pub streak_bonus_earned: bool,
    pub milestone_bonus: i64,
    pub next_streak_reward: u32,
}

/// Economy and streak summary of one player.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GamificationStats {
    pub credits: i64,
    pub total_credits_earned: i64,
    pub total_credits_spent: i64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub badges: Vec<String>,
    pub total_journeys: u32,
    pub average_score: f64,
    pub bankruptcy_count: u32,
    pub is_bankrupt: bool,
}
