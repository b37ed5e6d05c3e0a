use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{percentage, Stage};

/// Player profile stored in the "drivemaster_users" collection. Only the
/// fields the engine and evaluator touch are modelled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub user_id: String,
    #[serde(default)]
    pub total_journeys_completed: u32,
    #[serde(default)]
    pub total_questions_answered: u32,
    #[serde(default)]
    pub total_correct_answers: u32,
    #[serde(default)]
    pub total_incorrect_answers: u32,
    #[serde(default)]
    pub average_score: f64,
    #[serde(default)]
    pub perfect_journeys: u32,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub longest_streak: u32,
    #[serde(default)]
    pub last_active_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub credits: i64,
    #[serde(default)]
    pub total_credits_earned: i64,
    #[serde(default)]
    pub total_credits_spent: i64,
    /// Set when a deduction empties the balance; cleared by recovery or by
    /// any credit movement that leaves a positive balance.
    #[serde(default)]
    pub is_bankrupt: bool,
    #[serde(default)]
    pub bankruptcy_count: u32,
    #[serde(default)]
    pub last_bankruptcy_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_bankruptcy_recovery_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_bankruptcy_recoveries: u32,
    #[serde(default = "default_unlocked_stages")]
    pub unlocked_stages: Vec<Stage>,
    #[serde(default)]
    pub badges: Vec<String>,
    /// Award instant per earned badge id.
    #[serde(default)]
    pub badge_earned_at: BTreeMap<String, DateTime<Utc>>,
    /// Mastery instant keyed by stage name.
    #[serde(default)]
    pub mastery_dates: BTreeMap<String, DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            total_journeys_completed: 0,
            total_questions_answered: 0,
            total_correct_answers: 0,
            total_incorrect_answers: 0,
            average_score: 0.0,
            perfect_journeys: 0,
            current_streak: 0,
            longest_streak: 0,
            last_active_date: None,
            credits: 0,
            total_credits_earned: 0,
            total_credits_spent: 0,
            is_bankrupt: false,
            bankruptcy_count: 0,
            last_bankruptcy_date: None,
            last_bankruptcy_recovery_date: None,
            total_bankruptcy_recoveries: 0,
            unlocked_stages: default_unlocked_stages(),
            badges: Vec::new(),
            badge_earned_at: BTreeMap::new(),
            mastery_dates: BTreeMap::new(),
            updated_at: None,
        }
    }

    /// Beginner is always playable, whatever the stored list says.
    pub fn is_stage_unlocked(&self, stage: Stage) -> bool {
        stage == Stage::Beginner || self.unlocked_stages.contains(&stage)
    }

    pub fn has_badge(&self, badge_id: &str) -> bool {
        self.badges.iter().any(|id| id == badge_id)
    }

    pub fn mastery_date(&self, stage: Stage) -> Option<DateTime<Utc>> {
        self.mastery_dates.get(stage.as_str()).copied()
    }

    /// Folds one finished journey into the cumulative counters.
    pub fn apply_stats(&mut self, stats: &JourneyStats, now: DateTime<Utc>) {
        self.total_journeys_completed += 1;
        self.total_questions_answered += stats.questions;
        self.total_correct_answers += stats.correct;
        self.total_incorrect_answers += stats.incorrect;
        self.average_score =
            average_score(self.total_correct_answers, self.total_questions_answered);
        self.apply_credit_delta(stats.credits);
        if stats.perfect {
            self.perfect_journeys += 1;
        }
        self.updated_at = Some(now);
    }

    /// Moves the balance by `delta`, booking it as earned or spent.
    pub fn apply_credit_delta(&mut self, delta: i64) {
        self.credits += delta;
        if delta >= 0 {
            self.total_credits_earned += delta;
        } else {
            self.total_credits_spent -= delta;
        }
        if self.credits > 0 {
            self.is_bankrupt = false;
        }
    }

    /// Whether the once-a-day bankruptcy recovery is still available at `now`.
    pub fn can_recover_from_bankruptcy(&self, now: DateTime<Utc>) -> bool {
        self.credits <= 0
            && self
                .last_bankruptcy_recovery_date
                .is_none_or(|last| last.date_naive() < now.date_naive())
    }
}

/// Lifetime accuracy in percent; 0 before anything was answered.
pub fn average_score(correct: u32, answered: u32) -> f64 {
    percentage(correct, answered)
}

fn default_unlocked_stages() -> Vec<Stage> {
    vec![Stage::Beginner]
}

/// Counter deltas contributed by one finished journey.
#[derive(Debug, Clone, PartialEq)]
pub struct JourneyStats {
    pub questions: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub credits: i64,
    pub perfect: bool,
}

/// Plain field overwrites. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_streak: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longest_streak: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active_date: Option<DateTime<Utc>>,
}

impl ProfilePatch {
    pub fn apply_to(&self, profile: &mut UserProfile) {
        if let Some(streak) = self.current_streak {
            profile.current_streak = streak;
        }
        if let Some(longest) = self.longest_streak {
            profile.longest_streak = longest;
        }
        if let Some(date) = self.last_active_date {
            profile.last_active_date = Some(date);
        }
    }
}
