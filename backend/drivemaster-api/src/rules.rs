use serde::Deserialize;

use crate::models::mastery::BadgeCategory;
use crate::models::Stage;

/// Immutable game policy: credit amounts, pass bands, advancement
/// requirements and the badge registry. Built once (defaults or config) and
/// shared by the engine and the evaluator.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameRules {
    pub credits: CreditRules,
    pub mastery_thresholds: StageTable<MasteryThreshold>,
    pub stage_requirements: StageTable<StageRequirement>,
    pub badges: Vec<BadgeDefinition>,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            credits: CreditRules::default(),
            mastery_thresholds: StageTable {
                beginner: MasteryThreshold::new(95.0, 100.0),
                intermediate: MasteryThreshold::new(97.0, 100.0),
                advanced: MasteryThreshold::new(98.0, 100.0),
                k53: MasteryThreshold::new(100.0, 100.0),
            },
            stage_requirements: StageTable {
                beginner: StageRequirement::new(3, 95.0),
                intermediate: StageRequirement::new(5, 97.0),
                advanced: StageRequirement::new(5, 98.0),
                k53: StageRequirement::new(3, 100.0),
            },
            badges: default_badges(),
        }
    }
}

impl GameRules {
    pub fn threshold(&self, stage: Stage) -> &MasteryThreshold {
        self.mastery_thresholds.get(stage)
    }

    pub fn requirement(&self, stage: Stage) -> &StageRequirement {
        self.stage_requirements.get(stage)
    }

    pub fn badge(&self, badge_id: &str) -> Option<&BadgeDefinition> {
        self.badges.iter().find(|badge| badge.badge_id == badge_id)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CreditRules {
    pub correct_answer: i64,
    pub incorrect_answer: i64,
    pub perfect_journey: i64,
    pub quit_journey: i64,
    pub daily_login: i64,
    /// Balance granted by the daily bankruptcy recovery.
    pub bankruptcy_recovery: i64,
}

impl Default for CreditRules {
    fn default() -> Self {
        Self {
            correct_answer: 10,
            incorrect_answer: 5,
            perfect_journey: 50,
            quit_journey: 20,
            daily_login: 10,
            bankruptcy_recovery: 50,
        }
    }
}

impl CreditRules {
    /// Signed credit change for one answer.
    pub fn answer_delta(&self, is_correct: bool) -> i64 {
        if is_correct {
            self.correct_answer
        } else {
            -self.incorrect_answer
        }
    }
}

/// Inclusive score band (percent) a journey must land in to pass.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct MasteryThreshold {
    pub min: f64,
    pub max: f64,
}

impl MasteryThreshold {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, score: f64) -> bool {
        score >= self.min && score <= self.max
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct StageRequirement {
    pub min_journeys: u32,
    pub min_average_score: f64,
}

impl StageRequirement {
    pub fn new(min_journeys: u32, min_average_score: f64) -> Self {
        Self {
            min_journeys,
            min_average_score,
        }
    }
}

/// One value per stage; total by construction so lookups cannot miss.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StageTable<T> {
    pub beginner: T,
    pub intermediate: T,
    pub advanced: T,
    pub k53: T,
}

impl<T> StageTable<T> {
    pub fn get(&self, stage: Stage) -> &T {
        match stage {
            Stage::Beginner => &self.beginner,
            Stage::Intermediate => &self.intermediate,
            Stage::Advanced => &self.advanced,
            Stage::K53 => &self.k53,
        }
    }
}

impl Default for StageTable<MasteryThreshold> {
    fn default() -> Self {
        GameRules::default().mastery_thresholds
    }
}

impl Default for StageTable<StageRequirement> {
    fn default() -> Self {
        GameRules::default().stage_requirements
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BadgeDefinition {
    pub badge_id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: BadgeCategory,
}

fn badge(
    badge_id: &str,
    name: &str,
    description: &str,
    icon: &str,
    category: BadgeCategory,
) -> BadgeDefinition {
    BadgeDefinition {
        badge_id: badge_id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        category,
    }
}

pub fn default_badges() -> Vec<BadgeDefinition> {
    vec![
        badge(
            "first-journey",
            "First Steps",
            "Complete your first journey",
            "🚗",
            BadgeCategory::Journey,
        ),
        badge(
            "perfect-journey",
            "Perfection",
            "Score 100% on any journey",
            "⭐",
            BadgeCategory::Achievement,
        ),
        badge(
            "beginner-master",
            "Beginner Master",
            "Complete Beginner stage with 95%+ average",
            "🥉",
            BadgeCategory::Mastery,
        ),
        badge(
            "intermediate-master",
            "Intermediate Master",
            "Complete Intermediate stage with 97%+ average",
            "🥈",
            BadgeCategory::Mastery,
        ),
        badge(
            "advanced-master",
            "Advanced Master",
            "Complete Advanced stage with 98%+ average",
            "🥇",
            BadgeCategory::Mastery,
        ),
        badge(
            "k53-master",
            "K53 Champion",
            "Pass K53 simulation with 100%",
            "🏆",
            BadgeCategory::Mastery,
        ),
        badge(
            "streak-7",
            "Weekly Warrior",
            "Maintain a 7-day streak",
            "🔥",
            BadgeCategory::Streak,
        ),
        badge(
            "streak-30",
            "Monthly Dedication",
            "Maintain a 30-day streak",
            "💎",
            BadgeCategory::Streak,
        ),
        badge(
            "all-stages",
            "Road Master",
            "Master all stages",
            "👑",
            BadgeCategory::Mastery,
        ),
    ]
}
