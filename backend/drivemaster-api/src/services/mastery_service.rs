use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};
use crate::metrics::{record_badge_awarded, STAGE_UNLOCKS_TOTAL};
use crate::models::game::{AttemptSummary, JourneyAttempt};
use crate::models::mastery::{Badge, MasteryResult, StageProgress, WeakArea};
use crate::models::profile::UserProfile;
use crate::models::{percentage, EventType, Stage};
use crate::rules::{BadgeDefinition, GameRules};
use crate::store::{AttemptFilter, ProgressStore};

const FIRST_JOURNEY: &str = "first-journey";
const PERFECT_JOURNEY: &str = "perfect-journey";
const STREAK_7: &str = "streak-7";
const STREAK_30: &str = "streak-30";
const ALL_STAGES: &str = "all-stages";

/// Stage progress, advancement and badge ledger for one user.
///
/// Holds no state between calls: every answer is recomputed from the attempt
/// history and the profile. The only writes are stage unlocks and badge
/// awards. Read paths tolerate a missing profile; write paths fail with
/// `NotFound`.
pub struct MasteryService {
    user_id: String,
    progress: Arc<dyn ProgressStore>,
    rules: Arc<GameRules>,
}

impl MasteryService {
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

    pub async fn stage_progress(&self, stage: Stage) -> EngineResult<StageProgress> {
        let profile = self.progress.get_profile(&self.user_id).await?;
        let attempts = self
            .progress
            .query_attempts(&self.user_id, &AttemptFilter::stage(stage))
            .await?;

        Ok(self.build_stage_progress(stage, profile.as_ref(), &attempts))
    }

    pub async fn all_stages_progress(&self) -> EngineResult<Vec<StageProgress>> {
        let profile = self.progress.get_profile(&self.user_id).await?;
        let attempts = self
            .progress
            .query_attempts(&self.user_id, &AttemptFilter::default())
            .await?;

        Ok(Stage::ORDER
            .iter()
            .map(|&stage| {
                let stage_attempts: Vec<JourneyAttempt> = attempts
                    .iter()
                    .filter(|attempt| attempt.stage == stage)
                    .cloned()
                    .collect();
                self.build_stage_progress(stage, profile.as_ref(), &stage_attempts)
            })
            .collect())
    }

    fn build_stage_progress(
        &self,
        stage: Stage,
        profile: Option<&UserProfile>,
        attempts: &[JourneyAttempt],
    ) -> StageProgress {
        let passed = attempts.iter().filter(|attempt| attempt.passed).count() as u32;
        let average_score = if attempts.is_empty() {
            0.0
        } else {
            attempts.iter().map(|attempt| attempt.score).sum::<f64>() / attempts.len() as f64
        };
        let best_score = attempts
            .iter()
            .map(|attempt| attempt.score)
            .fold(0.0, f64::max);

        let threshold = self.rules.threshold(stage);
        let requirement = self.rules.requirement(stage);
        let is_mastered = passed >= requirement.min_journeys && average_score >= threshold.min;
        let is_unlocked = profile
            .map(|profile| profile.is_stage_unlocked(stage))
            .unwrap_or(stage == Stage::Beginner);

        let next_requirements = if !is_mastered && is_unlocked {
            let journeys_left = requirement.min_journeys.saturating_sub(passed);
            let score_gap = threshold.min - average_score;
            if journeys_left > 0 {
                Some(format!(
                    "Complete {} more journey(s) with {}%+ average",
                    journeys_left, threshold.min
                ))
            } else if score_gap > 0.0 {
                Some(format!("Improve average score by {:.1}%", score_gap))
            } else {
                None
            }
        } else {
            None
        };

        StageProgress {
            stage,
            journeys_completed: passed,
            total_attempts: attempts.len() as u32,
            average_score,
            best_score,
            is_unlocked,
            is_mastered,
            mastery_date: if is_mastered {
                profile.and_then(|profile| profile.mastery_date(stage))
            } else {
                None
            },
            next_requirements,
        }
    }

    pub async fn check_advancement(&self, current_stage: Stage) -> EngineResult<MasteryResult> {
        let Some(next_stage) = current_stage.next() else {
            return Ok(MasteryResult {
                can_advance: false,
                current_stage,
                next_stage: None,
                reason: "You have completed all stages!".to_string(),
                requirements_left: Vec::new(),
            });
        };

        let progress = self.stage_progress(current_stage).await?;
        let requirement = self.rules.requirement(current_stage);

        let mut requirements_left = Vec::new();
        if progress.journeys_completed < requirement.min_journeys {
            requirements_left.push(format!(
                "Complete {} more journey(s)",
                requirement.min_journeys - progress.journeys_completed
            ));
        }
        if progress.average_score < requirement.min_average_score {
            requirements_left.push(format!(
                "Achieve {}%+ average score (currently {:.1}%)",
                requirement.min_average_score, progress.average_score
            ));
        }

        if !requirements_left.is_empty() {
            return Ok(MasteryResult {
                can_advance: false,
                current_stage,
                next_stage: Some(next_stage),
                reason: format!(
                    "Complete {} mastery requirements to unlock {}",
                    current_stage, next_stage
                ),
                requirements_left,
            });
        }

        Ok(MasteryResult {
            can_advance: true,
            current_stage,
            next_stage: Some(next_stage),
            reason: format!("Congratulations! You can now advance to {}", next_stage),
            requirements_left,
        })
    }

    /// Unlocks the stage after `current_stage` when its requirements are met.
    /// Safe to call after every passing attempt: returns `false` without side
    /// effects when ineligible or already unlocked.
    pub async fn unlock_next_stage(&self, current_stage: Stage) -> EngineResult<bool> {
        let profile = self.require_profile().await?;

        let advancement = self.check_advancement(current_stage).await?;
        let next_stage = match advancement.next_stage {
            Some(next) if advancement.can_advance => next,
            _ => return Ok(false),
        };

        if profile.unlocked_stages.contains(&next_stage) {
            return Ok(false);
        }

        let unlocked = self
            .progress
            .unlock_stage(&self.user_id, next_stage, current_stage, Utc::now())
            .await?;
        if !unlocked {
            return Ok(false);
        }

        STAGE_UNLOCKS_TOTAL
            .with_label_values(&[next_stage.as_str()])
            .inc();
        tracing::info!(
            "User {} mastered {} and unlocked {}",
            self.user_id,
            current_stage,
            next_stage
        );

        self.award_badge(&current_stage.master_badge_id()).await?;

        Ok(true)
    }

    pub async fn check_stage_mastery(&self, stage: Stage) -> EngineResult<bool> {
        Ok(self.stage_progress(stage).await?.is_mastered)
    }

    pub async fn earned_badges(&self) -> EngineResult<Vec<Badge>> {
        let Some(profile) = self.progress.get_profile(&self.user_id).await? else {
            return Ok(Vec::new());
        };
        Ok(self.earned_from_profile(&profile))
    }

    fn earned_from_profile(&self, profile: &UserProfile) -> Vec<Badge> {
        profile
            .badges
            .iter()
            .filter_map(|badge_id| match self.rules.badge(badge_id) {
                Some(definition) => Some(earned_badge(
                    definition,
                    profile.badge_earned_at.get(badge_id).copied(),
                )),
                None => {
                    tracing::warn!(
                        "User {} holds unregistered badge {}",
                        self.user_id,
                        badge_id
                    );
                    None
                }
            })
            .collect()
    }

    /// Every registered badge: earned ones with their award instant, the rest
    /// with a progress/required pair.
    pub async fn all_badges_with_progress(&self) -> EngineResult<Vec<Badge>> {
        let profile = self
            .progress
            .get_profile(&self.user_id)
            .await?
            .unwrap_or_else(|| UserProfile::new(self.user_id.clone()));
        let earned = self.earned_from_profile(&profile);

        let mut badges = Vec::with_capacity(self.rules.badges.len());
        for definition in &self.rules.badges {
            if let Some(badge) = earned
                .iter()
                .find(|badge| badge.badge_id == definition.badge_id)
            {
                badges.push(badge.clone());
                continue;
            }

            let (progress, required) = match definition.badge_id.as_str() {
                FIRST_JOURNEY => (profile.total_journeys_completed, 1),
                PERFECT_JOURNEY => (profile.perfect_journeys, 1),
                STREAK_7 => (profile.current_streak, 7),
                STREAK_30 => (profile.current_streak, 30),
                ALL_STAGES => {
                    let mastered = self
                        .all_stages_progress()
                        .await?
                        .iter()
                        .filter(|progress| progress.is_mastered)
                        .count() as u32;
                    (mastered, Stage::ORDER.len() as u32)
                }
                _ => (0, 1),
            };

            badges.push(Badge {
                badge_id: definition.badge_id.clone(),
                name: definition.name.clone(),
                description: definition.description.clone(),
                icon: definition.icon.clone(),
                category: definition.category,
                earned_at: None,
                progress: Some(progress.min(required)),
                required: Some(required),
            });
        }

        Ok(badges)
    }

    /// Idempotent: `false` when already earned, award instant untouched.
    pub async fn award_badge(&self, badge_id: &str) -> EngineResult<bool> {
        if self.rules.badge(badge_id).is_none() {
            return Err(EngineError::not_found(format!("badge {}", badge_id)));
        }

        let profile = self.require_profile().await?;
        if profile.has_badge(badge_id) {
            return Ok(false);
        }

        let awarded = self
            .progress
            .award_badge(&self.user_id, badge_id, Utc::now())
            .await?;
        if awarded {
            record_badge_awarded(badge_id);
            tracing::info!("Badge awarded: user={}, badge={}", self.user_id, badge_id);
        }
        Ok(awarded)
    }

    /// Evaluates the automatic badges against the current profile counters
    /// and returns the ids awarded by this call.
    pub async fn check_and_award_badges(&self) -> EngineResult<Vec<String>> {
        let profile = self.require_profile().await?;

        let mut candidates = Vec::new();
        if profile.total_journeys_completed >= 1 {
            candidates.push(FIRST_JOURNEY);
        }
        if profile.perfect_journeys >= 1 {
            candidates.push(PERFECT_JOURNEY);
        }
        if profile.current_streak >= 7 {
            candidates.push(STREAK_7);
        }
        if profile.current_streak >= 30 {
            candidates.push(STREAK_30);
        }
        if !profile.has_badge(ALL_STAGES)
            && self
                .all_stages_progress()
                .await?
                .iter()
                .all(|progress| progress.is_mastered)
        {
            candidates.push(ALL_STAGES);
        }

        let mut newly_awarded = Vec::new();
        for badge_id in candidates {
            if profile.has_badge(badge_id) {
                continue;
            }
            if self.award_badge(badge_id).await? {
                newly_awarded.push(badge_id.to_string());
            }
        }

        Ok(newly_awarded)
    }

    /// Accuracy per event type over the stage's attempts, worst first.
    pub async fn weak_areas(&self, stage: Stage) -> EngineResult<Vec<WeakArea>> {
        let attempts = self
            .progress
            .query_attempts(&self.user_id, &AttemptFilter::stage(stage))
            .await?;

        Ok(rank_weak_areas(&attempts))
    }

    /// Attempt summaries for one journey, newest first.
    pub async fn journey_history(&self, journey_id: &str) -> EngineResult<Vec<AttemptSummary>> {
        let attempts = self
            .progress
            .query_attempts(&self.user_id, &AttemptFilter::journey(journey_id))
            .await?;

        let mut history: Vec<AttemptSummary> = attempts.iter().map(AttemptSummary::from).collect();
        history.sort_by(|a, b| b.attempt_number.cmp(&a.attempt_number));
        Ok(history)
    }

    async fn require_profile(&self) -> EngineResult<UserProfile> {
        self.progress
            .get_profile(&self.user_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("user profile {}", self.user_id)))
    }
}

fn earned_badge(
    definition: &BadgeDefinition,
    earned_at: Option<chrono::DateTime<Utc>>,
) -> Badge {
    Badge {
        badge_id: definition.badge_id.clone(),
        name: definition.name.clone(),
        description: definition.description.clone(),
        icon: definition.icon.clone(),
        category: definition.category,
        earned_at,
        progress: None,
        required: None,
    }
}

fn rank_weak_areas(attempts: &[JourneyAttempt]) -> Vec<WeakArea> {
    let mut stats: BTreeMap<EventType, (u32, u32)> = BTreeMap::new();
    for event in attempts.iter().flat_map(|attempt| &attempt.events) {
        let entry = stats.entry(event.event_type).or_default();
        entry.1 += 1;
        if event.is_correct {
            entry.0 += 1;
        }
    }

    let mut areas: Vec<WeakArea> = stats
        .into_iter()
        .filter(|(_, (_, total))| *total > 0)
        .map(|(event_type, (correct, total))| WeakArea {
            event_type,
            correct,
            total,
            accuracy: percentage(correct, total),
        })
        .collect();
    areas.sort_by(|a, b| a.accuracy.total_cmp(&b.accuracy));
    areas
}
