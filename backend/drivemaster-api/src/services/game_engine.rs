use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult, StoreError};
use crate::metrics::{record_answer, JOURNEYS_TOTAL, JOURNEY_SESSIONS_ACTIVE};
use crate::models::game::{AnswerResult, EventResult, GameState, JourneyAttempt, JourneyResult};
use crate::models::profile::JourneyStats;
use crate::models::{percentage, Stage};
use crate::rules::GameRules;
use crate::services::gamification_service::GamificationService;
use crate::services::mastery_service::MasteryService;
use crate::services::question_selector::select_question;
use crate::store::{AttemptFilter, ContentStore, ProgressStore, SnapshotStore};
use crate::utils::retry::{retry_async_with_config, RetryConfig};

/// Single-player journey session for one user.
///
/// `Idle -> Active(index) -> Complete | Quit`. At most one session is live;
/// starting a new journey replaces it. The engine is not shareable: callers
/// that serve concurrent requests keep one engine per user behind a mutex.
pub struct GameEngine {
    user_id: String,
    content: Arc<dyn ContentStore>,
    progress: Arc<dyn ProgressStore>,
    snapshots: Arc<dyn SnapshotStore>,
    rules: Arc<GameRules>,
    rng: StdRng,
    retry: RetryConfig,
    state: Option<GameState>,
}

impl GameEngine {
    pub fn new(
        user_id: impl Into<String>,
        content: Arc<dyn ContentStore>,
        progress: Arc<dyn ProgressStore>,
        snapshots: Arc<dyn SnapshotStore>,
        rules: Arc<GameRules>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            content,
            progress,
            snapshots,
            rules,
            rng: StdRng::from_os_rng(),
            retry: RetryConfig::aggressive(),
            state: None,
        }
    }

    /// Replaces the question-selection randomness, e.g. with a seeded rng.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Retry policy for persisting finished attempts.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn game_state(&self) -> Option<&GameState> {
        self.state.as_ref()
    }

    pub async fn start_journey(&mut self, journey_id: &str, car_type: &str) -> EngineResult<&GameState> {
        let journey = self
            .content
            .get_journey(journey_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("journey {}", journey_id)))?;

        let first_event = journey.events.first().cloned().ok_or_else(|| {
            EngineError::no_content(format!("journey {} has no events", journey_id))
        })?;
        let question =
            select_question(self.content.as_ref(), &first_event, journey.stage, &mut self.rng)
                .await?;

        if let Some(previous) = &self.state {
            tracing::info!(
                "User {} abandoned journey {} by starting {}",
                self.user_id,
                previous.journey_id,
                journey_id
            );
        } else {
            JOURNEY_SESSIONS_ACTIVE.inc();
        }
        JOURNEYS_TOTAL.with_label_values(&["started"]).inc();
        tracing::info!(
            "Journey started: user={}, journey={}, stage={}, events={}",
            self.user_id,
            journey_id,
            journey.stage,
            journey.events.len()
        );

        Ok(&*self.state.insert(GameState {
            journey_id: journey.id.clone(),
            journey,
            car_type: car_type.to_string(),
            current_event_index: 0,
            current_event: Some(first_event),
            current_question: Some(question),
            question_answered: false,
            events: Vec::new(),
            started_at: Utc::now(),
            is_paused: false,
            checkpoint_id: None,
        }))
    }

    /// Grades the current question. One answer per event; the index does not
    /// move until `advance_journey`.
    pub async fn validate_answer(
        &mut self,
        question_id: &str,
        option_id: &str,
        time_to_answer: f64,
    ) -> EngineResult<AnswerResult> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| EngineError::invalid_state("no active journey"))?;
        if state.question_answered {
            return Err(EngineError::invalid_state(
                "current question has already been answered",
            ));
        }
        let (Some(event), Some(question)) = (&state.current_event, &state.current_question) else {
            return Err(EngineError::invalid_state("journey has no current question"));
        };
        if question.id != question_id {
            return Err(EngineError::invalid_state(format!(
                "question {} is not the current question",
                question_id
            )));
        }
        let correct_option = question.correct_option().ok_or_else(|| {
            EngineError::no_content(format!(
                "question {} has no single correct option",
                question.id
            ))
        })?;

        let is_correct = correct_option.id == option_id;
        let time_to_answer = time_to_answer.max(0.0);
        let result = AnswerResult {
            is_correct,
            correct_option_id: correct_option.id.clone(),
            explanation: question.explanation.clone(),
            credits_awarded: self.rules.credits.answer_delta(is_correct),
            time_to_answer,
        };

        let event_result = EventResult {
            event_id: event.event_id.clone(),
            event_type: event.event_type,
            question_id: question.id.clone(),
            answer_id: option_id.to_string(),
            is_correct,
            time_to_answer,
        };
        state.events.push(event_result);
        state.question_answered = true;

        record_answer(is_correct);
        tracing::debug!(
            "Answer graded: user={}, question={}, correct={}",
            self.user_id,
            question_id,
            is_correct
        );

        Ok(result)
    }

    /// Moves to the next event. Returns `false` exactly once, when the last
    /// event has been passed; any further call is an invalid state.
    pub async fn advance_journey(&mut self) -> EngineResult<bool> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| EngineError::invalid_state("no active journey"))?;
        if state.is_exhausted() {
            return Err(EngineError::invalid_state("journey has no more events"));
        }

        let next_index = state.current_event_index + 1;
        let Some(next_event) = state.journey.events.get(next_index).cloned() else {
            state.current_event_index = next_index;
            state.current_event = None;
            state.current_question = None;
            state.question_answered = false;
            return Ok(false);
        };

        let question = select_question(
            self.content.as_ref(),
            &next_event,
            state.journey.stage,
            &mut self.rng,
        )
        .await?;

        state.current_event_index = next_index;
        state.current_event = Some(next_event);
        state.current_question = Some(question);
        state.question_answered = false;
        Ok(true)
    }

    /// Scores the session, persists the attempt and folds it into the
    /// profile. If the attempt cannot be stored the error is returned and the
    /// session stays active so the call can be repeated. Everything after the
    /// attempt write is best-effort.
    pub async fn end_journey(&mut self) -> EngineResult<JourneyResult> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| EngineError::invalid_state("no active journey"))?;

        let completed_at = Utc::now();
        let stage = state.journey.stage;
        let total = state.events.len() as u32;
        let correct = state.correct_count() as u32;
        let incorrect = total - correct;
        let score = percentage(correct, total);
        let checkpoint_id = state.checkpoint_id.clone();

        let threshold = self.rules.threshold(stage);
        let passed = threshold.contains(score);
        let perfect = total > 0 && correct == total;
        let mut credits: i64 = state
            .events
            .iter()
            .map(|event| self.rules.credits.answer_delta(event.is_correct))
            .sum();
        if perfect {
            credits += self.rules.credits.perfect_journey;
        }

        let prior_attempts = self
            .progress
            .query_attempts(&self.user_id, &AttemptFilter::journey(&state.journey_id))
            .await?
            .len() as u32;

        let attempt = JourneyAttempt {
            id: Uuid::new_v4().to_string(),
            user_id: self.user_id.clone(),
            journey_id: state.journey_id.clone(),
            stage,
            attempt_number: prior_attempts + 1,
            started_at: state.started_at,
            completed_at,
            duration: (completed_at - state.started_at).num_seconds(),
            total_questions: total,
            correct_answers: correct,
            incorrect_answers: incorrect,
            score,
            passed,
            events: state.events.clone(),
            car_type: state.car_type.clone(),
            route_id: state.journey.route.route_id.clone(),
        };

        let progress = self.progress.clone();
        let attempt_id = retry_async_with_config(self.retry.clone(), || {
            progress.append_attempt(&attempt)
        })
        .await
        .map_err(|e| {
            tracing::error!(
                "Failed to persist attempt for user {} on journey {}: {}",
                self.user_id,
                attempt.journey_id,
                e
            );
            EngineError::from(e)
        })?;

        let stats = JourneyStats {
            questions: total,
            correct,
            incorrect,
            credits,
            perfect,
        };
        let (unlocked_stage, new_badges) = self
            .update_profile_after_attempt(&stats, stage, passed, completed_at)
            .await;

        let feedback = if passed {
            format!(
                "Excellent! You scored {:.1}% and passed the {}% threshold.",
                score, threshold.min
            )
        } else {
            format!(
                "You scored {:.1}%, which is below the {}% threshold. Journey will restart with new questions.",
                score, threshold.min
            )
        };

        self.state = None;
        if let Some(checkpoint_id) = checkpoint_id {
            self.discard_checkpoint(&checkpoint_id).await;
        }
        JOURNEY_SESSIONS_ACTIVE.dec();
        JOURNEYS_TOTAL
            .with_label_values(&[if passed { "passed" } else { "failed" }])
            .inc();
        tracing::info!(
            "Journey completed: user={}, journey={}, attempt={}, score={:.1}, passed={}",
            self.user_id,
            attempt.journey_id,
            attempt.attempt_number,
            score,
            passed
        );

        Ok(JourneyResult {
            journey_id: attempt.journey_id,
            attempt_id,
            attempt_number: attempt.attempt_number,
            stage,
            score,
            total_questions: total,
            correct_answers: correct,
            incorrect_answers: incorrect,
            passed,
            perfect,
            feedback,
            credits_earned: credits,
            duration: attempt.duration,
            events: attempt.events,
            unlocked_stage,
            new_badges,
        })
    }

    async fn update_profile_after_attempt(
        &self,
        stats: &JourneyStats,
        stage: Stage,
        passed: bool,
        now: DateTime<Utc>,
    ) -> (Option<Stage>, Vec<String>) {
        match self.progress.apply_journey_stats(&self.user_id, stats).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::warn!("No profile for user {}; stats not recorded", self.user_id);
            }
            Err(e) => {
                tracing::error!("Failed to update stats for user {}: {}", self.user_id, e);
            }
        }

        let gamification =
            GamificationService::new(&self.user_id, self.progress.clone(), self.rules.clone());
        if let Err(e) = gamification.check_daily_streak(now).await {
            tracing::warn!("Streak update failed for user {}: {}", self.user_id, e);
        }

        let mastery = MasteryService::new(&self.user_id, self.progress.clone(), self.rules.clone());
        let mut unlocked_stage = None;
        if passed {
            match mastery.unlock_next_stage(stage).await {
                Ok(true) => unlocked_stage = stage.next(),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Stage unlock failed for user {}: {}", self.user_id, e);
                }
            }
        }

        let new_badges = match mastery.check_and_award_badges().await {
            Ok(badges) => badges,
            Err(e) => {
                tracing::warn!("Badge evaluation failed for user {}: {}", self.user_id, e);
                Vec::new()
            }
        };

        (unlocked_stage, new_badges)
    }

    /// Abandons the session. No attempt is recorded and in-progress answers
    /// are forfeited. The quit penalty is applied best-effort and never takes
    /// the balance below zero. Returns the nominal penalty and the resulting
    /// balance when it could be applied.
    pub async fn quit_journey(&mut self) -> EngineResult<(i64, Option<i64>)> {
        let state = self
            .state
            .take()
            .ok_or_else(|| EngineError::invalid_state("no active journey"))?;
        JOURNEY_SESSIONS_ACTIVE.dec();
        JOURNEYS_TOTAL.with_label_values(&["quit"]).inc();

        if let Some(checkpoint_id) = &state.checkpoint_id {
            self.discard_checkpoint(checkpoint_id).await;
        }

        let penalty = self.rules.credits.quit_journey;
        let gamification =
            GamificationService::new(&self.user_id, self.progress.clone(), self.rules.clone());
        let balance = match gamification.deduct_credits(penalty).await {
            Ok(balance) => Some(balance),
            Err(EngineError::NotFound(_)) => {
                tracing::warn!("No profile for user {}; quit penalty skipped", self.user_id);
                None
            }
            Err(e) => {
                tracing::error!("Failed to apply quit penalty to user {}: {}", self.user_id, e);
                None
            }
        };

        tracing::info!(
            "Journey quit: user={}, journey={}, answered={}",
            self.user_id,
            state.journey_id,
            state.events.len()
        );
        Ok((penalty, balance))
    }

    /// Snapshots the live session. Only the newest checkpoint of a session
    /// can be restored; saving again drops the previous one.
    pub async fn save_checkpoint(&mut self) -> EngineResult<String> {
        let mut snapshot = self
            .state
            .clone()
            .ok_or_else(|| EngineError::invalid_state("no active journey"))?;
        let previous = snapshot.checkpoint_id.take();

        let checkpoint_id = format!("checkpoint-{}", Uuid::new_v4());
        snapshot.checkpoint_id = Some(checkpoint_id.clone());
        snapshot.is_paused = true;
        let blob = serde_json::to_string(&snapshot).map_err(StoreError::from)?;
        self.snapshots
            .save(&self.user_id, &checkpoint_id, &blob)
            .await?;

        if let Some(state) = self.state.as_mut() {
            state.checkpoint_id = Some(checkpoint_id.clone());
        }
        if let Some(previous) = previous {
            self.discard_checkpoint(&previous).await;
        }
        tracing::info!("Checkpoint saved: user={}, id={}", self.user_id, checkpoint_id);
        Ok(checkpoint_id)
    }

    /// Rehydrates one of this user's saved sessions, replacing any active
    /// one. Checkpoints of finished or abandoned sessions are gone.
    pub async fn restore_checkpoint(&mut self, checkpoint_id: &str) -> EngineResult<&GameState> {
        let blob = self
            .snapshots
            .load(&self.user_id, checkpoint_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("checkpoint {}", checkpoint_id)))?;
        let mut restored: GameState = serde_json::from_str(&blob).map_err(StoreError::from)?;
        restored.is_paused = false;

        if self.state.is_none() {
            JOURNEY_SESSIONS_ACTIVE.inc();
        }
        tracing::info!(
            "Checkpoint restored: user={}, id={}, journey={}",
            self.user_id,
            checkpoint_id,
            restored.journey_id
        );
        Ok(&*self.state.insert(restored))
    }

    async fn discard_checkpoint(&self, checkpoint_id: &str) {
        match self.snapshots.delete(&self.user_id, checkpoint_id).await {
            Ok(true) => {
                tracing::debug!("Checkpoint discarded: user={}, id={}", self.user_id, checkpoint_id)
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(
                "Failed to discard checkpoint {} for user {}: {}",
                checkpoint_id,
                self.user_id,
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::{AnswerOption, Journey, JourneyEvent, Question, RouteInfo};
    use crate::models::profile::UserProfile;
    use crate::models::EventType;
    use crate::store::{MemorySnapshotStore, MemoryStore};

    fn question(id: &str) -> Question {
        Question {
            id: id.to_string(),
            text: format!("What now at {}?", id),
            options: vec![
                AnswerOption {
                    id: "right".to_string(),
                    text: "Stop".to_string(),
                    is_correct: true,
                },
                AnswerOption {
                    id: "wrong".to_string(),
                    text: "Speed up".to_string(),
                    is_correct: false,
                },
            ],
            explanation: "Always stop.".to_string(),
            stage: Stage::Beginner,
            is_active: true,
        }
    }

    async fn engine_with(events: usize) -> (Arc<MemoryStore>, GameEngine) {
        let (store, engine, _) = engine_with_snapshots(events).await;
        (store, engine)
    }

    async fn engine_with_snapshots(
        events: usize,
    ) -> (Arc<MemoryStore>, GameEngine, Arc<MemorySnapshotStore>) {
        let store = Arc::new(MemoryStore::new());
        let journey = Journey {
            id: "j1".to_string(),
            title: "Town loop".to_string(),
            description: String::new(),
            stage: Stage::Beginner,
            events: (0..events)
                .map(|i| JourneyEvent {
                    event_id: format!("e{}", i),
                    event_type: EventType::StopSign,
                    description: String::new(),
                    visual_ref: None,
                    question_ids: vec![format!("q{}", i)],
                })
                .collect(),
            route: RouteInfo {
                route_id: "r1".to_string(),
                name: String::new(),
            },
            is_published: true,
        };
        store.insert_journey(journey).await;
        for i in 0..events {
            store.insert_question(question(&format!("q{}", i))).await;
        }
        store.insert_profile(UserProfile::new("u1")).await;

        let snapshots = Arc::new(MemorySnapshotStore::new());
        let engine = player("u1", &store, &snapshots);
        (store, engine, snapshots)
    }

    fn player(
        user_id: &str,
        store: &Arc<MemoryStore>,
        snapshots: &Arc<MemorySnapshotStore>,
    ) -> GameEngine {
        GameEngine::new(
            user_id,
            store.clone(),
            store.clone(),
            snapshots.clone(),
            Arc::new(GameRules::default()),
        )
        .with_rng(StdRng::seed_from_u64(42))
        .with_retry(RetryConfig::once())
    }

    fn current_question_id(engine: &GameEngine) -> String {
        engine
            .game_state()
            .and_then(|state| state.current_question.as_ref())
            .map(|question| question.id.clone())
            .unwrap()
    }

    #[tokio::test]
    async fn unknown_journey_is_not_found() {
        let (_, mut engine) = engine_with(1).await;
        let err = engine.start_journey("nope", "sedan").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
        assert!(engine.game_state().is_none());
    }

    #[tokio::test]
    async fn second_answer_to_same_event_is_rejected() {
        let (_, mut engine) = engine_with(2).await;
        engine.start_journey("j1", "sedan").await.unwrap();
        let qid = current_question_id(&engine);

        let first = engine.validate_answer(&qid, "wrong", 4.0).await.unwrap();
        assert!(!first.is_correct);
        assert_eq!(first.correct_option_id, "right");
        assert_eq!(first.credits_awarded, -5);

        let err = engine.validate_answer(&qid, "right", 1.0).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
        assert_eq!(engine.game_state().unwrap().events.len(), 1);
    }

    #[tokio::test]
    async fn answer_for_another_question_leaves_session_untouched() {
        let (_, mut engine) = engine_with(2).await;
        engine.start_journey("j1", "sedan").await.unwrap();

        let err = engine.validate_answer("q-other", "right", 1.0).await.unwrap_err();

        assert!(matches!(err, EngineError::InvalidState(_)));
        let state = engine.game_state().unwrap();
        assert!(state.events.is_empty());
        assert!(!state.question_answered);
    }

    #[tokio::test]
    async fn advance_past_the_end_is_invalid() {
        let (_, mut engine) = engine_with(2).await;
        engine.start_journey("j1", "sedan").await.unwrap();

        assert!(engine.advance_journey().await.unwrap());
        assert!(!engine.advance_journey().await.unwrap());
        let err = engine.advance_journey().await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
    }

    #[tokio::test]
    async fn failed_attempt_write_keeps_session_for_retry() {
        let (store, mut engine) = engine_with(1).await;
        engine.start_journey("j1", "sedan").await.unwrap();
        let qid = current_question_id(&engine);
        engine.validate_answer(&qid, "right", 2.0).await.unwrap();

        store.set_fail_attempt_writes(true);
        let err = engine.end_journey().await.unwrap_err();
        assert!(matches!(err, EngineError::Persistence(_)));
        assert!(engine.game_state().is_some());

        store.set_fail_attempt_writes(false);
        let result = engine.end_journey().await.unwrap();
        assert_eq!(result.attempt_number, 1);
        assert_eq!(store.attempt_count().await, 1);
        assert!(engine.game_state().is_none());
    }

    #[tokio::test]
    async fn checkpoint_restores_progress() {
        let (_, mut engine) = engine_with(3).await;
        engine.start_journey("j1", "hatchback").await.unwrap();
        let qid = current_question_id(&engine);
        engine.validate_answer(&qid, "right", 2.0).await.unwrap();
        engine.advance_journey().await.unwrap();

        let checkpoint_id = engine.save_checkpoint().await.unwrap();
        assert!(checkpoint_id.starts_with("checkpoint-"));
        engine.start_journey("j1", "sedan").await.unwrap();
        assert!(engine.game_state().unwrap().events.is_empty());

        let restored = engine.restore_checkpoint(&checkpoint_id).await.unwrap();
        assert_eq!(restored.current_event_index, 1);
        assert_eq!(restored.events.len(), 1);
        assert_eq!(restored.car_type, "hatchback");
        assert_eq!(restored.checkpoint_id.as_deref(), Some(checkpoint_id.as_str()));
        assert!(!restored.is_paused);

        let err = engine.restore_checkpoint("checkpoint-missing").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn finished_session_cannot_be_restored_again() {
        let (store, mut engine, snapshots) = engine_with_snapshots(1).await;
        engine.start_journey("j1", "sedan").await.unwrap();
        let checkpoint_id = engine.save_checkpoint().await.unwrap();
        let qid = current_question_id(&engine);
        engine.validate_answer(&qid, "right", 2.0).await.unwrap();

        engine.end_journey().await.unwrap();

        assert!(snapshots.is_empty().await);
        let err = engine.restore_checkpoint(&checkpoint_id).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
        assert_eq!(store.attempt_count().await, 1);
    }

    #[tokio::test]
    async fn quitting_discards_the_checkpoint() {
        let (_, mut engine, snapshots) = engine_with_snapshots(2).await;
        engine.start_journey("j1", "sedan").await.unwrap();
        let checkpoint_id = engine.save_checkpoint().await.unwrap();

        engine.quit_journey().await.unwrap();

        assert!(snapshots.is_empty().await);
        let err = engine.restore_checkpoint(&checkpoint_id).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn saving_again_replaces_the_previous_checkpoint() {
        let (_, mut engine, snapshots) = engine_with_snapshots(2).await;
        engine.start_journey("j1", "sedan").await.unwrap();
        let first = engine.save_checkpoint().await.unwrap();
        let second = engine.save_checkpoint().await.unwrap();

        assert_ne!(first, second);
        assert_eq!(snapshots.len().await, 1);
        assert!(engine.restore_checkpoint(&first).await.is_err());
        assert!(engine.restore_checkpoint(&second).await.is_ok());
    }

    #[tokio::test]
    async fn checkpoints_belong_to_their_player() {
        let (store, mut alice, snapshots) = engine_with_snapshots(2).await;
        store.insert_profile(UserProfile::new("u2")).await;
        let mut bob = player("u2", &store, &snapshots);

        alice.start_journey("j1", "sedan").await.unwrap();
        let checkpoint_id = alice.save_checkpoint().await.unwrap();

        let err = bob.restore_checkpoint(&checkpoint_id).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
        assert!(bob.game_state().is_none());
        assert!(alice.restore_checkpoint(&checkpoint_id).await.is_ok());
    }

    #[tokio::test]
    async fn quit_penalty_stops_at_zero_and_declares_bankruptcy() {
        let (store, mut engine) = engine_with(1).await;
        let mut profile = UserProfile::new("u1");
        profile.credits = 10;
        store.insert_profile(profile).await;
        engine.start_journey("j1", "sedan").await.unwrap();

        let (penalty, balance) = engine.quit_journey().await.unwrap();

        assert_eq!(penalty, 20);
        assert_eq!(balance, Some(0));
        let stored = store.get_profile("u1").await.unwrap().unwrap();
        assert!(stored.is_bankrupt);
        assert_eq!(stored.bankruptcy_count, 1);
        assert_eq!(stored.total_credits_spent, 10);
    }

    #[tokio::test]
    async fn score_is_exact_for_whole_percentages() {
        let (_, mut engine) = engine_with(100).await;
        engine.start_journey("j1", "sedan").await.unwrap();
        for i in 0..100 {
            let qid = current_question_id(&engine);
            let option = if i < 57 { "right" } else { "wrong" };
            engine.validate_answer(&qid, option, 1.0).await.unwrap();
            engine.advance_journey().await.unwrap();
        }

        let result = engine.end_journey().await.unwrap();

        assert_eq!(result.score, 57.0);
        assert_eq!(result.correct_answers, 57);
        assert!(crate::rules::MasteryThreshold::new(57.0, 100.0).contains(result.score));
    }
}
