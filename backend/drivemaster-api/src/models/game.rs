use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::content::{Journey, JourneyEvent, Question, QuestionView};
use super::{EventType, Stage};

/// Live single-player session. Owned by exactly one engine; only leaves memory
/// through a checkpoint snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameState {
    pub journey_id: String,
    pub journey: Journey,
    pub car_type: String,
    pub current_event_index: usize,
    pub current_event: Option<JourneyEvent>,
    pub current_question: Option<Question>,
    /// Set once the current question has been answered, cleared on advance.
    #[serde(default)]
    pub question_answered: bool,
    pub events: Vec<EventResult>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub checkpoint_id: Option<String>,
}

impl GameState {
    pub fn is_exhausted(&self) -> bool {
        self.current_event_index >= self.journey.events.len()
    }

    pub fn correct_count(&self) -> usize {
        self.events.iter().filter(|event| event.is_correct).count()
    }
}

/// Outcome of one answered event. Never mutated after it is appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventResult {
    pub event_id: String,
    pub event_type: EventType,
    pub question_id: String,
    pub answer_id: String,
    pub is_correct: bool,
    /// Seconds.
    pub time_to_answer: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerResult {
    pub is_correct: bool,
    pub correct_option_id: String,
    pub explanation: String,
    pub credits_awarded: i64,
    pub time_to_answer: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JourneyResult {
    pub journey_id: String,
    pub attempt_id: String,
    pub attempt_number: u32,
    pub stage: Stage,
    pub score: f64,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    pub passed: bool,
    pub perfect: bool,
    pub feedback: String,
    pub credits_earned: i64,
    /// Seconds.
    pub duration: i64,
    pub events: Vec<EventResult>,
    /// Stage unlocked as a consequence of this attempt, if any.
    pub unlocked_stage: Option<Stage>,
    pub new_badges: Vec<String>,
}

/// Persisted, append-only record of a completed journey.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JourneyAttempt {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub journey_id: String,
    pub stage: Stage,
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration: i64,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    pub score: f64,
    pub passed: bool,
    pub events: Vec<EventResult>,
    pub car_type: String,
    pub route_id: String,
}

/// Row of a journey's attempt history.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AttemptSummary {
    pub attempt_id: String,
    pub attempt_number: u32,
    pub score: f64,
    pub passed: bool,
    pub completed_at: DateTime<Utc>,
    pub duration: i64,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
}

impl From<&JourneyAttempt> for AttemptSummary {
    fn from(attempt: &JourneyAttempt) -> Self {
        Self {
            attempt_id: attempt.id.clone(),
            attempt_number: attempt.attempt_number,
            score: attempt.score,
            passed: attempt.passed,
            completed_at: attempt.completed_at,
            duration: attempt.duration,
            correct_answers: attempt.correct_answers,
            incorrect_answers: attempt.incorrect_answers,
        }
    }
}

/// Player-facing projection of the session.
#[derive(Debug, Clone, Serialize)]
pub struct GameStateView {
    pub journey_id: String,
    pub stage: Stage,
    pub car_type: String,
    pub current_event_index: usize,
    pub total_events: usize,
    pub current_event: Option<JourneyEvent>,
    pub current_question: Option<QuestionView>,
    pub question_answered: bool,
    pub answered: usize,
    pub correct: usize,
    pub started_at: DateTime<Utc>,
    pub checkpoint_id: Option<String>,
}

impl From<&GameState> for GameStateView {
    fn from(state: &GameState) -> Self {
        Self {
            journey_id: state.journey_id.clone(),
            stage: state.journey.stage,
            car_type: state.car_type.clone(),
            current_event_index: state.current_event_index,
            total_events: state.journey.events.len(),
            current_event: state.current_event.clone(),
            current_question: state.current_question.as_ref().map(QuestionView::from),
            question_answered: state.question_answered,
            answered: state.events.len(),
            correct: state.correct_count(),
            started_at: state.started_at,
            checkpoint_id: state.checkpoint_id.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct StartJourneyRequest {
    #[validate(length(min = 1, message = "journey_id must not be empty"))]
    pub journey_id: String,
    #[validate(length(min = 1, max = 64, message = "car_type must be 1-64 characters"))]
    pub car_type: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    #[validate(length(min = 1))]
    pub question_id: String,
    #[validate(length(min = 1))]
    pub selected_option_id: String,
    #[validate(range(min = 0.0, message = "time_to_answer must not be negative"))]
    pub time_to_answer: f64,
}

#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    pub has_more: bool,
    pub state: Option<GameStateView>,
}

#[derive(Debug, Serialize)]
pub struct CheckpointResponse {
    pub checkpoint_id: String,
}

#[derive(Debug, Serialize)]
pub struct QuitResponse {
    pub penalty: i64,
    pub credits: Option<i64>,
}
