#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use drivemaster_api::{
    config::Config,
    create_router,
    models::content::{AnswerOption, Journey, JourneyEvent, Question, RouteInfo},
    models::game::{AnswerResult, EventResult, JourneyAttempt},
    models::profile::UserProfile,
    models::{EventType, Stage},
    rules::{GameRules, MasteryThreshold},
    services::{game_engine::GameEngine, AppState},
    store::{MemorySnapshotStore, MemoryStore, ProgressStore},
    utils::retry::RetryConfig,
};

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub state: Arc<AppState>,
}

/// Router over in-memory stores, seeded with one beginner journey ("town-loop",
/// 3 events) and a profile for "alice".
pub async fn create_test_app() -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let store = Arc::new(MemoryStore::new());
    seed_journey(&store, "town-loop", Stage::Beginner, 3).await;
    store.insert_profile(UserProfile::new("alice")).await;

    let state = Arc::new(AppState::with_stores(
        Config::default(),
        store.clone(),
        store.clone(),
        Arc::new(MemorySnapshotStore::new()),
    ));

    TestApp {
        router: create_router(state.clone()),
        store,
        state,
    }
}

pub fn question(id: &str, stage: Stage) -> Question {
    Question {
        id: id.to_string(),
        text: format!("What should you do at {}?", id),
        options: vec![
            AnswerOption {
                id: "a".to_string(),
                text: "Slow down and yield".to_string(),
                is_correct: true,
            },
            AnswerOption {
                id: "b".to_string(),
                text: "Keep going".to_string(),
                is_correct: false,
            },
            AnswerOption {
                id: "c".to_string(),
                text: "Hoot".to_string(),
                is_correct: false,
            },
        ],
        explanation: "Yield to traffic already in the circle.".to_string(),
        stage,
        is_active: true,
    }
}

/// Journey with `events` events; event i offers only question `{id}-q{i}`.
pub async fn seed_journey(store: &MemoryStore, id: &str, stage: Stage, events: usize) {
    let journey = Journey {
        id: id.to_string(),
        title: format!("Journey {}", id),
        description: "Around town".to_string(),
        stage,
        events: (0..events)
            .map(|i| JourneyEvent {
                event_id: format!("{}-e{}", id, i),
                event_type: if i % 2 == 0 {
                    EventType::Roundabout
                } else {
                    EventType::Pedestrian
                },
                description: format!("Event {}", i),
                visual_ref: None,
                question_ids: vec![format!("{}-q{}", id, i)],
            })
            .collect(),
        route: RouteInfo {
            route_id: format!("{}-route", id),
            name: "Main street".to_string(),
        },
        is_published: true,
    };
    store.insert_journey(journey).await;
    for i in 0..events {
        store
            .insert_question(question(&format!("{}-q{}", id, i), stage))
            .await;
    }
}

/// Default rules with the beginner pass band widened to [min, 100].
pub fn rules_with_beginner_threshold(min: f64) -> GameRules {
    let mut rules = GameRules::default();
    rules.mastery_thresholds.beginner = MasteryThreshold::new(min, 100.0);
    rules
}

pub fn engine(store: &Arc<MemoryStore>, user_id: &str, rules: GameRules) -> GameEngine {
    GameEngine::new(
        user_id,
        store.clone(),
        store.clone(),
        Arc::new(MemorySnapshotStore::new()),
        Arc::new(rules),
    )
    .with_rng(StdRng::seed_from_u64(2024))
    .with_retry(RetryConfig::once())
}

/// Answers the current question, choosing the right or a wrong option.
pub async fn answer_current(engine: &mut GameEngine, correct: bool) -> AnswerResult {
    let question = engine
        .game_state()
        .and_then(|state| state.current_question.clone())
        .expect("no current question");
    let option = question
        .options
        .iter()
        .find(|option| option.is_correct == correct)
        .expect("no matching option")
        .id
        .clone();
    engine
        .validate_answer(&question.id, &option, 2.5)
        .await
        .expect("answer rejected")
}

/// Plays a whole journey, answering each event according to `pattern`.
pub async fn play(engine: &mut GameEngine, journey_id: &str, pattern: &[bool]) {
    engine
        .start_journey(journey_id, "sedan")
        .await
        .expect("start failed");
    for (i, correct) in pattern.iter().enumerate() {
        answer_current(engine, *correct).await;
        let has_more = engine.advance_journey().await.expect("advance failed");
        assert_eq!(has_more, i + 1 < pattern.len());
    }
}

pub fn event_result(event_type: EventType, is_correct: bool) -> EventResult {
    EventResult {
        event_id: format!("{}-event", event_type),
        event_type,
        question_id: "q".to_string(),
        answer_id: "a".to_string(),
        is_correct,
        time_to_answer: 3.0,
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn record_attempt(
    store: &MemoryStore,
    user_id: &str,
    journey_id: &str,
    stage: Stage,
    attempt_number: u32,
    score: f64,
    passed: bool,
    events: Vec<EventResult>,
) {
    let now = Utc::now();
    let correct = events.iter().filter(|event| event.is_correct).count() as u32;
    let attempt = JourneyAttempt {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        journey_id: journey_id.to_string(),
        stage,
        attempt_number,
        started_at: now,
        completed_at: now,
        duration: 90,
        total_questions: events.len() as u32,
        correct_answers: correct,
        incorrect_answers: events.len() as u32 - correct,
        score,
        passed,
        events,
        car_type: "sedan".to_string(),
        route_id: "route".to_string(),
    };
    store.append_attempt(&attempt).await.expect("append failed");
}

pub fn json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Sends one request and returns the status with the JSON body (Null when empty).
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}
