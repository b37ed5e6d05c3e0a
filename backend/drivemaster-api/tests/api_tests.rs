mod common;

use axum::http::StatusCode;
use common::*;
use drivemaster_api::store::ProgressStore;
use serde_json::json;

#[tokio::test]
async fn health_reports_in_memory_backends() {
    let app = create_test_app().await;

    let (status, body) = send(&app.router, json_request("GET", "/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["dependencies"]["mongodb"]["status"], "in-memory");
}

#[tokio::test]
async fn journeys_are_listed_by_stage() {
    let app = create_test_app().await;

    let (status, body) = send(
        &app.router,
        json_request("GET", "/api/v1/journeys?stage=Beginner", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], "town-loop");

    let (status, _) = send(
        &app.router,
        json_request("GET", "/api/v1/journeys?stage=expert", None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn full_journey_over_http() {
    let app = create_test_app().await;

    let (status, state) = send(
        &app.router,
        json_request(
            "POST",
            "/api/v1/users/alice/journey",
            Some(json!({ "journey_id": "town-loop", "car_type": "sedan" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(state["total_events"], 3);
    assert!(state["current_question"]["options"][0].get("is_correct").is_none());

    for i in 0..3 {
        let (_, state) = send(
            &app.router,
            json_request("GET", "/api/v1/users/alice/journey", None),
        )
        .await;
        let question_id = state["current_question"]["id"].as_str().unwrap().to_string();
        assert_eq!(question_id, format!("town-loop-q{}", i));

        let (status, answer) = send(
            &app.router,
            json_request(
                "POST",
                "/api/v1/users/alice/journey/answers",
                Some(json!({
                    "question_id": question_id,
                    "selected_option_id": "a",
                    "time_to_answer": 3.2
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(answer["is_correct"], true);
        assert_eq!(answer["credits_awarded"], 10);

        let (status, advance) = send(
            &app.router,
            json_request("POST", "/api/v1/users/alice/journey/advance", None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(advance["has_more"], i < 2);
    }

    let (status, result) = send(
        &app.router,
        json_request("POST", "/api/v1/users/alice/journey/end", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["score"], 100.0);
    assert_eq!(result["passed"], true);
    assert_eq!(result["credits_earned"], 80);

    let (status, _) = send(
        &app.router,
        json_request("GET", "/api/v1/users/alice/journey", None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, history) = send(
        &app.router,
        json_request("GET", "/api/v1/users/alice/journeys/town-loop/history", None),
    )
    .await;
    assert_eq!(history.as_array().unwrap().len(), 1);

    let (_, credits) = send(
        &app.router,
        json_request("GET", "/api/v1/users/alice/credits", None),
    )
    .await;
    // journey credits plus the daily-login bonus
    assert_eq!(credits["credits"], 90);
}

#[tokio::test]
async fn session_errors_map_to_status_codes() {
    let app = create_test_app().await;

    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/api/v1/users/alice/journey/answers",
            Some(json!({ "question_id": "q", "selected_option_id": "a", "time_to_answer": 1.0 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], 409);

    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            "/api/v1/users/alice/journey",
            Some(json!({ "journey_id": "nowhere", "car_type": "sedan" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            "/api/v1/users/alice/journey",
            Some(json!({ "journey_id": "town-loop", "car_type": "" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            "/api/v1/users/alice/journey/checkpoint/checkpoint-missing/restore",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn checkpoint_round_trip_over_http() {
    let app = create_test_app().await;
    send(
        &app.router,
        json_request(
            "POST",
            "/api/v1/users/alice/journey",
            Some(json!({ "journey_id": "town-loop", "car_type": "hatchback" })),
        ),
    )
    .await;
    send(
        &app.router,
        json_request("POST", "/api/v1/users/alice/journey/advance", None),
    )
    .await;

    let (status, checkpoint) = send(
        &app.router,
        json_request("POST", "/api/v1/users/alice/journey/checkpoint", None),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let checkpoint_id = checkpoint["checkpoint_id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            "/api/v1/users/alice/journey",
            Some(json!({ "journey_id": "town-loop", "car_type": "sedan" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let restore_uri = format!(
        "/api/v1/users/alice/journey/checkpoint/{}/restore",
        checkpoint_id
    );
    let (status, restored) = send(&app.router, json_request("POST", &restore_uri, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(restored["current_event_index"], 1);
    assert_eq!(restored["car_type"], "hatchback");
    assert_eq!(restored["checkpoint_id"], checkpoint_id.as_str());

    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            &format!("/api/v1/users/bob/journey/checkpoint/{}/restore", checkpoint_id),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app.router,
        json_request("POST", "/api/v1/users/alice/journey/end", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // the finished session's checkpoint is spent
    let (status, _) = send(&app.router, json_request("POST", &restore_uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.store.attempt_count().await, 1);
}

#[tokio::test]
async fn engines_are_released_when_sessions_close() {
    let app = create_test_app().await;

    let (status, _) = send(
        &app.router,
        json_request("GET", "/api/v1/users/stranger/journey", None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(
        &app.router,
        json_request("POST", "/api/v1/users/stranger/journey/advance", None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(app.state.engine_count().await, 0);

    let start = json_request(
        "POST",
        "/api/v1/users/alice/journey",
        Some(json!({ "journey_id": "town-loop", "car_type": "sedan" })),
    );
    send(&app.router, start).await;
    assert_eq!(app.state.engine_count().await, 1);
    send(
        &app.router,
        json_request("POST", "/api/v1/users/alice/journey/end", None),
    )
    .await;
    assert_eq!(app.state.engine_count().await, 0);

    let start = json_request(
        "POST",
        "/api/v1/users/alice/journey",
        Some(json!({ "journey_id": "town-loop", "car_type": "sedan" })),
    );
    send(&app.router, start).await;
    let (status, quit) = send(
        &app.router,
        json_request("POST", "/api/v1/users/alice/journey/quit", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quit["penalty"], 20);
    assert_eq!(app.state.engine_count().await, 0);

    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            "/api/v1/users/alice/journey",
            Some(json!({ "journey_id": "nowhere", "car_type": "sedan" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.state.engine_count().await, 0);
}

#[tokio::test]
async fn bankruptcy_over_http() {
    let app = create_test_app().await;
    send(
        &app.router,
        json_request(
            "POST",
            "/api/v1/users/alice/journey",
            Some(json!({ "journey_id": "town-loop", "car_type": "sedan" })),
        ),
    )
    .await;

    let (_, quit) = send(
        &app.router,
        json_request("POST", "/api/v1/users/alice/journey/quit", None),
    )
    .await;
    assert_eq!(quit["credits"], 0);

    let (_, credits) = send(
        &app.router,
        json_request("GET", "/api/v1/users/alice/credits", None),
    )
    .await;
    assert_eq!(credits, json!({ "credits": 0, "is_bankrupt": true }));

    let (status, recovery) = send(
        &app.router,
        json_request("POST", "/api/v1/users/alice/bankruptcy/recover", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(recovery, json!({ "recovered": true, "credits": 50 }));

    let (_, again) = send(
        &app.router,
        json_request("POST", "/api/v1/users/alice/bankruptcy/recover", None),
    )
    .await;
    assert_eq!(again["recovered"], false);
    assert_eq!(again["credits"], 50);

    let (status, stats) = send(
        &app.router,
        json_request("GET", "/api/v1/users/alice/stats", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // recovery balance plus the daily-login bonus
    assert_eq!(stats["credits"], 60);
    assert_eq!(stats["bankruptcy_count"], 1);
    assert_eq!(stats["is_bankrupt"], false);
    assert_eq!(stats["current_streak"], 1);
    assert_eq!(stats["total_credits_earned"], 10);

    let (status, _) = send(
        &app.router,
        json_request("GET", "/api/v1/users/nobody/stats", None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn progress_endpoints() {
    let app = create_test_app().await;

    let (status, stages) = send(
        &app.router,
        json_request("GET", "/api/v1/users/alice/stages", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stages.as_array().unwrap().len(), 4);
    assert_eq!(stages[0]["is_unlocked"], true);
    assert_eq!(stages[1]["is_unlocked"], false);

    let (status, _) = send(
        &app.router,
        json_request("GET", "/api/v1/users/alice/stages/expert", None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, advancement) = send(
        &app.router,
        json_request("GET", "/api/v1/users/alice/stages/k53/advancement", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(advancement["can_advance"], false);
    assert!(advancement["next_stage"].is_null());

    let (status, unlock) = send(
        &app.router,
        json_request("POST", "/api/v1/users/alice/stages/beginner/unlock", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(unlock["unlocked"], false);

    let (status, _) = send(
        &app.router,
        json_request("POST", "/api/v1/users/nobody/stages/beginner/unlock", None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, badges) = send(
        &app.router,
        json_request("GET", "/api/v1/users/alice/badges", None),
    )
    .await;
    assert_eq!(badges.as_array().unwrap().len(), 9);

    let (_, earned) = send(
        &app.router,
        json_request("GET", "/api/v1/users/nobody/badges/earned", None),
    )
    .await;
    assert_eq!(earned, json!([]));

    let (status, streak) = send(
        &app.router,
        json_request("POST", "/api/v1/users/alice/streak", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(streak["current_streak"], 1);
    assert_eq!(streak["next_streak_reward"], 7);
    let profile = app.store.get_profile("alice").await.unwrap().unwrap();
    assert_eq!(profile.credits, 10);
}

#[tokio::test]
async fn metrics_endpoint_exposes_request_counters() {
    let app = create_test_app().await;
    send(&app.router, json_request("GET", "/health", None)).await;

    let (status, body) = send(&app.router, json_request("GET", "/metrics", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.as_str().unwrap().contains("http_requests_total"));
}

#[tokio::test]
async fn sessions_are_isolated_per_user() {
    let app = create_test_app().await;
    send(
        &app.router,
        json_request(
            "POST",
            "/api/v1/users/alice/journey",
            Some(json!({ "journey_id": "town-loop", "car_type": "sedan" })),
        ),
    )
    .await;

    let (status, _) = send(
        &app.router,
        json_request("GET", "/api/v1/users/bob/journey", None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let engine = app.state.existing_engine("alice").await.unwrap();
    assert!(engine.lock().await.game_state().is_some());
}
