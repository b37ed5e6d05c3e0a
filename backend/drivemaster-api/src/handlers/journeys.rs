use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::{parse_stage, ApiError};
use crate::error::EngineError;
use crate::extractors::ValidJson;
use crate::models::content::JourneySummary;
use crate::models::game::{
    AdvanceResponse, CheckpointResponse, GameStateView, QuitResponse, StartJourneyRequest,
    SubmitAnswerRequest,
};
use crate::services::{AppState, SharedEngine};

#[derive(Debug, Deserialize)]
pub struct JourneyListQuery {
    pub stage: String,
}

/// GET /api/v1/journeys?stage= - published journeys of a stage
pub async fn list_journeys(
    State(state): State<Arc<AppState>>,
    Query(query): Query<JourneyListQuery>,
) -> Result<Json<Vec<JourneySummary>>, ApiError> {
    let stage = parse_stage(&query.stage)?;
    let journeys = state
        .content
        .journeys_by_stage(stage)
        .await
        .map_err(EngineError::from)?;
    Ok(Json(journeys.iter().map(JourneySummary::from).collect()))
}

/// POST /api/v1/users/{user_id}/journey - start (or restart) a journey
pub async fn start_journey(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    ValidJson(req): ValidJson<StartJourneyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(
        "Starting journey for user_id={}, journey_id={}",
        user_id,
        req.journey_id
    );

    let engine = state.engine_for(&user_id).await;
    let view = {
        let mut engine = engine.lock().await;
        engine
            .start_journey(&req.journey_id, &req.car_type)
            .await
            .map(GameStateView::from)
    };
    drop(engine);
    state.release_if_idle(&user_id).await;

    Ok((StatusCode::CREATED, Json(view?)))
}

/// GET /api/v1/users/{user_id}/journey - current session
pub async fn get_game_state(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<GameStateView>, ApiError> {
    let engine = state
        .existing_engine(&user_id)
        .await
        .ok_or_else(|| ApiError::not_found("no active journey"))?;
    let engine = engine.lock().await;
    engine
        .game_state()
        .map(|game_state| Json(GameStateView::from(game_state)))
        .ok_or_else(|| ApiError::not_found("no active journey"))
}

/// Engine of a user with a session in flight.
async fn active_engine(state: &AppState, user_id: &str) -> Result<SharedEngine, ApiError> {
    state
        .existing_engine(user_id)
        .await
        .ok_or_else(|| EngineError::invalid_state("no active journey").into())
}

pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    ValidJson(req): ValidJson<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = active_engine(&state, &user_id).await?;
    let mut engine = engine.lock().await;
    let result = engine
        .validate_answer(&req.question_id, &req.selected_option_id, req.time_to_answer)
        .await?;
    Ok(Json(result))
}

pub async fn advance_journey(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<AdvanceResponse>, ApiError> {
    let engine = active_engine(&state, &user_id).await?;
    let mut engine = engine.lock().await;
    let has_more = engine.advance_journey().await?;
    Ok(Json(AdvanceResponse {
        has_more,
        state: engine.game_state().map(GameStateView::from),
    }))
}

/// POST /api/v1/users/{user_id}/journey/end - score and persist the attempt
pub async fn end_journey(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = active_engine(&state, &user_id).await?;
    let result = engine.lock().await.end_journey().await;
    drop(engine);
    state.release_if_idle(&user_id).await;

    Ok(Json(result?))
}

pub async fn quit_journey(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<QuitResponse>, ApiError> {
    let engine = active_engine(&state, &user_id).await?;
    let result = engine.lock().await.quit_journey().await;
    drop(engine);
    state.release_if_idle(&user_id).await;

    let (penalty, credits) = result?;
    Ok(Json(QuitResponse { penalty, credits }))
}

pub async fn save_checkpoint(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = active_engine(&state, &user_id).await?;
    let mut engine = engine.lock().await;
    let checkpoint_id = engine.save_checkpoint().await?;
    Ok((StatusCode::CREATED, Json(CheckpointResponse { checkpoint_id })))
}

pub async fn restore_checkpoint(
    State(state): State<Arc<AppState>>,
    Path((user_id, checkpoint_id)): Path<(String, String)>,
) -> Result<Json<GameStateView>, ApiError> {
    tracing::info!("Restoring checkpoint {} for user {}", checkpoint_id, user_id);

    let engine = state.engine_for(&user_id).await;
    let view = {
        let mut engine = engine.lock().await;
        engine
            .restore_checkpoint(&checkpoint_id)
            .await
            .map(GameStateView::from)
    };
    drop(engine);
    state.release_if_idle(&user_id).await;

    Ok(Json(view?))
}
