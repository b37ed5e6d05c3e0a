use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{parse_stage, ApiError};
use crate::models::game::AttemptSummary;
use crate::models::mastery::{
    Badge, GamificationStats, MasteryResult, StageProgress, StreakInfo, WeakArea,
};
use crate::services::AppState;

pub async fn all_stages(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<StageProgress>>, ApiError> {
    let progress = state.mastery_for(&user_id).all_stages_progress().await?;
    Ok(Json(progress))
}

pub async fn stage_progress(
    State(state): State<Arc<AppState>>,
    Path((user_id, stage)): Path<(String, String)>,
) -> Result<Json<StageProgress>, ApiError> {
    let stage = parse_stage(&stage)?;
    let progress = state.mastery_for(&user_id).stage_progress(stage).await?;
    Ok(Json(progress))
}

pub async fn advancement(
    State(state): State<Arc<AppState>>,
    Path((user_id, stage)): Path<(String, String)>,
) -> Result<Json<MasteryResult>, ApiError> {
    let stage = parse_stage(&stage)?;
    let result = state.mastery_for(&user_id).check_advancement(stage).await?;
    Ok(Json(result))
}

/// POST /api/v1/users/{user_id}/stages/{stage}/unlock - unlock the next stage if earned
pub async fn unlock_next_stage(
    State(state): State<Arc<AppState>>,
    Path((user_id, stage)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let stage = parse_stage(&stage)?;
    let unlocked = state.mastery_for(&user_id).unlock_next_stage(stage).await?;
    Ok(Json(json!({
        "unlocked": unlocked,
        "stage": if unlocked { stage.next() } else { None },
    })))
}

pub async fn weak_areas(
    State(state): State<Arc<AppState>>,
    Path((user_id, stage)): Path<(String, String)>,
) -> Result<Json<Vec<WeakArea>>, ApiError> {
    let stage = parse_stage(&stage)?;
    let areas = state.mastery_for(&user_id).weak_areas(stage).await?;
    Ok(Json(areas))
}

pub async fn all_badges(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Badge>>, ApiError> {
    let badges = state.mastery_for(&user_id).all_badges_with_progress().await?;
    Ok(Json(badges))
}

pub async fn earned_badges(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Badge>>, ApiError> {
    let badges = state.mastery_for(&user_id).earned_badges().await?;
    Ok(Json(badges))
}

pub async fn journey_history(
    State(state): State<Arc<AppState>>,
    Path((user_id, journey_id)): Path<(String, String)>,
) -> Result<Json<Vec<AttemptSummary>>, ApiError> {
    let history = state
        .mastery_for(&user_id)
        .journey_history(&journey_id)
        .await?;
    Ok(Json(history))
}

/// POST /api/v1/users/{user_id}/streak - record today's activity
pub async fn check_streak(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<StreakInfo>, ApiError> {
    let info = state
        .gamification_for(&user_id)
        .check_daily_streak(Utc::now())
        .await?;
    Ok(Json(info))
}

pub async fn credit_balance(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let credits = state.gamification_for(&user_id).credit_balance().await?;
    Ok(Json(json!({ "credits": credits, "is_bankrupt": credits <= 0 })))
}

/// GET /api/v1/users/{user_id}/stats - economy summary, counts as activity
pub async fn gamification_stats(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<GamificationStats>, ApiError> {
    let stats = state
        .gamification_for(&user_id)
        .gamification_stats(Utc::now())
        .await?;
    Ok(Json(stats))
}

/// POST /api/v1/users/{user_id}/bankruptcy/recover - daily restart balance
pub async fn recover_from_bankruptcy(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let gamification = state.gamification_for(&user_id);
    let recovered = gamification.offer_bankruptcy_recovery(Utc::now()).await?;
    let credits = gamification.credit_balance().await?;
    Ok(Json(json!({ "recovered": recovered, "credits": credits })))
}
