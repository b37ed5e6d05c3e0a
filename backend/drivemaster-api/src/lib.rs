use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod rules;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/api/v1/journeys", get(handlers::journeys::list_journeys))
        .nest("/api/v1/users/{user_id}", user_routes())
        .with_state(app_state)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Journey session
        .route(
            "/journey",
            get(handlers::journeys::get_game_state).post(handlers::journeys::start_journey),
        )
        .route("/journey/answers", post(handlers::journeys::submit_answer))
        .route("/journey/advance", post(handlers::journeys::advance_journey))
        .route("/journey/end", post(handlers::journeys::end_journey))
        .route("/journey/quit", post(handlers::journeys::quit_journey))
        .route(
            "/journey/checkpoint",
            post(handlers::journeys::save_checkpoint),
        )
        .route(
            "/journey/checkpoint/{checkpoint_id}/restore",
            post(handlers::journeys::restore_checkpoint),
        )
        // Mastery
        .route("/stages", get(handlers::progress::all_stages))
        .route("/stages/{stage}", get(handlers::progress::stage_progress))
        .route(
            "/stages/{stage}/advancement",
            get(handlers::progress::advancement),
        )
        .route(
            "/stages/{stage}/unlock",
            post(handlers::progress::unlock_next_stage),
        )
        .route(
            "/stages/{stage}/weak-areas",
            get(handlers::progress::weak_areas),
        )
        .route("/badges", get(handlers::progress::all_badges))
        .route("/badges/earned", get(handlers::progress::earned_badges))
        .route(
            "/journeys/{journey_id}/history",
            get(handlers::progress::journey_history),
        )
        // Gamification
        .route("/streak", post(handlers::progress::check_streak))
        .route("/credits", get(handlers::progress::credit_balance))
        .route("/stats", get(handlers::progress::gamification_stats))
        .route(
            "/bankruptcy/recover",
            post(handlers::progress::recover_from_bankruptcy),
        )
}
