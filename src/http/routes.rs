use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Draft recovery (checked before any interview UI)
        .route("/interviews/draft/:account_id", get(handlers::draft_status))
        .route(
            "/interviews/draft/:account_id",
            delete(handlers::discard_draft),
        )
        // Session lifecycle
        .route("/interviews/start", post(handlers::start_session))
        .route("/interviews/resume", post(handlers::resume_session))
        .route("/interviews/:session_id/cancel", post(handlers::cancel))
        // Conversation
        .route("/interviews/:session_id/theme", post(handlers::select_theme))
        .route("/interviews/:session_id/respond", post(handlers::respond))
        .route("/interviews/:session_id/spoken", post(handlers::spoken))
        .route("/interviews/:session_id/retry", post(handlers::retry))
        // Completion
        .route("/interviews/:session_id/finish", post(handlers::finish))
        .route("/interviews/:session_id/split", post(handlers::split_decision))
        // Queries
        .route("/interviews/:session_id/status", get(handlers::status))
        .route("/interviews/:session_id/result", get(handlers::result))
        // Tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
