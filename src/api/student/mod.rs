mod handlers;
mod helpers;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/assessments", get(handlers::list_assessments))
        .route("/assessments/:assessment_id", get(handlers::get_assessment))
        .route("/assessments/:assessment_id/start", post(handlers::start_assessment))
        .route("/assessments/:assessment_id/submit", post(handlers::submit_assessment))
        .route("/assessments/:assessment_id/result", get(handlers::get_result))
        .route("/attempts/:attempt_id/answers", put(handlers::save_answer))
        .route("/attempts/:attempt_id/submit", post(handlers::submit_attempt))
        .route("/history", get(handlers::history))
        .route("/analytics", get(handlers::analytics))
        .route("/chat", post(handlers::chat))
        .route("/chat/health", get(handlers::chat_health))
}

#[cfg(test)]
mod tests;
