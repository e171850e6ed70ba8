mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(handlers::list_categories).post(handlers::create_category))
        .route("/questions", get(handlers::list_questions).post(handlers::create_question))
        .route(
            "/questions/:question_id",
            get(handlers::get_question).put(handlers::update_question).delete(handlers::delete_question),
        )
        .route("/assessments", get(handlers::list_assessments).post(handlers::create_assessment))
        .route(
            "/assessments/:assessment_id",
            get(handlers::get_assessment)
                .put(handlers::update_assessment)
                .delete(handlers::delete_assessment),
        )
        .route("/assessments/:assessment_id/status", post(handlers::set_assessment_status))
        .route("/assessments/:assessment_id/duplicate", post(handlers::duplicate_assessment))
        .route("/assessments/:assessment_id/questions", post(handlers::link_question))
        .route(
            "/assessments/:assessment_id/questions/:question_id",
            axum::routing::delete(handlers::unlink_question),
        )
        .route("/students", get(handlers::list_students))
        .route("/students/bulk-approve", post(handlers::bulk_approve))
        .route("/students/bulk-reject", post(handlers::bulk_reject))
        .route("/students/:student_id", get(handlers::get_student))
        .route("/students/:student_id/approve", post(handlers::approve_student))
        .route("/students/:student_id/reject", post(handlers::reject_student))
        .route("/reports", get(handlers::overview))
        .route("/reports/assessments/:assessment_id", get(handlers::assessment_report))
        .route("/reports/students", get(handlers::student_report))
        .route("/reports/categories", get(handlers::category_report))
        .route("/reports/questions/:assessment_id", get(handlers::question_report))
        .route("/reports/export", get(handlers::export_results))
        .route("/rag/sync", post(handlers::sync_knowledge))
}

#[cfg(test)]
mod tests;
