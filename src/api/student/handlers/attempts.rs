use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::core::metrics::SUBMISSIONS;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::models::StudentAssessment;
use crate::db::types::AttemptStatus;
use crate::repositories;
use crate::schemas::student::{
    AnswerResponse, AnswerUpsertRequest, AttemptSubmitRequest, SubmitResponse,
};
use crate::services::answer_key::SubmittedAnswer;
use crate::services::cache;
use crate::services::reporting::{is_pass, percentage};
use crate::services::scoring::{self, ScoredQuestion};

use super::super::helpers;

const ALREADY_SUBMITTED: &str = "This attempt has already been submitted";

async fn load_open_attempt(
    state: &AppState,
    attempt_id: &str,
    student_id: &str,
) -> Result<StudentAssessment, ApiError> {
    let attempt = repositories::attempts::find_for_student(state.db(), attempt_id, student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;

    if attempt.status != AttemptStatus::InProgress {
        return Err(ApiError::Conflict(ALREADY_SUBMITTED.to_string()));
    }
    Ok(attempt)
}

/// Saves one answer of an open attempt; `null` clears it.
pub(in crate::api::student) async fn save_answer(
    Path(attempt_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<AnswerUpsertRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    if payload.time_spent < 0 {
        return Err(ApiError::BadRequest("time_spent must not be negative".to_string()));
    }

    let attempt = load_open_attempt(&state, &attempt_id, &student.id).await?;

    let linked =
        repositories::questions::list_active_for_assessment(state.db(), &attempt.assessment_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load questions"))?;
    if !linked.iter().any(|item| item.question.id == payload.question_id) {
        return Err(ApiError::BadRequest(
            "Question does not belong to this assessment".to_string(),
        ));
    }

    let stored = match &payload.answer {
        Value::Null => None,
        value => Some(SubmittedAnswer::parse(value).stored_letter().ok_or_else(|| {
            ApiError::BadRequest("answer must be one of A-D or 0-3".to_string())
        })?),
    };

    let saved = repositories::attempts::upsert_answer(
        state.db(),
        &attempt.id,
        &payload.question_id,
        stored.as_deref(),
        payload.time_spent,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to save answer"))?;

    Ok(Json(AnswerResponse {
        attempt_id: attempt.id,
        question_id: saved.question_id,
        student_answer: saved.student_answer,
        time_spent: saved.time_spent,
        saved_at: format_primitive(saved.updated_at),
    }))
}

/// Grades the saved answers and records the result in one transaction.
pub(in crate::api::student) async fn submit_attempt(
    Path(attempt_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<AttemptSubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    payload.validate().map_err(ApiError::invalid)?;

    let attempt = load_open_attempt(&state, &attempt_id, &student.id).await?;
    let assessment = helpers::load_visible_assessment(&state, &attempt.assessment_id).await?;
    let now = primitive_now_utc();

    let prior = helpers::prior_attempts(&state, &student.id, &assessment.id).await?;
    helpers::gate(helpers::verdict(&assessment, now, prior))?;

    let linked = repositories::questions::list_active_for_assessment(state.db(), &assessment.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load questions"))?;
    let questions: Vec<ScoredQuestion> =
        linked.iter().map(|item| ScoredQuestion::from_question(&item.question)).collect();

    let saved = repositories::attempts::list_answers(state.db(), &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load saved answers"))?;
    let answers: HashMap<String, SubmittedAnswer> = saved
        .iter()
        .filter_map(|answer| {
            answer
                .student_answer
                .as_deref()
                .map(|letter| (answer.question_id.clone(), SubmittedAnswer::parse_str(letter)))
        })
        .collect();

    let outcome = scoring::score(&questions, &answers);
    if !outcome.has_questions() {
        return Err(ApiError::Conflict(helpers::NO_QUESTIONS.to_string()));
    }

    let time_taken = payload.time_taken.unwrap_or_else(|| {
        (now - attempt.started_at).whole_seconds().clamp(1, i64::from(i32::MAX)) as i32
    });

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    for item in &outcome.per_question {
        repositories::attempts::grade_answer(
            &mut tx,
            &attempt.id,
            &item.question_id,
            item.is_correct,
            item.marks_obtained,
            now,
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to grade answer"))?;
    }

    let result =
        helpers::insert_result(&mut tx, &student.id, &assessment, &outcome, time_taken, now)
            .await?;

    let result_percentage = percentage(result.score, result.total_questions);
    let completed = repositories::attempts::complete(
        &mut tx,
        &attempt.id,
        repositories::attempts::CompleteAttempt {
            total_marks: outcome.total_marks,
            obtained_marks: outcome.obtained_marks,
            percentage: result_percentage,
            pass_status: helpers::pass_status(is_pass(
                result_percentage,
                assessment.pass_percentage,
            )),
            time_taken,
            result_id: &result.id,
            submitted_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to close attempt"))?;
    if completed.is_none() {
        return Err(ApiError::Conflict(ALREADY_SUBMITTED.to_string()));
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    cache::invalidate(&state, &cache::result_written(&student.id)).await;
    metrics::counter!(SUBMISSIONS, "flow" => "incremental").increment(1);
    tracing::info!(
        student_id = %student.id,
        attempt_id = %attempt.id,
        result_id = %result.id,
        score = result.score,
        total = result.total_questions,
        "Attempt submitted"
    );

    Ok((StatusCode::CREATED, Json(helpers::submit_response(&assessment, &result, &outcome))))
}
