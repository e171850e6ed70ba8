use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rand::seq::SliceRandom;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::api::pagination::PaginatedResponse;
use crate::api::validation::non_blank;
use crate::core::metrics::SUBMISSIONS;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::repositories;
use crate::schemas::assessment::AssessmentResponse;
use crate::schemas::question::StudentQuestion;
use crate::schemas::student::{
    ResultQuestion, ResultResponse, StartResponse, StudentAssessmentItem,
    StudentAssessmentsQuery, SubmitRequest, SubmitResponse,
};
use crate::services::answer_key::{self, AnswerKey, SubmittedAnswer};
use crate::services::cache;
use crate::services::reporting::{is_pass, percentage, Grade};
use crate::services::scoring::{self, ScoredQuestion};

use super::super::helpers;

pub(in crate::api::student) async fn list_assessments(
    Query(params): Query<StudentAssessmentsQuery>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<StudentAssessmentItem>>, ApiError> {
    let now = primitive_now_utc();
    let filters = repositories::assessments::AssessmentFilters {
        category: non_blank(&params.category),
        difficulty: params.difficulty,
        status: None,
        search: non_blank(&params.search),
    };

    let assessments =
        repositories::assessments::list_open(state.db(), &filters, now, params.skip, params.limit)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list assessments"))?;
    let total_count = repositories::assessments::count_open(state.db(), &filters, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count assessments"))?;

    let ids: Vec<String> = assessments.iter().map(|assessment| assessment.id.clone()).collect();
    let question_counts: HashMap<String, i64> =
        repositories::assessments::active_question_counts(state.db(), &ids)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to count questions"))?
            .into_iter()
            .collect();
    let summaries: HashMap<String, _> =
        repositories::results::attempt_summaries(state.db(), &student.id, &ids)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load attempts"))?
            .into_iter()
            .map(|row| (row.assessment_id.clone(), row))
            .collect();

    let items = assessments
        .into_iter()
        .map(|assessment| {
            let count = question_counts.get(&assessment.id).copied().unwrap_or(0);
            let summary = summaries.get(&assessment.id);
            helpers::student_item(assessment, count, summary, now)
        })
        .collect();

    Ok(Json(PaginatedResponse::new(items, total_count, params.skip, params.limit)))
}

pub(in crate::api::student) async fn get_assessment(
    Path(assessment_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<StudentAssessmentItem>, ApiError> {
    let assessment = helpers::load_visible_assessment(&state, &assessment_id).await?;

    let question_count =
        repositories::assessments::count_active_questions(state.db(), &assessment.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;
    let summaries = repositories::results::attempt_summaries(
        state.db(),
        &student.id,
        std::slice::from_ref(&assessment.id),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to load attempts"))?;

    Ok(Json(helpers::student_item(
        assessment,
        question_count,
        summaries.first(),
        primitive_now_utc(),
    )))
}

/// Opens (or resumes) an attempt and hands out the questions in a fresh
/// random order, without answer keys.
pub(in crate::api::student) async fn start_assessment(
    Path(assessment_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<StartResponse>, ApiError> {
    let assessment = helpers::load_visible_assessment(&state, &assessment_id).await?;
    let now = primitive_now_utc();

    let prior = helpers::prior_attempts(&state, &student.id, &assessment.id).await?;
    helpers::gate(helpers::verdict(&assessment, now, prior))?;

    let linked = repositories::questions::list_active_for_assessment(state.db(), &assessment.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load questions"))?;
    if linked.is_empty() {
        return Err(ApiError::Conflict(helpers::NO_QUESTIONS.to_string()));
    }
    let total_marks: i32 = linked.iter().map(|item| item.question.marks).sum();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;
    let attempt =
        repositories::attempts::open(&mut tx, &student.id, &assessment.id, total_marks, now)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to open attempt"))?;
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    let mut questions: Vec<StudentQuestion> =
        linked.iter().map(|item| StudentQuestion::from_db(&item.question)).collect();
    questions.shuffle(&mut rand::thread_rng());

    tracing::info!(
        student_id = %student.id,
        assessment_id = %assessment.id,
        attempt_id = %attempt.id,
        "Assessment started"
    );

    Ok(Json(StartResponse {
        attempt_id: attempt.id,
        assessment: AssessmentResponse::from_db(assessment, linked.len() as i64),
        questions,
        started_at: format_primitive(attempt.started_at),
    }))
}

pub(in crate::api::student) async fn submit_assessment(
    Path(assessment_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    payload.validate().map_err(ApiError::invalid)?;

    let assessment = helpers::load_visible_assessment(&state, &assessment_id).await?;
    let now = primitive_now_utc();

    let prior = helpers::prior_attempts(&state, &student.id, &assessment.id).await?;
    helpers::gate(helpers::verdict(&assessment, now, prior))?;

    let linked = repositories::questions::list_active_for_assessment(state.db(), &assessment.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load questions"))?;
    let questions: Vec<ScoredQuestion> =
        linked.iter().map(|item| ScoredQuestion::from_question(&item.question)).collect();
    let answers: HashMap<String, SubmittedAnswer> = payload
        .answers
        .iter()
        .map(|(question_id, value)| (question_id.clone(), SubmittedAnswer::parse(value)))
        .collect();

    let outcome = scoring::score(&questions, &answers);
    if !outcome.has_questions() {
        return Err(ApiError::Conflict(helpers::NO_QUESTIONS.to_string()));
    }

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let result = helpers::insert_result(
        &mut tx,
        &student.id,
        &assessment,
        &outcome,
        payload.time_taken,
        now,
    )
    .await?;

    let result_percentage = percentage(result.score, result.total_questions);
    repositories::attempts::complete_open_for(
        &mut tx,
        &student.id,
        &assessment.id,
        repositories::attempts::CompleteAttempt {
            total_marks: outcome.total_marks,
            obtained_marks: outcome.obtained_marks,
            percentage: result_percentage,
            pass_status: helpers::pass_status(is_pass(
                result_percentage,
                assessment.pass_percentage,
            )),
            time_taken: payload.time_taken,
            result_id: &result.id,
            submitted_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to close attempt"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    cache::invalidate(&state, &cache::result_written(&student.id)).await;
    metrics::counter!(SUBMISSIONS, "flow" => "direct").increment(1);
    tracing::info!(
        student_id = %student.id,
        assessment_id = %assessment.id,
        result_id = %result.id,
        score = result.score,
        total = result.total_questions,
        "Assessment submitted"
    );

    Ok((StatusCode::CREATED, Json(helpers::submit_response(&assessment, &result, &outcome))))
}

pub(in crate::api::student) async fn get_result(
    Path(assessment_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<ResultResponse>, ApiError> {
    let assessment = helpers::load_visible_assessment(&state, &assessment_id).await?;

    let result = repositories::results::latest_for_student_assessment(
        state.db(),
        &student.id,
        &assessment.id,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to load result"))?
    .ok_or_else(|| ApiError::NotFound("No result found for this assessment".to_string()))?;

    let linked = repositories::questions::list_linked(state.db(), &assessment.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load questions"))?;

    let questions = linked
        .into_iter()
        .map(|item| {
            let question = item.question;
            let key = answer_key::key_for(&question);
            let student_answer = result.answers.0.get(&question.id).cloned();
            let is_correct = student_answer
                .as_deref()
                .map(|answer| answer_key::is_correct(key, SubmittedAnswer::parse_str(answer)))
                .unwrap_or(false);

            ResultQuestion {
                options: answer_key::options_for(&question),
                question_id: question.id,
                question_text: question.question_text,
                student_answer,
                is_correct,
                correct_answer: if assessment.show_correct_answers {
                    key.map(AnswerKey::letter)
                } else {
                    None
                },
            }
        })
        .collect();

    let result_percentage = percentage(result.score, result.total_questions);
    Ok(Json(ResultResponse {
        result_id: result.id,
        assessment_id: assessment.id,
        assessment_title: assessment.title,
        attempt_number: result.attempt_number,
        score: result.score,
        total_questions: result.total_questions,
        percentage: result_percentage,
        grade: Grade::from_percentage(result_percentage).as_str(),
        passed: is_pass(result_percentage, assessment.pass_percentage),
        pass_percentage: assessment.pass_percentage,
        time_taken: result.time_taken,
        submitted_at: format_primitive(result.submitted_at),
        questions,
    }))
}
