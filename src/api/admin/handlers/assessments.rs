use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::pagination::PaginatedResponse;
use crate::api::validation::non_blank;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::Assessment;
use crate::db::types::AssessmentStatus;
use crate::repositories;
use crate::schemas::assessment::{
    AdminAssessmentsQuery, AssessmentCreate, AssessmentDetailResponse, AssessmentResponse,
    AssessmentUpdate, LinkQuestionRequest, StatusRequest,
};
use crate::schemas::question::QuestionResponse;
use crate::services::cache::{self, CacheTag};

const ASSESSMENT_TAGS: [CacheTag; 2] = [CacheTag::Assessments, CacheTag::Reports];

async fn load_assessment(state: &AppState, assessment_id: &str) -> Result<Assessment, ApiError> {
    repositories::assessments::find_by_id(state.db(), assessment_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load assessment"))?
        .ok_or_else(|| ApiError::NotFound("Assessment not found".to_string()))
}

async fn active_questions(state: &AppState, assessment_id: &str) -> Result<i64, ApiError> {
    repositories::assessments::count_active_questions(state.db(), assessment_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count questions"))
}

pub(in crate::api::admin) async fn list_assessments(
    Query(params): Query<AdminAssessmentsQuery>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<AssessmentResponse>>, ApiError> {
    let filters = repositories::assessments::AssessmentFilters {
        category: non_blank(&params.category),
        difficulty: params.difficulty,
        status: params.status,
        search: non_blank(&params.search),
    };
    let cache_params = json!({
        "category": filters.category,
        "difficulty": filters.difficulty,
        "status": filters.status,
        "search": filters.search,
        "skip": params.skip,
        "limit": params.limit,
    });

    let page = cache::get_or_load(
        &state,
        "admin_assessments",
        &cache_params,
        &[CacheTag::Assessments],
        || async {
            let assessments = repositories::assessments::list(
                state.db(),
                &filters,
                params.skip,
                params.limit,
            )
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list assessments"))?;
            let total_count = repositories::assessments::count(state.db(), &filters)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to count assessments"))?;

            let ids: Vec<String> = assessments.iter().map(|a| a.id.clone()).collect();
            let counts: HashMap<String, i64> =
                repositories::assessments::active_question_counts(state.db(), &ids)
                    .await
                    .map_err(|e| ApiError::internal(e, "Failed to count questions"))?
                    .into_iter()
                    .collect();

            let items = assessments
                .into_iter()
                .map(|assessment| {
                    let count = counts.get(&assessment.id).copied().unwrap_or(0);
                    AssessmentResponse::from_db(assessment, count)
                })
                .collect();
            Ok::<_, ApiError>(PaginatedResponse::new(items, total_count, params.skip, params.limit))
        },
    )
    .await?;

    Ok(Json(page))
}

/// New assessments start as drafts; they are published through the status
/// endpoint once questions are linked.
pub(in crate::api::admin) async fn create_assessment(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<AssessmentCreate>,
) -> Result<(StatusCode, Json<AssessmentResponse>), ApiError> {
    payload.validate().map_err(ApiError::invalid)?;

    let pass_percentage = payload
        .pass_percentage
        .unwrap_or(state.settings().reporting().default_pass_percentage);

    let assessment = repositories::assessments::create(
        state.db(),
        repositories::assessments::CreateAssessment {
            title: payload.title.trim(),
            description: non_blank(&payload.description),
            category: payload.category.trim(),
            difficulty: payload.difficulty,
            duration_minutes: payload.duration_minutes,
            total_marks: payload.total_marks,
            pass_percentage,
            start_date: payload.start_date,
            end_date: payload.end_date,
            allow_multiple_attempts: payload.allow_multiple_attempts,
            show_results_immediately: payload.show_results_immediately,
            show_correct_answers: payload.show_correct_answers,
            created_by: &admin.id,
            created_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create assessment"))?;

    cache::invalidate(&state, &ASSESSMENT_TAGS).await;
    super::rag::schedule_sync(&state);
    tracing::info!(admin_id = %admin.id, assessment_id = %assessment.id, "Assessment created");

    Ok((StatusCode::CREATED, Json(AssessmentResponse::from_db(assessment, 0))))
}

pub(in crate::api::admin) async fn get_assessment(
    Path(assessment_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<AssessmentDetailResponse>, ApiError> {
    let assessment = load_assessment(&state, &assessment_id).await?;

    let linked = repositories::questions::list_linked(state.db(), &assessment.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load questions"))?;
    let result_count = repositories::assessments::count_results(state.db(), &assessment.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count results"))?;

    let active = linked.iter().filter(|item| item.question.is_active).count() as i64;
    let questions = linked
        .into_iter()
        .map(|item| QuestionResponse::from_db(item.question, Some(item.order_index)))
        .collect();

    Ok(Json(AssessmentDetailResponse {
        assessment: AssessmentResponse::from_db(assessment, active),
        questions,
        result_count,
    }))
}

pub(in crate::api::admin) async fn update_assessment(
    Path(assessment_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<AssessmentUpdate>,
) -> Result<Json<AssessmentResponse>, ApiError> {
    payload.validate().map_err(ApiError::invalid)?;
    let current = load_assessment(&state, &assessment_id).await?;

    let start = payload.start_date.unwrap_or(current.start_date);
    let end = payload.end_date.unwrap_or(current.end_date);
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(ApiError::BadRequest(
                "end_date must not be before start_date".to_string(),
            ));
        }
    }

    let assessment = repositories::assessments::update(
        state.db(),
        &current.id,
        repositories::assessments::UpdateAssessment {
            title: payload.title.as_deref().map(str::trim),
            description: payload.description.as_deref(),
            category: payload.category.as_deref().map(str::trim),
            difficulty: payload.difficulty,
            duration_minutes: payload.duration_minutes,
            total_marks: payload.total_marks,
            pass_percentage: payload.pass_percentage,
            start_date: payload.start_date,
            end_date: payload.end_date,
            allow_multiple_attempts: payload.allow_multiple_attempts,
            show_results_immediately: payload.show_results_immediately,
            show_correct_answers: payload.show_correct_answers,
        },
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update assessment"))?
    .ok_or_else(|| ApiError::NotFound("Assessment not found".to_string()))?;

    let count = active_questions(&state, &assessment.id).await?;
    cache::invalidate(&state, &ASSESSMENT_TAGS).await;
    super::rag::schedule_sync(&state);
    tracing::info!(admin_id = %admin.id, assessment_id = %assessment.id, "Assessment updated");

    Ok(Json(AssessmentResponse::from_db(assessment, count)))
}

pub(in crate::api::admin) async fn delete_assessment(
    Path(assessment_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let assessment = load_assessment(&state, &assessment_id).await?;

    let results = repositories::assessments::count_results(state.db(), &assessment.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count results"))?;
    if results > 0 {
        return Err(ApiError::Conflict(
            "Assessment has recorded results and cannot be deleted".to_string(),
        ));
    }

    let deleted = repositories::assessments::delete(state.db(), &assessment.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete assessment"))?;
    if !deleted {
        return Err(ApiError::NotFound("Assessment not found".to_string()));
    }

    cache::invalidate(&state, &ASSESSMENT_TAGS).await;
    super::rag::schedule_sync(&state);
    tracing::info!(admin_id = %admin.id, assessment_id = %assessment.id, "Assessment deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub(in crate::api::admin) async fn set_assessment_status(
    Path(assessment_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<AssessmentResponse>, ApiError> {
    let current = load_assessment(&state, &assessment_id).await?;
    let count = active_questions(&state, &current.id).await?;

    if payload.status == AssessmentStatus::Active && count == 0 {
        return Err(ApiError::Conflict(
            "Link at least one active question before activating".to_string(),
        ));
    }

    let assessment = repositories::assessments::set_status(
        state.db(),
        &current.id,
        payload.status,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update status"))?
    .ok_or_else(|| ApiError::NotFound("Assessment not found".to_string()))?;

    cache::invalidate(&state, &ASSESSMENT_TAGS).await;
    super::rag::schedule_sync(&state);
    tracing::info!(
        admin_id = %admin.id,
        assessment_id = %assessment.id,
        status = ?assessment.status,
        "Assessment status changed"
    );

    Ok(Json(AssessmentResponse::from_db(assessment, count)))
}

pub(in crate::api::admin) async fn duplicate_assessment(
    Path(assessment_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<AssessmentResponse>), ApiError> {
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let copy = repositories::assessments::duplicate(
        &mut tx,
        &assessment_id,
        &admin.id,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to duplicate assessment"))?
    .ok_or_else(|| ApiError::NotFound("Assessment not found".to_string()))?;
    let count = repositories::assessments::count_active_questions(&mut *tx, &copy.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    cache::invalidate(&state, &ASSESSMENT_TAGS).await;
    super::rag::schedule_sync(&state);
    tracing::info!(
        admin_id = %admin.id,
        source_id = %assessment_id,
        assessment_id = %copy.id,
        "Assessment duplicated"
    );

    Ok((StatusCode::CREATED, Json(AssessmentResponse::from_db(copy, count))))
}

pub(in crate::api::admin) async fn link_question(
    Path(assessment_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<LinkQuestionRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.order_index.is_some_and(|order| order < 0) {
        return Err(ApiError::BadRequest("order_index must not be negative".to_string()));
    }
    let assessment = load_assessment(&state, &assessment_id).await?;
    let question = repositories::questions::find_by_id(state.db(), &payload.question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load question"))?
        .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))?;

    let order_index = repositories::assessments::link_question(
        state.db(),
        &assessment.id,
        &question.id,
        payload.order_index,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to link question"))?;

    cache::invalidate(&state, &ASSESSMENT_TAGS).await;
    super::rag::schedule_sync(&state);
    tracing::info!(
        admin_id = %admin.id,
        assessment_id = %assessment.id,
        question_id = %question.id,
        order_index,
        "Question linked"
    );

    Ok(Json(json!({
        "assessment_id": assessment.id,
        "question_id": question.id,
        "order_index": order_index,
    })))
}

pub(in crate::api::admin) async fn unlink_question(
    Path((assessment_id, question_id)): Path<(String, String)>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let removed =
        repositories::assessments::unlink_question(state.db(), &assessment_id, &question_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to unlink question"))?;
    if !removed {
        return Err(ApiError::NotFound("Question is not linked to this assessment".to_string()));
    }

    cache::invalidate(&state, &ASSESSMENT_TAGS).await;
    super::rag::schedule_sync(&state);
    tracing::info!(
        admin_id = %admin.id,
        assessment_id = %assessment_id,
        question_id = %question_id,
        "Question unlinked"
    );

    Ok(StatusCode::NO_CONTENT)
}
