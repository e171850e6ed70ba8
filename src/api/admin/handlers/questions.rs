use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::pagination::PaginatedResponse;
use crate::api::validation::non_blank;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::Question;
use crate::repositories;
use crate::schemas::question::{ListQuestionsQuery, QuestionCreate, QuestionResponse, QuestionUpdate};
use crate::services::answer_key;
use crate::services::cache::{self, CacheTag};

/// Question edits change counts and texts shown in assessment lists and reports.
const QUESTION_TAGS: [CacheTag; 2] = [CacheTag::Assessments, CacheTag::Reports];

async fn load_question(state: &AppState, question_id: &str) -> Result<Question, ApiError> {
    repositories::questions::find_by_id(state.db(), question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load question"))?
        .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))
}

pub(in crate::api::admin) async fn list_questions(
    Query(params): Query<ListQuestionsQuery>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<QuestionResponse>>, ApiError> {
    let filters = repositories::questions::QuestionFilters {
        category: non_blank(&params.category),
        difficulty: params.difficulty,
        is_active: params.is_active,
        search: non_blank(&params.search),
    };

    let questions = repositories::questions::list(state.db(), &filters, params.skip, params.limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list questions"))?;
    let total_count = repositories::questions::count(state.db(), &filters)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;

    let items = questions.into_iter().map(|question| QuestionResponse::from_db(question, None)).collect();
    Ok(Json(PaginatedResponse::new(items, total_count, params.skip, params.limit)))
}

pub(in crate::api::admin) async fn create_question(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<QuestionCreate>,
) -> Result<(StatusCode, Json<QuestionResponse>), ApiError> {
    payload.validate().map_err(ApiError::invalid)?;
    let options = payload.option_list().map_err(ApiError::BadRequest)?;
    let key = payload.answer_key().map_err(ApiError::BadRequest)?;

    let question = repositories::questions::create(
        state.db(),
        repositories::questions::CreateQuestion {
            question_text: payload.question_text.trim(),
            options: &options,
            correct_letter: key.letter(),
            category: payload.category.trim(),
            difficulty: payload.difficulty,
            marks: payload.marks,
            time_per_question: payload.time_per_question,
            is_active: payload.is_active,
            created_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create question"))?;

    cache::invalidate(&state, &QUESTION_TAGS).await;
    super::rag::schedule_sync(&state);
    tracing::info!(admin_id = %admin.id, question_id = %question.id, "Question created");

    Ok((StatusCode::CREATED, Json(QuestionResponse::from_db(question, None))))
}

pub(in crate::api::admin) async fn get_question(
    Path(question_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<QuestionResponse>, ApiError> {
    let question = load_question(&state, &question_id).await?;
    Ok(Json(QuestionResponse::from_db(question, None)))
}

pub(in crate::api::admin) async fn update_question(
    Path(question_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<QuestionUpdate>,
) -> Result<Json<QuestionResponse>, ApiError> {
    payload.validate().map_err(ApiError::invalid)?;
    let current = load_question(&state, &question_id).await?;

    let options =
        payload.merged_options(answer_key::options_for(&current)).map_err(ApiError::BadRequest)?;
    let key = payload.answer_key().map_err(ApiError::BadRequest)?;

    let question = repositories::questions::update(
        state.db(),
        &current.id,
        repositories::questions::UpdateQuestion {
            question_text: payload.question_text.as_deref().map(str::trim),
            options: options.as_deref(),
            correct_letter: key.map(answer_key::AnswerKey::letter),
            category: payload.category.as_deref().map(str::trim),
            difficulty: payload.difficulty,
            marks: payload.marks,
            time_per_question: payload.time_per_question,
            is_active: payload.is_active,
        },
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update question"))?
    .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))?;

    cache::invalidate(&state, &QUESTION_TAGS).await;
    super::rag::schedule_sync(&state);
    tracing::info!(admin_id = %admin.id, question_id = %question.id, "Question updated");

    Ok(Json(QuestionResponse::from_db(question, None)))
}

/// Refused while any attempt history points at the question; otherwise the
/// question is unlinked from every assessment and removed.
pub(in crate::api::admin) async fn delete_question(
    Path(question_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let question = load_question(&state, &question_id).await?;

    let referenced = repositories::questions::is_referenced(state.db(), &question.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check question usage"))?;
    if referenced {
        return Err(ApiError::Conflict(
            "Question has recorded attempts and cannot be deleted; deactivate it instead"
                .to_string(),
        ));
    }

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;
    let deleted = repositories::questions::delete(&mut tx, &question.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete question"))?;
    if !deleted {
        return Err(ApiError::NotFound("Question not found".to_string()));
    }
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    cache::invalidate(&state, &QUESTION_TAGS).await;
    super::rag::schedule_sync(&state);
    tracing::info!(admin_id = %admin.id, question_id = %question.id, "Question deleted");

    Ok(StatusCode::NO_CONTENT)
}
