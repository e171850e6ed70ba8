use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::api::validation::non_blank;
use crate::core::metrics::CHAT_REPLIES;
use crate::core::state::AppState;
use crate::core::time::{format_offset, format_primitive, primitive_now_utc};
use crate::db::models::User;
use crate::repositories;
use crate::repositories::chat_facts::PgStudentFacts;
use crate::schemas::chat::{ChatHealthResponse, ChatRequest, ChatResponse};
use crate::services::cache::{self, CacheTag};
use crate::services::chat_fallback::{ChatMode, FallbackResponder};
use crate::services::rag_client::{HistoryTurn, RagChatRequest};
use crate::services::reporting::percentage;

const HISTORY_EXCHANGES: i64 = 5;
const CONTEXT_RESULTS: i64 = 5;

async fn conversation_history(state: &AppState, student_id: &str, session_id: &str) -> Vec<HistoryTurn> {
    let rows = match repositories::chat_messages::recent_for_session(
        state.db(),
        student_id,
        session_id,
        HISTORY_EXCHANGES,
    )
    .await
    {
        Ok(rows) => rows,
        Err(err) => {
            tracing::warn!(student_id, error = %err, "Failed to load chat history");
            return Vec::new();
        }
    };

    rows.into_iter()
        .flat_map(|row| {
            [
                HistoryTurn { role: "user".to_string(), content: row.message },
                HistoryTurn { role: "assistant".to_string(), content: row.reply },
            ]
        })
        .collect()
}

/// Profile and recent scores handed to the retrieval service.
async fn student_context(state: &AppState, student: &User) -> Value {
    let tags = [CacheTag::Student(student.id.clone())];
    let loaded = cache::get_or_load(
        state,
        "chat_context",
        &json!({ "student_id": student.id }),
        &tags,
        || async {
            let rows = repositories::results::history_for_student(
                state.db(),
                &student.id,
                Some(CONTEXT_RESULTS),
            )
            .await?;
            let recent: Vec<Value> = rows
                .iter()
                .map(|row| {
                    json!({
                        "assessment_title": row.assessment_title,
                        "category": row.category,
                        "score": row.score,
                        "total_questions": row.total_questions,
                        "percentage": percentage(row.score, row.total_questions),
                        "submitted_at": format_primitive(row.submitted_at),
                    })
                })
                .collect();
            Ok::<_, sqlx::Error>(json!({
                "full_name": student.full_name,
                "email": student.email,
                "recent_results": recent,
            }))
        },
    )
    .await;

    loaded.unwrap_or_else(|err| {
        tracing::warn!(student_id = %student.id, error = %err, "Failed to build chat context");
        json!({ "full_name": student.full_name, "email": student.email, "recent_results": [] })
    })
}

/// Answers through the retrieval service when it responds, otherwise from
/// templated database lookups.
pub(in crate::api::student) async fn chat(
    current: CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let auth = current.auth();
    let CurrentStudent(student) = current;
    payload.validate().map_err(ApiError::invalid)?;
    let message = payload.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("message must not be blank".to_string()));
    }
    let session_id = non_blank(&payload.session_id)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let request = RagChatRequest {
        student_id: student.id.clone(),
        message: message.to_string(),
        student_name: student.full_name.clone(),
        student_email: student.email.clone(),
        session_id: session_id.clone(),
        student_context: student_context(&state, &student).await,
        conversation_history: conversation_history(&state, &student.id, &session_id).await,
    };

    let response = match state.rag().chat(&request).await {
        Ok(reply) => ChatResponse {
            success: true,
            response: reply.message.clone(),
            message: reply.message,
            mode: reply.mode.unwrap_or_else(|| ChatMode::RagActive.as_str().to_string()),
            mode_name: reply
                .mode_name
                .unwrap_or_else(|| ChatMode::RagActive.display_name().to_string()),
            query_type: reply.query_type.unwrap_or_else(|| "general".to_string()),
            model_used: reply.model_used,
            data: reply.data.unwrap_or_else(|| json!({})),
            actions: reply.actions.unwrap_or_default(),
            follow_up_questions: reply.follow_up_questions.unwrap_or_default(),
            session_id: session_id.clone(),
            timestamp: format_offset(OffsetDateTime::now_utc()),
        },
        Err(err) => {
            tracing::warn!(student_id = %student.id, error = %err, "Retrieval chat unavailable, using limited mode");
            let facts = PgStudentFacts(state.db());
            let reply = FallbackResponder::new(&facts, &state.settings().api().public_url)
                .respond(&auth, message)
                .await;
            let actions = reply
                .actions
                .iter()
                .filter_map(|action| serde_json::to_value(action).ok())
                .collect();
            ChatResponse {
                success: true,
                response: reply.message.clone(),
                message: reply.message,
                mode: ChatMode::DatabaseOnly.as_str().to_string(),
                mode_name: ChatMode::DatabaseOnly.display_name().to_string(),
                query_type: reply.query_type.to_string(),
                model_used: None,
                data: reply.data,
                actions,
                follow_up_questions: reply.follow_up_questions,
                session_id: session_id.clone(),
                timestamp: format_offset(OffsetDateTime::now_utc()),
            }
        }
    };

    if let Err(err) = repositories::chat_messages::insert(
        state.db(),
        repositories::chat_messages::CreateChatMessage {
            student_id: &student.id,
            session_id: &session_id,
            message,
            reply: &response.message,
            mode: &response.mode,
            query_type: Some(&response.query_type),
            created_at: primitive_now_utc(),
        },
    )
    .await
    {
        tracing::error!(student_id = %student.id, error = %err, "Failed to store chat message");
    }

    metrics::counter!(CHAT_REPLIES, "mode" => response.mode.clone()).increment(1);
    Ok(Json(response))
}

pub(in crate::api::student) async fn chat_health(
    CurrentStudent(_student): CurrentStudent,
    State(state): State<AppState>,
) -> Json<ChatHealthResponse> {
    let rag = state.rag().health().await;
    let database = repositories::health::ping(state.db()).await;

    let mode = if rag.is_healthy() {
        ChatMode::RagActive
    } else if database.is_ok() {
        ChatMode::DatabaseOnly
    } else {
        ChatMode::Offline
    };

    Json(ChatHealthResponse {
        mode: mode.as_str(),
        mode_name: mode.display_name(),
        rag: rag.describe(),
        database: match database {
            Ok(()) => "healthy".to_string(),
            Err(err) => format!("unhealthy: {err}"),
        },
    })
}
