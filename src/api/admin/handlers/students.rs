use axum::extract::{Path, Query, State};
use axum::Json;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::pagination::PaginatedResponse;
use crate::api::validation::non_blank;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::models::User;
use crate::db::types::ApprovalStatus;
use crate::repositories;
use crate::schemas::user::{
    BulkDecisionRequest, DecisionResponse, ListStudentsQuery, RejectRequest, StudentDetailResponse,
    StudentResultLine, UserResponse,
};
use crate::services::cache::{self, CacheTag};
use crate::services::reporting::{self, is_pass, percentage, Grade, Sample};

pub(in crate::api::admin) async fn list_students(
    Query(params): Query<ListStudentsQuery>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<UserResponse>>, ApiError> {
    let filter = repositories::users::StudentFilter {
        status: params.status,
        search: non_blank(&params.search),
    };

    let students =
        repositories::users::list_students(state.db(), &filter, params.skip, params.limit)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list students"))?;
    let total_count = repositories::users::count_students(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count students"))?;

    let items = students.into_iter().map(UserResponse::from_db).collect();
    Ok(Json(PaginatedResponse::new(items, total_count, params.skip, params.limit)))
}

pub(in crate::api::admin) async fn get_student(
    Path(student_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<StudentDetailResponse>, ApiError> {
    let student = repositories::users::find_student(state.db(), &student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load student"))?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;

    let rows = repositories::results::history_for_student(state.db(), &student.id, None)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load results"))?;

    let samples: Vec<Sample> = rows
        .iter()
        .map(|row| Sample::new(row.score, row.total_questions, row.time_taken, row.pass_percentage))
        .collect();
    let results = rows
        .into_iter()
        .map(|row| {
            let row_percentage = percentage(row.score, row.total_questions);
            StudentResultLine {
                result_id: row.id,
                assessment_id: row.assessment_id,
                assessment_title: row.assessment_title,
                score: row.score,
                total_questions: row.total_questions,
                percentage: row_percentage,
                grade: Grade::from_percentage(row_percentage).as_str(),
                passed: is_pass(row_percentage, row.pass_percentage),
                submitted_at: format_primitive(row.submitted_at),
            }
        })
        .collect();

    Ok(Json(StudentDetailResponse {
        student: UserResponse::from_db(student),
        summary: reporting::summarize(&samples),
        results,
    }))
}

/// Applies one decision to every id inside a single transaction; any id that
/// is not a pending student aborts the whole batch. E-mails go out only after
/// the commit.
async fn decide(
    state: &AppState,
    admin: &User,
    student_ids: &[String],
    status: ApprovalStatus,
    reason: Option<&str>,
) -> Result<Vec<User>, ApiError> {
    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let mut decided = Vec::with_capacity(student_ids.len());
    for student_id in student_ids {
        let student =
            repositories::users::decide_pending(&mut *tx, student_id, status, reason, now)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to update student"))?;
        match student {
            Some(student) => decided.push(student),
            None => {
                let exists = repositories::users::find_student(&mut *tx, student_id)
                    .await
                    .map_err(|e| ApiError::internal(e, "Failed to load student"))?;
                return Err(match exists {
                    Some(_) => ApiError::Conflict(format!(
                        "Student {student_id} is not pending approval"
                    )),
                    None => ApiError::NotFound(format!("Student {student_id} not found")),
                });
            }
        }
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    cache::invalidate(state, &[CacheTag::Reports]).await;
    tracing::info!(
        admin_id = %admin.id,
        status = status.as_str(),
        count = decided.len(),
        "Student approval decided"
    );

    for student in &decided {
        state
            .notifier()
            .send_status_email(&student.email, &student.full_name, status, reason)
            .await;
    }

    Ok(decided)
}

fn decision_response(verb: &str, students: Vec<User>) -> DecisionResponse {
    DecisionResponse {
        message: format!("{} student(s) {verb}", students.len()),
        students: students.into_iter().map(UserResponse::from_db).collect(),
    }
}

/// Order-preserving de-duplication of requested ids.
fn unique_ids(ids: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

pub(in crate::api::admin) async fn approve_student(
    Path(student_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let decided = decide(&state, &admin, &[student_id], ApprovalStatus::Approved, None).await?;
    Ok(Json(decision_response("approved", decided)))
}

pub(in crate::api::admin) async fn reject_student(
    Path(student_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    payload: Option<Json<RejectRequest>>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let payload = payload.map(|Json(payload)| payload).unwrap_or_default();
    payload.validate().map_err(ApiError::invalid)?;

    let decided = decide(
        &state,
        &admin,
        &[student_id],
        ApprovalStatus::Rejected,
        non_blank(&payload.reason),
    )
    .await?;
    Ok(Json(decision_response("rejected", decided)))
}

pub(in crate::api::admin) async fn bulk_approve(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<BulkDecisionRequest>,
) -> Result<Json<DecisionResponse>, ApiError> {
    payload.validate().map_err(ApiError::invalid)?;
    let ids = unique_ids(&payload.student_ids);
    if ids.is_empty() {
        return Err(ApiError::BadRequest("student_ids must not be empty".to_string()));
    }

    let decided = decide(&state, &admin, &ids, ApprovalStatus::Approved, None).await?;
    Ok(Json(decision_response("approved", decided)))
}

pub(in crate::api::admin) async fn bulk_reject(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<BulkDecisionRequest>,
) -> Result<Json<DecisionResponse>, ApiError> {
    payload.validate().map_err(ApiError::invalid)?;
    let ids = unique_ids(&payload.student_ids);
    if ids.is_empty() {
        return Err(ApiError::BadRequest("student_ids must not be empty".to_string()));
    }

    let decided =
        decide(&state, &admin, &ids, ApprovalStatus::Rejected, non_blank(&payload.reason)).await?;
    Ok(Json(decision_response("rejected", decided)))
}

#[cfg(test)]
mod tests {
    use super::unique_ids;

    #[test]
    fn unique_ids_keeps_first_occurrence_and_drops_blanks() {
        let ids = vec![
            "b".to_string(),
            " a ".to_string(),
            "b".to_string(),
            "  ".to_string(),
            "a".to_string(),
        ];
        assert_eq!(unique_ids(&ids), vec!["b".to_string(), "a".to_string()]);
    }
}
