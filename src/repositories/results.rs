use std::collections::HashMap;

use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres};
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::StudentResult;
use crate::db::types::DifficultyLevel;

const COLUMNS: &str = "\
    id, student_id, assessment_id, attempt_number, score, total_questions, time_taken, \
    answers, submitted_at, created_at";

pub(crate) async fn count_for_student_assessment(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    assessment_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM student_results WHERE student_id = $1 AND assessment_id = $2",
    )
    .bind(student_id)
    .bind(assessment_id)
    .fetch_one(executor)
    .await
}

pub(crate) async fn next_attempt_number(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    student_id: &str,
    assessment_id: &str,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COALESCE(MAX(attempt_number), 0) + 1
         FROM student_results WHERE student_id = $1 AND assessment_id = $2",
    )
    .bind(student_id)
    .bind(assessment_id)
    .fetch_one(&mut **tx)
    .await
}

pub(crate) struct CreateResult<'a> {
    pub(crate) student_id: &'a str,
    pub(crate) assessment_id: &'a str,
    pub(crate) attempt_number: i32,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) time_taken: i32,
    pub(crate) answers: HashMap<String, String>,
    pub(crate) submitted_at: PrimitiveDateTime,
}

/// Fails with a unique violation when the attempt number is already taken.
pub(crate) async fn insert(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateResult<'_>,
) -> Result<StudentResult, sqlx::Error> {
    sqlx::query_as::<_, StudentResult>(&format!(
        "INSERT INTO student_results (
            id, student_id, assessment_id, attempt_number, score, total_questions,
            time_taken, answers, submitted_at, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$9)
        RETURNING {COLUMNS}",
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(params.student_id)
    .bind(params.assessment_id)
    .bind(params.attempt_number)
    .bind(params.score)
    .bind(params.total_questions)
    .bind(params.time_taken)
    .bind(Json(params.answers))
    .bind(params.submitted_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn latest_for_student_assessment(
    pool: &PgPool,
    student_id: &str,
    assessment_id: &str,
) -> Result<Option<StudentResult>, sqlx::Error> {
    sqlx::query_as::<_, StudentResult>(&format!(
        "SELECT {COLUMNS} FROM student_results
         WHERE student_id = $1 AND assessment_id = $2
         ORDER BY attempt_number DESC, submitted_at DESC
         LIMIT 1"
    ))
    .bind(student_id)
    .bind(assessment_id)
    .fetch_optional(pool)
    .await
}

#[derive(Debug, FromRow)]
pub(crate) struct AttemptSummaryRow {
    pub(crate) assessment_id: String,
    pub(crate) attempts: i64,
    pub(crate) latest_score: i32,
    pub(crate) latest_total: i32,
    pub(crate) latest_submitted_at: PrimitiveDateTime,
}

/// Attempt count and latest result per assessment for one student.
pub(crate) async fn attempt_summaries(
    pool: &PgPool,
    student_id: &str,
    assessment_ids: &[String],
) -> Result<Vec<AttemptSummaryRow>, sqlx::Error> {
    sqlx::query_as::<_, AttemptSummaryRow>(
        "SELECT DISTINCT ON (assessment_id)
                assessment_id,
                COUNT(*) OVER (PARTITION BY assessment_id) AS attempts,
                score AS latest_score,
                total_questions AS latest_total,
                submitted_at AS latest_submitted_at
         FROM student_results
         WHERE student_id = $1 AND assessment_id = ANY($2)
         ORDER BY assessment_id, attempt_number DESC, submitted_at DESC",
    )
    .bind(student_id)
    .bind(assessment_ids)
    .fetch_all(pool)
    .await
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct HistoryRow {
    pub(crate) id: String,
    pub(crate) assessment_id: String,
    pub(crate) assessment_title: String,
    pub(crate) category: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) pass_percentage: i32,
    pub(crate) attempt_number: i32,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) time_taken: i32,
    pub(crate) submitted_at: PrimitiveDateTime,
}

/// Newest first. `limit = None` returns every result.
pub(crate) async fn history_for_student(
    pool: &PgPool,
    student_id: &str,
    limit: Option<i64>,
) -> Result<Vec<HistoryRow>, sqlx::Error> {
    sqlx::query_as::<_, HistoryRow>(
        "SELECT r.id, r.assessment_id, a.title AS assessment_title, a.category, a.difficulty,
                a.pass_percentage, r.attempt_number, r.score, r.total_questions, r.time_taken,
                r.submitted_at
         FROM student_results r
         JOIN assessments a ON a.id = r.assessment_id
         WHERE r.student_id = $1
         ORDER BY r.submitted_at DESC
         LIMIT $2",
    )
    .bind(student_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Stored answer maps of every result for an assessment.
pub(crate) async fn answers_for_assessment(
    pool: &PgPool,
    assessment_id: &str,
) -> Result<Vec<HashMap<String, String>>, sqlx::Error> {
    let rows: Vec<Json<HashMap<String, String>>> =
        sqlx::query_scalar("SELECT answers FROM student_results WHERE assessment_id = $1")
            .bind(assessment_id)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|Json(answers)| answers).collect())
}
