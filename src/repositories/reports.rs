use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::types::DifficultyLevel;

/// One stored result joined with its student and assessment.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct ReportRow {
    pub(crate) result_id: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) student_email: String,
    pub(crate) assessment_id: String,
    pub(crate) assessment_title: String,
    pub(crate) category: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) pass_percentage: i32,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) time_taken: i32,
    pub(crate) submitted_at: PrimitiveDateTime,
}

#[derive(Debug, Default, serde::Serialize)]
pub(crate) struct ReportFilter<'a> {
    pub(crate) assessment_id: Option<&'a str>,
    pub(crate) search: Option<&'a str>,
}

/// Newest first, capped at `limit` rows.
pub(crate) async fn rows(
    pool: &PgPool,
    filter: &ReportFilter<'_>,
    limit: i64,
) -> Result<Vec<ReportRow>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT r.id AS result_id, u.id AS student_id, u.full_name AS student_name,
                u.email AS student_email, a.id AS assessment_id, a.title AS assessment_title,
                a.category, a.difficulty, a.pass_percentage, r.score, r.total_questions,
                r.time_taken, r.submitted_at
         FROM student_results r
         JOIN users u ON u.id = r.student_id
         JOIN assessments a ON a.id = r.assessment_id
         WHERE TRUE",
    );
    if let Some(assessment_id) = filter.assessment_id {
        builder.push(" AND r.assessment_id = ");
        builder.push_bind(assessment_id.to_string());
    }
    if let Some(search) = filter.search.map(str::trim).filter(|value| !value.is_empty()) {
        let pattern = format!("%{search}%");
        builder.push(" AND (u.full_name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR u.email ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    builder.push(" ORDER BY r.submitted_at DESC LIMIT ");
    builder.push_bind(limit.max(1));

    builder.build_query_as::<ReportRow>().fetch_all(pool).await
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct AssessmentHeader {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) category: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) pass_percentage: i32,
    pub(crate) is_active: bool,
}

/// Every assessment, including those nobody attempted yet.
pub(crate) async fn assessment_headers(pool: &PgPool) -> Result<Vec<AssessmentHeader>, sqlx::Error> {
    sqlx::query_as::<_, AssessmentHeader>(
        "SELECT id, title, category, difficulty, pass_percentage, is_active
         FROM assessments
         ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await
}
