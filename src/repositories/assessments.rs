use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::Assessment;
use crate::db::types::{AssessmentStatus, DifficultyLevel};

const COLUMNS: &str = "\
    a.id, a.title, a.description, a.category, a.difficulty, a.duration_minutes, \
    a.total_marks, a.pass_percentage, a.is_active, a.status, a.start_date, a.end_date, \
    a.allow_multiple_attempts, a.show_results_immediately, a.show_correct_answers, \
    a.created_by, a.created_at, a.updated_at";

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Assessment>, sqlx::Error> {
    sqlx::query_as::<_, Assessment>(&format!("SELECT {COLUMNS} FROM assessments a WHERE a.id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

#[derive(Debug, Default)]
pub(crate) struct AssessmentFilters<'a> {
    pub(crate) category: Option<&'a str>,
    pub(crate) difficulty: Option<DifficultyLevel>,
    pub(crate) status: Option<AssessmentStatus>,
    pub(crate) search: Option<&'a str>,
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &AssessmentFilters<'_>) {
    if let Some(category) = filters.category {
        builder.push(" AND a.category = ");
        builder.push_bind(category.to_string());
    }
    if let Some(difficulty) = filters.difficulty {
        builder.push(" AND a.difficulty = ");
        builder.push_bind(difficulty);
    }
    if let Some(status) = filters.status {
        builder.push(" AND a.status = ");
        builder.push_bind(status);
    }
    if let Some(search) = filters.search.map(str::trim).filter(|value| !value.is_empty()) {
        let pattern = format!("%{search}%");
        builder.push(" AND (a.title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR a.description ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

/// Visible to students: active flag and status agree and `now` falls inside
/// the window.
fn push_open_window(builder: &mut QueryBuilder<'_, Postgres>, now: PrimitiveDateTime) {
    builder.push(" AND a.is_active AND a.status = 'active'");
    builder.push(" AND (a.start_date IS NULL OR a.start_date <= ");
    builder.push_bind(now);
    builder.push(") AND (a.end_date IS NULL OR a.end_date >= ");
    builder.push_bind(now);
    builder.push(")");
}

pub(crate) async fn list_open(
    pool: &PgPool,
    filters: &AssessmentFilters<'_>,
    now: PrimitiveDateTime,
    skip: i64,
    limit: i64,
) -> Result<Vec<Assessment>, sqlx::Error> {
    let mut builder =
        QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM assessments a WHERE TRUE"));
    push_open_window(&mut builder, now);
    push_filters(&mut builder, filters);
    builder.push(" ORDER BY a.created_at DESC OFFSET ");
    builder.push_bind(skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(limit.clamp(1, 1000));

    builder.build_query_as::<Assessment>().fetch_all(pool).await
}

pub(crate) async fn count_open(
    pool: &PgPool,
    filters: &AssessmentFilters<'_>,
    now: PrimitiveDateTime,
) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM assessments a WHERE TRUE");
    push_open_window(&mut builder, now);
    push_filters(&mut builder, filters);
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

pub(crate) async fn list(
    pool: &PgPool,
    filters: &AssessmentFilters<'_>,
    skip: i64,
    limit: i64,
) -> Result<Vec<Assessment>, sqlx::Error> {
    let mut builder =
        QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM assessments a WHERE TRUE"));
    push_filters(&mut builder, filters);
    builder.push(" ORDER BY a.created_at DESC OFFSET ");
    builder.push_bind(skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(limit.clamp(1, 1000));

    builder.build_query_as::<Assessment>().fetch_all(pool).await
}

pub(crate) async fn count(pool: &PgPool, filters: &AssessmentFilters<'_>) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM assessments a WHERE TRUE");
    push_filters(&mut builder, filters);
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

pub(crate) struct CreateAssessment<'a> {
    pub(crate) title: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) category: &'a str,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) duration_minutes: i32,
    pub(crate) total_marks: i32,
    pub(crate) pass_percentage: i32,
    pub(crate) start_date: Option<PrimitiveDateTime>,
    pub(crate) end_date: Option<PrimitiveDateTime>,
    pub(crate) allow_multiple_attempts: bool,
    pub(crate) show_results_immediately: bool,
    pub(crate) show_correct_answers: bool,
    pub(crate) created_by: &'a str,
    pub(crate) created_at: PrimitiveDateTime,
}

/// New assessments start as inactive drafts; activation goes through
/// [`set_status`].
pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateAssessment<'_>,
) -> Result<Assessment, sqlx::Error> {
    sqlx::query_as::<_, Assessment>(&format!(
        "INSERT INTO assessments AS a (
            id, title, description, category, difficulty, duration_minutes, total_marks,
            pass_percentage, is_active, status, start_date, end_date, allow_multiple_attempts,
            show_results_immediately, show_correct_answers, created_by, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,FALSE,'draft',$9,$10,$11,$12,$13,$14,$15,$15)
        RETURNING {COLUMNS}",
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(params.title)
    .bind(params.description)
    .bind(params.category)
    .bind(params.difficulty)
    .bind(params.duration_minutes)
    .bind(params.total_marks)
    .bind(params.pass_percentage)
    .bind(params.start_date)
    .bind(params.end_date)
    .bind(params.allow_multiple_attempts)
    .bind(params.show_results_immediately)
    .bind(params.show_correct_answers)
    .bind(params.created_by)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}

#[derive(Debug, Default)]
pub(crate) struct UpdateAssessment<'a> {
    pub(crate) title: Option<&'a str>,
    pub(crate) description: Option<&'a str>,
    pub(crate) category: Option<&'a str>,
    pub(crate) difficulty: Option<DifficultyLevel>,
    pub(crate) duration_minutes: Option<i32>,
    pub(crate) total_marks: Option<i32>,
    pub(crate) pass_percentage: Option<i32>,
    /// `None` keeps the stored bound; `Some(None)` clears it.
    pub(crate) start_date: Option<Option<PrimitiveDateTime>>,
    pub(crate) end_date: Option<Option<PrimitiveDateTime>>,
    pub(crate) allow_multiple_attempts: Option<bool>,
    pub(crate) show_results_immediately: Option<bool>,
    pub(crate) show_correct_answers: Option<bool>,
}

pub(crate) async fn update(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    params: UpdateAssessment<'_>,
    updated_at: PrimitiveDateTime,
) -> Result<Option<Assessment>, sqlx::Error> {
    sqlx::query_as::<_, Assessment>(&format!(
        "UPDATE assessments AS a
         SET title = COALESCE($1, a.title),
             description = COALESCE($2, a.description),
             category = COALESCE($3, a.category),
             difficulty = COALESCE($4, a.difficulty),
             duration_minutes = COALESCE($5, a.duration_minutes),
             total_marks = COALESCE($6, a.total_marks),
             pass_percentage = COALESCE($7, a.pass_percentage),
             start_date = CASE WHEN $15 THEN $8 ELSE a.start_date END,
             end_date = CASE WHEN $16 THEN $9 ELSE a.end_date END,
             allow_multiple_attempts = COALESCE($10, a.allow_multiple_attempts),
             show_results_immediately = COALESCE($11, a.show_results_immediately),
             show_correct_answers = COALESCE($12, a.show_correct_answers),
             updated_at = $13
         WHERE a.id = $14
         RETURNING {COLUMNS}",
    ))
    .bind(params.title)
    .bind(params.description)
    .bind(params.category)
    .bind(params.difficulty)
    .bind(params.duration_minutes)
    .bind(params.total_marks)
    .bind(params.pass_percentage)
    .bind(params.start_date.flatten())
    .bind(params.end_date.flatten())
    .bind(params.allow_multiple_attempts)
    .bind(params.show_results_immediately)
    .bind(params.show_correct_answers)
    .bind(updated_at)
    .bind(id)
    .bind(params.start_date.is_some())
    .bind(params.end_date.is_some())
    .fetch_optional(executor)
    .await
}

/// The active flag mirrors the status so the two never disagree after an
/// admin status change.
pub(crate) async fn set_status(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    status: AssessmentStatus,
    updated_at: PrimitiveDateTime,
) -> Result<Option<Assessment>, sqlx::Error> {
    sqlx::query_as::<_, Assessment>(&format!(
        "UPDATE assessments AS a
         SET status = $1, is_active = ($1 = 'active'::assessmentstatus), updated_at = $2
         WHERE a.id = $3
         RETURNING {COLUMNS}",
    ))
    .bind(status)
    .bind(updated_at)
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM assessments WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn count_results(pool: &PgPool, id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM student_results WHERE assessment_id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
}

pub(crate) async fn count_active_questions(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*)
         FROM assessment_questions aq
         JOIN questions q ON q.id = aq.question_id
         WHERE aq.assessment_id = $1 AND q.is_active",
    )
    .bind(id)
    .fetch_one(executor)
    .await
}

/// Copies every field except identity into a new inactive draft owned by
/// `actor_id` and re-links the same questions in the same order.
pub(crate) async fn duplicate(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    source_id: &str,
    actor_id: &str,
    now: PrimitiveDateTime,
) -> Result<Option<Assessment>, sqlx::Error> {
    let copy = sqlx::query_as::<_, Assessment>(&format!(
        "INSERT INTO assessments AS a (
            id, title, description, category, difficulty, duration_minutes, total_marks,
            pass_percentage, is_active, status, start_date, end_date, allow_multiple_attempts,
            show_results_immediately, show_correct_answers, created_by, created_at, updated_at
        )
        SELECT $1, src.title || ' (Copy)', src.description, src.category, src.difficulty,
               src.duration_minutes, src.total_marks, src.pass_percentage, FALSE, 'draft',
               src.start_date, src.end_date, src.allow_multiple_attempts,
               src.show_results_immediately, src.show_correct_answers, $2, $3, $3
        FROM assessments src
        WHERE src.id = $4
        RETURNING {COLUMNS}",
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(actor_id)
    .bind(now)
    .bind(source_id)
    .fetch_optional(&mut **tx)
    .await?;

    let Some(copy) = copy else {
        return Ok(None);
    };

    sqlx::query(
        "INSERT INTO assessment_questions (assessment_id, question_id, order_index)
         SELECT $1, question_id, order_index FROM assessment_questions WHERE assessment_id = $2",
    )
    .bind(&copy.id)
    .bind(source_id)
    .execute(&mut **tx)
    .await?;

    Ok(Some(copy))
}

/// Links a question, or moves it when already linked. Without an explicit
/// order the question goes last.
pub(crate) async fn link_question(
    pool: &PgPool,
    assessment_id: &str,
    question_id: &str,
    order_index: Option<i32>,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO assessment_questions (assessment_id, question_id, order_index)
         VALUES (
            $1, $2,
            COALESCE($3, (SELECT COALESCE(MAX(order_index) + 1, 0)
                          FROM assessment_questions WHERE assessment_id = $1))
         )
         ON CONFLICT (assessment_id, question_id)
         DO UPDATE SET order_index = COALESCE($3, assessment_questions.order_index)
         RETURNING order_index",
    )
    .bind(assessment_id)
    .bind(question_id)
    .bind(order_index)
    .fetch_one(pool)
    .await
}

pub(crate) async fn unlink_question(
    pool: &PgPool,
    assessment_id: &str,
    question_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM assessment_questions WHERE assessment_id = $1 AND question_id = $2",
    )
    .bind(assessment_id)
    .bind(question_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn active_question_counts(
    pool: &PgPool,
    ids: &[String],
) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (String, i64)>(
        "SELECT aq.assessment_id, COUNT(*)
         FROM assessment_questions aq
         JOIN questions q ON q.id = aq.question_id
         WHERE aq.assessment_id = ANY($1) AND q.is_active
         GROUP BY aq.assessment_id",
    )
    .bind(ids)
    .fetch_all(pool)
    .await
}

#[derive(Debug, FromRow)]
pub(crate) struct AvailableRow {
    pub(crate) title: String,
    pub(crate) category: String,
    pub(crate) duration_minutes: i32,
    pub(crate) difficulty: DifficultyLevel,
}

/// Open assessments the student can still take: never attempted, or retakes
/// allowed.
pub(crate) async fn available_for_student(
    pool: &PgPool,
    student_id: &str,
    category: Option<&str>,
    now: PrimitiveDateTime,
    limit: i64,
) -> Result<Vec<AvailableRow>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT a.title, a.category, a.duration_minutes, a.difficulty FROM assessments a WHERE TRUE",
    );
    push_open_window(&mut builder, now);
    push_not_exhausted(&mut builder, student_id);
    if let Some(category) = category {
        builder.push(" AND a.category ILIKE ");
        builder.push_bind(format!("%{category}%"));
    }
    builder.push(" ORDER BY a.created_at DESC LIMIT ");
    builder.push_bind(limit.clamp(1, 1000));

    builder.build_query_as::<AvailableRow>().fetch_all(pool).await
}

pub(crate) async fn count_available_for_student(
    pool: &PgPool,
    student_id: &str,
    now: PrimitiveDateTime,
) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM assessments a WHERE TRUE");
    push_open_window(&mut builder, now);
    push_not_exhausted(&mut builder, student_id);
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

fn push_not_exhausted(builder: &mut QueryBuilder<'_, Postgres>, student_id: &str) {
    builder.push(
        " AND (a.allow_multiple_attempts OR NOT EXISTS (
            SELECT 1 FROM student_results r WHERE r.assessment_id = a.id AND r.student_id = ",
    );
    builder.push_bind(student_id.to_string());
    builder.push("))");
}

pub(crate) async fn count_active(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM assessments WHERE is_active AND status = 'active'")
        .fetch_one(pool)
        .await
}
