use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::{LinkedQuestion, Question};
use crate::db::types::DifficultyLevel;

pub(crate) const COLUMNS: &str = "\
    q.id, q.question_text, q.options, q.option_a, q.option_b, q.option_c, q.option_d, \
    q.correct_answer, q.correct_option, q.category, q.difficulty, q.marks, \
    q.time_per_question, q.is_active, q.created_at, q.updated_at";

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!("SELECT {COLUMNS} FROM questions q WHERE q.id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

#[derive(Debug, Default)]
pub(crate) struct QuestionFilters<'a> {
    pub(crate) category: Option<&'a str>,
    pub(crate) difficulty: Option<DifficultyLevel>,
    pub(crate) is_active: Option<bool>,
    pub(crate) search: Option<&'a str>,
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &QuestionFilters<'_>) {
    builder.push(" WHERE TRUE");
    if let Some(category) = filters.category {
        builder.push(" AND q.category = ");
        builder.push_bind(category.to_string());
    }
    if let Some(difficulty) = filters.difficulty {
        builder.push(" AND q.difficulty = ");
        builder.push_bind(difficulty);
    }
    if let Some(is_active) = filters.is_active {
        builder.push(" AND q.is_active = ");
        builder.push_bind(is_active);
    }
    if let Some(search) = filters.search.map(str::trim).filter(|value| !value.is_empty()) {
        builder.push(" AND q.question_text ILIKE ");
        builder.push_bind(format!("%{search}%"));
    }
}

pub(crate) async fn list(
    pool: &PgPool,
    filters: &QuestionFilters<'_>,
    skip: i64,
    limit: i64,
) -> Result<Vec<Question>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM questions q"));
    push_filters(&mut builder, filters);
    builder.push(" ORDER BY q.created_at DESC OFFSET ");
    builder.push_bind(skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(limit.clamp(1, 1000));

    builder.build_query_as::<Question>().fetch_all(pool).await
}

pub(crate) async fn count(pool: &PgPool, filters: &QuestionFilters<'_>) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM questions q");
    push_filters(&mut builder, filters);
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

/// Answer columns are written in both forms so older readers of either
/// column keep working.
pub(crate) struct CreateQuestion<'a> {
    pub(crate) question_text: &'a str,
    pub(crate) options: &'a [String],
    pub(crate) correct_letter: char,
    pub(crate) category: &'a str,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) marks: i32,
    pub(crate) time_per_question: i32,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateQuestion<'_>,
) -> Result<Question, sqlx::Error> {
    let option = |index: usize| params.options.get(index).cloned();
    let correct_option = i32::from(params.correct_letter as u8 - b'A');

    sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions AS q (
            id, question_text, options, option_a, option_b, option_c, option_d,
            correct_answer, correct_option, category, difficulty, marks,
            time_per_question, is_active, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$15)
        RETURNING {COLUMNS}",
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(params.question_text)
    .bind(Json(params.options.to_vec()))
    .bind(option(0))
    .bind(option(1))
    .bind(option(2))
    .bind(option(3))
    .bind(params.correct_letter.to_string())
    .bind(correct_option)
    .bind(params.category)
    .bind(params.difficulty)
    .bind(params.marks)
    .bind(params.time_per_question)
    .bind(params.is_active)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}

#[derive(Debug, Default)]
pub(crate) struct UpdateQuestion<'a> {
    pub(crate) question_text: Option<&'a str>,
    pub(crate) options: Option<&'a [String]>,
    pub(crate) correct_letter: Option<char>,
    pub(crate) category: Option<&'a str>,
    pub(crate) difficulty: Option<DifficultyLevel>,
    pub(crate) marks: Option<i32>,
    pub(crate) time_per_question: Option<i32>,
    pub(crate) is_active: Option<bool>,
}

pub(crate) async fn update(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    params: UpdateQuestion<'_>,
    updated_at: PrimitiveDateTime,
) -> Result<Option<Question>, sqlx::Error> {
    let option = |index: usize| params.options.and_then(|options| options.get(index).cloned());
    let correct_option = params.correct_letter.map(|letter| i32::from(letter as u8 - b'A'));

    sqlx::query_as::<_, Question>(&format!(
        "UPDATE questions AS q
         SET question_text = COALESCE($1, q.question_text),
             options = COALESCE($2, q.options),
             option_a = COALESCE($3, q.option_a),
             option_b = COALESCE($4, q.option_b),
             option_c = COALESCE($5, q.option_c),
             option_d = COALESCE($6, q.option_d),
             correct_answer = COALESCE($7, q.correct_answer),
             correct_option = COALESCE($8, q.correct_option),
             category = COALESCE($9, q.category),
             difficulty = COALESCE($10, q.difficulty),
             marks = COALESCE($11, q.marks),
             time_per_question = COALESCE($12, q.time_per_question),
             is_active = COALESCE($13, q.is_active),
             updated_at = $14
         WHERE q.id = $15
         RETURNING {COLUMNS}",
    ))
    .bind(params.question_text)
    .bind(params.options.map(|options| Json(options.to_vec())))
    .bind(option(0))
    .bind(option(1))
    .bind(option(2))
    .bind(option(3))
    .bind(params.correct_letter.map(|letter| letter.to_string()))
    .bind(correct_option)
    .bind(params.category)
    .bind(params.difficulty)
    .bind(params.marks)
    .bind(params.time_per_question)
    .bind(params.is_active)
    .bind(updated_at)
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// True when deleting the question would erase attempt history: it has saved
/// answers, appears in a stored result, or belongs to an assessment that has
/// results.
pub(crate) async fn is_referenced(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM student_answers WHERE question_id = $1)
             OR EXISTS(SELECT 1 FROM student_results WHERE answers ? $1)
             OR EXISTS(
                SELECT 1
                FROM assessment_questions aq
                JOIN student_results r ON r.assessment_id = aq.assessment_id
                WHERE aq.question_id = $1
             )",
    )
    .bind(id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn delete(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query("DELETE FROM assessment_questions WHERE question_id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    let result = sqlx::query("DELETE FROM questions WHERE id = $1").bind(id).execute(&mut **tx).await?;
    Ok(result.rows_affected() > 0)
}

/// Active questions of an assessment in display order. Scoring totals are
/// computed from exactly this set.
pub(crate) async fn list_active_for_assessment(
    executor: impl sqlx::PgExecutor<'_>,
    assessment_id: &str,
) -> Result<Vec<LinkedQuestion>, sqlx::Error> {
    sqlx::query_as::<_, LinkedQuestion>(&format!(
        "SELECT {COLUMNS}, aq.order_index
         FROM assessment_questions aq
         JOIN questions q ON q.id = aq.question_id
         WHERE aq.assessment_id = $1 AND q.is_active
         ORDER BY aq.order_index, q.created_at"
    ))
    .bind(assessment_id)
    .fetch_all(executor)
    .await
}

/// Every linked question, active or not.
pub(crate) async fn list_linked(
    pool: &PgPool,
    assessment_id: &str,
) -> Result<Vec<LinkedQuestion>, sqlx::Error> {
    sqlx::query_as::<_, LinkedQuestion>(&format!(
        "SELECT {COLUMNS}, aq.order_index
         FROM assessment_questions aq
         JOIN questions q ON q.id = aq.question_id
         WHERE aq.assessment_id = $1
         ORDER BY aq.order_index, q.created_at"
    ))
    .bind(assessment_id)
    .fetch_all(pool)
    .await
}
