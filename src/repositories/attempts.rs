use sqlx::Postgres;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::{StudentAnswer, StudentAssessment};

const COLUMNS: &str = "\
    id, student_id, assessment_id, status, started_at, submitted_at, total_marks, \
    obtained_marks, percentage, pass_status, time_taken, result_id, created_at, updated_at";

const ANSWER_COLUMNS: &str = "\
    id, student_assessment_id, question_id, student_answer, is_correct, marks_obtained, \
    time_spent, created_at, updated_at";

pub(crate) async fn find_open(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    assessment_id: &str,
) -> Result<Option<StudentAssessment>, sqlx::Error> {
    sqlx::query_as::<_, StudentAssessment>(&format!(
        "SELECT {COLUMNS} FROM student_assessments
         WHERE student_id = $1 AND assessment_id = $2 AND status = 'in_progress'"
    ))
    .bind(student_id)
    .bind(assessment_id)
    .fetch_optional(executor)
    .await
}

/// Returns the open attempt for the pair, creating it when none exists. The
/// partial unique index keeps concurrent starts down to one open row.
pub(crate) async fn open(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    student_id: &str,
    assessment_id: &str,
    total_marks: i32,
    now: PrimitiveDateTime,
) -> Result<StudentAssessment, sqlx::Error> {
    sqlx::query(
        "INSERT INTO student_assessments (
            id, student_id, assessment_id, status, started_at, total_marks, created_at, updated_at
        ) VALUES ($1, $2, $3, 'in_progress', $4, $5, $4, $4)
        ON CONFLICT (student_id, assessment_id) WHERE status = 'in_progress' DO NOTHING",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(student_id)
    .bind(assessment_id)
    .bind(now)
    .bind(total_marks)
    .execute(&mut **tx)
    .await?;

    find_open(&mut **tx, student_id, assessment_id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub(crate) async fn find_for_student(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    student_id: &str,
) -> Result<Option<StudentAssessment>, sqlx::Error> {
    sqlx::query_as::<_, StudentAssessment>(&format!(
        "SELECT {COLUMNS} FROM student_assessments WHERE id = $1 AND student_id = $2"
    ))
    .bind(id)
    .bind(student_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn upsert_answer(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
    question_id: &str,
    answer: Option<&str>,
    time_spent: i32,
    now: PrimitiveDateTime,
) -> Result<StudentAnswer, sqlx::Error> {
    sqlx::query_as::<_, StudentAnswer>(&format!(
        "INSERT INTO student_answers (
            id, student_assessment_id, question_id, student_answer, is_correct,
            marks_obtained, time_spent, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, FALSE, 0, $5, $6, $6)
        ON CONFLICT (student_assessment_id, question_id)
        DO UPDATE SET student_answer = EXCLUDED.student_answer,
                      time_spent = EXCLUDED.time_spent,
                      updated_at = EXCLUDED.updated_at
        RETURNING {ANSWER_COLUMNS}",
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(attempt_id)
    .bind(question_id)
    .bind(answer)
    .bind(time_spent)
    .bind(now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn list_answers(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Vec<StudentAnswer>, sqlx::Error> {
    sqlx::query_as::<_, StudentAnswer>(&format!(
        "SELECT {ANSWER_COLUMNS} FROM student_answers
         WHERE student_assessment_id = $1
         ORDER BY created_at"
    ))
    .bind(attempt_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn grade_answer(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    attempt_id: &str,
    question_id: &str,
    is_correct: bool,
    marks_obtained: i32,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE student_answers
         SET is_correct = $1, marks_obtained = $2, updated_at = $3
         WHERE student_assessment_id = $4 AND question_id = $5",
    )
    .bind(is_correct)
    .bind(marks_obtained)
    .bind(now)
    .bind(attempt_id)
    .bind(question_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub(crate) struct CompleteAttempt<'a> {
    pub(crate) total_marks: i32,
    pub(crate) obtained_marks: i32,
    pub(crate) percentage: f64,
    pub(crate) pass_status: &'a str,
    pub(crate) time_taken: i32,
    pub(crate) result_id: &'a str,
    pub(crate) submitted_at: PrimitiveDateTime,
}

/// Closes an open attempt. Returns `None` when the attempt was already closed.
pub(crate) async fn complete(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    attempt_id: &str,
    params: CompleteAttempt<'_>,
) -> Result<Option<StudentAssessment>, sqlx::Error> {
    sqlx::query_as::<_, StudentAssessment>(&format!(
        "UPDATE student_assessments
         SET status = 'completed', submitted_at = $1, total_marks = $2, obtained_marks = $3,
             percentage = $4, pass_status = $5, time_taken = $6, result_id = $7, updated_at = $1
         WHERE id = $8 AND status = 'in_progress'
         RETURNING {COLUMNS}",
    ))
    .bind(params.submitted_at)
    .bind(params.total_marks)
    .bind(params.obtained_marks)
    .bind(params.percentage)
    .bind(params.pass_status)
    .bind(params.time_taken)
    .bind(params.result_id)
    .bind(attempt_id)
    .fetch_optional(&mut **tx)
    .await
}

/// Closes whatever attempt the student left open for the assessment once a
/// result exists for it.
pub(crate) async fn complete_open_for(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    student_id: &str,
    assessment_id: &str,
    params: CompleteAttempt<'_>,
) -> Result<(), sqlx::Error> {
    let open = find_open(&mut **tx, student_id, assessment_id).await?;
    if let Some(open) = open {
        complete(tx, &open.id, params).await?;
    }
    Ok(())
}
