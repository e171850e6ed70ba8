use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::User;
use crate::db::types::{ApprovalStatus, UserRole};

const COLUMNS: &str = "\
    id, email, hashed_password, full_name, role, status, is_active, \
    rejection_reason, approved_at, rejected_at, created_at, updated_at";

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn find_by_email(
    executor: impl sqlx::PgExecutor<'_>,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE lower(email) = lower($1)"))
        .bind(email)
        .fetch_optional(executor)
        .await
}

pub(crate) struct CreateUser<'a> {
    pub(crate) email: &'a str,
    pub(crate) hashed_password: &'a str,
    pub(crate) full_name: &'a str,
    pub(crate) role: UserRole,
    pub(crate) status: ApprovalStatus,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateUser<'_>,
) -> Result<User, sqlx::Error> {
    let approved_at = (params.status == ApprovalStatus::Approved).then_some(params.created_at);

    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (
            id, email, hashed_password, full_name, role, status, is_active,
            approved_at, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,TRUE,$7,$8,$8)
        RETURNING {COLUMNS}",
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(params.email)
    .bind(params.hashed_password)
    .bind(params.full_name)
    .bind(params.role)
    .bind(params.status)
    .bind(approved_at)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn promote_to_admin(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    hashed_password: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users
         SET hashed_password = $1,
             role = 'admin',
             status = 'approved',
             is_active = TRUE,
             approved_at = COALESCE(approved_at, $2),
             updated_at = $2
         WHERE id = $3",
    )
    .bind(hashed_password)
    .bind(now)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) struct StudentFilter<'a> {
    pub(crate) status: Option<ApprovalStatus>,
    pub(crate) search: Option<&'a str>,
}

fn push_student_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &StudentFilter<'_>) {
    builder.push(" WHERE role = 'student'");
    if let Some(status) = filter.status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }
    if let Some(search) = filter.search.map(str::trim).filter(|value| !value.is_empty()) {
        let pattern = format!("%{}%", search.to_lowercase());
        builder.push(" AND (lower(full_name) LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR lower(email) LIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

pub(crate) async fn list_students(
    pool: &PgPool,
    filter: &StudentFilter<'_>,
    skip: i64,
    limit: i64,
) -> Result<Vec<User>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM users"));
    push_student_filter(&mut builder, filter);
    builder.push(" ORDER BY created_at DESC OFFSET ");
    builder.push_bind(skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(limit.clamp(1, 1000));

    builder.build_query_as::<User>().fetch_all(pool).await
}

pub(crate) async fn count_students(
    pool: &PgPool,
    filter: &StudentFilter<'_>,
) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
    push_student_filter(&mut builder, filter);
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

pub(crate) async fn find_student(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {COLUMNS} FROM users WHERE id = $1 AND role = 'student'"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Moves a pending student to `status`. Returns `None` when the row is not a
/// pending student, leaving it untouched.
pub(crate) async fn decide_pending(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    status: ApprovalStatus,
    reason: Option<&str>,
    now: PrimitiveDateTime,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users
         SET status = $1,
             approved_at = CASE WHEN $1 = 'approved'::approvalstatus THEN $3 ELSE approved_at END,
             rejected_at = CASE WHEN $1 = 'rejected'::approvalstatus THEN $3 ELSE rejected_at END,
             rejection_reason = $2,
             updated_at = $3
         WHERE id = $4 AND role = 'student' AND status = 'pending'
         RETURNING {COLUMNS}"
    ))
    .bind(status)
    .bind(reason)
    .bind(now)
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn count_by_status(pool: &PgPool) -> Result<Vec<(ApprovalStatus, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (ApprovalStatus, i64)>(
        "SELECT status, COUNT(*) FROM users WHERE role = 'student' GROUP BY status",
    )
    .fetch_all(pool)
    .await
}
