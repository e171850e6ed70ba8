use sqlx::PgPool;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::ChatMessage;

const COLUMNS: &str = "id, student_id, session_id, message, reply, mode, query_type, created_at";

pub(crate) struct CreateChatMessage<'a> {
    pub(crate) student_id: &'a str,
    pub(crate) session_id: &'a str,
    pub(crate) message: &'a str,
    pub(crate) reply: &'a str,
    pub(crate) mode: &'a str,
    pub(crate) query_type: Option<&'a str>,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn insert(pool: &PgPool, params: CreateChatMessage<'_>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO chat_messages (
            id, student_id, session_id, message, reply, mode, query_type, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(params.student_id)
    .bind(params.session_id)
    .bind(params.message)
    .bind(params.reply)
    .bind(params.mode)
    .bind(params.query_type)
    .bind(params.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// The last `limit` exchanges of a session, oldest first.
pub(crate) async fn recent_for_session(
    pool: &PgPool,
    student_id: &str,
    session_id: &str,
    limit: i64,
) -> Result<Vec<ChatMessage>, sqlx::Error> {
    let mut rows = sqlx::query_as::<_, ChatMessage>(&format!(
        "SELECT {COLUMNS} FROM chat_messages
         WHERE student_id = $1 AND session_id = $2
         ORDER BY created_at DESC
         LIMIT $3"
    ))
    .bind(student_id)
    .bind(session_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.reverse();
    Ok(rows)
}
