use sqlx::PgPool;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::Category;

const COLUMNS: &str = "id, name, description, is_active, created_at";

pub(crate) async fn list(pool: &PgPool, include_inactive: bool) -> Result<Vec<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(&format!(
        "SELECT {COLUMNS} FROM categories WHERE is_active OR $1 ORDER BY name"
    ))
    .bind(include_inactive)
    .fetch_all(pool)
    .await
}

pub(crate) async fn exists_by_name(pool: &PgPool, name: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE lower(name) = lower($1))")
        .bind(name)
        .fetch_one(pool)
        .await
}

pub(crate) async fn create(
    pool: &PgPool,
    name: &str,
    description: Option<&str>,
    now: PrimitiveDateTime,
) -> Result<Category, sqlx::Error> {
    sqlx::query_as::<_, Category>(&format!(
        "INSERT INTO categories (id, name, description, is_active, created_at)
         VALUES ($1, $2, $3, TRUE, $4)
         RETURNING {COLUMNS}"
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(name)
    .bind(description)
    .bind(now)
    .fetch_one(pool)
    .await
}
