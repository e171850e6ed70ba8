use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::validation::non_blank;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::category::{CategoryCreate, CategoryResponse};

#[derive(Debug, Deserialize)]
pub(in crate::api::admin) struct CategoryListQuery {
    #[serde(default, alias = "includeInactive")]
    include_inactive: bool,
}

pub(in crate::api::admin) async fn list_categories(
    Query(params): Query<CategoryListQuery>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryResponse>>, ApiError> {
    let categories = repositories::categories::list(state.db(), params.include_inactive)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list categories"))?;

    Ok(Json(categories.into_iter().map(CategoryResponse::from_db).collect()))
}

pub(in crate::api::admin) async fn create_category(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<CategoryCreate>,
) -> Result<(StatusCode, Json<CategoryResponse>), ApiError> {
    payload.validate().map_err(ApiError::invalid)?;
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name must not be blank".to_string()));
    }

    let exists = repositories::categories::exists_by_name(state.db(), name)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check category"))?;
    if exists {
        return Err(ApiError::Conflict("Category already exists".to_string()));
    }

    let category = repositories::categories::create(
        state.db(),
        name,
        non_blank(&payload.description),
        primitive_now_utc(),
    )
    .await
    .map_err(|e| {
        ApiError::from_insert(e, "Category already exists", "Failed to create category")
    })?;

    tracing::info!(admin_id = %admin.id, category_id = %category.id, "Category created");
    Ok((StatusCode::CREATED, Json(CategoryResponse::from_db(category))))
}
