use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::validation::{normalize_email, validate_password_len};
use crate::core::security::{self, AuthContext};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::User;
use crate::db::types::{ApprovalStatus, UserRole};
use crate::repositories;
use crate::schemas::auth::{LoginRequest, RegisterRequest, RegisterResponse, TokenResponse};
use crate::schemas::user::UserResponse;

/// Max attempts per window for auth endpoints.
const AUTH_RATE_LIMIT: u64 = 10;
/// Rate limit window in seconds.
const AUTH_RATE_WINDOW_SECONDS: u64 = 60;

const BAD_CREDENTIALS: &str = "Incorrect email or password";

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}

async fn enforce_rate_limit(state: &AppState, key: &str, message: &'static str) -> Result<(), ApiError> {
    let allowed = state
        .redis()
        .rate_limit(key, AUTH_RATE_LIMIT, AUTH_RATE_WINDOW_SECONDS)
        .await
        .unwrap_or(true);
    if allowed {
        Ok(())
    } else {
        Err(ApiError::TooManyRequests(message))
    }
}

/// Students register themselves and wait for approval; no token is issued.
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    payload.validate().map_err(ApiError::invalid)?;
    validate_password_len(&payload.password)?;

    let email = normalize_email(&payload.email);
    let full_name = payload.full_name.trim();
    if full_name.is_empty() {
        return Err(ApiError::BadRequest("full_name must not be empty".to_string()));
    }

    enforce_rate_limit(
        &state,
        &format!("rl:register:{email}"),
        "Too many registration attempts, try again later",
    )
    .await?;

    let existing = repositories::users::find_by_email(state.db(), &email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing user"))?;
    if existing.is_some() {
        return Err(ApiError::Conflict("An account with this email already exists".to_string()));
    }

    let hashed_password = security::hash_password(&payload.password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;

    let user = repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            email: &email,
            hashed_password: &hashed_password,
            full_name,
            role: UserRole::Student,
            status: ApprovalStatus::Pending,
            created_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| {
        ApiError::from_insert(
            e,
            "An account with this email already exists",
            "Failed to create user",
        )
    })?;

    tracing::info!(user_id = %user.id, "Student registered, awaiting approval");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful. Your account is awaiting admin approval."
                .to_string(),
            user: UserResponse::from_db(user),
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let email = normalize_email(&payload.email);
    enforce_rate_limit(
        &state,
        &format!("rl:login:{email}"),
        "Too many login attempts, try again later",
    )
    .await?;

    let user = fetch_user_by_email(&state, &email).await?;

    let verified = security::verify_password(&payload.password, &user.hashed_password)
        .map_err(|_| ApiError::Unauthorized(BAD_CREDENTIALS))?;
    if !verified {
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS));
    }

    if !user.is_active {
        return Err(ApiError::Forbidden("Account is deactivated"));
    }
    AuthContext::for_user(&user).ensure_may_sign_in()?;

    let token = security::create_access_token(&user.id, user.role, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;

    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        user: UserResponse::from_db(user),
    }))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from_db(user))
}

async fn fetch_user_by_email(state: &AppState, email: &str) -> Result<User, ApiError> {
    repositories::users::find_by_email(state.db(), email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .ok_or(ApiError::Unauthorized(BAD_CREDENTIALS))
}

#[cfg(test)]
mod tests;
