use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::core::security::AccessDenied;

/// Wire shape of every error: `{status, detail}`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    status: u16,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    TooManyRequests(&'static str),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    /// Logs the cause and hides it behind `context`.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    pub(crate) fn invalid(err: impl std::fmt::Display) -> Self {
        Self::BadRequest(err.to_string())
    }

    /// Maps a unique-constraint violation to 409 with `conflict`; any other
    /// database failure is internal.
    pub(crate) fn from_insert(err: sqlx::Error, conflict: &str, context: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(conflict.to_string())
            }
            _ => Self::internal(err, context),
        }
    }

    pub(crate) fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_detail(self) -> String {
        match self {
            Self::Unauthorized(detail) | Self::Forbidden(detail) | Self::TooManyRequests(detail) => {
                detail.to_string()
            }
            Self::BadRequest(detail)
            | Self::NotFound(detail)
            | Self::Conflict(detail)
            | Self::ServiceUnavailable(detail)
            | Self::Internal(detail) => detail,
        }
    }
}

impl From<AccessDenied> for ApiError {
    fn from(denied: AccessDenied) -> Self {
        Self::Forbidden(denied.message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.into_detail();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), detail = %detail, "Request failed");
        }

        let mut response =
            (status, Json(ErrorBody { status: status.as_u16(), detail })).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::ApiError;
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;

    use crate::test_support;

    #[tokio::test]
    async fn unauthorized_carries_bearer_challenge() {
        let response = ApiError::Unauthorized("Could not validate credentials").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let body = test_support::read_json(response).await;
        assert_eq!(body["status"], 401);
        assert_eq!(body["detail"], "Could not validate credentials");
    }

    #[tokio::test]
    async fn conflicts_keep_their_message() {
        let response = ApiError::Conflict("You have already attempted this assessment".to_string())
            .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());

        let body = test_support::read_json(response).await;
        assert_eq!(body["detail"], "You have already attempted this assessment");
    }

    #[test]
    fn non_database_insert_errors_are_internal() {
        let err = ApiError::from_insert(sqlx::Error::RowNotFound, "taken", "Failed to insert");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
