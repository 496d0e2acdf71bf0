//! HTTP rendering of `AppError`.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use domains::{AppError, FieldError};
use serde_json::json;

/// Wrapper that lets handlers return `AppError` with `?`.
#[derive(Debug)]
pub struct ApiError(pub AppError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(AppError::Validation(vec![FieldError::new(
            "body",
            rejection.body_text(),
        )]))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(AppError::Validation(vec![FieldError::new(
            "query",
            rejection.body_text(),
        )]))
    }
}

fn envelope(status: StatusCode, code: &str, message: String) -> Response {
    let body = Json(json!({
        "error": {
            "code": code,
            "message": message,
        }
    }));
    (status, body).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            AppError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "errors": errors }))).into_response()
            }
            AppError::NotFound(..) => StatusCode::NOT_FOUND.into_response(),
            AppError::Unauthorized(message) => {
                let mut response = envelope(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message);
                response.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    header::HeaderValue::from_static("Bearer"),
                );
                response
            }
            AppError::Forbidden(message) => envelope(StatusCode::FORBIDDEN, "FORBIDDEN", message),
            AppError::Conflict(message) => envelope(StatusCode::CONFLICT, "CONFLICT", message),
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                envelope(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "internal server error".to_string(),
                )
            }
        }
    }
}
