use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use estudio_core::CoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and implements [`IntoResponse`]
/// to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `estudio_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                    None,
                ),
                CoreError::Validation(msg) => (
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    msg.clone(),
                    None,
                ),
                CoreError::InvalidOptions { errors } => (
                    StatusCode::BAD_REQUEST,
                    "INVALID_OPTIONS",
                    "Render options are invalid".to_string(),
                    Some(errors.clone()),
                ),
                CoreError::Conflict(msg) => {
                    (StatusCode::CONFLICT, "CONFLICT", msg.clone(), None)
                }
                CoreError::Unavailable(msg) => {
                    tracing::error!(error = %msg, "Backing service unavailable");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "UNAVAILABLE",
                        "Service temporarily unavailable".to_string(),
                        None,
                    )
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                        None,
                    )
                }
            },
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None)
            }
        };

        let body = match details {
            Some(details) => json!({
                "error": message,
                "code": code,
                "details": details,
            }),
            None => json!({
                "error": message,
                "code": code,
            }),
        };

        (status, axum::Json(body)).into_response()
    }
}
