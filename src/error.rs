use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("password does not meet security requirements")]
    WeakPassword(Vec<String>),

    #[error("admin account already exists")]
    AlreadySetup,

    #[error("admin account not created")]
    NotSetup,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Validation(message) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Bad request", "message": message }),
            ),
            AppError::WeakPassword(requirements) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "Weak password",
                    "message": "Password does not meet security requirements",
                    "requirements": requirements,
                }),
            ),
            AppError::AlreadySetup => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "Already setup",
                    "message": "Admin account already exists. If you need to reset, clear the backing store.",
                }),
            ),
            AppError::NotSetup => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "Not setup",
                    "message": "Admin account not created. Please run setup first at /auth/setup",
                }),
            ),
            AppError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Unauthorized", "message": message }),
            ),
            AppError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                json!({ "error": "Not found", "message": message }),
            ),
            AppError::Internal(e) => {
                error!("Internal error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "Internal server error",
                        "message": "An unexpected error occurred",
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
