use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::db::DbError;

/// Errors surfaced by the HTTP API. Every variant renders as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Captcha(String),

    #[error("Analysis timed out")]
    Timeout,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            DbError::Invalid(_) | DbError::InvalidTransition { .. } => {
                ApiError::BadRequest(err.to_string())
            }
            DbError::Sqlite(rusqlite::Error::SqliteFailure(ref failure, _))
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                ApiError::BadRequest(constraint_message(&err))
            }
            other => ApiError::Internal(other.into()),
        }
    }
}

fn constraint_message(err: &DbError) -> String {
    let detail = err.to_string();
    if detail.contains("UNIQUE") {
        "A record with that slug or email already exists".to_string()
    } else if detail.contains("FOREIGN KEY") {
        "Referenced author or category does not exist".to_string()
    } else {
        "Constraint violation".to_string()
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Captcha(_) => StatusCode::FORBIDDEN,
            ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ApiError::Internal(e) = self {
            tracing::error!(error = %e, "Request failed");
        }
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
