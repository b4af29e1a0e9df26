use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Database(String),
    Serialization(serde_json::Error),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Unauthorized(String),
    Internal(String),
    Configuration(String),
    PreconditionFailed,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(e) => write!(f, "Database error: {}", e),
            AppError::Serialization(e) => write!(f, "Serialization error: {}", e),
            AppError::BadRequest(e) => write!(f, "Bad request: {}", e),
            AppError::NotFound(e) => write!(f, "Not found: {}", e),
            AppError::Conflict(e) => write!(f, "Conflict: {}", e),
            AppError::Unauthorized(e) => write!(f, "Unauthorized: {}", e),
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
            AppError::Configuration(e) => write!(f, "Configuration error: {}", e),
            AppError::PreconditionFailed => {
                write!(f, "Precondition failed: Resource version mismatch")
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err)
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Short machine-readable kind used in error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database",
            AppError::Serialization(_) => "serialization",
            AppError::BadRequest(_) => "badRequest",
            AppError::NotFound(_) => "notFound",
            AppError::Conflict(_) => "conflict",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Internal(_) => "internal",
            AppError::Configuration(_) => "configuration",
            AppError::PreconditionFailed => "preconditionFailed",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            AppError::Database(_)
            | AppError::Serialization(_)
            | AppError::Internal(_)
            | AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_response(&self) -> (StatusCode, Json<serde_json::Value>) {
        let status = self.status_code();
        let message = match self {
            AppError::Database(e) | AppError::Internal(e) | AppError::Configuration(e) => {
                tracing::error!(kind = self.kind(), "{}", e);
                e.clone()
            }
            AppError::Serialization(e) => {
                tracing::error!(kind = self.kind(), "{}", e);
                e.to_string()
            }
            AppError::BadRequest(e)
            | AppError::NotFound(e)
            | AppError::Conflict(e)
            | AppError::Unauthorized(e) => e.clone(),
            AppError::PreconditionFailed => "Resource version mismatch".to_string(),
        };

        (
            status,
            Json(json!({ "error": self.kind(), "message": message })),
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_response().into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::PreconditionFailed.status_code(),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            AppError::Database("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_body() {
        let (status, Json(body)) = AppError::NotFound("User abc".into()).to_response();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "notFound");
        assert_eq!(body["message"], "User abc");
    }
}
