use actix_web::{error, http::StatusCode, HttpResponse};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Error taxonomy shared by the engine, the stores and the HTTP boundary
#[derive(Debug, Error)]
pub enum KindredError {
    /// Bad input shape or range; the caller can correct it
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Blocked pair or duplicate terminal state
    #[error("conflict: {0}")]
    Conflict(String),

    /// A store call exceeded its deadline. Retryable.
    #[error("storage timeout: {0}")]
    StorageTimeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl KindredError {
    pub fn invalid_action(message: impl Into<String>) -> Self {
        KindredError::Validation(message.into())
    }

    pub fn profile_not_found(id: &str) -> Self {
        KindredError::NotFound(format!("profile {}", id))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, KindredError::StorageTimeout(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            KindredError::Validation(_) => "validation_error",
            KindredError::NotFound(_) => "not_found",
            KindredError::Conflict(_) => "conflict",
            KindredError::StorageTimeout(_) => "storage_timeout",
            KindredError::Internal(_) => "internal_error",
        }
    }

    /// Message safe to return to the caller
    fn public_message(&self) -> String {
        match self {
            KindredError::Validation(msg)
            | KindredError::NotFound(msg)
            | KindredError::Conflict(msg) => msg.clone(),
            KindredError::StorageTimeout(_) => "storage temporarily unavailable, retry later".to_string(),
            KindredError::Internal(_) => "internal server error".to_string(),
        }
    }
}

impl error::ResponseError for KindredError {
    fn status_code(&self) -> StatusCode {
        match self {
            KindredError::Validation(_) => StatusCode::BAD_REQUEST,
            KindredError::NotFound(_) => StatusCode::NOT_FOUND,
            KindredError::Conflict(_) => StatusCode::CONFLICT,
            KindredError::StorageTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            KindredError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            KindredError::Internal(detail) => {
                tracing::error!(code = self.code(), status = %status, error = %detail, "request failed");
            }
            KindredError::StorageTimeout(detail) => {
                tracing::warn!(code = self.code(), status = %status, error = %detail, "request timed out");
            }
            _ => tracing::info!(code = self.code(), status = %status, error = %self, "request rejected"),
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: self.code().to_string(),
            message: self.public_message(),
            status_code: status.as_u16(),
        })
    }
}

impl From<validator::ValidationErrors> for KindredError {
    fn from(errors: validator::ValidationErrors) -> Self {
        KindredError::Validation(errors.to_string())
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    KindredError::Validation(format!("invalid JSON: {}", err)).into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("Query payload error on {}: {}", req.path(), err);
    KindredError::Validation(format!("invalid query: {}", err)).into()
}
