use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};
use validator::ValidationErrors;

use crate::services::{DeliveryError, IssueError, RedeliverError};
use crate::store::StoreError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid fields")]
    FieldErrors(ValidationErrors),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error")]
    DatabaseError(#[from] StoreError),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::FieldErrors(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::DatabaseError(StoreError::Timeout(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) | AppError::FieldErrors(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::ExternalServiceError(_) => "EXTERNAL_SERVICE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn log(&self) {
        match self {
            // Caller mistakes; not worth an error-level line.
            AppError::ValidationError(_)
            | AppError::FieldErrors(_)
            | AppError::AuthError(_)
            | AppError::Forbidden(_)
            | AppError::NotFound(_)
            | AppError::Conflict(_) => {
                warn!(code = self.code(), message = %self, "Request rejected");
            }
            AppError::ExternalServiceError(msg) | AppError::InternalServerError(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
        }
    }
}

impl From<IssueError> for AppError {
    fn from(err: IssueError) -> Self {
        match err {
            IssueError::Validation(errors) => AppError::FieldErrors(errors),
            IssueError::DuplicateRegistration => {
                AppError::Conflict("You are already registered for this event".to_string())
            }
            IssueError::EventNotFound(id) => AppError::NotFound(format!("Event '{id}' was not found")),
            IssueError::BatchNotFound(id) => AppError::NotFound(format!("Batch '{id}' was not found")),
            IssueError::Storage(e) => AppError::DatabaseError(e),
        }
    }
}

impl From<RedeliverError> for AppError {
    fn from(err: RedeliverError) -> Self {
        match err {
            RedeliverError::TicketNotFound(id) => {
                AppError::NotFound(format!("Ticket '{id}' was not found"))
            }
            RedeliverError::EventNotFound(id) => {
                AppError::NotFound(format!("Event '{id}' was not found"))
            }
            RedeliverError::Delivery(e) => AppError::from(e),
            RedeliverError::Storage(e) => AppError::DatabaseError(e),
        }
    }
}

impl From<DeliveryError> for AppError {
    fn from(err: DeliveryError) -> Self {
        match err {
            DeliveryError::Qr(e) => AppError::InternalServerError(format!("QR encoding failed: {e}")),
            other => AppError::ExternalServiceError(other.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Only expose high-level message to the client
        let (public_message, details): (String, Option<Value>) = match &self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => (msg.clone(), None),
            AppError::FieldErrors(errors) => (
                "One or more fields are invalid".to_string(),
                serde_json::to_value(errors).ok(),
            ),
            AppError::ExternalServiceError(_) => {
                ("Ticket delivery failed, please retry".to_string(), None)
            }
            AppError::DatabaseError(_) => ("A database error occurred".to_string(), None),
            AppError::InternalServerError(_) => ("An internal error occurred".to_string(), None),
        };

        error_response(code, public_message, details, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_errors_map_to_distinct_statuses() {
        let duplicate = AppError::from(IssueError::DuplicateRegistration);
        assert_eq!(duplicate.status_code(), StatusCode::CONFLICT);
        assert_eq!(duplicate.code(), "CONFLICT");

        let missing = AppError::from(IssueError::EventNotFound("abc".to_string()));
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let storage = AppError::from(IssueError::Storage(StoreError::Unavailable(
            "down".to_string(),
        )));
        assert_eq!(storage.code(), "DATABASE_ERROR");
    }

    #[test]
    fn test_store_timeout_is_service_unavailable() {
        let err = AppError::from(StoreError::Timeout(std::time::Duration::from_millis(10)));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
