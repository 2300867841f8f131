use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::error::ServiceError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Request is well formed but clashes with current state (sold out,
    /// already checked in). Carries its own error code.
    #[error("Conflict: {1}")]
    Conflict(&'static str, String),

    #[error("Invalid ticket: {0}")]
    InvalidTicket(String),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(..) => StatusCode::CONFLICT,
            AppError::InvalidTicket(_) => StatusCode::BAD_REQUEST,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(code, _) => code,
            AppError::InvalidTicket(_) => "INVALID_TICKET",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::ExternalServiceError(_) => "EXTERNAL_SERVICE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
            AppError::ExternalServiceError(msg) | AppError::InternalServerError(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            _ => {
                warn!(code = self.code(), message = %self, "Request rejected");
            }
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(what) => AppError::NotFound(format!("{what} not found")),
            ServiceError::EventUnavailable(msg) => AppError::Conflict("EVENT_UNAVAILABLE", msg),
            ServiceError::DuplicateReference(msg) => {
                AppError::Conflict("DUPLICATE_REFERENCE", msg)
            }
            ServiceError::AlreadyCheckedIn(ticket) => AppError::Conflict(
                "ALREADY_CHECKED_IN",
                format!("Ticket {ticket} has already been checked in"),
            ),
            ServiceError::InvalidTicket(msg) => AppError::InvalidTicket(msg),
            ServiceError::Validation(msg) => AppError::ValidationError(msg),
            ServiceError::Forbidden(msg) => AppError::Forbidden(msg),
            ServiceError::Delivery(msg) => AppError::ExternalServiceError(msg),
            ServiceError::Encoding(msg) | ServiceError::Storage(msg) => {
                AppError::InternalServerError(msg)
            }
            ServiceError::Database(e) => AppError::DatabaseError(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        // Only expose high-level message to the client
        let public_message = match &self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(_, msg)
            | AppError::InvalidTicket(msg)
            | AppError::ExternalServiceError(msg) => msg.clone(),
            AppError::InternalServerError(_) => "An internal error occurred".to_string(),
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
        };

        error_response(code, public_message, None, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_errors_map_to_status() {
        let cases = [
            (ServiceError::not_found("Booking"), StatusCode::NOT_FOUND),
            (
                ServiceError::EventUnavailable("sold out".into()),
                StatusCode::CONFLICT,
            ),
            (
                ServiceError::AlreadyCheckedIn("TKT-1".into()),
                StatusCode::CONFLICT,
            ),
            (
                ServiceError::InvalidTicket("unknown".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServiceError::Validation("quantity".into()),
                StatusCode::BAD_REQUEST,
            ),
            (ServiceError::Forbidden("admin".into()), StatusCode::FORBIDDEN),
            (
                ServiceError::Encoding("qr".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_conflict_keeps_specific_code() {
        let err = AppError::from(ServiceError::EventUnavailable("sold out".into()));
        assert_eq!(err.code(), "EVENT_UNAVAILABLE");
        let err = AppError::from(ServiceError::AlreadyCheckedIn("TKT-1".into()));
        assert_eq!(err.code(), "ALREADY_CHECKED_IN");
    }

    #[test]
    fn test_internal_details_not_exposed() {
        let response =
            AppError::from(ServiceError::Storage("lock poisoned".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
