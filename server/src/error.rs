use thiserror::Error;

/// Failures raised by the cart, booking, ticket, notification and analytics services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Event unavailable: {0}")]
    EventUnavailable(String),

    /// A generated booking reference or ticket number already exists. Retryable.
    #[error("Duplicate booking reference or ticket number: {0}")]
    DuplicateReference(String),

    #[error("Ticket {0} has already been checked in")]
    AlreadyCheckedIn(String),

    #[error("Invalid ticket: {0}")]
    InvalidTicket(String),

    #[error("Ticket encoding failed: {0}")]
    Encoding(String),

    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ServiceError::NotFound(what.into())
    }

    /// Whether the same call may succeed when repeated with fresh input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::DuplicateReference(_) | ServiceError::Delivery(_)
        )
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(ServiceError::DuplicateReference("TKT-1".into()).is_retryable());
        assert!(ServiceError::Delivery("smtp down".into()).is_retryable());
        assert!(!ServiceError::EventUnavailable("sold out".into()).is_retryable());
        assert!(!ServiceError::not_found("Booking").is_retryable());
    }

    #[test]
    fn test_not_found_message() {
        let err = ServiceError::not_found("Event 42");
        assert_eq!(err.to_string(), "Event 42 not found");
    }
}
