//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A ledger rule rejected the operation.
    ///
    /// `code` is the stable machine-readable kind (e.g. `INSUFFICIENT_BALANCE`).
    #[error("{message}")]
    Rejected {
        /// Stable error kind.
        code: &'static str,
        /// HTTP status in the 4xx range.
        status: u16,
        /// Human-readable message.
        message: String,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Rejected { status, .. } => *status,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Rejected { code, .. } => code,
            Self::Database(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the message safe to show to a client.
    ///
    /// Infrastructure failures are collapsed into a generic message.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(AppError::Validation(String::new()).status_code(), 400);
        assert_eq!(AppError::Database(String::new()).status_code(), 500);
        assert_eq!(AppError::Internal(String::new()).status_code(), 500);
    }

    #[test]
    fn test_rejected_carries_kind() {
        let err = AppError::Rejected {
            code: "INSUFFICIENT_BALANCE",
            status: 422,
            message: "Insufficient balance".into(),
        };
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.error_code(), "INSUFFICIENT_BALANCE");
        assert_eq!(err.public_message(), "Insufficient balance");
    }

    #[test]
    fn test_infrastructure_errors_do_not_leak() {
        let err = AppError::Database("relation \"orders\" does not exist".into());
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
        assert_eq!(err.public_message(), "Internal server error");
    }
}
