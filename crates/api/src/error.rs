//! Error responses.
//!
//! Wallet routes answer `{"error": CODE, "message": ...}`. Epay routes keep
//! the protocol's `{"code": -1, "msg": ...}` envelope instead.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use credit_core::ledger::LedgerError;
use credit_db::SettlementError;
use credit_shared::AppError;
use sea_orm::DbErr;
use serde_json::json;

/// Epay code for a failed request.
pub const EPAY_FAILURE: i32 = -1;

/// Maps a ledger error onto the HTTP error taxonomy.
#[must_use]
pub fn app_error(err: LedgerError) -> AppError {
    if err.is_business() {
        AppError::Rejected {
            code: err.error_code(),
            status: err.http_status_code(),
            message: err.to_string(),
        }
    } else {
        match err {
            LedgerError::Database(message) => AppError::Database(message),
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Error returned by wallet handlers.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl ApiError {
    /// A 400 for malformed input.
    pub fn validation(message: impl Into<String>) -> Self {
        Self(AppError::Validation(message.into()))
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        Self(app_error(err))
    }
}

impl From<SettlementError> for ApiError {
    fn from(err: SettlementError) -> Self {
        err.into_ledger().into()
    }
}

impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        Self(AppError::Database(err.to_string()))
    }
}

fn status_of(err: &AppError) -> StatusCode {
    StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn log_infrastructure(err: &AppError) {
    if err.status_code() >= 500 {
        tracing::error!("Request failed: {}", err);
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        log_infrastructure(&self.0);
        (
            status_of(&self.0),
            Json(json!({
                "error": self.0.error_code(),
                "message": self.0.public_message(),
            })),
        )
            .into_response()
    }
}

/// Error returned by epay handlers.
#[derive(Debug)]
pub struct EpayError(pub AppError);

impl From<ApiError> for EpayError {
    fn from(err: ApiError) -> Self {
        Self(err.0)
    }
}

impl From<LedgerError> for EpayError {
    fn from(err: LedgerError) -> Self {
        Self(app_error(err))
    }
}

impl From<SettlementError> for EpayError {
    fn from(err: SettlementError) -> Self {
        err.into_ledger().into()
    }
}

impl From<DbErr> for EpayError {
    fn from(err: DbErr) -> Self {
        Self(AppError::Database(err.to_string()))
    }
}

impl IntoResponse for EpayError {
    fn into_response(self) -> Response {
        log_infrastructure(&self.0);
        (
            status_of(&self.0),
            Json(json!({
                "code": EPAY_FAILURE,
                "msg": self.0.public_message(),
                "error": self.0.error_code(),
            })),
        )
            .into_response()
    }
}

/// Result type of wallet handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type of epay handlers.
pub type EpayResult<T> = Result<T, EpayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_business_errors_keep_their_code() {
        let err = app_error(LedgerError::DailyLimitExceeded {
            limit: dec!(100),
            spent: dec!(80),
        });
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.error_code(), "DAILY_LIMIT_EXCEEDED");
    }

    #[test]
    fn test_infrastructure_errors_are_generic() {
        let err = app_error(LedgerError::Database("connection reset".into()));
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.public_message(), "Internal server error");

        let err = app_error(LedgerError::Internal("boom".into()));
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_concurrent_settlement_is_a_conflict() {
        let err = app_error(LedgerError::ConcurrentSettlement);
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.error_code(), "CONCURRENT_SETTLEMENT");
    }
}
