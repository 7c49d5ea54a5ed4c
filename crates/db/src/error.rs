//! Settlement error type.

use credit_core::ledger::LedgerError;
use sea_orm::{DbErr, RuntimeErr};

use crate::repositories::JobError;

/// SQLSTATE raised when `NOWAIT` cannot take a row lock.
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Errors returned by the settlement engine and the balance helpers.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    /// A business rule rejected the operation.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(DbErr),
}

impl From<DbErr> for SettlementError {
    fn from(err: DbErr) -> Self {
        if is_lock_not_available(&err) {
            Self::Ledger(LedgerError::ConcurrentSettlement)
        } else {
            Self::Database(err)
        }
    }
}

impl From<JobError> for SettlementError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::Database(err) => err.into(),
            JobError::Payload(err) => Self::Ledger(LedgerError::Internal(err.to_string())),
        }
    }
}

impl SettlementError {
    /// Flattens into the ledger taxonomy, hiding database details behind `Database`.
    #[must_use]
    pub fn into_ledger(self) -> LedgerError {
        match self {
            Self::Ledger(err) => err,
            Self::Database(err) => LedgerError::Database(err.to_string()),
        }
    }

    /// Returns the business error, if this is one.
    #[must_use]
    pub const fn as_ledger(&self) -> Option<&LedgerError> {
        match self {
            Self::Ledger(err) => Some(err),
            Self::Database(_) => None,
        }
    }
}

/// Returns true if the error is PostgreSQL's lock-not-available failure.
#[must_use]
pub fn is_lock_not_available(err: &DbErr) -> bool {
    let runtime = match err {
        DbErr::Query(runtime) | DbErr::Exec(runtime) => runtime,
        _ => return false,
    };
    let RuntimeErr::SqlxError(sqlx_err) = runtime else {
        return false;
    };
    sqlx_err
        .as_database_error()
        .and_then(|db_err| db_err.code())
        .as_deref()
        == Some(LOCK_NOT_AVAILABLE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_db_errors_stay_infrastructure() {
        let err = SettlementError::from(DbErr::RecordNotFound("orders".into()));
        assert!(matches!(err, SettlementError::Database(_)));
        let ledger = err.into_ledger();
        assert!(!ledger.is_business());
        assert_eq!(ledger.http_status_code(), 500);
    }

    #[test]
    fn test_ledger_errors_pass_through() {
        let err = SettlementError::from(LedgerError::InsufficientBalance);
        assert!(matches!(
            err.as_ledger(),
            Some(LedgerError::InsufficientBalance)
        ));
        assert_eq!(err.to_string(), "Insufficient balance");
    }

    #[test]
    fn test_non_sqlx_errors_are_not_lock_conflicts() {
        assert!(!is_lock_not_available(&DbErr::Custom("boom".into())));
        assert!(!is_lock_not_available(&DbErr::Query(RuntimeErr::Internal(
            "boom".into()
        ))));
    }
}
