//! Worker error types.

use std::time::Duration;

use credit_core::ledger::LedgerError;
use credit_db::SettlementError;
use credit_db::repositories::JobError;
use sea_orm::DbErr;

/// Why a job attempt failed.
///
/// Every variant is retryable; the runtime decides between retry and
/// terminal failure from the attempt count alone.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Queue error while enqueueing follow-up jobs.
    #[error(transparent)]
    Job(#[from] JobError),

    /// Settlement error while applying a score page or refunding a dispute.
    #[error(transparent)]
    Settlement(#[from] SettlementError),

    /// Ledger rule violation, such as a malformed notify URL.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Transport error talking to a merchant or the score feed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The merchant answered, but not with a success acknowledgement.
    #[error("Notification rejected: HTTP {status}: {body}")]
    Rejected {
        /// Response status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// The score feed answered with an unexpected status.
    #[error("Score feed returned HTTP {0}")]
    Feed(u16),

    /// The attempt ran past its deadline.
    #[error("Job timed out after {0:?}")]
    Timeout(Duration),
}
