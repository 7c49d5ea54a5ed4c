//! Job handlers, one per job kind.

pub mod disputes;
pub mod expiry;
pub mod notify;
pub mod score_sync;

pub use disputes::DisputeRefundHandler;
pub use expiry::ExpiryHandler;
pub use notify::NotificationDispatcher;
pub use score_sync::ScoreSyncHandler;

use async_trait::async_trait;
use credit_core::jobs::JobPayload;

use crate::error::WorkerError;

/// Which attempt of a job is running.
///
/// Passed explicitly; handlers never read it from ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based attempt number.
    pub number: i32,
    /// Attempts allowed in total.
    pub max: i32,
}

impl Attempt {
    /// True when a failure now fails the job for good.
    #[must_use]
    pub const fn is_final(self) -> bool {
        self.number >= self.max
    }
}

/// Runs one decoded job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Handles a job; an error schedules a retry or fails it terminally.
    async fn handle(&self, payload: JobPayload, attempt: Attempt) -> Result<(), WorkerError>;
}

/// Routes each payload to its handler.
#[derive(Clone)]
pub struct Handlers {
    notify: NotificationDispatcher,
    expiry: ExpiryHandler,
    score_sync: ScoreSyncHandler,
    disputes: DisputeRefundHandler,
}

impl Handlers {
    /// Bundles the per-kind handlers.
    #[must_use]
    pub const fn new(
        notify: NotificationDispatcher,
        expiry: ExpiryHandler,
        score_sync: ScoreSyncHandler,
        disputes: DisputeRefundHandler,
    ) -> Self {
        Self {
            notify,
            expiry,
            score_sync,
            disputes,
        }
    }
}

#[async_trait]
impl JobHandler for Handlers {
    async fn handle(&self, payload: JobPayload, attempt: Attempt) -> Result<(), WorkerError> {
        match payload {
            JobPayload::MerchantNotify {
                order_id,
                client_id,
            } => self.notify.deliver(order_id, &client_id, attempt).await,
            JobPayload::ScoreSyncAll { from_page } => {
                self.score_sync.sync_all(from_page, attempt).await.map(drop)
            }
            JobPayload::ScoreSyncPage { page, scores } => {
                self.score_sync.sync_page(page, &scores).await
            }
            JobPayload::ExpireOrders => self.expiry.expire_overdue().await,
            JobPayload::RefundExpiredDisputes => self.disputes.refund_overdue().await.map(drop),
        }
    }
}
