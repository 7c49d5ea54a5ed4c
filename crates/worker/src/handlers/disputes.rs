//! Refunds of disputes the merchant never answered.

use chrono::{Duration, Utc};
use credit_db::SettlementEngine;
use credit_db::settlement::DisputeSweep;

use crate::error::WorkerError;

/// Refunds disputes left open longer than the answer window.
#[derive(Clone)]
pub struct DisputeRefundHandler {
    engine: SettlementEngine,
    window: Duration,
}

impl DisputeRefundHandler {
    /// Creates the handler; merchants get `window_days` to answer.
    #[must_use]
    pub fn new(engine: SettlementEngine, window_days: u32) -> Self {
        Self {
            engine,
            window: Duration::days(i64::from(window_days)),
        }
    }

    /// One pass over overdue disputes. Safe to repeat.
    pub async fn refund_overdue(&self) -> Result<DisputeSweep, WorkerError> {
        let sweep = self
            .engine
            .refund_expired_disputes(Utc::now() - self.window)
            .await?;
        if sweep.refunded > 0 || sweep.uncovered > 0 {
            tracing::info!(
                refunded = sweep.refunded,
                uncovered = sweep.uncovered,
                "Refunded unanswered disputes"
            );
        }
        Ok(sweep)
    }
}
