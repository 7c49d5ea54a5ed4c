//! Bulk expiry of overdue orders.

use chrono::Utc;
use credit_db::OrderRepository;

use crate::error::WorkerError;

/// Expires every pending order past its deadline.
#[derive(Debug, Clone)]
pub struct ExpiryHandler {
    orders: OrderRepository,
}

impl ExpiryHandler {
    /// Creates the handler.
    #[must_use]
    pub const fn new(orders: OrderRepository) -> Self {
        Self { orders }
    }

    /// One bulk sweep. Safe to repeat.
    pub async fn expire_overdue(&self) -> Result<(), WorkerError> {
        let expired = self.orders.expire_overdue(Utc::now()).await?;
        if expired > 0 {
            tracing::info!(expired, "Expired overdue orders");
        }
        Ok(())
    }
}
