//! Per-order expiry fast path.
//!
//! The token store reports each order whose expiry marker timed out. The
//! sweeper expires that one order right away instead of waiting for the
//! next bulk `expire_orders` job, which remains the backstop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use credit_db::{OrderRepository, TokenStore};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// How often the token store runs its housekeeping, which fires expiry events.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(1);

/// Expires orders as their markers time out.
pub struct ExpirySweeper {
    orders: OrderRepository,
    tokens: Arc<TokenStore>,
    expired: UnboundedReceiver<i64>,
}

impl ExpirySweeper {
    /// Creates a sweeper reading order ids from `expired`.
    #[must_use]
    pub const fn new(
        orders: OrderRepository,
        tokens: Arc<TokenStore>,
        expired: UnboundedReceiver<i64>,
    ) -> Self {
        Self {
            orders,
            tokens,
            expired,
        }
    }

    /// Runs until `shutdown` fires or the store is dropped.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut housekeeping = interval(HOUSEKEEPING_INTERVAL);
        housekeeping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = housekeeping.tick() => self.tokens.run_pending_tasks().await,
                received = self.expired.recv() => match received {
                    Some(order_id) => self.expire(order_id).await,
                    None => break,
                },
            }
        }
        info!("Expiry sweeper stopped");
    }

    async fn expire(&self, order_id: i64) {
        match self.orders.expire_one(order_id, Utc::now()).await {
            Ok(true) => info!(order_id, "Order expired"),
            Ok(false) => debug!(order_id, "Order already settled or expired"),
            Err(e) => error!(order_id, "Failed to expire order: {}", e),
        }
    }
}
