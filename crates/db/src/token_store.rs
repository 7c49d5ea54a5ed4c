//! Short-lived order token mappings.
//!
//! Two caches share the order lifetime as TTL:
//! - `token -> merchant account id`, used to pick the key that opens a token
//! - `order id -> ()`, an expiry marker whose TTL eviction tells the expiry
//!   sweeper to expire that one order without waiting for the bulk sweep
//!
//! Both caches are bounded by `payment.token_cache_capacity`. Past that bound
//! moka evicts entries early: an evicted token stops resolving and the
//! merchant has to issue a new order, while the order row itself is still
//! expired by the bulk sweep. Size the capacity above the number of orders
//! issued within one order TTL.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use moka::notification::RemovalCause;
use tokio::sync::mpsc::UnboundedSender;

/// In-process store for order tokens and expiry markers.
#[derive(Clone)]
pub struct TokenStore {
    merchants: Cache<String, i64>,
    expiry_markers: Cache<i64, ()>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("tokens", &self.merchants.entry_count())
            .field("expiry_markers", &self.expiry_markers.entry_count())
            .finish()
    }
}

impl TokenStore {
    /// Creates a store whose entries live for `ttl`.
    ///
    /// `capacity` bounds each cache. When `expired` is set, the id of every
    /// order whose marker times out is sent on it. Markers cleared explicitly
    /// or evicted for size are not sent.
    #[must_use]
    pub fn new(ttl: Duration, capacity: u64, expired: Option<UnboundedSender<i64>>) -> Self {
        let merchants = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .eviction_listener(move |_token: Arc<String>, merchant_id: i64, cause| {
                if cause == RemovalCause::Size {
                    tracing::warn!(
                        merchant_id,
                        capacity,
                        "Order token evicted before expiry; the order must be re-issued"
                    );
                }
            })
            .build();

        let mut markers = Cache::builder().max_capacity(capacity).time_to_live(ttl);
        if let Some(sender) = expired {
            markers = markers.eviction_listener(move |order_id: Arc<i64>, (), cause| {
                if cause == RemovalCause::Expired {
                    // Receiver gone means the sweeper stopped; the bulk sweep covers it.
                    let _ = sender.send(*order_id);
                }
            });
        }

        Self {
            merchants,
            expiry_markers: markers.build(),
        }
    }

    /// Records a freshly issued token and arms the order's expiry marker.
    pub async fn remember(&self, token: &str, merchant_id: i64, order_id: i64) {
        self.merchants.insert(token.to_string(), merchant_id).await;
        self.expiry_markers.insert(order_id, ()).await;
    }

    /// Merchant account that issued `token`, if it has not expired.
    pub async fn merchant_for(&self, token: &str) -> Option<i64> {
        self.merchants.get(token).await
    }

    /// Disarms the expiry marker of a settled order.
    pub async fn clear_expiry_marker(&self, order_id: i64) {
        self.expiry_markers.invalidate(&order_id).await;
    }

    /// Runs pending housekeeping, which fires listeners for expired markers.
    pub async fn run_pending_tasks(&self) {
        self.merchants.run_pending_tasks().await;
        self.expiry_markers.run_pending_tasks().await;
    }
}
