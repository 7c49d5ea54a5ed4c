//! Background job payloads.
//!
//! Each job kind has its own typed payload. Payloads are stored as JSON with a
//! `kind` tag and decoded by kind, never by ad hoc map access.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::score::ExternalScore;

/// Queue for merchant notifications.
pub const QUEUE_CRITICAL: &str = "critical";
/// Queue for maintenance work.
pub const QUEUE_DEFAULT: &str = "default";
/// Queue for bulk synchronization.
pub const QUEUE_LOW: &str = "low";

/// A unit of background work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    /// Deliver the settlement webhook for an order.
    MerchantNotify {
        /// Settled order.
        order_id: i64,
        /// Merchant client id.
        client_id: String,
    },
    /// Walk the external score feed from `from_page`, fanning out one job
    /// per page. A walk that runs out of time continues in a new job.
    ScoreSyncAll {
        /// First page this walk step fetches.
        #[serde(default)]
        from_page: u32,
    },
    /// Apply one page of external scores.
    ScoreSyncPage {
        /// Zero-based page number, for logs.
        page: u32,
        /// Scores on the page.
        scores: Vec<ExternalScore>,
    },
    /// Expire every overdue pending order.
    ExpireOrders,
    /// Refund disputes the merchant left unanswered too long.
    RefundExpiredDisputes,
}

impl JobPayload {
    /// Stable kind name, stored alongside the payload.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MerchantNotify { .. } => "merchant_notify",
            Self::ScoreSyncAll { .. } => "score_sync_all",
            Self::ScoreSyncPage { .. } => "score_sync_page",
            Self::ExpireOrders => "expire_orders",
            Self::RefundExpiredDisputes => "refund_expired_disputes",
        }
    }

    /// Queue the job runs on.
    #[must_use]
    pub const fn queue(&self) -> &'static str {
        match self {
            Self::MerchantNotify { .. } => QUEUE_CRITICAL,
            Self::ExpireOrders | Self::RefundExpiredDisputes => QUEUE_DEFAULT,
            Self::ScoreSyncAll { .. } | Self::ScoreSyncPage { .. } => QUEUE_LOW,
        }
    }

    /// Claim priority; higher runs first.
    #[must_use]
    pub const fn priority(&self) -> i16 {
        match self {
            Self::MerchantNotify { .. } => 6,
            Self::ExpireOrders | Self::RefundExpiredDisputes => 3,
            Self::ScoreSyncAll { .. } | Self::ScoreSyncPage { .. } => 1,
        }
    }
}

/// Delay before retrying after failed attempt number `attempt` (1-based).
///
/// Doubles from 10 seconds and caps at 10 minutes.
#[must_use]
pub fn retry_backoff(attempt: i32) -> Duration {
    const BASE_SECS: u64 = 10;
    const MAX_SECS: u64 = 600;

    let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(0).min(16);
    Duration::from_secs(BASE_SECS.saturating_mul(1 << exponent).min(MAX_SECS))
}
