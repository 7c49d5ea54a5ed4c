//! Order status, type, and the lifecycle state machine.
//!
//! The valid transitions are:
//! - Pending → Success (settled)
//! - Pending → Expired (sweeper)
//! - Pending → Failed
//! - Success → Disputing (payer opens a dispute)
//! - Success → Refund (merchant refund)
//! - Disputing → Refund (dispute accepted)
//! - Disputing → Refused (dispute rejected)

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ledger::error::LedgerError;

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Created by a merchant, waiting for the payer.
    Pending,
    /// Funds moved.
    Success,
    /// Pending order passed its expiry.
    Expired,
    /// Settlement failed permanently.
    Failed,
    /// Payer disputes a settled order.
    Disputing,
    /// Funds returned to the payer.
    Refund,
    /// Dispute rejected by the merchant.
    Refused,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::Success,
        Self::Expired,
        Self::Failed,
        Self::Disputing,
        Self::Refund,
        Self::Refused,
    ];

    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Expired => "expired",
            Self::Failed => "failed",
            Self::Disputing => "disputing",
            Self::Refund => "refund",
            Self::Refused => "refused",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "success" => Some(Self::Success),
            "expired" => Some(Self::Expired),
            "failed" => Some(Self::Failed),
            "disputing" => Some(Self::Disputing),
            "refund" => Some(Self::Refund),
            "refused" => Some(Self::Refused),
            _ => None,
        }
    }

    /// Returns true if no transition leaves this status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Expired | Self::Failed | Self::Refund | Self::Refused
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Merchant-collected order, pending until paid.
    Payment,
    /// Payment-link purchase, settles immediately.
    Online,
    /// Peer-to-peer transfer.
    Transfer,
    /// System credit or debit from score sync.
    Community,
}

impl OrderType {
    /// Returns the string representation of the type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Online => "online",
            Self::Transfer => "transfer",
            Self::Community => "community",
        }
    }

    /// Parses a type from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "payment" => Some(Self::Payment),
            "online" => Some(Self::Online),
            "transfer" => Some(Self::Transfer),
            "community" => Some(Self::Community),
            _ => None,
        }
    }

    /// Returns true if orders of this type count toward the payer's daily limit.
    #[must_use]
    pub const fn counts_toward_daily_limit(&self) -> bool {
        matches!(self, Self::Payment | Self::Online)
    }

    /// Returns true if this type charges a fee and notifies a merchant.
    #[must_use]
    pub const fn is_merchant(&self) -> bool {
        matches!(self, Self::Payment | Self::Online)
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stateless service validating order status transitions.
pub struct OrderLifecycle;

impl OrderLifecycle {
    /// Returns true if `from → to` is an allowed transition.
    #[must_use]
    pub const fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
        matches!(
            (from, to),
            (
                OrderStatus::Pending,
                OrderStatus::Success | OrderStatus::Expired | OrderStatus::Failed
            ) | (
                OrderStatus::Success,
                OrderStatus::Disputing | OrderStatus::Refund
            ) | (
                OrderStatus::Disputing,
                OrderStatus::Refund | OrderStatus::Refused
            )
        )
    }

    /// Validates a transition and returns the target status.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidTransition` if the lifecycle forbids it.
    pub const fn transition(
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<OrderStatus, LedgerError> {
        if Self::is_valid_transition(from, to) {
            Ok(to)
        } else {
            Err(LedgerError::InvalidTransition { from, to })
        }
    }

    /// Statuses from which a refund may be issued.
    #[must_use]
    pub const fn refundable_from() -> [OrderStatus; 2] {
        [OrderStatus::Success, OrderStatus::Disputing]
    }
}
