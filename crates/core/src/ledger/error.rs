//! Ledger error types.
//!
//! Every business rejection carries a stable machine-readable code so that
//! callers can distinguish, for example, an exceeded daily limit from an
//! exhausted payment link without parsing messages.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::ledger::order::OrderStatus;

/// Errors that can occur while settling, refunding or transitioning orders.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Amount is non-positive or has more than two fractional digits.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Payer balance does not cover the amount.
    #[error("Insufficient balance")]
    InsufficientBalance,

    /// Today's spending plus this payment would exceed the tier's daily limit.
    #[error("Daily limit {limit} exceeded: {spent} already spent today")]
    DailyLimitExceeded {
        /// Configured daily limit.
        limit: Decimal,
        /// Amount already spent today.
        spent: Decimal,
    },

    /// Payment link reached its total number of successful payments.
    #[error("Payment link total limit {limit} reached")]
    PaymentLinkTotalLimitExceeded {
        /// Configured total limit.
        limit: i32,
    },

    /// Payer reached the per-payer limit of a payment link.
    #[error("Payment link per-payer limit {limit} reached")]
    PaymentLinkUserLimitExceeded {
        /// Configured per-payer limit.
        limit: i32,
    },

    /// Payer and payee are the same account.
    #[error("Cannot pay yourself")]
    CannotPaySelf,

    /// Payer is the merchant that issued the order.
    #[error("Cannot pay your own order")]
    CannotPayOwnOrder,

    /// Transfer recipient is the sender.
    #[error("Cannot transfer to yourself")]
    CannotTransferToSelf,

    /// Order does not exist or is not in the expected state.
    #[error("Order not found")]
    OrderNotFound,

    /// Pending order passed its expiry time.
    #[error("Order has expired")]
    OrderExpired,

    /// Order token could not be decoded.
    #[error("Malformed order number")]
    OrderNoFormatError,

    /// Merchant account or credential is missing or inactive.
    #[error("Merchant information not found")]
    MerchantInfoNotFound,

    /// No pay-config tier covers the account's score.
    #[error("No pay config for score {0}")]
    PayConfigNotFound(i64),

    /// Acting account does not exist or is disabled.
    #[error("Account {0} not found")]
    AccountNotFound(i64),

    /// Transfer recipient does not exist.
    #[error("Recipient not found")]
    RecipientNotFound,

    /// Payment link does not exist or was deleted.
    #[error("Payment link not found")]
    PaymentLinkNotFound,

    /// Payment secret did not match.
    #[error("Incorrect payment key")]
    PayKeyIncorrect,

    /// Merchant request signature did not verify.
    #[error("Signature verification failed")]
    InvalidSignature,

    /// Order status change not allowed by the lifecycle.
    #[error("Invalid order transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: OrderStatus,
        /// Requested status.
        to: OrderStatus,
    },

    /// Another request is settling the same order right now.
    #[error("Order is being processed by another request")]
    ConcurrentSettlement,

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidAmount(_) | Self::OrderNoFormatError | Self::InvalidSignature => 400,

            Self::PayKeyIncorrect => 403,

            Self::OrderNotFound
            | Self::AccountNotFound(_)
            | Self::MerchantInfoNotFound
            | Self::PayConfigNotFound(_)
            | Self::RecipientNotFound
            | Self::PaymentLinkNotFound => 404,

            Self::InvalidTransition { .. } | Self::ConcurrentSettlement => 409,

            Self::InsufficientBalance
            | Self::DailyLimitExceeded { .. }
            | Self::PaymentLinkTotalLimitExceeded { .. }
            | Self::PaymentLinkUserLimitExceeded { .. }
            | Self::CannotPaySelf
            | Self::CannotPayOwnOrder
            | Self::CannotTransferToSelf
            | Self::OrderExpired => 422,

            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the stable error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::InsufficientBalance => "INSUFFICIENT_BALANCE",
            Self::DailyLimitExceeded { .. } => "DAILY_LIMIT_EXCEEDED",
            Self::PaymentLinkTotalLimitExceeded { .. } => "PAYMENT_LINK_TOTAL_LIMIT_EXCEEDED",
            Self::PaymentLinkUserLimitExceeded { .. } => "PAYMENT_LINK_USER_LIMIT_EXCEEDED",
            Self::CannotPaySelf => "CANNOT_PAY_SELF",
            Self::CannotPayOwnOrder => "CANNOT_PAY_OWN_ORDER",
            Self::CannotTransferToSelf => "CANNOT_TRANSFER_TO_SELF",
            Self::OrderNotFound => "ORDER_NOT_FOUND",
            Self::OrderExpired => "ORDER_EXPIRED",
            Self::OrderNoFormatError => "ORDER_NO_FORMAT_ERROR",
            Self::MerchantInfoNotFound => "MERCHANT_INFO_NOT_FOUND",
            Self::PayConfigNotFound(_) => "PAY_CONFIG_NOT_FOUND",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::RecipientNotFound => "RECIPIENT_NOT_FOUND",
            Self::PaymentLinkNotFound => "PAYMENT_LINK_NOT_FOUND",
            Self::PayKeyIncorrect => "PAY_KEY_INCORRECT",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::ConcurrentSettlement => "CONCURRENT_SETTLEMENT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true for rule rejections, false for infrastructure failures.
    ///
    /// Business errors are final; retrying the same request cannot succeed.
    #[must_use]
    pub const fn is_business(&self) -> bool {
        !matches!(self, Self::Database(_) | Self::Internal(_))
    }
}
