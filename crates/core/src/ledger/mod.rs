//! Ledger rules for the credit ledger.
//!
//! # Modules
//!
//! - `error` - Business error taxonomy with stable codes
//! - `order` - Order status/type and the lifecycle state machine
//! - `tier` - Pay-config tiers and the daily spending window
//! - `limits` - Limit lock keys

pub mod error;
pub mod limits;
pub mod order;
pub mod tier;

#[cfg(test)]
mod order_props;

pub use error::LedgerError;
pub use limits::{LimitKey, LimitScope};
pub use order::{OrderLifecycle, OrderStatus, OrderType};
pub use tier::{DailyWindow, PayTier, parse_timezone, select_tier};
