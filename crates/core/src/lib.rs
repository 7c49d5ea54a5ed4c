//! Core ledger logic for the credit ledger.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Everything that decides *what* happens to money lives here; the `db` crate
//! decides *how* it is persisted atomically.
//!
//! # Modules
//!
//! - `money` - Amount validation, fee and score computation
//! - `ledger` - Error taxonomy, order lifecycle, pay tiers, limit keys
//! - `merchant` - Request signatures, order tokens, webhook payloads
//! - `score` - Community score sync rules
//! - `jobs` - Typed background job payloads
//! - `auth` - Payment secret hashing

pub mod auth;
pub mod jobs;
pub mod ledger;
pub mod merchant;
pub mod money;
pub mod score;

#[cfg(test)]
mod money_props;
