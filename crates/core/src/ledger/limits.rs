//! Limit lock keys.
//!
//! A limit check is "count prior successes, compare, then insert", which is
//! not atomic. Callers serialize it per subject with a transaction-scoped lock
//! whose identifier is derived here. Keys are stable across processes and
//! releases, so every instance computes the same lock id for the same subject.

use sha2::{Digest, Sha256};

use crate::ledger::tier::DailyWindow;

/// What a limit lock protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitScope {
    /// A payer's spending on one local day.
    DailySpend {
        /// Local date as `yyyymmdd`.
        day: u32,
    },
    /// Successful payments through a link, across all payers.
    LinkTotal,
    /// Successful payments through a link by one payer.
    LinkPerPayer {
        /// Paying account.
        payer_id: i64,
    },
}

/// Composite key for one limit lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LimitKey {
    /// Account id or payment link id, depending on scope.
    pub subject: i64,
    /// Limit scope.
    pub scope: LimitScope,
}

impl LimitKey {
    /// Key for a payer's daily spending limit.
    #[must_use]
    pub const fn daily_spend(account_id: i64, window: &DailyWindow) -> Self {
        Self {
            subject: account_id,
            scope: LimitScope::DailySpend { day: window.bucket },
        }
    }

    /// Key for a payment link's total limit.
    #[must_use]
    pub const fn link_total(link_id: i64) -> Self {
        Self {
            subject: link_id,
            scope: LimitScope::LinkTotal,
        }
    }

    /// Key for a payment link's per-payer limit.
    #[must_use]
    pub const fn link_per_payer(link_id: i64, payer_id: i64) -> Self {
        Self {
            subject: link_id,
            scope: LimitScope::LinkPerPayer { payer_id },
        }
    }

    /// Canonical text form, e.g. `daily:42:20260302`.
    #[must_use]
    pub fn canonical(&self) -> String {
        match self.scope {
            LimitScope::DailySpend { day } => format!("daily:{}:{day}", self.subject),
            LimitScope::LinkTotal => format!("link-total:{}", self.subject),
            LimitScope::LinkPerPayer { payer_id } => {
                format!("link-user:{}:{payer_id}", self.subject)
            }
        }
    }

    /// Collapses the key to a single 64-bit lock identifier.
    #[must_use]
    pub fn lock_id(&self) -> i64 {
        let digest = Sha256::digest(self.canonical().as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        i64::from_be_bytes(head)
    }
}
