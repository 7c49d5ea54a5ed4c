//! Community score synchronization rules.
//!
//! The external score feed reports an absolute score per account. The ledger
//! mirrors it in `community_balance` and turns each change into a credit or
//! debit of the spendable balance. New accounts are shielded from debits for
//! a configurable number of days.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One row of the external score feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalScore {
    /// Account id.
    pub account_id: i64,
    /// Account username, for logs.
    #[serde(default)]
    pub username: String,
    /// Current absolute score.
    pub score: i64,
}

/// Community fields of an account before a sync.
#[derive(Debug, Clone, Copy)]
pub struct CommunityState {
    /// Last synced score.
    pub community_balance: Decimal,
    /// Sum of all applied community deltas.
    pub total_community: Decimal,
    /// Account creation time.
    pub created_at: DateTime<Utc>,
}

impl CommunityState {
    /// An account that was never synced has both community fields at zero.
    #[must_use]
    pub fn is_unsynced(&self) -> bool {
        self.community_balance.is_zero() && self.total_community.is_zero()
    }
}

/// What a sync does to one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoreSyncAction {
    /// First sync: record the score, move no funds, write no order.
    Initialize {
        /// Score to store.
        score: Decimal,
    },
    /// Score did not change.
    Unchanged,
    /// Negative change on a protected account: store the score, move no funds.
    Suppressed {
        /// Previous score.
        from: Decimal,
        /// New score.
        to: Decimal,
        /// The change that was not applied.
        delta: Decimal,
    },
    /// Apply the change to balances.
    Apply {
        /// Previous score.
        from: Decimal,
        /// New score.
        to: Decimal,
        /// Signed change.
        delta: Decimal,
    },
}

impl ScoreSyncAction {
    /// Remark for the community order this action writes, if any.
    #[must_use]
    pub fn remark(&self) -> Option<String> {
        match self {
            Self::Initialize { .. } | Self::Unchanged => None,
            Self::Suppressed { from, to, delta } => Some(format!(
                "community score from {from} to {to}, change {delta} not applied during new account protection"
            )),
            Self::Apply { from, to, delta } => Some(format!(
                "community score from {from} to {to}, change {delta}"
            )),
        }
    }
}

/// Decides how a new external score affects an account.
#[must_use]
pub fn plan_score_sync(
    state: &CommunityState,
    new_score: i64,
    now: DateTime<Utc>,
    protection_days: u32,
) -> ScoreSyncAction {
    let to = Decimal::from(new_score);
    if state.is_unsynced() {
        return ScoreSyncAction::Initialize { score: to };
    }

    let from = state.community_balance;
    let delta = to - from;
    if delta.is_zero() {
        return ScoreSyncAction::Unchanged;
    }

    let protected =
        now.signed_duration_since(state.created_at) < Duration::days(i64::from(protection_days));
    if delta < Decimal::ZERO && protected {
        ScoreSyncAction::Suppressed { from, to, delta }
    } else {
        ScoreSyncAction::Apply { from, to, delta }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn state(balance: Decimal, age_days: i64, now: DateTime<Utc>) -> CommunityState {
        CommunityState {
            community_balance: balance,
            total_community: balance,
            created_at: now - Duration::days(age_days),
        }
    }

    #[test]
    fn test_first_sync_initializes() {
        let now = Utc::now();
        let fresh = CommunityState {
            community_balance: Decimal::ZERO,
            total_community: Decimal::ZERO,
            created_at: now,
        };
        assert_eq!(
            plan_score_sync(&fresh, 250, now, 7),
            ScoreSyncAction::Initialize { score: dec!(250) }
        );
    }

    #[test]
    fn test_unchanged() {
        let now = Utc::now();
        assert_eq!(
            plan_score_sync(&state(dec!(100), 30, now), 100, now, 7),
            ScoreSyncAction::Unchanged
        );
    }

    #[test]
    fn test_drop_on_young_account_is_suppressed() {
        let now = Utc::now();
        let action = plan_score_sync(&state(dec!(100), 5, now), 60, now, 7);
        assert_eq!(
            action,
            ScoreSyncAction::Suppressed {
                from: dec!(100),
                to: dec!(60),
                delta: dec!(-40)
            }
        );
        assert!(action.remark().unwrap().contains("not applied"));
    }

    #[test]
    fn test_drop_on_older_account_is_applied() {
        let now = Utc::now();
        let action = plan_score_sync(&state(dec!(100), 10, now), 60, now, 7);
        assert_eq!(
            action,
            ScoreSyncAction::Apply {
                from: dec!(100),
                to: dec!(60),
                delta: dec!(-40)
            }
        );
        assert_eq!(
            action.remark().unwrap(),
            "community score from 100 to 60, change -40"
        );
    }

    #[test]
    fn test_gain_on_young_account_is_applied() {
        let now = Utc::now();
        assert!(matches!(
            plan_score_sync(&state(dec!(100), 1, now), 150, now, 7),
            ScoreSyncAction::Apply { .. }
        ));
    }

    #[test]
    fn test_zero_protection_window() {
        let now = Utc::now();
        assert!(matches!(
            plan_score_sync(&state(dec!(100), 0, now), 10, now, 0),
            ScoreSyncAction::Apply { .. }
        ));
    }
}
