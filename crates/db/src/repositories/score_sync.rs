//! Applies pages of external community scores to the ledger.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use credit_core::ledger::{OrderStatus, OrderType};
use credit_core::score::{CommunityState, ExternalScore, ScoreSyncAction, plan_score_sync};
use rust_decimal::Decimal;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QuerySelect, Set, TransactionTrait,
};

use crate::entities::{accounts, orders};
use crate::error::SettlementError;
use crate::repositories::balance;

/// Order name of community score adjustments.
pub const COMMUNITY_ORDER_NAME: &str = "community score update";

/// Per-batch counters, for logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// First syncs that only recorded the score.
    pub initialized: usize,
    /// Accounts whose score did not change.
    pub unchanged: usize,
    /// Drops recorded without a debit under new-account protection.
    pub suppressed: usize,
    /// Changes applied to balances.
    pub applied: usize,
    /// Scores for accounts that do not exist here.
    pub unknown: usize,
}

/// Score sync repository.
#[derive(Debug, Clone)]
pub struct ScoreSyncRepository {
    db: DatabaseConnection,
}

impl ScoreSyncRepository {
    /// Creates a new score sync repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Applies one page of scores in a single transaction.
    ///
    /// Accounts are row-locked for the duration, and every change is a
    /// relative update, so a concurrent payment never loses its effect.
    ///
    /// # Errors
    ///
    /// Returns an error if any update fails; nothing from the page is kept.
    pub async fn apply_batch(
        &self,
        scores: &[ExternalScore],
        protection_days: u32,
        now: DateTime<Utc>,
    ) -> Result<BatchSummary, SettlementError> {
        let mut summary = BatchSummary::default();
        if scores.is_empty() {
            return Ok(summary);
        }

        let by_id: HashMap<i64, i64> = scores.iter().map(|s| (s.account_id, s.score)).collect();
        let ids: Vec<i64> = by_id.keys().copied().collect();

        let txn = self.db.begin().await?;
        let accounts = accounts::Entity::find()
            .filter(accounts::Column::Id.is_in(ids))
            .lock_exclusive()
            .all(&txn)
            .await?;
        summary.unknown = by_id.len() - accounts.len();

        for account in accounts {
            let Some(&new_score) = by_id.get(&account.id) else {
                continue;
            };
            let state = CommunityState {
                community_balance: account.community_balance,
                total_community: account.total_community,
                created_at: account.created_at.with_timezone(&Utc),
            };
            let action = plan_score_sync(&state, new_score, now, protection_days);

            match &action {
                ScoreSyncAction::Initialize { score } => {
                    balance::shift_community_balance(&txn, account.id, *score).await?;
                    summary.initialized += 1;
                    tracing::debug!(
                        account_id = account.id,
                        score = %score,
                        "Community score initialized"
                    );
                }
                ScoreSyncAction::Unchanged => summary.unchanged += 1,
                ScoreSyncAction::Suppressed { delta, .. } => {
                    // The drop is absorbed: later syncs compare against the new score.
                    balance::shift_community_balance(&txn, account.id, *delta).await?;
                    record_community_order(&txn, account.id, Decimal::ZERO, &action, now).await?;
                    summary.suppressed += 1;
                    tracing::info!(
                        account_id = account.id,
                        delta = %delta,
                        "Community score drop skipped during new account protection"
                    );
                }
                ScoreSyncAction::Apply { delta, .. } => {
                    balance::apply_community_delta(&txn, account.id, *delta).await?;
                    record_community_order(&txn, account.id, *delta, &action, now).await?;
                    summary.applied += 1;
                }
            }
        }

        txn.commit().await?;
        Ok(summary)
    }
}

async fn record_community_order(
    txn: &DatabaseTransaction,
    account_id: i64,
    amount: Decimal,
    action: &ScoreSyncAction,
    now: DateTime<Utc>,
) -> Result<(), SettlementError> {
    let now: DateTimeWithTimeZone = now.into();
    orders::ActiveModel {
        order_name: Set(COMMUNITY_ORDER_NAME.to_string()),
        payer_id: Set(0),
        payee_id: Set(account_id),
        amount: Set(amount),
        status: Set(OrderStatus::Success.into()),
        order_type: Set(OrderType::Community.into()),
        remark: Set(action.remark().unwrap_or_default()),
        trade_time: Set(Some(now)),
        expires_at: Set(now),
        ..Default::default()
    }
    .insert(txn)
    .await?;
    Ok(())
}
