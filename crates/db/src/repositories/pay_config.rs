//! Pay-config tier lookup.
//!
//! Tiers are looked up by the account's score at the moment of each
//! settlement, never cached on the account.

use credit_core::ledger::{PayTier, select_tier};
use sea_orm::{ConnectionTrait, DbErr, EntityTrait, QueryOrder};

use crate::entities::pay_configs;
use crate::error::SettlementError;

/// Pay-config repository.
///
/// Stateless: every lookup runs on the caller's connection or transaction.
#[derive(Debug, Clone, Copy)]
pub struct PayConfigRepository;

impl PayConfigRepository {
    /// Loads every tier on any connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn load_tiers<C: ConnectionTrait>(conn: &C) -> Result<Vec<PayTier>, DbErr> {
        let rows = pay_configs::Entity::find()
            .order_by_asc(pay_configs::Column::Level)
            .all(conn)
            .await?;
        Ok(rows.into_iter().map(PayTier::from).collect())
    }

    /// Resolves the tier for a score.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::PayConfigNotFound` if no band covers the score.
    pub async fn tier_for<C: ConnectionTrait>(
        conn: &C,
        score: i64,
    ) -> Result<PayTier, SettlementError> {
        let tiers = Self::load_tiers(conn).await?;
        Ok(select_tier(&tiers, score)?.clone())
    }
}
