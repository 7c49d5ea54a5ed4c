//! Relative balance updates.
//!
//! Account money columns are only ever changed with `col = col +/- value`
//! statements, never by writing back a value computed in memory. The payer
//! side is additionally conditioned on `available_balance >= amount`, which
//! makes check-and-deduct one atomic statement.

use credit_core::ledger::LedgerError;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};

use crate::entities::accounts;
use crate::error::SettlementError;

/// Cumulative counter a debit is recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitCounter {
    /// Merchant payments, counted in `total_payment`.
    Payment,
    /// Peer transfers, counted in `total_transfer`.
    Transfer,
}

impl DebitCounter {
    const fn column(self) -> accounts::Column {
        match self {
            Self::Payment => accounts::Column::TotalPayment,
            Self::Transfer => accounts::Column::TotalTransfer,
        }
    }
}

/// Row-locks both accounts of a movement in ascending id order.
///
/// Every flow that touches two accounts locks them this way first, so two
/// settlements crossing the same pair in opposite directions queue instead
/// of deadlocking.
///
/// # Errors
///
/// Returns an error if the lock query fails.
pub async fn lock_pair<C: ConnectionTrait>(
    conn: &C,
    first: i64,
    second: i64,
) -> Result<(), SettlementError> {
    accounts::Entity::find()
        .select_only()
        .column(accounts::Column::Id)
        .filter(accounts::Column::Id.is_in([first, second]))
        .order_by_asc(accounts::Column::Id)
        .lock_exclusive()
        .into_tuple::<i64>()
        .all(conn)
        .await?;
    Ok(())
}

/// Deducts `amount` from the payer if the balance covers it.
///
/// # Errors
///
/// Returns `LedgerError::InsufficientBalance` if no row matched, which is the
/// authoritative sufficiency check.
pub async fn debit<C: ConnectionTrait>(
    conn: &C,
    account_id: i64,
    amount: Decimal,
    counter: DebitCounter,
    score_gain: i64,
) -> Result<(), SettlementError> {
    let counter = counter.column();
    let result = accounts::Entity::update_many()
        .col_expr(
            accounts::Column::AvailableBalance,
            Expr::col(accounts::Column::AvailableBalance).sub(amount),
        )
        .col_expr(counter, Expr::col(counter).add(amount))
        .col_expr(
            accounts::Column::PayScore,
            Expr::col(accounts::Column::PayScore).add(score_gain),
        )
        .col_expr(accounts::Column::UpdatedAt, Expr::current_timestamp().into())
        .filter(accounts::Column::Id.eq(account_id))
        .filter(accounts::Column::AvailableBalance.gte(amount))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(LedgerError::InsufficientBalance.into());
    }
    Ok(())
}

/// Credits `amount` to the payee's balance and `total_receive`.
///
/// # Errors
///
/// Returns `LedgerError::AccountNotFound` if the account does not exist.
pub async fn credit<C: ConnectionTrait>(
    conn: &C,
    account_id: i64,
    amount: Decimal,
    score_gain: i64,
) -> Result<(), SettlementError> {
    let result = accounts::Entity::update_many()
        .col_expr(
            accounts::Column::AvailableBalance,
            Expr::col(accounts::Column::AvailableBalance).add(amount),
        )
        .col_expr(
            accounts::Column::TotalReceive,
            Expr::col(accounts::Column::TotalReceive).add(amount),
        )
        .col_expr(
            accounts::Column::PayScore,
            Expr::col(accounts::Column::PayScore).add(score_gain),
        )
        .col_expr(accounts::Column::UpdatedAt, Expr::current_timestamp().into())
        .filter(accounts::Column::Id.eq(account_id))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(LedgerError::AccountNotFound(account_id).into());
    }
    Ok(())
}

/// Takes back what a settlement credited to the payee.
///
/// Conditioned on the payee still holding `amount`.
///
/// # Errors
///
/// Returns `LedgerError::InsufficientBalance` if the payee cannot cover it.
pub async fn reverse_credit<C: ConnectionTrait>(
    conn: &C,
    account_id: i64,
    amount: Decimal,
    score_gain: i64,
) -> Result<(), SettlementError> {
    let result = accounts::Entity::update_many()
        .col_expr(
            accounts::Column::AvailableBalance,
            Expr::col(accounts::Column::AvailableBalance).sub(amount),
        )
        .col_expr(
            accounts::Column::TotalReceive,
            Expr::col(accounts::Column::TotalReceive).sub(amount),
        )
        .col_expr(
            accounts::Column::PayScore,
            Expr::col(accounts::Column::PayScore).sub(score_gain),
        )
        .col_expr(accounts::Column::UpdatedAt, Expr::current_timestamp().into())
        .filter(accounts::Column::Id.eq(account_id))
        .filter(accounts::Column::AvailableBalance.gte(amount))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(LedgerError::InsufficientBalance.into());
    }
    Ok(())
}

/// Returns a payment to the payer.
///
/// # Errors
///
/// Returns `LedgerError::AccountNotFound` if the account does not exist.
pub async fn reverse_debit<C: ConnectionTrait>(
    conn: &C,
    account_id: i64,
    amount: Decimal,
    score_gain: i64,
) -> Result<(), SettlementError> {
    let result = accounts::Entity::update_many()
        .col_expr(
            accounts::Column::AvailableBalance,
            Expr::col(accounts::Column::AvailableBalance).add(amount),
        )
        .col_expr(
            accounts::Column::TotalPayment,
            Expr::col(accounts::Column::TotalPayment).sub(amount),
        )
        .col_expr(
            accounts::Column::PayScore,
            Expr::col(accounts::Column::PayScore).sub(score_gain),
        )
        .col_expr(accounts::Column::UpdatedAt, Expr::current_timestamp().into())
        .filter(accounts::Column::Id.eq(account_id))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(LedgerError::AccountNotFound(account_id).into());
    }
    Ok(())
}

/// Applies a signed community score change to the spendable balance.
///
/// `community_balance` moves by `delta` as well, so it always mirrors the
/// last synced score.
///
/// # Errors
///
/// Returns an error if the update fails.
pub async fn apply_community_delta<C: ConnectionTrait>(
    conn: &C,
    account_id: i64,
    delta: Decimal,
) -> Result<(), SettlementError> {
    accounts::Entity::update_many()
        .col_expr(
            accounts::Column::CommunityBalance,
            Expr::col(accounts::Column::CommunityBalance).add(delta),
        )
        .col_expr(
            accounts::Column::TotalCommunity,
            Expr::col(accounts::Column::TotalCommunity).add(delta),
        )
        .col_expr(
            accounts::Column::TotalReceive,
            Expr::col(accounts::Column::TotalReceive).add(delta),
        )
        .col_expr(
            accounts::Column::AvailableBalance,
            Expr::col(accounts::Column::AvailableBalance).add(delta),
        )
        .col_expr(accounts::Column::UpdatedAt, Expr::current_timestamp().into())
        .filter(accounts::Column::Id.eq(account_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Moves the mirrored community score without touching any money column.
///
/// # Errors
///
/// Returns an error if the update fails.
pub async fn shift_community_balance<C: ConnectionTrait>(
    conn: &C,
    account_id: i64,
    delta: Decimal,
) -> Result<(), SettlementError> {
    accounts::Entity::update_many()
        .col_expr(
            accounts::Column::CommunityBalance,
            Expr::col(accounts::Column::CommunityBalance).add(delta),
        )
        .col_expr(accounts::Column::UpdatedAt, Expr::current_timestamp().into())
        .filter(accounts::Column::Id.eq(account_id))
        .exec(conn)
        .await?;
    Ok(())
}
