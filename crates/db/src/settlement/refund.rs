//! Merchant refunds and the dispute flow that can trigger them.

use chrono::{DateTime, Utc};
use credit_core::ledger::{
    LedgerError, OrderLifecycle, OrderStatus as CoreOrderStatus, OrderType as CoreOrderType,
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};

use super::{SettlementEngine, payer_score_gain};
use crate::entities::orders;
use crate::entities::sea_orm_active_enums::{OrderStatus, OrderType as DbOrderType};
use crate::error::SettlementError;
use crate::repositories::MerchantRepository;
use crate::repositories::balance;

/// A merchant's refund of a settled order.
#[derive(Debug, Clone)]
pub struct RefundRequest {
    /// Merchant client id.
    pub client_id: String,
    /// Merchant client secret.
    pub client_secret: String,
    /// Order to refund.
    pub order_id: i64,
    /// Must equal the order amount exactly.
    pub amount: Decimal,
}

/// Outcome of one pass over overdue disputes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisputeSweep {
    /// Disputes refunded to the payer.
    pub refunded: u64,
    /// Disputes left open because the merchant cannot cover the refund.
    pub uncovered: u64,
}

/// How a merchant closes a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisputeResolution {
    /// Accept the dispute and return the funds.
    Refund,
    /// Reject the dispute; funds stay with the merchant.
    Refuse,
}

impl SettlementEngine {
    /// Refunds a `success` order of the authenticated merchant.
    ///
    /// # Errors
    ///
    /// - `MerchantInfoNotFound` if the credential does not authenticate
    /// - `OrderNotFound` unless the order is `success` with exactly `amount`
    /// - `InsufficientBalance` if the merchant can no longer cover the refund
    pub async fn refund(&self, request: RefundRequest) -> Result<orders::Model, SettlementError> {
        let credential =
            MerchantRepository::authenticate(&self.db, &request.client_id, &request.client_secret)
                .await?
                .ok_or(LedgerError::MerchantInfoNotFound)?;

        let txn = self.db.begin().await?;
        let order = orders::Entity::find_by_id(request.order_id)
            .filter(orders::Column::ClientId.eq(credential.client_id.as_str()))
            .filter(orders::Column::Status.eq(OrderStatus::Success))
            .filter(orders::Column::Amount.eq(request.amount))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(LedgerError::OrderNotFound)?;

        let refunded = apply_refund(&txn, order).await?;
        txn.commit().await?;

        tracing::info!(
            order_id = refunded.id,
            client_id = %credential.client_id,
            amount = %refunded.amount,
            "Order refunded"
        );
        Ok(refunded)
    }

    /// Opens a dispute on one of the payer's settled merchant orders.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound` unless the payer paid the order and it is `success`.
    pub async fn open_dispute(
        &self,
        payer_id: i64,
        order_id: i64,
    ) -> Result<orders::Model, SettlementError> {
        let txn = self.db.begin().await?;
        let order = orders::Entity::find_by_id(order_id)
            .filter(orders::Column::PayerId.eq(payer_id))
            .filter(
                orders::Column::OrderType.is_in([DbOrderType::Payment, DbOrderType::Online]),
            )
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(LedgerError::OrderNotFound)?;

        let disputed = set_status(&txn, order, CoreOrderStatus::Disputing).await?;
        txn.commit().await?;

        tracing::info!(order_id, payer_id, "Dispute opened");
        Ok(disputed)
    }

    /// Closes a dispute on one of the merchant's orders.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound` if the merchant was not paid by the order,
    /// `InvalidTransition` if it is not `disputing`, and `InsufficientBalance`
    /// if a refund can no longer be covered.
    pub async fn resolve_dispute(
        &self,
        merchant_id: i64,
        order_id: i64,
        resolution: DisputeResolution,
    ) -> Result<orders::Model, SettlementError> {
        let txn = self.db.begin().await?;
        let order = orders::Entity::find_by_id(order_id)
            .filter(orders::Column::PayeeId.eq(merchant_id))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(LedgerError::OrderNotFound)?;
        let current = CoreOrderStatus::from(order.status);
        if current != CoreOrderStatus::Disputing {
            let to = match resolution {
                DisputeResolution::Refund => CoreOrderStatus::Refund,
                DisputeResolution::Refuse => CoreOrderStatus::Refused,
            };
            return Err(LedgerError::InvalidTransition { from: current, to }.into());
        }

        let closed = match resolution {
            DisputeResolution::Refund => apply_refund(&txn, order).await?,
            DisputeResolution::Refuse => set_status(&txn, order, CoreOrderStatus::Refused).await?,
        };
        txn.commit().await?;

        tracing::info!(order_id, merchant_id, ?resolution, "Dispute resolved");
        Ok(closed)
    }
}

impl SettlementEngine {
    /// Refunds every dispute opened before `opened_before` that the merchant
    /// never answered.
    ///
    /// Each dispute settles in its own transaction. A merchant who can no
    /// longer cover the refund leaves the dispute open for the next pass.
    ///
    /// # Errors
    ///
    /// Returns an error on database failures; disputes already refunded in
    /// this pass stay refunded.
    pub async fn refund_expired_disputes(
        &self,
        opened_before: DateTime<Utc>,
    ) -> Result<DisputeSweep, SettlementError> {
        let overdue: Vec<i64> = orders::Entity::find()
            .select_only()
            .column(orders::Column::Id)
            .filter(orders::Column::Status.eq(OrderStatus::Disputing))
            .filter(orders::Column::UpdatedAt.lt(opened_before))
            .order_by_asc(orders::Column::Id)
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut sweep = DisputeSweep::default();
        for order_id in overdue {
            let txn = self.db.begin().await?;
            let Some(order) = orders::Entity::find_by_id(order_id)
                .filter(orders::Column::Status.eq(OrderStatus::Disputing))
                .filter(orders::Column::UpdatedAt.lt(opened_before))
                .lock_exclusive()
                .one(&txn)
                .await?
            else {
                // Resolved by the merchant since the scan.
                continue;
            };

            match apply_refund(&txn, order).await {
                Ok(_) => {
                    txn.commit().await?;
                    sweep.refunded += 1;
                    tracing::info!(order_id, "Unanswered dispute refunded");
                }
                Err(SettlementError::Ledger(LedgerError::InsufficientBalance)) => {
                    txn.rollback().await?;
                    sweep.uncovered += 1;
                    tracing::warn!(order_id, "Merchant cannot cover dispute refund, left open");
                }
                Err(SettlementError::Ledger(LedgerError::ConcurrentSettlement)) => {
                    txn.rollback().await?;
                    tracing::debug!(order_id, "Dispute refund busy, retrying next pass");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(sweep)
    }
}

/// Reverses a settled order's money and score effects and marks it `refund`.
///
/// The merchant side is deducted first and conditionally; test-mode orders
/// moved nothing and only change status.
async fn apply_refund(
    txn: &DatabaseTransaction,
    order: orders::Model,
) -> Result<orders::Model, SettlementError> {
    if !order.is_test {
        let order_type = CoreOrderType::from(order.order_type);
        let payer_score = if order_type.is_merchant() {
            payer_score_gain(order.amount)
        } else {
            0
        };
        balance::lock_pair(txn, order.payer_id, order.payee_id).await?;
        balance::reverse_credit(
            txn,
            order.payee_id,
            order.amount - order.fee,
            order.payee_score_delta,
        )
        .await?;
        balance::reverse_debit(txn, order.payer_id, order.amount, payer_score).await?;
    }
    set_status(txn, order, CoreOrderStatus::Refund).await
}

async fn set_status(
    txn: &DatabaseTransaction,
    order: orders::Model,
    to: CoreOrderStatus,
) -> Result<orders::Model, SettlementError> {
    let next = OrderLifecycle::transition(order.status.into(), to)?;
    let mut active: orders::ActiveModel = order.into();
    active.status = Set(next.into());
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(txn).await?)
}
