//! Peer-to-peer transfers.

use chrono::Utc;
use credit_core::ledger::{LedgerError, OrderStatus, OrderType};
use credit_core::money::validate_amount;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};

use super::{Movement, SettlementEngine, move_funds};
use crate::entities::orders;
use crate::error::SettlementError;
use crate::repositories::AccountRepository;
use crate::repositories::balance::DebitCounter;

/// Order name of transfers.
const TRANSFER_ORDER_NAME: &str = "transfer";

/// A transfer to another account, addressed by id and username.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Recipient account id.
    pub recipient_id: i64,
    /// Recipient username; must match the id.
    pub recipient_username: String,
    /// Amount to send.
    pub amount: Decimal,
    /// Sender's payment secret.
    pub pay_key: String,
    /// Optional note.
    pub remark: String,
}

impl SettlementEngine {
    /// Moves funds between two accounts without fee or score.
    ///
    /// Concurrent transfers from the same payer queue on the payer's row
    /// lock rather than failing; the conditional debit then decides.
    ///
    /// # Errors
    ///
    /// `InvalidAmount`, `CannotTransferToSelf`, `RecipientNotFound`,
    /// `PayKeyIncorrect` or `InsufficientBalance`.
    pub async fn transfer(
        &self,
        payer_id: i64,
        request: TransferRequest,
    ) -> Result<orders::Model, SettlementError> {
        let amount = validate_amount(request.amount)?;
        if request.recipient_id == payer_id {
            return Err(LedgerError::CannotTransferToSelf.into());
        }
        let recipient = AccountRepository::find_by_id_and_username(
            &self.db,
            request.recipient_id,
            &request.recipient_username,
        )
        .await?
        .ok_or(LedgerError::RecipientNotFound)?;
        let payer = self.load_payer(payer_id, &request.pay_key).await?;

        let now = Utc::now();
        let txn = self.db.begin().await?;

        move_funds(
            &txn,
            &Movement {
                payer_id: payer.id,
                payee_id: recipient.id,
                amount,
                net: amount,
                counter: DebitCounter::Transfer,
                payer_score: 0,
                payee_score: 0,
            },
        )
        .await?;

        let order = orders::ActiveModel {
            order_name: Set(TRANSFER_ORDER_NAME.to_string()),
            payer_id: Set(payer.id),
            payee_id: Set(recipient.id),
            amount: Set(amount),
            status: Set(OrderStatus::Success.into()),
            order_type: Set(OrderType::Transfer.into()),
            remark: Set(request.remark),
            trade_time: Set(Some(now.into())),
            expires_at: Set(now.into()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        tracing::info!(
            order_id = order.id,
            payer_id = payer.id,
            payee_id = recipient.id,
            amount = %amount,
            "Transfer settled"
        );
        Ok(order)
    }
}
