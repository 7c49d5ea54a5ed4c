//! Payment link purchases.

use chrono::Utc;
use credit_core::ledger::{LedgerError, OrderStatus, OrderType};
use credit_core::merchant::PAY_TYPE_EPAY;
use credit_core::money::{FeeBreakdown, compute_fee, score_delta, validate_amount};
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};

use super::{Movement, SettlementEngine, TEST_MODE_REMARK, move_funds, payer_score_gain};
use crate::entities::orders;
use crate::error::SettlementError;
use crate::repositories::balance::DebitCounter;
use crate::repositories::{AccountRepository, MerchantRepository, PayConfigRepository};

/// A payer's purchase through a merchant payment link.
#[derive(Debug, Clone)]
pub struct PayLinkRequest {
    /// Public link token.
    pub token: String,
    /// Payer's payment secret.
    pub pay_key: String,
    /// Optional note from the payer.
    pub remark: String,
}

impl SettlementEngine {
    /// Buys through a payment link, creating a settled `online` order.
    ///
    /// Link limits are checked under their limit locks, so concurrent buyers
    /// never exceed them.
    ///
    /// # Errors
    ///
    /// - `PaymentLinkNotFound` / `MerchantInfoNotFound` for a dead link
    /// - `CannotPaySelf` if the payer owns the link
    /// - `PayKeyIncorrect`, `DailyLimitExceeded`, `InsufficientBalance`
    /// - `PaymentLinkTotalLimitExceeded` / `PaymentLinkUserLimitExceeded`
    pub async fn pay_link(
        &self,
        payer_id: i64,
        request: PayLinkRequest,
    ) -> Result<orders::Model, SettlementError> {
        let link = MerchantRepository::find_link_by_token(&self.db, &request.token)
            .await?
            .ok_or(LedgerError::PaymentLinkNotFound)?;
        let credential = MerchantRepository::find_credential(&self.db, link.merchant_credential_id)
            .await?
            .ok_or(LedgerError::MerchantInfoNotFound)?;
        let merchant = AccountRepository::find_active(&self.db, credential.account_id)
            .await?
            .ok_or(LedgerError::MerchantInfoNotFound)?;
        if merchant.id == payer_id {
            return Err(LedgerError::CannotPaySelf.into());
        }

        let payer = self.load_payer(payer_id, &request.pay_key).await?;
        let amount = validate_amount(link.amount)?;
        let test_mode = credential.is_test_mode;
        if !test_mode && payer.available_balance < amount {
            return Err(LedgerError::InsufficientBalance.into());
        }

        let payer_tier = PayConfigRepository::tier_for(&self.db, payer.pay_score).await?;
        let payee_tier = PayConfigRepository::tier_for(&self.db, merchant.pay_score).await?;

        let now = Utc::now();
        let txn = self.db.begin().await?;

        if !test_mode {
            self.enforce_daily_limit(&txn, payer.id, &payer_tier, amount, now)
                .await?;
        }
        self.enforce_link_limits(&txn, &link, payer.id).await?;

        let (fee, remark) = if test_mode {
            (FeeBreakdown::free(amount), TEST_MODE_REMARK.to_string())
        } else {
            let fee = compute_fee(amount, payee_tier.fee_rate);
            (fee, fee.annotate(&request.remark))
        };
        let payee_score = if test_mode {
            0
        } else {
            score_delta(amount, payee_tier.score_rate)
        };

        let order = orders::ActiveModel {
            order_name: Set(link.product_name.clone()),
            client_id: Set(Some(credential.client_id.clone())),
            payer_id: Set(payer.id),
            payee_id: Set(merchant.id),
            amount: Set(amount),
            fee: Set(fee.fee),
            payee_score_delta: Set(payee_score),
            status: Set(OrderStatus::Success.into()),
            order_type: Set(OrderType::Online.into()),
            remark: Set(remark),
            payment_type: Set(PAY_TYPE_EPAY.to_string()),
            payment_link_id: Set(Some(link.id)),
            is_test: Set(test_mode),
            trade_time: Set(Some(now.into())),
            expires_at: Set(now.into()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        if !test_mode {
            move_funds(
                &txn,
                &Movement {
                    payer_id: payer.id,
                    payee_id: merchant.id,
                    amount,
                    net: fee.net,
                    counter: DebitCounter::Payment,
                    payer_score: payer_score_gain(amount),
                    payee_score,
                },
            )
            .await?;
        }

        self.schedule_notification(&txn, order.id, &credential.client_id)
            .await?;
        txn.commit().await?;

        tracing::info!(
            order_id = order.id,
            link_id = link.id,
            payer_id = payer.id,
            amount = %amount,
            test_mode,
            "Payment link purchase settled"
        );
        Ok(order)
    }
}
