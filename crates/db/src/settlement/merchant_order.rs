//! Merchant orders: issuance, token resolution and payment.

use chrono::Utc;
use credit_core::ledger::{LedgerError, OrderLifecycle, OrderStatus as CoreOrderStatus, OrderType};
use credit_core::merchant::OrderTokenCipher;
use credit_core::money::{FeeBreakdown, compute_fee, score_delta, validate_amount};
use rust_decimal::Decimal;
use sea_orm::sea_query::{LockBehavior, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};

use super::{Movement, SettlementEngine, TEST_MODE_REMARK, move_funds, payer_score_gain};
use crate::entities::sea_orm_active_enums::OrderStatus;
use crate::entities::{accounts, merchant_credentials, orders};
use crate::error::SettlementError;
use crate::repositories::balance::DebitCounter;
use crate::repositories::{AccountRepository, MerchantRepository, PayConfigRepository};

/// A merchant's request to collect a payment.
#[derive(Debug, Clone)]
pub struct NewMerchantOrder {
    /// Display name.
    pub order_name: String,
    /// Merchant's own reference.
    pub merchant_order_no: String,
    /// Amount to collect.
    pub amount: Decimal,
    /// Payment type reported back in the webhook.
    pub payment_type: String,
    /// Free-form remark.
    pub remark: String,
}

/// A pending order and the link the payer follows to pay it.
#[derive(Debug, Clone)]
pub struct IssuedOrder {
    /// The pending order.
    pub order: orders::Model,
    /// Opaque token standing in for the order id.
    pub token: String,
    /// Payment page URL carrying the token.
    pub pay_url: String,
}

/// An order token opened with its merchant's key.
#[derive(Debug, Clone)]
pub struct ResolvedOrder {
    /// Internal order id.
    pub order_id: i64,
    /// Merchant account that issued the token.
    pub merchant: accounts::Model,
}

/// What the payment page shows before the payer confirms.
#[derive(Debug, Clone)]
pub struct PaymentPage {
    /// The pending order.
    pub order: orders::Model,
    /// Fee rate of the merchant's tier.
    pub fee_rate: Decimal,
    /// Merchant application name.
    pub app_name: String,
    /// Where to send the payer afterwards.
    pub redirect_uri: String,
}

impl SettlementEngine {
    /// Creates a pending `payment` order and issues its token.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidAmount` for a bad amount and
    /// `LedgerError::MerchantInfoNotFound` if the merchant account is inactive.
    pub async fn create_merchant_order(
        &self,
        credential: &merchant_credentials::Model,
        input: NewMerchantOrder,
    ) -> Result<IssuedOrder, SettlementError> {
        let amount = validate_amount(input.amount)?;
        let merchant = AccountRepository::find_active(&self.db, credential.account_id)
            .await?
            .ok_or(LedgerError::MerchantInfoNotFound)?;
        let cipher = OrderTokenCipher::new(&merchant.sign_key)?;

        let now = Utc::now();
        let expires_at = now
            + chrono::Duration::from_std(self.settings.order_ttl)
                .map_err(|e| LedgerError::Internal(e.to_string()))?;

        let txn = self.db.begin().await?;
        let order = orders::ActiveModel {
            order_name: Set(input.order_name),
            merchant_order_no: Set(Some(input.merchant_order_no)),
            client_id: Set(Some(credential.client_id.clone())),
            payee_id: Set(merchant.id),
            amount: Set(amount),
            status: Set(CoreOrderStatus::Pending.into()),
            order_type: Set(OrderType::Payment.into()),
            remark: Set(input.remark),
            payment_type: Set(input.payment_type),
            is_test: Set(credential.is_test_mode),
            expires_at: Set(expires_at.into()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        let token = cipher.seal(order.id)?;
        txn.commit().await?;

        self.tokens.remember(&token, merchant.id, order.id).await;

        let mut pay_url = self.settings.frontend_pay_url.clone();
        pay_url.query_pairs_mut().append_pair("order_no", &token);

        tracing::info!(
            order_id = order.id,
            client_id = %credential.client_id,
            amount = %amount,
            "Merchant order issued"
        );
        Ok(IssuedOrder {
            order,
            token,
            pay_url: pay_url.into(),
        })
    }

    /// Opens an order token on behalf of `payer_id`.
    ///
    /// # Errors
    ///
    /// - `LedgerError::OrderNotFound` if the token is unknown or expired
    /// - `LedgerError::MerchantInfoNotFound` if the issuing merchant is gone
    /// - `LedgerError::OrderNoFormatError` if the token does not open
    /// - `LedgerError::CannotPayOwnOrder` if the payer issued the order
    pub async fn resolve_order_token(
        &self,
        payer_id: i64,
        token: &str,
    ) -> Result<ResolvedOrder, SettlementError> {
        let merchant_id = self
            .tokens
            .merchant_for(token)
            .await
            .ok_or(LedgerError::OrderNotFound)?;
        let merchant = AccountRepository::find_active(&self.db, merchant_id)
            .await?
            .ok_or(LedgerError::MerchantInfoNotFound)?;
        let order_id = OrderTokenCipher::new(&merchant.sign_key)?.open(token)?;

        if payer_id == merchant.id {
            return Err(LedgerError::CannotPayOwnOrder.into());
        }
        Ok(ResolvedOrder { order_id, merchant })
    }

    /// Loads what the payment page needs for a token.
    ///
    /// # Errors
    ///
    /// Same as [`Self::resolve_order_token`], plus `OrderNotFound` if the
    /// order is no longer pending.
    pub async fn payment_page(
        &self,
        payer_id: i64,
        token: &str,
    ) -> Result<PaymentPage, SettlementError> {
        let resolved = self.resolve_order_token(payer_id, token).await?;
        let order = orders::Entity::find_by_id(resolved.order_id)
            .filter(orders::Column::Status.eq(OrderStatus::Pending))
            .one(&self.db)
            .await?
            .ok_or(LedgerError::OrderNotFound)?;
        let credential = MerchantRepository::find_credential_by_client_id(
            &self.db,
            order.client_id.as_deref().unwrap_or_default(),
        )
        .await?
        .ok_or(LedgerError::MerchantInfoNotFound)?;
        let tier = PayConfigRepository::tier_for(&self.db, resolved.merchant.pay_score).await?;

        Ok(PaymentPage {
            order,
            fee_rate: tier.fee_rate,
            app_name: credential.app_name,
            redirect_uri: credential.redirect_uri,
        })
    }

    /// Pays a pending merchant order identified by its token.
    ///
    /// A second concurrent attempt on the same order fails immediately with
    /// `LedgerError::ConcurrentSettlement` instead of waiting.
    ///
    /// # Errors
    ///
    /// Any token resolution error, `PayKeyIncorrect`, `DailyLimitExceeded`,
    /// `OrderNotFound`, `OrderExpired` or `InsufficientBalance`.
    pub async fn pay_merchant_order(
        &self,
        payer_id: i64,
        token: &str,
        pay_key: &str,
    ) -> Result<orders::Model, SettlementError> {
        let ResolvedOrder { order_id, merchant } = self.resolve_order_token(payer_id, token).await?;
        let payer = self.load_payer(payer_id, pay_key).await?;

        let preview = orders::Entity::find_by_id(order_id)
            .filter(orders::Column::Status.eq(OrderStatus::Pending))
            .one(&self.db)
            .await?
            .ok_or(LedgerError::OrderNotFound)?;
        let amount = validate_amount(preview.amount)?;
        let client_id = preview.client_id.clone().unwrap_or_default();
        let credential = MerchantRepository::find_credential_by_client_id(&self.db, &client_id)
            .await?
            .ok_or(LedgerError::MerchantInfoNotFound)?;
        let test_mode = credential.is_test_mode || preview.is_test;

        let payer_tier = PayConfigRepository::tier_for(&self.db, payer.pay_score).await?;
        let payee_tier = PayConfigRepository::tier_for(&self.db, merchant.pay_score).await?;

        let now = Utc::now();
        let txn = self.db.begin().await?;

        if !test_mode {
            self.enforce_daily_limit(&txn, payer.id, &payer_tier, amount, now)
                .await?;
        }

        let order = orders::Entity::find_by_id(order_id)
            .filter(orders::Column::Status.eq(OrderStatus::Pending))
            .lock_with_behavior(LockType::Update, LockBehavior::Nowait)
            .one(&txn)
            .await?
            .ok_or(LedgerError::OrderNotFound)?;

        if order.expires_at.with_timezone(&Utc) <= now {
            return Err(LedgerError::OrderExpired.into());
        }
        if !test_mode {
            let current = accounts::Entity::find_by_id(payer.id)
                .one(&txn)
                .await?
                .ok_or(LedgerError::AccountNotFound(payer.id))?;
            if current.available_balance < amount {
                return Err(LedgerError::InsufficientBalance.into());
            }
        }

        let next = OrderLifecycle::transition(order.status.into(), CoreOrderStatus::Success)?;
        let (fee, remark) = if test_mode {
            (FeeBreakdown::free(amount), TEST_MODE_REMARK.to_string())
        } else {
            let fee = compute_fee(amount, payee_tier.fee_rate);
            (fee, fee.annotate(&order.remark))
        };
        let payee_score = score_delta(amount, payee_tier.score_rate);

        let mut active: orders::ActiveModel = order.into();
        active.status = Set(next.into());
        active.payer_id = Set(payer.id);
        active.fee = Set(fee.fee);
        active.payee_score_delta = Set(if test_mode { 0 } else { payee_score });
        active.remark = Set(remark);
        active.is_test = Set(test_mode);
        active.trade_time = Set(Some(now.into()));
        active.updated_at = Set(now.into());
        let settled = active.update(&txn).await?;

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

        self.schedule_notification(&txn, settled.id, &client_id)
            .await?;
        txn.commit().await?;

        self.tokens.clear_expiry_marker(settled.id).await;

        tracing::info!(
            order_id = settled.id,
            payer_id = payer.id,
            payee_id = merchant.id,
            amount = %amount,
            fee = %fee.fee,
            test_mode,
            "Merchant order settled"
        );
        Ok(settled)
    }
}
