//! Settlement Engine.
//!
//! Every payment, link purchase, transfer and refund runs as one database
//! transaction that validates, takes the locks it needs, checks limits,
//! moves money with relative updates, writes the order and, for merchant
//! flows, enqueues the webhook job. Any failure rolls the whole unit back.
//!
//! The flows differ only in their pre-checks and in how the order row is
//! obtained; they share the commit sequence implemented here:
//!
//! 1. `enforce_daily_limit` / `enforce_link_limits` (limit lock, then count)
//! 2. `move_funds` (conditional debit, then credit)
//! 3. `schedule_notification` (job insert inside the same transaction)

mod merchant_order;
mod payment_link;
mod refund;
mod transfer;

pub use merchant_order::{IssuedOrder, NewMerchantOrder, PaymentPage, ResolvedOrder};
pub use payment_link::PayLinkRequest;
pub use refund::{DisputeResolution, DisputeSweep, RefundRequest};
pub use transfer::TransferRequest;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use credit_core::auth::verify_pay_key;
use credit_core::jobs::JobPayload;
use credit_core::ledger::{DailyWindow, LedgerError, LimitKey, PayTier, parse_timezone};
use credit_core::money::score_delta;
use credit_shared::config::{PaymentConfig, WorkerConfig};
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, DatabaseTransaction};
use url::Url;

use crate::entities::{accounts, payment_links};
use crate::error::SettlementError;
use crate::limit_lock::LimitLock;
use crate::repositories::balance::{self, DebitCounter};
use crate::repositories::{AccountRepository, JobRepository, OrderRepository};
use crate::token_store::TokenStore;

/// Remark written on test-mode orders, which move no funds.
pub const TEST_MODE_REMARK: &str = "[system]: test mode order, no funds moved";

/// Process-wide settlement settings, fixed at startup.
#[derive(Debug, Clone)]
pub struct SettlementSettings {
    /// Zone whose calendar day bounds the daily limit.
    pub timezone: Tz,
    /// Lifetime of a pending merchant order and its token.
    pub order_ttl: Duration,
    /// Payment page the payer is redirected to.
    pub frontend_pay_url: Url,
    /// Delivery attempts per merchant webhook.
    pub notify_max_attempts: i32,
}

impl SettlementSettings {
    /// Builds settings from configuration.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Internal` for an unknown time zone or a bad URL.
    pub fn from_config(
        payment: &PaymentConfig,
        worker: &WorkerConfig,
    ) -> Result<Self, LedgerError> {
        let frontend_pay_url = Url::parse(&payment.frontend_pay_url).map_err(|e| {
            LedgerError::Internal(format!(
                "invalid frontend pay url {}: {e}",
                payment.frontend_pay_url
            ))
        })?;
        Ok(Self {
            timezone: parse_timezone(&payment.timezone)?,
            order_ttl: Duration::from_secs(u64::from(payment.order_expire_minutes) * 60),
            frontend_pay_url,
            notify_max_attempts: worker.notify_max_attempts,
        })
    }
}

/// One value movement between two accounts.
#[derive(Debug, Clone, Copy)]
struct Movement {
    payer_id: i64,
    payee_id: i64,
    /// Taken from the payer.
    amount: Decimal,
    /// Given to the payee, after fee.
    net: Decimal,
    counter: DebitCounter,
    payer_score: i64,
    payee_score: i64,
}

/// Orchestrates atomic settlements.
#[derive(Clone)]
pub struct SettlementEngine {
    db: DatabaseConnection,
    limit_lock: Arc<dyn LimitLock>,
    tokens: Arc<TokenStore>,
    settings: Arc<SettlementSettings>,
}

impl std::fmt::Debug for SettlementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementEngine")
            .field("tokens", &self.tokens)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl SettlementEngine {
    /// Creates a new settlement engine.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        limit_lock: Arc<dyn LimitLock>,
        tokens: Arc<TokenStore>,
        settings: SettlementSettings,
    ) -> Self {
        Self {
            db,
            limit_lock,
            tokens,
            settings: Arc::new(settings),
        }
    }

    /// The order token store shared with the expiry sweeper.
    #[must_use]
    pub const fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Settlement settings.
    #[must_use]
    pub fn settings(&self) -> &SettlementSettings {
        &self.settings
    }

    /// Loads the paying account and checks its payment secret.
    async fn load_payer(
        &self,
        payer_id: i64,
        pay_key: &str,
    ) -> Result<accounts::Model, SettlementError> {
        let payer = AccountRepository::find_active(&self.db, payer_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(payer_id))?;
        verify_pay_key(pay_key, payer.pay_key_hash.as_deref())?;
        Ok(payer)
    }

    /// Serializes and checks the payer's daily spending.
    ///
    /// Takes no lock when the tier has no enforced limit.
    async fn enforce_daily_limit(
        &self,
        txn: &DatabaseTransaction,
        payer_id: i64,
        tier: &PayTier,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), SettlementError> {
        let Some(limit) = tier.enforced_daily_limit() else {
            return Ok(());
        };
        let window = DailyWindow::containing(now, self.settings.timezone);
        self.limit_lock
            .acquire(txn, &LimitKey::daily_spend(payer_id, &window))
            .await?;

        let spent = OrderRepository::spent_between(txn, payer_id, &window).await?;
        if spent + amount > limit {
            return Err(LedgerError::DailyLimitExceeded { limit, spent }.into());
        }
        Ok(())
    }

    /// Serializes and checks a payment link's total and per-payer limits.
    async fn enforce_link_limits(
        &self,
        txn: &DatabaseTransaction,
        link: &payment_links::Model,
        payer_id: i64,
    ) -> Result<(), SettlementError> {
        if let Some(limit) = link.enforced_total_limit() {
            self.limit_lock
                .acquire(txn, &LimitKey::link_total(link.id))
                .await?;
            let used = OrderRepository::count_link_successes(txn, link.id, None).await?;
            if used >= u64::try_from(limit).unwrap_or(0) {
                return Err(LedgerError::PaymentLinkTotalLimitExceeded { limit }.into());
            }
        }

        if let Some(limit) = link.enforced_user_limit() {
            self.limit_lock
                .acquire(txn, &LimitKey::link_per_payer(link.id, payer_id))
                .await?;
            let used = OrderRepository::count_link_successes(txn, link.id, Some(payer_id)).await?;
            if used >= u64::try_from(limit).unwrap_or(0) {
                return Err(LedgerError::PaymentLinkUserLimitExceeded { limit }.into());
            }
        }
        Ok(())
    }

    /// Schedules the merchant webhook; it exists only if `txn` commits.
    async fn schedule_notification(
        &self,
        txn: &DatabaseTransaction,
        order_id: i64,
        client_id: &str,
    ) -> Result<(), SettlementError> {
        let payload = JobPayload::MerchantNotify {
            order_id,
            client_id: client_id.to_string(),
        };
        JobRepository::enqueue(txn, &payload, self.settings.notify_max_attempts).await?;
        Ok(())
    }
}

/// Locks both accounts, debits the payer (conditionally), then credits the payee.
async fn move_funds(txn: &DatabaseTransaction, movement: &Movement) -> Result<(), SettlementError> {
    balance::lock_pair(txn, movement.payer_id, movement.payee_id).await?;
    balance::debit(
        txn,
        movement.payer_id,
        movement.amount,
        movement.counter,
        movement.payer_score,
    )
    .await?;
    balance::credit(txn, movement.payee_id, movement.net, movement.payee_score).await
}

/// Score a payer earns for spending `amount`: one point per unit.
fn payer_score_gain(amount: Decimal) -> i64 {
    score_delta(amount, Decimal::ONE)
}
