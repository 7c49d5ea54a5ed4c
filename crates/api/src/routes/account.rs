//! Account balance and payment secret.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, put},
};
use credit_core::ledger::LedgerError;
use credit_db::AccountRepository;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;

/// Shortest accepted payment secret.
const MIN_PAY_KEY_LEN: usize = 6;

/// Creates the account routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/account", get(get_account))
        .route("/account/pay-key", put(set_pay_key))
}

/// Balances and counters of the caller's account.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    /// Account ID.
    pub id: i64,
    /// Username.
    pub username: String,
    /// Spendable balance.
    pub available_balance: Decimal,
    /// Last synced community score.
    pub community_balance: Decimal,
    /// Lifetime received.
    pub total_receive: Decimal,
    /// Lifetime paid to merchants.
    pub total_payment: Decimal,
    /// Lifetime transferred.
    pub total_transfer: Decimal,
    /// Reputation score selecting the pay tier.
    pub pay_score: i64,
    /// Whether a payment secret is set.
    pub has_pay_key: bool,
}

/// Request body for setting the payment secret.
#[derive(Debug, Deserialize)]
pub struct SetPayKeyRequest {
    /// New payment secret.
    pub pay_key: String,
}

/// GET `/account` - The caller's balances.
async fn get_account(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<AccountResponse>> {
    let account = AccountRepository::new(state.db.clone())
        .find_by_id(auth.account_id())
        .await?
        .ok_or(LedgerError::AccountNotFound(auth.account_id()))?;

    Ok(Json(AccountResponse {
        id: account.id,
        username: account.username,
        available_balance: account.available_balance,
        community_balance: account.community_balance,
        total_receive: account.total_receive,
        total_payment: account.total_payment,
        total_transfer: account.total_transfer,
        pay_score: account.pay_score,
        has_pay_key: account.pay_key_hash.is_some(),
    }))
}

/// PUT `/account/pay-key` - Set or replace the payment secret.
async fn set_pay_key(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<SetPayKeyRequest>,
) -> ApiResult<StatusCode> {
    if body.pay_key.chars().count() < MIN_PAY_KEY_LEN {
        return Err(ApiError::validation(format!(
            "pay_key must be at least {MIN_PAY_KEY_LEN} characters"
        )));
    }
    AccountRepository::new(state.db.clone())
        .set_pay_key(auth.account_id(), &body.pay_key)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
