//! Wallet payment routes.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use credit_core::ledger::{LedgerError, OrderStatus, OrderType};
use credit_db::entities::orders;
use credit_db::settlement::{PayLinkRequest, PaymentPage, TransferRequest};
use credit_db::{AccountRepository, PayConfigRepository};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiResult;
use crate::middleware::AuthUser;

/// Creates the payment routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payment/order", get(get_order))
        .route("/payment/order/pay", post(pay_order))
        .route("/payment/link/pay", post(pay_link))
        .route("/payment/transfer", post(transfer))
        .route("/payment/usage", get(usage))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query carrying an order token.
#[derive(Debug, Deserialize)]
pub struct OrderTokenQuery {
    /// Opaque order token from the payment page URL.
    pub order_no: String,
}

/// Request body for paying a merchant order.
#[derive(Debug, Deserialize)]
pub struct PayOrderRequest {
    /// Opaque order token.
    pub order_no: String,
    /// Payment secret.
    #[serde(default)]
    pub pay_key: String,
}

/// Request body for paying through a payment link.
#[derive(Debug, Deserialize)]
pub struct PayLinkBody {
    /// Link token.
    pub token: String,
    /// Payment secret.
    #[serde(default)]
    pub pay_key: String,
    /// Optional note.
    #[serde(default)]
    pub remark: String,
}

/// Request body for a transfer.
#[derive(Debug, Deserialize)]
pub struct TransferBody {
    /// Recipient account id.
    pub recipient_id: i64,
    /// Recipient username, checked against the id.
    pub recipient_username: String,
    /// Amount to send.
    pub amount: Decimal,
    /// Payment secret.
    #[serde(default)]
    pub pay_key: String,
    /// Optional note.
    #[serde(default)]
    pub remark: String,
}

/// An order as shown to its payer or payee.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    /// Order ID.
    pub id: i64,
    /// Display name.
    pub order_name: String,
    /// Merchant reference, if any.
    pub merchant_order_no: Option<String>,
    /// Payer account.
    pub payer_id: i64,
    /// Payee account; 0 is the system.
    pub payee_id: i64,
    /// Amount.
    pub amount: Decimal,
    /// Fee charged to the payee.
    pub fee: Decimal,
    /// Status.
    pub status: OrderStatus,
    /// Type.
    #[serde(rename = "type")]
    pub order_type: OrderType,
    /// Remark, including system annotations.
    pub remark: String,
    /// Test-mode order that moved no funds.
    pub is_test: bool,
    /// Settlement time.
    pub trade_time: Option<String>,
    /// Created at timestamp.
    pub created_at: String,
}

impl From<orders::Model> for OrderResponse {
    fn from(order: orders::Model) -> Self {
        Self {
            id: order.id,
            order_name: order.order_name,
            merchant_order_no: order.merchant_order_no,
            payer_id: order.payer_id,
            payee_id: order.payee_id,
            amount: order.amount,
            fee: order.fee,
            status: order.status.into(),
            order_type: order.order_type.into(),
            remark: order.remark,
            is_test: order.is_test,
            trade_time: order.trade_time.map(|at| at.to_rfc3339()),
            created_at: order.created_at.to_rfc3339(),
        }
    }
}

/// A pending merchant order as shown before payment.
///
/// Carries no order id; the token stands in for it.
#[derive(Debug, Serialize)]
pub struct PaymentPageResponse {
    /// Merchant application name.
    pub app_name: String,
    /// Order name.
    pub order_name: String,
    /// Merchant reference.
    pub merchant_order_no: Option<String>,
    /// Amount.
    pub amount: Decimal,
    /// Status.
    pub status: OrderStatus,
    /// Fee rate of the merchant's tier.
    pub fee_rate: Decimal,
    /// When the order expires.
    pub expires_at: String,
    /// Where to send the payer afterwards.
    pub redirect_uri: String,
}

impl From<PaymentPage> for PaymentPageResponse {
    fn from(page: PaymentPage) -> Self {
        Self {
            app_name: page.app_name,
            order_name: page.order.order_name,
            merchant_order_no: page.order.merchant_order_no,
            amount: page.order.amount,
            status: page.order.status.into(),
            fee_rate: page.fee_rate,
            expires_at: page.order.expires_at.to_rfc3339(),
            redirect_uri: page.redirect_uri,
        }
    }
}

/// Today's spending against the daily limit.
#[derive(Debug, Serialize)]
pub struct UsageResponse {
    /// Spent today, in the configured time zone.
    pub today_spent: Decimal,
    /// The tier's daily limit; `None` means unlimited.
    pub daily_limit: Option<Decimal>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/payment/order?order_no=` - Resolve an order token for the payment page.
async fn get_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<OrderTokenQuery>,
) -> ApiResult<Json<PaymentPageResponse>> {
    let page = state
        .engine
        .payment_page(auth.account_id(), &query.order_no)
        .await?;
    Ok(Json(page.into()))
}

/// POST `/payment/order/pay` - Pay a merchant order.
async fn pay_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<PayOrderRequest>,
) -> ApiResult<Json<OrderResponse>> {
    let order = state
        .engine
        .pay_merchant_order(auth.account_id(), &body.order_no, &body.pay_key)
        .await?;
    Ok(Json(order.into()))
}

/// POST `/payment/link/pay` - Pay through a payment link.
async fn pay_link(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<PayLinkBody>,
) -> ApiResult<Json<OrderResponse>> {
    let order = state
        .engine
        .pay_link(
            auth.account_id(),
            PayLinkRequest {
                token: body.token,
                pay_key: body.pay_key,
                remark: body.remark,
            },
        )
        .await?;
    Ok(Json(order.into()))
}

/// POST `/payment/transfer` - Send funds to another account.
async fn transfer(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<TransferBody>,
) -> ApiResult<Json<OrderResponse>> {
    let order = state
        .engine
        .transfer(
            auth.account_id(),
            TransferRequest {
                recipient_id: body.recipient_id,
                recipient_username: body.recipient_username,
                amount: body.amount,
                pay_key: body.pay_key,
                remark: body.remark,
            },
        )
        .await?;
    Ok(Json(order.into()))
}

/// GET `/payment/usage` - Today's spending against the daily limit.
async fn usage(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<UsageResponse>> {
    let accounts = AccountRepository::new(state.db.clone());
    let account = accounts
        .find_by_id(auth.account_id())
        .await?
        .ok_or(LedgerError::AccountNotFound(auth.account_id()))?;
    let tier = PayConfigRepository::tier_for(&state.db, account.pay_score).await?;
    let today_spent = accounts
        .today_spent(account.id, state.engine.settings().timezone)
        .await?;

    Ok(Json(UsageResponse {
        today_spent,
        daily_limit: tier.enforced_daily_limit(),
    }))
}
