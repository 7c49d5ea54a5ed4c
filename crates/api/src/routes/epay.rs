//! Merchant epay protocol.
//!
//! - `submit.php` creates a pending order from a signed form and redirects the
//!   payer to the payment page
//! - `api.php?act=order` reports an order
//! - `api.php?act=refund` refunds a settled order
//!
//! Merchants authenticate with a signature on submit and with `pid` + `key`
//! (client id and secret) on `api.php`.

use std::str::FromStr;

use axum::{
    Form, Json, Router,
    extract::{Query, State},
    response::Redirect,
    routing::get,
};
use chrono_tz::Tz;
use credit_core::ledger::{LedgerError, OrderStatus};
use credit_core::merchant::{PAY_TYPE_EPAY, SubmitRequest};
use credit_core::money::format_money;
use credit_db::entities::orders;
use credit_db::settlement::{NewMerchantOrder, RefundRequest};
use credit_db::{MerchantRepository, OrderRepository};
use rust_decimal::Decimal;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::AppState;
use crate::error::{ApiError, EpayResult};

/// Epay code for a successful request.
pub const EPAY_SUCCESS: i32 = 1;

/// Timestamp format of the epay protocol.
const EPAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Creates the epay routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/submit.php", get(submit_query).post(submit_form))
        .route("/api.php", get(api_query).post(api_form))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Selects the `api.php` action.
#[derive(Debug, Default, Deserialize)]
pub struct ActQuery {
    /// `order` or `refund`.
    pub act: Option<String>,
}

/// Parameters of `api.php`.
#[derive(Debug, Default, Deserialize)]
pub struct ApiParams {
    /// Action, when sent in the body.
    pub act: Option<String>,
    /// Merchant client id.
    #[serde(default)]
    pub pid: String,
    /// Merchant client secret.
    #[serde(default)]
    pub key: String,
    /// Internal order id.
    pub trade_no: Option<String>,
    /// Merchant order reference.
    pub out_trade_no: Option<String>,
    /// Refund amount.
    pub money: Option<String>,
}

/// `act=order` response.
#[derive(Debug, Serialize)]
pub struct EpayOrderResponse {
    /// Always `1`.
    pub code: i32,
    /// Human-readable status.
    pub msg: &'static str,
    /// Internal order id.
    pub trade_no: String,
    /// Merchant order reference.
    pub out_trade_no: String,
    /// Payment type.
    #[serde(rename = "type")]
    pub pay_type: String,
    /// Merchant client id.
    pub pid: String,
    /// Creation time.
    pub addtime: String,
    /// Settlement time, if settled.
    pub endtime: Option<String>,
    /// Order name.
    pub name: String,
    /// Amount, two decimals.
    pub money: String,
    /// `1` once settled, otherwise `0`.
    pub status: i32,
}

/// `act=refund` response.
#[derive(Debug, Serialize)]
pub struct EpayRefundResponse {
    /// Always `1`.
    pub code: i32,
    /// Human-readable status.
    pub msg: &'static str,
}

fn format_time(at: DateTimeWithTimeZone, tz: Tz) -> String {
    at.with_timezone(&tz).format(EPAY_TIME_FORMAT).to_string()
}

impl EpayOrderResponse {
    fn from_order(order: orders::Model, client_id: &str, tz: Tz) -> Self {
        let settled = OrderStatus::from(order.status) == OrderStatus::Success;
        Self {
            code: EPAY_SUCCESS,
            msg: "succ",
            trade_no: order.id.to_string(),
            out_trade_no: order.merchant_order_no.unwrap_or_default(),
            pay_type: if order.payment_type.is_empty() {
                PAY_TYPE_EPAY.to_string()
            } else {
                order.payment_type
            },
            pid: client_id.to_string(),
            addtime: format_time(order.created_at, tz),
            endtime: order.trade_time.map(|at| format_time(at, tz)),
            name: order.order_name,
            money: format_money(order.amount),
            status: i32::from(settled),
        }
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/epay/submit.php` - Signed order submission as query parameters.
async fn submit_query(
    State(state): State<AppState>,
    Query(request): Query<SubmitRequest>,
) -> EpayResult<Redirect> {
    submit(&state, request).await
}

/// POST `/epay/submit.php` - Signed order submission as a form.
async fn submit_form(
    State(state): State<AppState>,
    Form(request): Form<SubmitRequest>,
) -> EpayResult<Redirect> {
    submit(&state, request).await
}

async fn submit(state: &AppState, request: SubmitRequest) -> EpayResult<Redirect> {
    let credential = MerchantRepository::new(state.db.clone())
        .find_by_client_id(&request.pid)
        .await?
        .ok_or(LedgerError::MerchantInfoNotFound)?;
    let amount = request.verify(&credential.client_secret)?;

    let issued = state
        .engine
        .create_merchant_order(
            &credential,
            NewMerchantOrder {
                order_name: request.name,
                merchant_order_no: request.out_trade_no,
                amount,
                payment_type: if request.pay_type.is_empty() {
                    PAY_TYPE_EPAY.to_string()
                } else {
                    request.pay_type
                },
                remark: String::new(),
            },
        )
        .await?;

    info!(
        order_id = issued.order.id,
        client_id = %credential.client_id,
        "Merchant order submitted"
    );
    Ok(Redirect::to(&issued.pay_url))
}

/// GET `/epay/api.php` - Query actions.
async fn api_query(
    State(state): State<AppState>,
    Query(params): Query<ApiParams>,
) -> EpayResult<Json<serde_json::Value>> {
    let act = params.act.clone().unwrap_or_default();
    dispatch(&state, &act, params).await
}

/// POST `/epay/api.php` - Form actions; `act` may sit in the query or the body.
async fn api_form(
    State(state): State<AppState>,
    Query(query): Query<ActQuery>,
    Form(params): Form<ApiParams>,
) -> EpayResult<Json<serde_json::Value>> {
    let act = query.act.or_else(|| params.act.clone()).unwrap_or_default();
    dispatch(&state, &act, params).await
}

async fn dispatch(
    state: &AppState,
    act: &str,
    params: ApiParams,
) -> EpayResult<Json<serde_json::Value>> {
    let body = match act {
        "order" => serde_json::to_value(query_order(state, params).await?),
        "refund" => serde_json::to_value(refund(state, params).await?),
        other => return Err(ApiError::validation(format!("unknown act: {other}")).into()),
    };
    body.map(Json)
        .map_err(|e| ApiError::from(LedgerError::Internal(e.to_string())).into())
}

async fn query_order(state: &AppState, params: ApiParams) -> EpayResult<EpayOrderResponse> {
    let credential = MerchantRepository::authenticate(&state.db, &params.pid, &params.key)
        .await?
        .ok_or(LedgerError::MerchantInfoNotFound)?;

    let orders = OrderRepository::new(state.db.clone());
    let order = match (params.trade_no.as_deref(), params.out_trade_no.as_deref()) {
        (Some(trade_no), _) if !trade_no.is_empty() => {
            let id = trade_no
                .parse::<i64>()
                .map_err(|_| LedgerError::OrderNotFound)?;
            orders.find_for_client(id, &credential.client_id).await?
        }
        (_, Some(out_trade_no)) if !out_trade_no.is_empty() => {
            orders
                .find_by_merchant_order_no(&credential.client_id, out_trade_no)
                .await?
        }
        _ => return Err(ApiError::validation("trade_no or out_trade_no is required").into()),
    }
    .ok_or(LedgerError::OrderNotFound)?;

    Ok(EpayOrderResponse::from_order(
        order,
        &credential.client_id,
        state.engine.settings().timezone,
    ))
}

async fn refund(state: &AppState, params: ApiParams) -> EpayResult<EpayRefundResponse> {
    let order_id = params
        .trade_no
        .as_deref()
        .and_then(|no| no.parse::<i64>().ok())
        .ok_or(LedgerError::OrderNotFound)?;
    let money = params.money.unwrap_or_default();
    let amount = Decimal::from_str(money.trim())
        .map_err(|_| LedgerError::InvalidAmount(format!("unparseable amount {money}")))?;

    state
        .engine
        .refund(RefundRequest {
            client_id: params.pid,
            client_secret: params.key,
            order_id,
            amount,
        })
        .await?;

    Ok(EpayRefundResponse {
        code: EPAY_SUCCESS,
        msg: "refund succeeded",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use credit_db::entities::sea_orm_active_enums::{OrderStatus as DbStatus, OrderType};
    use rust_decimal_macros::dec;

    fn order(status: DbStatus) -> orders::Model {
        let created: DateTimeWithTimeZone =
            Utc.with_ymd_and_hms(2026, 3, 1, 16, 30, 5).unwrap().into();
        orders::Model {
            id: 42,
            order_name: "Sticker pack".into(),
            merchant_order_no: Some("M-1".into()),
            client_id: Some("client-1".into()),
            payer_id: 7,
            payee_id: 8,
            amount: dec!(12.5),
            fee: dec!(0.63),
            payee_score_delta: 0,
            status,
            order_type: OrderType::Payment,
            remark: String::new(),
            payment_type: String::new(),
            payment_link_id: None,
            is_test: false,
            trade_time: (status == DbStatus::Success).then_some(created),
            expires_at: created,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_order_response_for_settled_order() {
        let response =
            EpayOrderResponse::from_order(
                order(DbStatus::Success),
                "client-1",
                chrono_tz::Asia::Shanghai,
            );
        assert_eq!(response.trade_no, "42");
        assert_eq!(response.money, "12.50");
        assert_eq!(response.pay_type, "epay");
        assert_eq!(response.status, 1);
        // 16:30 UTC is past midnight in Shanghai.
        assert_eq!(response.addtime, "2026-03-02 00:30:05");
        assert_eq!(response.endtime.as_deref(), Some("2026-03-02 00:30:05"));
    }

    #[test]
    fn test_order_response_for_pending_order() {
        let response =
            EpayOrderResponse::from_order(order(DbStatus::Pending), "client-1", chrono_tz::UTC);
        assert_eq!(response.status, 0);
        assert_eq!(response.endtime, None);
        assert_eq!(response.addtime, "2026-03-01 16:30:05");
    }
}
