//! Disputes: opened by the payer, resolved by the merchant.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use credit_db::settlement::DisputeResolution;

use super::payment::OrderResponse;
use crate::AppState;
use crate::error::ApiResult;
use crate::middleware::AuthUser;

/// Creates the dispute routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders/{id}/dispute", post(open_dispute))
        .route("/merchant/orders/{id}/dispute/refund", post(refund_dispute))
        .route("/merchant/orders/{id}/dispute/refuse", post(refuse_dispute))
}

/// POST `/orders/{id}/dispute` - Payer disputes a settled order.
async fn open_dispute(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<OrderResponse>> {
    let order = state.engine.open_dispute(auth.account_id(), id).await?;
    Ok(Json(order.into()))
}

/// POST `/merchant/orders/{id}/dispute/refund` - Merchant refunds a disputed order.
async fn refund_dispute(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<OrderResponse>> {
    resolve(&state, &auth, id, DisputeResolution::Refund).await
}

/// POST `/merchant/orders/{id}/dispute/refuse` - Merchant refuses a dispute.
async fn refuse_dispute(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<OrderResponse>> {
    resolve(&state, &auth, id, DisputeResolution::Refuse).await
}

async fn resolve(
    state: &AppState,
    auth: &AuthUser,
    id: i64,
    resolution: DisputeResolution,
) -> ApiResult<Json<OrderResponse>> {
    let order = state
        .engine
        .resolve_dispute(auth.account_id(), id, resolution)
        .await?;
    Ok(Json(order.into()))
}
