//! Order history of the caller's account.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use chrono::{DateTime, Utc};
use credit_core::ledger::OrderStatus;
use credit_db::OrderRepository;
use credit_db::repositories::{HistoryFilter, HistoryView};
use credit_shared::{PageRequest, PageResponse};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiResult;
use crate::middleware::AuthUser;
use crate::routes::payment::OrderResponse;

/// Creates the order history routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/orders", get(list_orders))
}

/// Query parameters for the order history.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// Page number (1-indexed).
    pub page: Option<u32>,
    /// Items per page, capped at 100.
    pub page_size: Option<u32>,
    /// Restrict to one side of the history.
    #[serde(rename = "type")]
    pub view: Option<HistoryView>,
    /// Filter by status.
    pub status: Option<OrderStatus>,
    /// Filter by merchant client id.
    pub client_id: Option<String>,
    /// Created at or after (RFC 3339).
    pub from: Option<DateTime<Utc>>,
    /// Created at or before (RFC 3339).
    pub to: Option<DateTime<Utc>>,
}

impl HistoryQuery {
    fn page_request(&self) -> PageRequest {
        let defaults = PageRequest::default();
        PageRequest {
            page: self.page.unwrap_or(defaults.page),
            page_size: self.page_size.unwrap_or(defaults.page_size),
        }
        .normalized()
    }
}

/// GET `/orders` - The caller's orders, newest first.
async fn list_orders(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<PageResponse<OrderResponse>>> {
    let page = query.page_request();
    let filter = HistoryFilter {
        view: query.view,
        status: query.status,
        client_id: query.client_id.filter(|id| !id.is_empty()),
        from: query.from,
        to: query.to,
    };

    let (orders, total) = OrderRepository::new(state.db.clone())
        .list_history(auth.account_id(), &filter, page)
        .await?;
    Ok(Json(PageResponse::new(orders, page, total).map(OrderResponse::from)))
}
