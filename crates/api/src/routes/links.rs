//! Payment link management for merchants and the public link page.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use credit_core::ledger::LedgerError;
use credit_db::entities::{merchant_credentials, payment_links};
use credit_db::MerchantRepository;
use credit_db::repositories::NewPaymentLink;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;

/// Creates the payment link routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/merchant/credentials/{credential_id}/payment-links",
            get(list_links).post(create_link),
        )
        .route(
            "/merchant/credentials/{credential_id}/payment-links/{link_id}",
            delete(delete_link),
        )
        .route("/payment/link/{token}", get(link_page))
}

/// Request body for creating a payment link.
#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    /// Fixed price.
    pub amount: Decimal,
    /// Product name, also the order name.
    pub product_name: String,
    /// Note shown on the link page.
    #[serde(default)]
    pub remark: String,
    /// Successful payments allowed in total.
    pub total_limit: Option<i32>,
    /// Successful payments allowed per payer.
    pub user_limit: Option<i32>,
}

impl From<CreateLinkRequest> for NewPaymentLink {
    fn from(body: CreateLinkRequest) -> Self {
        Self {
            amount: body.amount,
            product_name: body.product_name,
            remark: body.remark,
            total_limit: body.total_limit,
            user_limit: body.user_limit,
        }
    }
}

/// A link as its owner sees it.
#[derive(Debug, Serialize)]
pub struct LinkResponse {
    /// Link ID.
    pub id: i64,
    /// Public token used in the link URL.
    pub token: String,
    /// Fixed price.
    pub amount: Decimal,
    /// Product name.
    pub product_name: String,
    /// Note.
    pub remark: String,
    /// Total payment cap.
    pub total_limit: Option<i32>,
    /// Per-payer payment cap.
    pub user_limit: Option<i32>,
    /// Created at timestamp.
    pub created_at: String,
}

impl From<payment_links::Model> for LinkResponse {
    fn from(link: payment_links::Model) -> Self {
        Self {
            id: link.id,
            token: link.token,
            amount: link.amount,
            product_name: link.product_name,
            remark: link.remark,
            total_limit: link.total_limit,
            user_limit: link.user_limit,
            created_at: link.created_at.to_rfc3339(),
        }
    }
}

/// A link as a payer sees it before paying.
#[derive(Debug, Serialize)]
pub struct LinkPageResponse {
    /// Merchant application name.
    pub app_name: String,
    /// Product name.
    pub product_name: String,
    /// Note.
    pub remark: String,
    /// Fixed price.
    pub amount: Decimal,
}

async fn owned_credential(
    merchants: &MerchantRepository,
    auth: &AuthUser,
    credential_id: i64,
) -> ApiResult<merchant_credentials::Model> {
    merchants
        .find_owned_credential(auth.account_id(), credential_id)
        .await?
        .ok_or_else(|| LedgerError::MerchantInfoNotFound.into())
}

/// POST `/merchant/credentials/{credential_id}/payment-links` - Create a link.
async fn create_link(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(credential_id): Path<i64>,
    Json(body): Json<CreateLinkRequest>,
) -> ApiResult<(StatusCode, Json<LinkResponse>)> {
    let new: NewPaymentLink = body.into();
    new.validate().map_err(ApiError::validation)?;

    let merchants = MerchantRepository::new(state.db.clone());
    let credential = owned_credential(&merchants, &auth, credential_id).await?;
    let link = merchants.create_link(&credential, new).await?;
    Ok((StatusCode::CREATED, Json(link.into())))
}

/// GET `/merchant/credentials/{credential_id}/payment-links` - Live links.
async fn list_links(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(credential_id): Path<i64>,
) -> ApiResult<Json<Vec<LinkResponse>>> {
    let merchants = MerchantRepository::new(state.db.clone());
    let credential = owned_credential(&merchants, &auth, credential_id).await?;
    let links = merchants.list_links(credential.id).await?;
    Ok(Json(links.into_iter().map(LinkResponse::from).collect()))
}

/// DELETE `/merchant/credentials/{credential_id}/payment-links/{link_id}` - Retire a link.
async fn delete_link(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((credential_id, link_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    let merchants = MerchantRepository::new(state.db.clone());
    let credential = owned_credential(&merchants, &auth, credential_id).await?;
    if !merchants.delete_link(credential.id, link_id).await? {
        return Err(LedgerError::PaymentLinkNotFound.into());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/payment/link/{token}` - Resolve a link for the payment page.
async fn link_page(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(token): Path<String>,
) -> ApiResult<Json<LinkPageResponse>> {
    let detail = MerchantRepository::new(state.db.clone())
        .link_detail(&token)
        .await?
        .ok_or(LedgerError::PaymentLinkNotFound)?;

    Ok(Json(LinkPageResponse {
        app_name: detail.app_name,
        product_name: detail.link.product_name,
        remark: detail.link.remark,
        amount: detail.link.amount,
    }))
}
