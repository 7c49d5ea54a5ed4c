//! API route definitions.

use axum::{Router, middleware};

use crate::{AppState, middleware::auth::auth_middleware};

pub mod account;
pub mod disputes;
pub mod epay;
pub mod health;
pub mod links;
pub mod orders;
pub mod payment;

/// Creates the wallet router; every route requires a bearer token.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes_with_state(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(account::routes())
        .merge(payment::routes())
        .merge(disputes::routes())
        .merge(orders::routes())
        .merge(links::routes())
        .layer(middleware::from_fn_with_state(state, auth_middleware))
}
