use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use eggmart_core::DomainError;
use eggmart_infra::services::Marketplace;

use crate::app::{dto, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(order_history))
        .route("/:reference/sync", post(sync_order))
}

pub async fn checkout(
    Extension(market): Extension<Arc<Marketplace>>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<dto::CheckoutRequest>,
) -> axum::response::Response {
    let command = match body.into_command(user.user_id()) {
        Ok(c) => c,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match market.orders.checkout(&command).await {
        Ok(outcome) => (StatusCode::CREATED, Json(dto::checkout_to_json(&outcome))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn order_history(
    Extension(market): Extension<Arc<Marketplace>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    match market.payments.order_history(user.user_id()).await {
        Ok(views) => {
            let body: Vec<_> = views.iter().map(dto::order_view_to_json).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Pull the gateway's view of one of the caller's orders.
pub async fn sync_order(
    Extension(market): Extension<Arc<Marketplace>>,
    Extension(user): Extension<UserContext>,
    Path(reference): Path<String>,
) -> axum::response::Response {
    // Someone else's order looks exactly like a missing one.
    match market.payments.get(&reference).await {
        Ok(order) if order.buyer_id() == user.user_id() => {}
        Ok(_) => {
            return errors::domain_error_to_response(DomainError::not_found(format!("order {reference}")));
        }
        Err(e) => return errors::service_error_to_response(e),
    }

    match market.payments.sync_pending(&reference).await {
        Ok(order) => (StatusCode::OK, Json(dto::order_to_json(&order))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
