use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use eggmart_infra::gateway::verify_notification_signature;
use eggmart_infra::services::Marketplace;

use crate::app::{dto, errors};

/// Server key used to verify inbound notifications, if configured.
#[derive(Debug, Clone, Default)]
pub struct WebhookKey(pub Option<Arc<str>>);

/// Gateway push notification. Unauthenticated; trust comes from the signature.
pub async fn notify(
    Extension(market): Extension<Arc<Marketplace>>,
    Extension(key): Extension<WebhookKey>,
    Json(body): Json<dto::PaymentNotification>,
) -> axum::response::Response {
    if let Some(server_key) = key.0.as_deref() {
        if !signature_matches(&body, server_key) {
            tracing::warn!(order_ref = %body.order_id, "notification signature mismatch");
            return errors::json_error(StatusCode::UNAUTHORIZED, "invalid_signature", "signature mismatch");
        }
    }

    let (transaction, fraud) = match body.statuses() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match market
        .payments
        .apply_notification(&body.order_id, transaction, fraud)
        .await
    {
        Ok(order) => (StatusCode::OK, Json(dto::order_to_json(&order))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

fn signature_matches(body: &dto::PaymentNotification, server_key: &str) -> bool {
    match (&body.status_code, &body.gross_amount, &body.signature_key) {
        (Some(status_code), Some(gross_amount), Some(signature)) => verify_notification_signature(
            &body.order_id,
            status_code,
            gross_amount,
            server_key,
            signature,
        ),
        _ => false,
    }
}
