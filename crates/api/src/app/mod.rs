//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store/gateway selection and marketplace construction
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use eggmart_infra::services::Marketplace;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Settings the router needs besides the services themselves.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub jwt_secret: String,
    /// Gateway server key used to verify notification signatures. `None`
    /// accepts unsigned notifications (local development only).
    pub notification_key: Option<String>,
}

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn build_app(market: Marketplace, settings: ApiSettings) -> Router {
    let auth_state = middleware::AuthState {
        tokens: Arc::new(middleware::Hs256Validator::new(settings.jwt_secret.as_bytes())),
    };
    let webhook = routes::payments::WebhookKey(settings.notification_key.map(Arc::from));

    // Protected routes: require a bearer token.
    let protected = routes::router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/payments/notify", post(routes::payments::notify))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(Extension(Arc::new(market)))
                .layer(Extension(webhook)),
        )
}
