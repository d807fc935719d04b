use axum::{
    Router,
    routing::{get, post},
};

pub mod listings;
pub mod orders;
pub mod payments;
pub mod scans;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/scans", scans::router())
        .nest("/listings", listings::router())
        .route("/checkout", post(orders::checkout))
        .nest("/orders", orders::router())
}
