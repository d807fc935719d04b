use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use eggmart_core::ScanId;
use eggmart_infra::services::{Marketplace, ScanInput};

use crate::app::{dto, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_scan).get(history))
        .route("/image", post(scan_image))
        .route("/summary", get(summary))
        .route("/:id", get(get_scan))
        .route("/:id/discard", post(discard))
}

pub async fn create_scan(
    Extension(market): Extension<Arc<Marketplace>>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<ScanInput>,
) -> axum::response::Response {
    match market.scans.create_scan(user.user_id(), body).await {
        Ok(scan) => (StatusCode::CREATED, Json(scan)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn scan_image(
    Extension(market): Extension<Arc<Marketplace>>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<dto::ImageScanRequest>,
) -> axum::response::Response {
    match market
        .scans
        .scan_image(user.user_id(), &body.image_ref, body.weight_grams, body.freshness)
        .await
    {
        Ok(scan) => (StatusCode::CREATED, Json(scan)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn history(
    Extension(market): Extension<Arc<Marketplace>>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<dto::HistoryQuery>,
) -> axum::response::Response {
    match market.scans.history(user.user_id(), query.limit()).await {
        Ok(scans) => (StatusCode::OK, Json(scans)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn summary(
    Extension(market): Extension<Arc<Marketplace>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    match market.scans.grade_summary(user.user_id()).await {
        Ok(counts) => (StatusCode::OK, Json(counts)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_scan(
    Extension(market): Extension<Arc<Marketplace>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let scan_id: ScanId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match market.scans.get(user.user_id(), scan_id).await {
        Ok(scan) => (StatusCode::OK, Json(scan)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn discard(
    Extension(market): Extension<Arc<Marketplace>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let scan_id: ScanId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match market.scans.discard(user.user_id(), scan_id).await {
        Ok(scan) => (StatusCode::OK, Json(scan)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
