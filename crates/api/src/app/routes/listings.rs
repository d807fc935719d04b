use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use eggmart_core::ListingId;
use eggmart_infra::services::Marketplace;
use eggmart_listings::PublishListing;

use crate::app::{dto, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(catalog).post(publish))
        .route("/mine", get(seller_overview))
        .route("/:id", get(get_listing))
}

pub async fn catalog(Extension(market): Extension<Arc<Marketplace>>) -> axum::response::Response {
    match market.listings.catalog().await {
        Ok(listings) => (StatusCode::OK, Json(listings)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn publish(
    Extension(market): Extension<Arc<Marketplace>>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<dto::PublishListingRequest>,
) -> axum::response::Response {
    let command = PublishListing {
        seller_id: Some(user.user_id()),
        grade: body.grade,
        price: body.price,
        stock: body.stock,
    };

    match market.listings.publish(&command).await {
        Ok(listing) => (StatusCode::CREATED, Json(listing)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn seller_overview(
    Extension(market): Extension<Arc<Marketplace>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    match market.listings.seller_overview(user.user_id()).await {
        Ok(overview) => (StatusCode::OK, Json(overview)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_listing(
    Extension(market): Extension<Arc<Marketplace>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let listing_id: ListingId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match market.listings.get(listing_id).await {
        Ok(listing) => (StatusCode::OK, Json(listing)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
