use serde::Deserialize;
use serde_json::json;

use eggmart_core::{DomainError, ListingId, UserId};
use eggmart_grading::Freshness;
use eggmart_infra::services::{CheckoutOutcome, OrderView};
use eggmart_orders::{Checkout, FraudStatus, Order, TransactionStatus};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ImageScanRequest {
    pub image_ref: String,
    pub weight_grams: Option<f64>,
    pub freshness: Option<Freshness>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

impl HistoryQuery {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 500;

    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }
}

#[derive(Debug, Deserialize)]
pub struct PublishListingRequest {
    pub grade: String,
    pub price: i64,
    pub stock: i64,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub listing_id: Option<String>,
    pub seller_id: Option<String>,
    pub grade: Option<String>,
    pub quantity: i64,
}

impl CheckoutRequest {
    pub fn into_command(self, buyer_id: UserId) -> Result<Checkout, DomainError> {
        let listing_id = self
            .listing_id
            .as_deref()
            .map(str::parse::<ListingId>)
            .transpose()?;
        let seller_id = self
            .seller_id
            .as_deref()
            .map(str::parse::<UserId>)
            .transpose()?;

        Ok(Checkout {
            buyer_id: Some(buyer_id),
            listing_id,
            seller_id,
            grade: self.grade,
            quantity: self.quantity,
        })
    }
}

/// Gateway notification body. Only the fields we act on or verify.
#[derive(Debug, Deserialize)]
pub struct PaymentNotification {
    pub order_id: String,
    pub transaction_status: String,
    pub fraud_status: Option<String>,
    pub status_code: Option<String>,
    pub gross_amount: Option<String>,
    pub signature_key: Option<String>,
}

impl PaymentNotification {
    pub fn statuses(&self) -> Result<(TransactionStatus, Option<FraudStatus>), DomainError> {
        let transaction = self.transaction_status.parse::<TransactionStatus>()?;
        let fraud = self
            .fraud_status
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<FraudStatus>)
            .transpose()?;
        Ok((transaction, fraud))
    }
}

// -------------------------
// Response mapping
// -------------------------

pub fn order_to_json(order: &Order) -> serde_json::Value {
    json!({
        "id": order.id_typed().to_string(),
        "reference": order.payment_ref(),
        "buyer_id": order.buyer_id().to_string(),
        "seller_id": order.seller_id().to_string(),
        "listing_id": order.listing_id().to_string(),
        "grade": order.grade(),
        "quantity": order.quantity(),
        "unit_price": order.unit_price(),
        "total_amount": order.total_amount(),
        "payment_token": order.payment_token(),
        "status": order.status(),
        "created_at": order.created_at(),
        "updated_at": order.updated_at(),
    })
}

pub fn checkout_to_json(outcome: &CheckoutOutcome) -> serde_json::Value {
    json!({
        "order": order_to_json(&outcome.order),
        "scan_ids": outcome.items.iter().map(|i| i.scan_id.to_string()).collect::<Vec<_>>(),
    })
}

pub fn order_view_to_json(view: &OrderView) -> serde_json::Value {
    json!({
        "order": order_to_json(&view.order),
        "items": view.items,
    })
}
