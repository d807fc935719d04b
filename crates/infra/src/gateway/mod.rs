//! Payment gateway boundary.
//!
//! The gateway hands out payment-initiation tokens, pushes status
//! notifications to us, and answers status queries for pull-based
//! reconciliation. Everything here speaks the gateway's own vocabulary
//! (`TransactionStatus`, `FraudStatus`); mapping onto orders happens in the
//! reconciler.

pub mod http;
pub mod in_memory;
pub mod signature;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use eggmart_orders::{FraudStatus, TransactionStatus};

pub use http::{GatewayConfig, HttpPaymentGateway};
pub use in_memory::InMemoryGateway;
pub use signature::{notification_signature, verify_notification_signature};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("gateway transport error: {0}")]
    Transport(String),

    #[error("gateway request timed out")]
    Timeout,

    #[error("gateway returned status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("failed to decode gateway response: {0}")]
    Decode(String),

    #[error("payment gateway is not configured")]
    NotConfigured,
}

/// One line on the gateway's payment page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionItem {
    pub id: String,
    pub price: u64,
    pub quantity: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub customer_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// `createTransaction(orderRef, grossAmount, items[], customer)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub order_ref: String,
    pub gross_amount: u64,
    pub items: Vec<TransactionItem>,
    pub customer: CustomerDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionToken {
    pub token: String,
    pub redirect_url: Option<String>,
}

/// Status of one transaction as the gateway currently sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayStatus {
    pub transaction_status: TransactionStatus,
    pub fraud_status: Option<FraudStatus>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TransactionToken, GatewayError>;

    async fn query_status(&self, order_ref: &str) -> Result<GatewayStatus, GatewayError>;
}

#[async_trait]
impl<G> PaymentGateway for Arc<G>
where
    G: PaymentGateway + ?Sized,
{
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TransactionToken, GatewayError> {
        (**self).create_transaction(request).await
    }

    async fn query_status(&self, order_ref: &str) -> Result<GatewayStatus, GatewayError> {
        (**self).query_status(order_ref).await
    }
}

/// Stand-in used when no server key is configured. Every call fails with
/// [`GatewayError::NotConfigured`], so checkouts degrade to token-less
/// pending orders.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn create_transaction(
        &self,
        _request: &TransactionRequest,
    ) -> Result<TransactionToken, GatewayError> {
        Err(GatewayError::NotConfigured)
    }

    async fn query_status(&self, _order_ref: &str) -> Result<GatewayStatus, GatewayError> {
        Err(GatewayError::NotConfigured)
    }
}
