//! Payment gateway status vocabulary.

use serde::{Deserialize, Serialize};

use eggmart_core::DomainError;

use crate::order::OrderStatus;

/// `transaction_status` as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Capture,
    Settlement,
    Pending,
    Deny,
    Expire,
    Cancel,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 6] = [
        TransactionStatus::Capture,
        TransactionStatus::Settlement,
        TransactionStatus::Pending,
        TransactionStatus::Deny,
        TransactionStatus::Expire,
        TransactionStatus::Cancel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Capture => "capture",
            TransactionStatus::Settlement => "settlement",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Deny => "deny",
            TransactionStatus::Expire => "expire",
            TransactionStatus::Cancel => "cancel",
        }
    }
}

impl core::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for TransactionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| DomainError::validation(format!("unknown transaction status: {s:?}")))
    }
}

/// `fraud_status` as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FraudStatus {
    Accept,
    Challenge,
}

impl FraudStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FraudStatus::Accept => "accept",
            FraudStatus::Challenge => "challenge",
        }
    }
}

impl core::str::FromStr for FraudStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accept" => Ok(FraudStatus::Accept),
            "challenge" => Ok(FraudStatus::Challenge),
            _ => Err(DomainError::validation(format!("unknown fraud status: {s:?}"))),
        }
    }
}

/// Map a gateway `(transaction_status, fraud_status)` pair onto the order
/// lifecycle. Total over the vocabulary.
///
/// A captured payment under fraud challenge stays `pending` until it is
/// reviewed manually on the gateway side.
pub fn map_gateway_status(transaction: TransactionStatus, fraud: Option<FraudStatus>) -> OrderStatus {
    match transaction {
        TransactionStatus::Capture if fraud == Some(FraudStatus::Challenge) => OrderStatus::Pending,
        TransactionStatus::Capture => OrderStatus::Paid,
        TransactionStatus::Settlement => OrderStatus::Settled,
        TransactionStatus::Pending => OrderStatus::Pending,
        TransactionStatus::Deny => OrderStatus::Denied,
        TransactionStatus::Expire => OrderStatus::Expired,
        TransactionStatus::Cancel => OrderStatus::Cancelled,
    }
}
