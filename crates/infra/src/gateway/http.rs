use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use eggmart_orders::{FraudStatus, TransactionStatus};

use super::{
    GatewayError, GatewayStatus, PaymentGateway, TransactionItem, TransactionRequest,
    TransactionToken,
};

pub const SANDBOX_SNAP_URL: &str = "https://app.sandbox.midtrans.com/snap/v1";
pub const SANDBOX_API_URL: &str = "https://api.sandbox.midtrans.com/v2";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Used as the HTTP basic auth user and as the notification signature secret.
    pub server_key: String,
    pub snap_url: String,
    pub api_url: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn sandbox(server_key: impl Into<String>) -> Self {
        Self {
            server_key: server_key.into(),
            snap_url: SANDBOX_SNAP_URL.to_string(),
            api_url: SANDBOX_API_URL.to_string(),
            timeout: Duration::from_secs(8),
        }
    }
}

/// REST client for the payment gateway.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    server_key: String,
    snap_url: String,
    api_url: String,
}

impl HttpPaymentGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            server_key: config.server_key.clone(),
            snap_url: config.snap_url.trim_end_matches('/').to_string(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    async fn checked(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Status {
            code: status.as_u16(),
            body,
        })
    }
}

#[derive(Serialize)]
struct TransactionDetails<'a> {
    order_id: &'a str,
    gross_amount: u64,
}

#[derive(Serialize)]
struct CustomerBody<'a> {
    first_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
}

#[derive(Serialize)]
struct SnapRequest<'a> {
    transaction_details: TransactionDetails<'a>,
    item_details: &'a [TransactionItem],
    customer_details: CustomerBody<'a>,
}

#[derive(Deserialize)]
struct SnapResponse {
    token: Option<String>,
    redirect_url: Option<String>,
}

#[derive(Deserialize)]
struct StatusResponse {
    transaction_status: Option<String>,
    fraud_status: Option<String>,
}

fn map_reqwest_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else if err.is_decode() {
        GatewayError::Decode(err.to_string())
    } else {
        GatewayError::Transport(err.to_string())
    }
}

/// Parse the gateway's status body. A blank fraud status counts as absent;
/// anything outside the known vocabulary is a decode error.
fn parse_status(body: StatusResponse) -> Result<GatewayStatus, GatewayError> {
    let raw = body
        .transaction_status
        .ok_or_else(|| GatewayError::Decode("missing transaction_status".to_string()))?;
    let transaction_status: TransactionStatus = raw
        .parse()
        .map_err(|e| GatewayError::Decode(format!("{e}")))?;
    let fraud_status = body
        .fraud_status
        .filter(|f| !f.trim().is_empty())
        .map(|f| f.parse::<FraudStatus>())
        .transpose()
        .map_err(|e| GatewayError::Decode(format!("{e}")))?;

    Ok(GatewayStatus {
        transaction_status,
        fraud_status,
    })
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, request), fields(order_ref = %request.order_ref, gross_amount = request.gross_amount), err)]
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TransactionToken, GatewayError> {
        let body = SnapRequest {
            transaction_details: TransactionDetails {
                order_id: &request.order_ref,
                gross_amount: request.gross_amount,
            },
            item_details: &request.items,
            customer_details: CustomerBody {
                first_name: &request.customer.customer_id,
                email: request.customer.email.as_deref(),
            },
        };

        let response = self
            .client
            .post(format!("{}/transactions", self.snap_url))
            .basic_auth(&self.server_key, None::<&str>)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let parsed: SnapResponse = Self::checked(response)
            .await?
            .json()
            .await
            .map_err(map_reqwest_error)?;

        let token = parsed
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GatewayError::Decode("response carried no token".to_string()))?;

        debug!("payment token issued");
        Ok(TransactionToken {
            token,
            redirect_url: parsed.redirect_url,
        })
    }

    #[instrument(skip(self), err)]
    async fn query_status(&self, order_ref: &str) -> Result<GatewayStatus, GatewayError> {
        let response = self
            .client
            .get(format!("{}/{order_ref}/status", self.api_url))
            .basic_auth(&self.server_key, None::<&str>)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let parsed: StatusResponse = Self::checked(response)
            .await?
            .json()
            .await
            .map_err(map_reqwest_error)?;

        parse_status(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(tx: Option<&str>, fraud: Option<&str>) -> StatusResponse {
        StatusResponse {
            transaction_status: tx.map(str::to_string),
            fraud_status: fraud.map(str::to_string),
        }
    }

    #[test]
    fn parses_known_status() {
        let parsed = parse_status(status(Some("capture"), Some("challenge"))).unwrap();
        assert_eq!(parsed.transaction_status, TransactionStatus::Capture);
        assert_eq!(parsed.fraud_status, Some(FraudStatus::Challenge));
    }

    #[test]
    fn unknown_fraud_status_is_a_decode_error() {
        assert!(matches!(
            parse_status(status(Some("capture"), Some("deny"))),
            Err(GatewayError::Decode(_))
        ));
        let parsed = parse_status(status(Some("capture"), Some(" "))).unwrap();
        assert_eq!(parsed.fraud_status, None);
    }

    #[test]
    fn unknown_transaction_status_is_a_decode_error() {
        assert!(matches!(
            parse_status(status(Some("refund"), None)),
            Err(GatewayError::Decode(_))
        ));
        assert!(matches!(parse_status(status(None, None)), Err(GatewayError::Decode(_))));
    }

    #[test]
    fn trailing_slashes_are_trimmed() {
        let mut config = GatewayConfig::sandbox("SB-key");
        config.snap_url.push('/');
        let gateway = HttpPaymentGateway::new(&config).unwrap();
        assert_eq!(gateway.snap_url, SANDBOX_SNAP_URL);
    }

    #[test]
    fn snap_body_shape() {
        let items = vec![TransactionItem {
            id: "listing".into(),
            price: 2200,
            quantity: 2,
            name: "Egg grade B".into(),
        }];
        let body = SnapRequest {
            transaction_details: TransactionDetails {
                order_id: "EGG-1",
                gross_amount: 4400,
            },
            item_details: &items,
            customer_details: CustomerBody {
                first_name: "buyer",
                email: None,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["transaction_details"]["order_id"], "EGG-1");
        assert_eq!(json["transaction_details"]["gross_amount"], 4400);
        assert_eq!(json["item_details"][0]["quantity"], 2);
        assert!(json["customer_details"].get("email").is_none());
    }
}
