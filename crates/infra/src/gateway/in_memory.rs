use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use eggmart_orders::{FraudStatus, TransactionStatus};

use super::{GatewayError, GatewayStatus, PaymentGateway, TransactionRequest, TransactionToken};

#[derive(Debug, Default)]
struct GatewayState {
    requests: Vec<TransactionRequest>,
    statuses: HashMap<String, GatewayStatus>,
    offline: bool,
}

/// In-memory payment gateway.
///
/// Intended for tests/dev. Issues `tok-{order_ref}` tokens, records every
/// transaction request, and reports whatever status was last set for a
/// reference. While offline, every call fails with a transport error.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    state: Mutex<GatewayState>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, GatewayState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    pub fn set_status(
        &self,
        order_ref: impl Into<String>,
        transaction_status: TransactionStatus,
        fraud_status: Option<FraudStatus>,
    ) {
        self.state().statuses.insert(
            order_ref.into(),
            GatewayStatus {
                transaction_status,
                fraud_status,
            },
        );
    }

    pub fn requests(&self) -> Vec<TransactionRequest> {
        self.state().requests.clone()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TransactionToken, GatewayError> {
        let mut state = self.state();
        if state.offline {
            return Err(GatewayError::Transport("gateway offline".to_string()));
        }

        state.requests.push(request.clone());
        state
            .statuses
            .entry(request.order_ref.clone())
            .or_insert(GatewayStatus {
                transaction_status: TransactionStatus::Pending,
                fraud_status: None,
            });

        Ok(TransactionToken {
            token: format!("tok-{}", request.order_ref),
            redirect_url: None,
        })
    }

    async fn query_status(&self, order_ref: &str) -> Result<GatewayStatus, GatewayError> {
        let state = self.state();
        if state.offline {
            return Err(GatewayError::Transport("gateway offline".to_string()));
        }

        state.statuses.get(order_ref).copied().ok_or(GatewayError::Status {
            code: 404,
            body: format!("transaction {order_ref} not found"),
        })
    }
}
