//! Infrastructure wiring: pick a store and a gateway from configuration.

use std::sync::Arc;

use anyhow::Context;

use eggmart_grading::WeightSimulator;
use eggmart_infra::classifier::HttpAspectClassifier;
use eggmart_infra::clock::SystemClock;
use eggmart_infra::config::MarketConfig;
use eggmart_infra::gateway::{DisabledGateway, HttpPaymentGateway, PaymentGateway};
use eggmart_infra::services::Marketplace;
use eggmart_infra::store::{InMemoryMarketStore, MarketStore, PostgresMarketStore};

pub async fn build_marketplace(config: &MarketConfig) -> anyhow::Result<Marketplace> {
    let store: Arc<dyn MarketStore> = match &config.database_url {
        Some(url) => {
            let store = PostgresMarketStore::connect(url)
                .await
                .context("failed to connect to Postgres")?;
            store
                .ensure_schema()
                .await
                .context("failed to apply schema")?;
            tracing::info!("using Postgres store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
            Arc::new(InMemoryMarketStore::new())
        }
    };

    let gateway: Arc<dyn PaymentGateway> = match &config.gateway {
        Some(gateway) => Arc::new(HttpPaymentGateway::new(gateway).context("failed to build gateway client")?),
        None => {
            tracing::warn!("PAYMENT_SERVER_KEY not set; checkouts will not receive payment tokens");
            Arc::new(DisabledGateway)
        }
    };

    let mut market = Marketplace::new(
        store,
        gateway,
        Arc::new(SystemClock),
        Arc::new(WeightSimulator::from_entropy()),
        config.order_expiry,
    );

    match &config.classifier {
        Some(classifier) => {
            let classifier = HttpAspectClassifier::new(classifier).context("failed to build classifier client")?;
            market.scans = market.scans.with_classifier(Arc::new(classifier));
        }
        None => tracing::warn!("CLASSIFIER_URL not set; image scans are disabled"),
    }

    Ok(market)
}

/// In-memory marketplace over the given gateway (dev/test).
pub fn in_memory_marketplace(gateway: Arc<dyn PaymentGateway>, order_expiry: chrono::Duration) -> Marketplace {
    Marketplace::new(
        Arc::new(InMemoryMarketStore::new()),
        gateway,
        Arc::new(SystemClock),
        Arc::new(WeightSimulator::from_entropy()),
        order_expiry,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use eggmart_core::UserId;
    use eggmart_grading::Grade;
    use eggmart_infra::services::ServiceError;

    fn config(vars: &[(&str, &str)]) -> MarketConfig {
        MarketConfig::from_lookup(|key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
        .unwrap()
    }

    #[tokio::test]
    async fn image_scans_need_a_classifier_url() {
        let market = build_marketplace(&config(&[])).await.unwrap();
        let err = market
            .scans
            .scan_image(UserId::new(), "uploads/egg.jpg", Some(55.0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotConfigured(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn configured_classifier_is_wired_into_image_scans() {
        // Nothing listens on the discard port, so every aspect fails.
        let market = build_marketplace(&config(&[
            ("CLASSIFIER_URL", "http://127.0.0.1:9"),
            ("CLASSIFIER_TIMEOUT_SECS", "1"),
        ]))
        .await
        .unwrap();

        let scan = market
            .scans
            .scan_image(UserId::new(), "uploads/egg.jpg", Some(55.0), None)
            .await
            .unwrap();
        assert_eq!(scan.grade(), Grade::Reject);
        assert_eq!(scan.image_ref(), Some("uploads/egg.jpg"));
    }
}
