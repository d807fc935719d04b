use anyhow::Context;

use eggmart_api::app::{self, ApiSettings};
use eggmart_infra::config::MarketConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    eggmart_observability::init();

    let config = MarketConfig::from_env().context("invalid configuration")?;

    let jwt_secret = config.jwt_secret.clone().unwrap_or_else(|| {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
        "dev-secret".to_string()
    });
    let settings = ApiSettings {
        jwt_secret,
        notification_key: config.gateway.as_ref().map(|g| g.server_key.clone()),
    };

    let market = app::services::build_marketplace(&config).await?;
    let router = app::build_app(market, settings);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router).await?;
    Ok(())
}
