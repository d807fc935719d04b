//! Environment-driven configuration.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::classifier::ClassifierConfig;
use crate::gateway::GatewayConfig;
use crate::gateway::http::{SANDBOX_API_URL, SANDBOX_SNAP_URL};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_TIMEOUT_SECS: u64 = 8;
const DEFAULT_EXPIRY_MINUTES: i64 = 60;
const DEFAULT_CLASSIFIER_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketConfig {
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    /// `None` disables the gateway; checkouts then create token-less pending orders.
    pub gateway: Option<GatewayConfig>,
    /// `None` leaves image scans unavailable.
    pub classifier: Option<ClassifierConfig>,
    pub order_expiry: chrono::Duration,
    /// HS256 secret for bearer tokens. `None` lets the binary fall back to a dev secret.
    pub jwt_secret: Option<String>,
}

impl MarketConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_raw = get("EGGMART_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            key: "EGGMART_BIND_ADDR",
            value: bind_raw.clone(),
            reason: e.to_string(),
        })?;

        let timeout_secs = parse_positive(get("PAYMENT_TIMEOUT_SECS"), "PAYMENT_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let expiry_minutes = parse_positive(
            get("ORDER_EXPIRY_MINUTES"),
            "ORDER_EXPIRY_MINUTES",
            DEFAULT_EXPIRY_MINUTES as u64,
        )?;
        let expiry_minutes = i64::try_from(expiry_minutes).map_err(|e| ConfigError::Invalid {
            key: "ORDER_EXPIRY_MINUTES",
            value: expiry_minutes.to_string(),
            reason: e.to_string(),
        })?;

        let gateway = get("PAYMENT_SERVER_KEY").map(|server_key| GatewayConfig {
            server_key,
            snap_url: get("PAYMENT_SNAP_URL").unwrap_or_else(|| SANDBOX_SNAP_URL.to_string()),
            api_url: get("PAYMENT_API_URL").unwrap_or_else(|| SANDBOX_API_URL.to_string()),
            timeout: Duration::from_secs(timeout_secs),
        });

        let classifier_timeout = parse_positive(
            get("CLASSIFIER_TIMEOUT_SECS"),
            "CLASSIFIER_TIMEOUT_SECS",
            DEFAULT_CLASSIFIER_TIMEOUT_SECS,
        )?;
        let classifier = get("CLASSIFIER_URL").map(|base_url| ClassifierConfig {
            base_url,
            timeout: Duration::from_secs(classifier_timeout),
        });

        Ok(Self {
            database_url: get("DATABASE_URL"),
            bind_addr,
            gateway,
            classifier,
            order_expiry: chrono::Duration::minutes(expiry_minutes),
            jwt_secret: get("JWT_SECRET"),
        })
    }
}

fn parse_positive(raw: Option<String>, key: &'static str, default: u64) -> Result<u64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "must be positive".to_string(),
        }),
        Ok(v) => Ok(v),
        Err(e) => Err(ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<MarketConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MarketConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.bind_addr, DEFAULT_BIND_ADDR.parse().unwrap());
        assert_eq!(cfg.gateway, None);
        assert_eq!(cfg.classifier, None);
        assert_eq!(cfg.order_expiry, chrono::Duration::minutes(60));
        assert_eq!(cfg.jwt_secret, None);
    }

    #[test]
    fn server_key_enables_gateway() {
        let cfg = config(&[("PAYMENT_SERVER_KEY", "SB-key"), ("PAYMENT_TIMEOUT_SECS", "5")]).unwrap();
        let gateway = cfg.gateway.unwrap();
        assert_eq!(gateway.server_key, "SB-key");
        assert_eq!(gateway.snap_url, SANDBOX_SNAP_URL);
        assert_eq!(gateway.timeout, Duration::from_secs(5));
    }

    #[test]
    fn classifier_url_enables_image_scans() {
        let cfg = config(&[("CLASSIFIER_URL", "http://models:9000")]).unwrap();
        let classifier = cfg.classifier.unwrap();
        assert_eq!(classifier.base_url, "http://models:9000");
        assert_eq!(classifier.timeout, Duration::from_secs(DEFAULT_CLASSIFIER_TIMEOUT_SECS));
        assert!(config(&[("CLASSIFIER_TIMEOUT_SECS", "0")]).is_err());
    }

    #[test]
    fn empty_values_count_as_unset() {
        let cfg = config(&[("DATABASE_URL", " "), ("PAYMENT_SERVER_KEY", "")]).unwrap();
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.gateway, None);
    }

    #[test]
    fn bad_numbers_are_errors() {
        assert!(config(&[("PAYMENT_TIMEOUT_SECS", "soon")]).is_err());
        assert!(config(&[("ORDER_EXPIRY_MINUTES", "0")]).is_err());
        assert!(config(&[("EGGMART_BIND_ADDR", "nowhere")]).is_err());
    }
}
