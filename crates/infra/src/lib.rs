//! Infrastructure layer: store, payment gateway, model client, config, and the
//! marketplace services that tie them to the domain crates.

pub mod classifier;
pub mod clock;
pub mod config;
pub mod gateway;
pub mod services;
pub mod store;
