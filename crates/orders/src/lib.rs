//! Orders domain module.
//!
//! Order headers and lines, the order lifecycle, and the mapping from the
//! payment gateway's status vocabulary onto it. Pure logic only; allocation
//! and reconciliation against the store live in `eggmart-infra`.

pub mod order;
pub mod payment;

pub use order::{
    Checkout, CheckoutPlan, ListingRef, Order, OrderItem, OrderParts, OrderStatus,
    payment_reference,
};
pub use payment::{FraudStatus, TransactionStatus, map_gateway_status};
