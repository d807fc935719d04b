//! Marketplace services.
//!
//! Each service runs one unit of work per call: open a store transaction,
//! load and mutate aggregates through their pure transition methods, write
//! them back with version guards, commit. The only outbound call besides the
//! store is the payment gateway, which is made after the allocation has
//! committed.
//!
//! ## Error semantics
//!
//! - Domain errors (validation, not found, stock, transitions) surface as
//!   [`ServiceError::Domain`] with nothing written.
//! - A lost race (store conflict or a failed version guard) surfaces as
//!   `Domain(Conflict)`. Publish and checkout retry such a conflict once.
//! - Gateway failures surface as [`ServiceError::Gateway`] only on the pull
//!   path; during checkout they are logged and the order stays token-less.
//! - Any other store failure is [`ServiceError::Persistence`] and is never
//!   retried here.

pub mod listings;
pub mod orders;
pub mod payments;
pub mod scans;

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::warn;

use eggmart_core::{AggregateRoot, DomainError, ExpectedVersion, UserId};
use eggmart_grading::{Grade, WeightSimulator};
use eggmart_listings::Listing;
use eggmart_orders::Order;
use eggmart_scans::ScanRecord;

use crate::clock::Clock;
use crate::gateway::{GatewayError, PaymentGateway};
use crate::store::{MarketStore, MarketTx, StoreError};

pub use listings::{ListingAggregator, SellerOverview};
pub use orders::{CheckoutOutcome, OrderAllocator};
pub use payments::{OrderView, PaymentReconciler};
pub use scans::{ScanInput, ScanLifecycle};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("persistence failure: {0}")]
    Persistence(StoreError),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => ServiceError::Domain(DomainError::Conflict(msg)),
            other => ServiceError::Persistence(other),
        }
    }
}

impl ServiceError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ServiceError::Domain(DomainError::Conflict(_)))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Run `attempt`, and run it once more if it lost a race.
pub(crate) async fn retry_on_conflict<T, F, Fut>(operation: &'static str, mut attempt: F) -> ServiceResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ServiceResult<T>>,
{
    match attempt().await {
        Err(err) if err.is_conflict() => {
            warn!(operation, error = %err, "conflict, retrying once");
            attempt().await
        }
        other => other,
    }
}

/// Write back a scan that was at `previous` before this transaction touched it.
pub(crate) async fn save_scan(
    tx: &mut dyn MarketTx,
    scan: &ScanRecord,
    previous: u64,
) -> ServiceResult<()> {
    if tx.update_scan(scan, ExpectedVersion::Exact(previous)).await? {
        Ok(())
    } else {
        Err(DomainError::conflict(format!("scan {} changed concurrently", scan.id_typed())).into())
    }
}

pub(crate) async fn save_listing(
    tx: &mut dyn MarketTx,
    listing: &Listing,
    previous: u64,
) -> ServiceResult<()> {
    if tx.update_listing(listing, ExpectedVersion::Exact(previous)).await? {
        Ok(())
    } else {
        Err(DomainError::conflict(format!("listing {} changed concurrently", listing.id_typed())).into())
    }
}

pub(crate) async fn save_order(tx: &mut dyn MarketTx, order: &Order, previous: u64) -> ServiceResult<()> {
    if tx.update_order(order, ExpectedVersion::Exact(previous)).await? {
        Ok(())
    } else {
        Err(DomainError::conflict(format!("order {} changed concurrently", order.payment_ref())).into())
    }
}

/// Recount the listed units behind a seller's listing and store the result.
/// No-op when the seller has no listing for `grade`.
pub(crate) async fn resync_listing_stock(
    tx: &mut dyn MarketTx,
    seller_id: UserId,
    grade: Grade,
    at: DateTime<Utc>,
) -> ServiceResult<Option<Listing>> {
    let Some(mut listing) = tx.find_listing(seller_id, grade).await? else {
        return Ok(None);
    };
    let previous = listing.version();
    let live = tx.count_listed(seller_id, grade, listing.unit_price()).await?;
    if listing.sync_stock(live, at) {
        save_listing(tx, &listing, previous).await?;
    }
    Ok(Some(listing))
}

/// All four services over one store, gateway and clock.
#[derive(Clone)]
pub struct Marketplace {
    pub scans: ScanLifecycle,
    pub listings: ListingAggregator,
    pub orders: OrderAllocator,
    pub payments: PaymentReconciler,
}

impl Marketplace {
    pub fn new(
        store: Arc<dyn MarketStore>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        weights: Arc<WeightSimulator>,
        order_expiry: Duration,
    ) -> Self {
        Self {
            scans: ScanLifecycle::new(store.clone(), clock.clone(), weights),
            listings: ListingAggregator::new(store.clone(), clock.clone()),
            orders: OrderAllocator::new(store.clone(), gateway.clone(), clock.clone()),
            payments: PaymentReconciler::new(store, gateway, clock, order_expiry),
        }
    }
}
