use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use eggmart_core::{ExpectedVersion, ListingId, OrderId, ScanId, UserId};
use eggmart_grading::Grade;
use eggmart_listings::Listing;
use eggmart_orders::{Order, OrderItem};
use eggmart_scans::{ScanRecord, ScanStatus};

/// Marketplace store operation error.
///
/// These are **infrastructure errors** (connectivity, serialization failures,
/// corrupt rows) as opposed to domain errors (validation, stock, lifecycle).
///
/// ## Error Categories
///
/// - **Unavailable**: the store cannot be reached (pool closed, connect failure)
/// - **Conflict**: the transaction lost a race (serialization failure, deadlock,
///   unique key collision). Callers may retry the whole unit of work.
/// - **Decode**: a stored row does not map back onto a domain type
/// - **Query**: any other statement failure
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("failed to decode row: {0}")]
    Decode(String),

    #[error("query failed: {0}")]
    Query(String),
}

/// Count of scans per grade for one owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GradeCount {
    pub grade: Grade,
    pub count: u32,
}

/// Entry point into the marketplace store.
///
/// All reads and writes happen inside a [`MarketTx`]. A unit of work (publish,
/// checkout, reconciliation) opens one transaction, does every read and
/// conditional write through it, and commits once at the end.
///
/// ## Isolation
///
/// Implementations must make "select candidate scans, then transition them"
/// atomic with respect to other transactions touching the same
/// (seller, grade) partition. The in-memory store serializes transactions
/// outright; the Postgres store runs `SERIALIZABLE` and locks selected rows.
/// A transaction that loses a race fails with [`StoreError::Conflict`].
#[async_trait]
pub trait MarketStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn MarketTx>, StoreError>;
}

#[async_trait]
impl<S> MarketStore for Arc<S>
where
    S: MarketStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn MarketTx>, StoreError> {
        (**self).begin().await
    }
}

/// One open transaction.
///
/// Dropping a transaction without calling [`MarketTx::commit`] rolls it back.
///
/// ## Conditional updates
///
/// `update_*` methods write only if the stored row is still at the version
/// named by `expected` and return `false` otherwise. The aggregate passed in
/// already carries its new version.
#[async_trait]
pub trait MarketTx: Send {
    // --- scans ---------------------------------------------------------

    async fn insert_scan(&mut self, scan: &ScanRecord) -> Result<(), StoreError>;

    async fn get_scan(&mut self, id: ScanId) -> Result<Option<ScanRecord>, StoreError>;

    async fn update_scan(
        &mut self,
        scan: &ScanRecord,
        expected: ExpectedVersion,
    ) -> Result<bool, StoreError>;

    /// Newest first.
    async fn scans_for_owner(
        &mut self,
        owner_id: UserId,
        limit: u32,
    ) -> Result<Vec<ScanRecord>, StoreError>;

    /// Oldest `limit` available scans of `grade`, by capture time ascending.
    async fn select_available(
        &mut self,
        owner_id: UserId,
        grade: Grade,
        limit: u32,
    ) -> Result<Vec<ScanRecord>, StoreError>;

    /// Listed scans of `grade`, by listing time ascending. `price` narrows to
    /// one price point; `limit` caps the result.
    async fn select_listed(
        &mut self,
        owner_id: UserId,
        grade: Grade,
        price: Option<u64>,
        limit: Option<u32>,
    ) -> Result<Vec<ScanRecord>, StoreError>;

    async fn count_listed(
        &mut self,
        owner_id: UserId,
        grade: Grade,
        price: u64,
    ) -> Result<u32, StoreError>;

    /// Per-grade counts, optionally restricted to one status. Grades with no
    /// scans are omitted.
    async fn count_by_grade(
        &mut self,
        owner_id: UserId,
        status: Option<ScanStatus>,
    ) -> Result<Vec<GradeCount>, StoreError>;

    // --- listings ------------------------------------------------------

    async fn get_listing(&mut self, id: ListingId) -> Result<Option<Listing>, StoreError>;

    async fn find_listing(
        &mut self,
        seller_id: UserId,
        grade: Grade,
    ) -> Result<Option<Listing>, StoreError>;

    async fn insert_listing(&mut self, listing: &Listing) -> Result<(), StoreError>;

    async fn update_listing(
        &mut self,
        listing: &Listing,
        expected: ExpectedVersion,
    ) -> Result<bool, StoreError>;

    /// Ordered by grade.
    async fn listings_for_seller(&mut self, seller_id: UserId) -> Result<Vec<Listing>, StoreError>;

    /// Ordered by seller, then grade.
    async fn active_listings(&mut self) -> Result<Vec<Listing>, StoreError>;

    // --- orders --------------------------------------------------------

    async fn insert_order(&mut self, order: &Order, items: &[OrderItem]) -> Result<(), StoreError>;

    async fn get_order(&mut self, payment_ref: &str) -> Result<Option<Order>, StoreError>;

    async fn update_order(
        &mut self,
        order: &Order,
        expected: ExpectedVersion,
    ) -> Result<bool, StoreError>;

    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>, StoreError>;

    /// Newest first.
    async fn orders_for_buyer(&mut self, buyer_id: UserId) -> Result<Vec<Order>, StoreError>;

    /// The buyer's `pending` orders created at or before `cutoff`.
    async fn pending_orders_before(
        &mut self,
        buyer_id: UserId,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Order>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
