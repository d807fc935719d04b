use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use eggmart_core::{AggregateRoot, ExpectedVersion, ListingId, OrderId, ScanId, UserId};
use eggmart_grading::Grade;
use eggmart_listings::Listing;
use eggmart_orders::{Order, OrderItem, OrderStatus};
use eggmart_scans::{ScanRecord, ScanStatus};

use super::r#trait::{GradeCount, MarketStore, MarketTx, StoreError};

#[derive(Debug, Clone, Default)]
struct MarketState {
    scans: HashMap<ScanId, ScanRecord>,
    listings: HashMap<ListingId, Listing>,
    orders: HashMap<OrderId, Order>,
    items: BTreeMap<OrderId, Vec<OrderItem>>,
}

impl MarketState {
    fn scans_of(&self, owner_id: UserId, grade: Grade, status: ScanStatus) -> Vec<&ScanRecord> {
        self.scans
            .values()
            .filter(|s| s.owner_id() == owner_id && s.grade() == grade && s.status() == status)
            .collect()
    }
}

/// In-memory marketplace store.
///
/// Intended for tests/dev. Transactions are fully serialized: `begin` waits for
/// the single state lock, works on a private copy, and `commit` swaps the copy
/// in. Dropping the transaction discards the copy.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMarketStore {
    state: Arc<Mutex<MarketState>>,
    commits: Arc<AtomicU64>,
}

impl InMemoryMarketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed transactions so far.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketStore for InMemoryMarketStore {
    async fn begin(&self) -> Result<Box<dyn MarketTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTx {
            guard,
            working,
            commits: self.commits.clone(),
        }))
    }
}

struct InMemoryTx {
    guard: OwnedMutexGuard<MarketState>,
    working: MarketState,
    commits: Arc<AtomicU64>,
}

fn limit_to(mut rows: Vec<ScanRecord>, limit: Option<u32>) -> Vec<ScanRecord> {
    if let Some(limit) = limit {
        rows.truncate(limit as usize);
    }
    rows
}

#[async_trait]
impl MarketTx for InMemoryTx {
    async fn insert_scan(&mut self, scan: &ScanRecord) -> Result<(), StoreError> {
        if self.working.scans.contains_key(&scan.id_typed()) {
            return Err(StoreError::Conflict(format!("scan {} already exists", scan.id_typed())));
        }
        self.working.scans.insert(scan.id_typed(), scan.clone());
        Ok(())
    }

    async fn get_scan(&mut self, id: ScanId) -> Result<Option<ScanRecord>, StoreError> {
        Ok(self.working.scans.get(&id).cloned())
    }

    async fn update_scan(
        &mut self,
        scan: &ScanRecord,
        expected: ExpectedVersion,
    ) -> Result<bool, StoreError> {
        match self.working.scans.get_mut(&scan.id_typed()) {
            Some(current) if expected.matches(current.version()) => {
                *current = scan.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn scans_for_owner(
        &mut self,
        owner_id: UserId,
        limit: u32,
    ) -> Result<Vec<ScanRecord>, StoreError> {
        let mut rows: Vec<ScanRecord> = self
            .working
            .scans
            .values()
            .filter(|s| s.owner_id() == owner_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.captured_at()
                .cmp(&a.captured_at())
                .then_with(|| b.id_typed().cmp(&a.id_typed()))
        });
        Ok(limit_to(rows, Some(limit)))
    }

    async fn select_available(
        &mut self,
        owner_id: UserId,
        grade: Grade,
        limit: u32,
    ) -> Result<Vec<ScanRecord>, StoreError> {
        let mut rows: Vec<ScanRecord> = self
            .working
            .scans_of(owner_id, grade, ScanStatus::Available)
            .into_iter()
            .cloned()
            .collect();
        rows.sort_by_key(|s| (s.captured_at(), s.id_typed()));
        Ok(limit_to(rows, Some(limit)))
    }

    async fn select_listed(
        &mut self,
        owner_id: UserId,
        grade: Grade,
        price: Option<u64>,
        limit: Option<u32>,
    ) -> Result<Vec<ScanRecord>, StoreError> {
        let mut rows: Vec<ScanRecord> = self
            .working
            .scans_of(owner_id, grade, ScanStatus::Listed)
            .into_iter()
            .filter(|s| price.is_none() || s.listed_price() == price)
            .cloned()
            .collect();
        rows.sort_by_key(|s| (s.listed_at(), s.captured_at(), s.id_typed()));
        Ok(limit_to(rows, limit))
    }

    async fn count_listed(
        &mut self,
        owner_id: UserId,
        grade: Grade,
        price: u64,
    ) -> Result<u32, StoreError> {
        let count = self
            .working
            .scans_of(owner_id, grade, ScanStatus::Listed)
            .into_iter()
            .filter(|s| s.listed_price() == Some(price))
            .count();
        u32::try_from(count).map_err(|e| StoreError::Decode(format!("listed count: {e}")))
    }

    async fn count_by_grade(
        &mut self,
        owner_id: UserId,
        status: Option<ScanStatus>,
    ) -> Result<Vec<GradeCount>, StoreError> {
        let mut counts: BTreeMap<Grade, u32> = BTreeMap::new();
        for scan in self.working.scans.values() {
            if scan.owner_id() == owner_id && status.is_none_or(|s| scan.status() == s) {
                *counts.entry(scan.grade()).or_default() += 1;
            }
        }
        Ok(counts
            .into_iter()
            .map(|(grade, count)| GradeCount { grade, count })
            .collect())
    }

    async fn get_listing(&mut self, id: ListingId) -> Result<Option<Listing>, StoreError> {
        Ok(self.working.listings.get(&id).cloned())
    }

    async fn find_listing(
        &mut self,
        seller_id: UserId,
        grade: Grade,
    ) -> Result<Option<Listing>, StoreError> {
        Ok(self
            .working
            .listings
            .values()
            .find(|l| l.seller_id() == seller_id && l.grade() == grade)
            .cloned())
    }

    async fn insert_listing(&mut self, listing: &Listing) -> Result<(), StoreError> {
        let duplicate = self
            .working
            .listings
            .values()
            .any(|l| l.seller_id() == listing.seller_id() && l.grade() == listing.grade());
        if duplicate || self.working.listings.contains_key(&listing.id_typed()) {
            return Err(StoreError::Conflict(format!(
                "listing for seller {} grade {} already exists",
                listing.seller_id(),
                listing.grade()
            )));
        }
        self.working.listings.insert(listing.id_typed(), listing.clone());
        Ok(())
    }

    async fn update_listing(
        &mut self,
        listing: &Listing,
        expected: ExpectedVersion,
    ) -> Result<bool, StoreError> {
        match self.working.listings.get_mut(&listing.id_typed()) {
            Some(current) if expected.matches(current.version()) => {
                *current = listing.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn listings_for_seller(&mut self, seller_id: UserId) -> Result<Vec<Listing>, StoreError> {
        let mut rows: Vec<Listing> = self
            .working
            .listings
            .values()
            .filter(|l| l.seller_id() == seller_id)
            .cloned()
            .collect();
        rows.sort_by_key(|l| l.grade());
        Ok(rows)
    }

    async fn active_listings(&mut self) -> Result<Vec<Listing>, StoreError> {
        let mut rows: Vec<Listing> = self
            .working
            .listings
            .values()
            .filter(|l| l.is_active())
            .cloned()
            .collect();
        rows.sort_by_key(|l| (l.seller_id(), l.grade()));
        Ok(rows)
    }

    async fn insert_order(&mut self, order: &Order, items: &[OrderItem]) -> Result<(), StoreError> {
        let duplicate_ref = self
            .working
            .orders
            .values()
            .any(|o| o.payment_ref() == order.payment_ref());
        if duplicate_ref {
            return Err(StoreError::Conflict(format!(
                "payment reference {} already used",
                order.payment_ref()
            )));
        }
        for item in items {
            let taken = self
                .working
                .items
                .values()
                .flatten()
                .any(|existing| existing.scan_id == item.scan_id);
            if taken {
                return Err(StoreError::Conflict(format!(
                    "scan {} already belongs to an order",
                    item.scan_id
                )));
            }
        }

        self.working.orders.insert(order.id_typed(), order.clone());
        self.working.items.insert(order.id_typed(), items.to_vec());
        Ok(())
    }

    async fn get_order(&mut self, payment_ref: &str) -> Result<Option<Order>, StoreError> {
        Ok(self
            .working
            .orders
            .values()
            .find(|o| o.payment_ref() == payment_ref)
            .cloned())
    }

    async fn update_order(
        &mut self,
        order: &Order,
        expected: ExpectedVersion,
    ) -> Result<bool, StoreError> {
        match self.working.orders.get_mut(&order.id_typed()) {
            Some(current) if expected.matches(current.version()) => {
                *current = order.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>, StoreError> {
        Ok(self.working.items.get(&order_id).cloned().unwrap_or_default())
    }

    async fn orders_for_buyer(&mut self, buyer_id: UserId) -> Result<Vec<Order>, StoreError> {
        let mut rows: Vec<Order> = self
            .working
            .orders
            .values()
            .filter(|o| o.buyer_id() == buyer_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id_typed().cmp(&a.id_typed()))
        });
        Ok(rows)
    }

    async fn pending_orders_before(
        &mut self,
        buyer_id: UserId,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Order>, StoreError> {
        Ok(self
            .working
            .orders
            .values()
            .filter(|o| {
                o.buyer_id() == buyer_id
                    && o.status() == OrderStatus::Pending
                    && o.created_at() <= cutoff
            })
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTx {
            mut guard,
            working,
            commits,
        } = *self;
        *guard = working;
        commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use eggmart_grading::{Classification, ClassifierInputs, Freshness};

    fn graded(owner_id: UserId, grade: Grade, captured_at: DateTime<Utc>) -> ScanRecord {
        ScanRecord::graded(
            ScanId::new(),
            owner_id,
            captured_at,
            None,
            &ClassifierInputs::default(),
            &Classification {
                grade,
                confidence: 90.0,
                freshness: Freshness::Fresh,
            },
        )
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = InMemoryMarketStore::new();
        let scan = graded(UserId::new(), Grade::A, Utc::now());

        let mut tx = store.begin().await.unwrap();
        tx.insert_scan(&scan).await.unwrap();
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        assert!(tx.get_scan(scan.id_typed()).await.unwrap().is_none());
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn commit_publishes_changes() {
        let store = InMemoryMarketStore::new();
        let scan = graded(UserId::new(), Grade::A, Utc::now());

        let mut tx = store.begin().await.unwrap();
        tx.insert_scan(&scan).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.get_scan(scan.id_typed()).await.unwrap(), Some(scan));
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn stale_update_is_refused() {
        let store = InMemoryMarketStore::new();
        let mut scan = graded(UserId::new(), Grade::B, Utc::now());

        let mut tx = store.begin().await.unwrap();
        tx.insert_scan(&scan).await.unwrap();

        scan.mark_listed(1500, Utc::now()).unwrap();
        assert!(!tx.update_scan(&scan, ExpectedVersion::Exact(7)).await.unwrap());
        assert!(tx.update_scan(&scan, ExpectedVersion::Exact(1)).await.unwrap());
    }

    #[tokio::test]
    async fn available_selection_is_oldest_first() {
        let store = InMemoryMarketStore::new();
        let owner = UserId::new();
        let t0 = Utc::now();
        let newest = graded(owner, Grade::B, t0 + Duration::minutes(2));
        let oldest = graded(owner, Grade::B, t0);
        let middle = graded(owner, Grade::B, t0 + Duration::minutes(1));
        let other_grade = graded(owner, Grade::A, t0 - Duration::minutes(5));

        let mut tx = store.begin().await.unwrap();
        for scan in [&newest, &oldest, &middle, &other_grade] {
            tx.insert_scan(scan).await.unwrap();
        }

        let picked = tx.select_available(owner, Grade::B, 2).await.unwrap();
        let ids: Vec<_> = picked.iter().map(|s| s.id_typed()).collect();
        assert_eq!(ids, vec![oldest.id_typed(), middle.id_typed()]);
    }

    #[tokio::test]
    async fn one_listing_per_seller_and_grade() {
        let store = InMemoryMarketStore::new();
        let seller = UserId::new();
        let first = Listing::open(ListingId::new(), seller, Grade::A, 100, 1, Utc::now()).unwrap();
        let second = Listing::open(ListingId::new(), seller, Grade::A, 200, 1, Utc::now()).unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert_listing(&first).await.unwrap();
        let err = tx.insert_listing(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
