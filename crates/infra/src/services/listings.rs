use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument};

use eggmart_core::{AggregateRoot, DomainError, ListingId, UserId};
use eggmart_listings::{Listing, PublishListing, PublishPlan};
use eggmart_scans::ScanStatus;

use crate::clock::Clock;
use crate::store::{GradeCount, MarketStore};

use super::{ServiceResult, retry_on_conflict, save_listing, save_scan};

/// What a producer sees on their dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct SellerOverview {
    /// Graded, not yet listed units per grade.
    pub available_by_grade: Vec<GradeCount>,
    pub listings: Vec<Listing>,
}

/// Turns available scans into priced listings and keeps listing stock equal
/// to the live count of listed scans.
#[derive(Clone)]
pub struct ListingAggregator {
    store: Arc<dyn MarketStore>,
    clock: Arc<dyn Clock>,
}

impl ListingAggregator {
    pub fn new(store: Arc<dyn MarketStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// List `stock` more units of one grade at a uniform price.
    ///
    /// The oldest available scans are taken first. Either all requested
    /// units are listed or nothing is written. Units already listed at a
    /// different price are re-tagged with the new one.
    #[instrument(skip(self, command), fields(grade = %command.grade, price = command.price, stock = command.stock), err)]
    pub async fn publish(&self, command: &PublishListing) -> ServiceResult<Listing> {
        let plan = command.validate()?;
        retry_on_conflict("publish", || self.publish_once(plan)).await
    }

    async fn publish_once(&self, plan: PublishPlan) -> ServiceResult<Listing> {
        let PublishPlan {
            seller_id,
            grade,
            price,
            stock,
        } = plan;
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let selected = tx.select_available(seller_id, grade, stock).await?;
        let available = u32::try_from(selected.len()).unwrap_or(u32::MAX);
        if available < stock {
            return Err(DomainError::insufficient_stock(available, stock).into());
        }

        let existing = tx.find_listing(seller_id, grade).await?;

        // Price uniformity: every listed unit of this grade carries the listing price.
        let mut repriced = 0usize;
        for mut scan in tx.select_listed(seller_id, grade, None, None).await? {
            let previous = scan.version();
            if scan.reprice(price)? {
                save_scan(tx.as_mut(), &scan, previous).await?;
                repriced += 1;
            }
        }

        for mut scan in selected {
            let previous = scan.version();
            scan.mark_listed(price, now)?;
            save_scan(tx.as_mut(), &scan, previous).await?;
        }

        let live = tx.count_listed(seller_id, grade, price).await?;
        let listing = match existing {
            Some(mut listing) => {
                let previous = listing.version();
                if listing.sync(live, price, now)? {
                    save_listing(tx.as_mut(), &listing, previous).await?;
                }
                listing
            }
            None => {
                let listing = Listing::open(ListingId::new(), seller_id, grade, price, live, now)?;
                tx.insert_listing(&listing).await?;
                listing
            }
        };

        tx.commit().await?;

        if repriced > 0 {
            debug!(repriced, "re-tagged listed units with the new price");
        }
        info!(
            listing_id = %listing.id_typed(),
            seller_id = %seller_id,
            stock = listing.stock(),
            "listing published"
        );
        Ok(listing)
    }

    pub async fn get(&self, listing_id: ListingId) -> ServiceResult<Listing> {
        let mut tx = self.store.begin().await?;
        tx.get_listing(listing_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("listing {listing_id}")).into())
    }

    /// Active listings across every seller.
    pub async fn catalog(&self) -> ServiceResult<Vec<Listing>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.active_listings().await?)
    }

    pub async fn seller_overview(&self, seller_id: UserId) -> ServiceResult<SellerOverview> {
        let mut tx = self.store.begin().await?;
        let available_by_grade = tx
            .count_by_grade(seller_id, Some(ScanStatus::Available))
            .await?
            .into_iter()
            .filter(|c| c.grade.is_sellable())
            .collect();
        let listings = tx.listings_for_seller(seller_id).await?;
        Ok(SellerOverview {
            available_by_grade,
            listings,
        })
    }
}
