use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use eggmart_core::{AggregateRoot, DomainError, OrderId};
use eggmart_listings::Listing;
use eggmart_orders::{Checkout, CheckoutPlan, ListingRef, Order, OrderItem, OrderStatus, payment_reference};

use crate::clock::Clock;
use crate::gateway::{CustomerDetails, PaymentGateway, TransactionItem, TransactionRequest};
use crate::store::{MarketStore, MarketTx};

use super::{ServiceResult, retry_on_conflict, save_listing, save_order, save_scan};

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOutcome {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Allocates listed units to buyers.
///
/// A checkout commits the allocation first (order, items, sold scans,
/// listing stock) and only then asks the gateway for a payment token. A
/// gateway outage therefore never loses an allocation: the order stays
/// `pending` without a token until it is reconciled or expires.
#[derive(Clone)]
pub struct OrderAllocator {
    store: Arc<dyn MarketStore>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
}

impl OrderAllocator {
    pub fn new(store: Arc<dyn MarketStore>, gateway: Arc<dyn PaymentGateway>, clock: Arc<dyn Clock>) -> Self {
        Self { store, gateway, clock }
    }

    #[instrument(skip(self, command), fields(quantity = command.quantity), err)]
    pub async fn checkout(&self, command: &Checkout) -> ServiceResult<CheckoutOutcome> {
        let plan = command.validate()?;
        let allocated = retry_on_conflict("checkout", || self.allocate(plan)).await?;
        let order = self.request_token(allocated.order, &allocated.items).await;
        Ok(CheckoutOutcome {
            order,
            items: allocated.items,
        })
    }

    async fn allocate(&self, plan: CheckoutPlan) -> ServiceResult<CheckoutOutcome> {
        let CheckoutPlan {
            buyer_id,
            target,
            quantity,
        } = plan;
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let mut listing = resolve_listing(tx.as_mut(), target).await?;
        if !listing.is_active() || listing.stock() < quantity {
            return Err(DomainError::insufficient_stock(listing.stock(), quantity).into());
        }

        let seller_id = listing.seller_id();
        let grade = listing.grade();
        let price = listing.unit_price();

        let units = tx
            .select_listed(seller_id, grade, Some(price), Some(quantity))
            .await?;
        let found = u32::try_from(units.len()).unwrap_or(u32::MAX);
        if found < quantity {
            // Listing stock drifted from the listed scans. The caller sees
            // what is actually there.
            warn!(
                listing_id = %listing.id_typed(),
                stock = listing.stock(),
                found,
                "listing stock ahead of listed scans"
            );
            return Err(DomainError::insufficient_stock(found, quantity).into());
        }

        let order_id = OrderId::new();
        let order = Order::place(
            order_id,
            payment_reference(listing.id_typed()),
            buyer_id,
            seller_id,
            listing.id_typed(),
            grade,
            price,
            quantity,
            now,
        )?;

        let mut items = Vec::with_capacity(units.len());
        for mut scan in units {
            let previous = scan.version();
            scan.mark_sold(now)?;
            save_scan(tx.as_mut(), &scan, previous).await?;
            items.push(OrderItem::for_scan(order_id, scan.id_typed(), price));
        }
        tx.insert_order(&order, &items).await?;

        let previous = listing.version();
        let live = tx.count_listed(seller_id, grade, price).await?;
        if listing.sync_stock(live, now) {
            save_listing(tx.as_mut(), &listing, previous).await?;
        }

        tx.commit().await?;

        info!(
            payment_ref = order.payment_ref(),
            listing_id = %listing.id_typed(),
            remaining = listing.stock(),
            total = order.total_amount(),
            "units allocated"
        );
        Ok(CheckoutOutcome { order, items })
    }

    /// Ask the gateway for a payment token and store it on the order.
    ///
    /// Runs after the allocation committed, so nothing here fails the
    /// checkout: any error leaves the order `pending` without a token.
    async fn request_token(&self, order: Order, items: &[OrderItem]) -> Order {
        let request = TransactionRequest {
            order_ref: order.payment_ref().to_string(),
            gross_amount: order.total_amount(),
            items: vec![TransactionItem {
                id: order.listing_id().to_string(),
                price: order.unit_price(),
                quantity: u32::try_from(items.len()).unwrap_or(order.quantity()),
                name: format!("Egg grade {}", order.grade()),
            }],
            customer: CustomerDetails {
                customer_id: order.buyer_id().to_string(),
                email: None,
            },
        };

        let token = match self.gateway.create_transaction(&request).await {
            Ok(token) => token,
            Err(err) => {
                warn!(payment_ref = order.payment_ref(), error = %err, "payment token unavailable, order left pending");
                return order;
            }
        };

        match self.store_token(order.payment_ref(), token.token).await {
            Ok(stored) => stored,
            Err(err) => {
                warn!(payment_ref = order.payment_ref(), error = %err, "payment token not stored, order left pending");
                order
            }
        }
    }

    async fn store_token(&self, payment_ref: &str, token: String) -> ServiceResult<Order> {
        let mut tx = self.store.begin().await?;
        let Some(mut current) = tx.get_order(payment_ref).await? else {
            return Err(DomainError::not_found(format!("order {payment_ref}")).into());
        };
        if current.status() != OrderStatus::Pending {
            // A notification beat us to it.
            warn!(payment_ref, status = %current.status(), "order moved on before its token was stored");
            return Ok(current);
        }

        let previous = current.version();
        current.attach_token(token, self.clock.now())?;
        save_order(tx.as_mut(), &current, previous).await?;
        tx.commit().await?;
        Ok(current)
    }
}

async fn resolve_listing(tx: &mut dyn MarketTx, target: ListingRef) -> ServiceResult<Listing> {
    let found = match target {
        ListingRef::Id { listing_id } => tx.get_listing(listing_id).await?,
        ListingRef::SellerGrade { seller_id, grade } => tx.find_listing(seller_id, grade).await?,
    };
    found.ok_or_else(|| {
        let what = match target {
            ListingRef::Id { listing_id } => format!("listing {listing_id}"),
            ListingRef::SellerGrade { seller_id, grade } => format!("grade {grade} listing of seller {seller_id}"),
        };
        DomainError::not_found(what).into()
    })
}
