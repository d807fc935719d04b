use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use eggmart_core::{AggregateRoot, DomainError, UserId};
use eggmart_orders::{FraudStatus, Order, OrderItem, OrderStatus, TransactionStatus, map_gateway_status};
use eggmart_scans::ScanStatus;

use crate::clock::Clock;
use crate::gateway::PaymentGateway;
use crate::store::{MarketStore, MarketTx};

use super::{ServiceResult, resync_listing_stock, save_order, save_scan};

/// An order with the units it bought.
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Maps gateway outcomes onto orders.
///
/// Notifications may arrive late, twice, or out of order. Re-applying the
/// status an order already has writes nothing; a status the order can no
/// longer reach is logged and ignored.
#[derive(Clone)]
pub struct PaymentReconciler {
    store: Arc<dyn MarketStore>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    expiry: Duration,
}

impl PaymentReconciler {
    pub fn new(
        store: Arc<dyn MarketStore>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        expiry: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
            expiry,
        }
    }

    /// Apply a pushed gateway notification.
    #[instrument(skip(self), fields(status = %transaction_status), err)]
    pub async fn apply_notification(
        &self,
        payment_ref: &str,
        transaction_status: TransactionStatus,
        fraud_status: Option<FraudStatus>,
    ) -> ServiceResult<Order> {
        let next = map_gateway_status(transaction_status, fraud_status);
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let Some(mut order) = tx.get_order(payment_ref).await? else {
            return Err(DomainError::not_found(format!("order {payment_ref}")).into());
        };

        if order.status() == next {
            debug!(payment_ref, status = %next, "notification repeats current status");
            return Ok(order);
        }
        if !order.status().can_transition_to(next) {
            warn!(payment_ref, current = %order.status(), incoming = %next, "ignoring stale notification");
            return Ok(order);
        }

        let previous = order.version();
        order.apply_status(next, now)?;
        save_order(tx.as_mut(), &order, previous).await?;

        if order.status().is_paid() {
            finalize_sale(tx.as_mut(), &order, now).await?;
        }

        tx.commit().await?;
        info!(payment_ref, status = %order.status(), "order status updated");
        Ok(order)
    }

    pub async fn get(&self, payment_ref: &str) -> ServiceResult<Order> {
        let mut tx = self.store.begin().await?;
        tx.get_order(payment_ref)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("order {payment_ref}")).into())
    }

    /// Pull the current status of a non-terminal order from the gateway.
    #[instrument(skip(self), err)]
    pub async fn sync_pending(&self, payment_ref: &str) -> ServiceResult<Order> {
        let order = self.get(payment_ref).await?;
        if order.status().is_terminal() {
            return Ok(order);
        }

        let status = self.gateway.query_status(payment_ref).await?;
        self.apply_notification(payment_ref, status.transaction_status, status.fraud_status)
            .await
    }

    /// Expire the buyer's pending orders older than the payment window.
    /// Returns how many were expired.
    #[instrument(skip(self), fields(buyer_id = %buyer_id), err)]
    pub async fn expire_overdue(&self, buyer_id: UserId) -> ServiceResult<usize> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let mut expired = 0;
        for mut order in tx.pending_orders_before(buyer_id, now - self.expiry).await? {
            if !order.is_overdue(now, self.expiry) {
                continue;
            }
            let previous = order.version();
            if order.apply_status(OrderStatus::Expired, now)? {
                save_order(tx.as_mut(), &order, previous).await?;
                expired += 1;
            }
        }

        if expired > 0 {
            tx.commit().await?;
            info!(expired, "expired overdue orders");
        }
        Ok(expired)
    }

    /// The buyer's orders, newest first, after expiring overdue ones.
    pub async fn order_history(&self, buyer_id: UserId) -> ServiceResult<Vec<OrderView>> {
        self.expire_overdue(buyer_id).await?;

        let mut tx = self.store.begin().await?;
        let orders = tx.orders_for_buyer(buyer_id).await?;
        let mut views = Vec::with_capacity(orders.len());
        for order in orders {
            let items = tx.order_items(order.id_typed()).await?;
            views.push(OrderView { order, items });
        }
        Ok(views)
    }
}

/// Make sure every unit of a paid order is `sold`.
///
/// Allocation already sold them, so normally nothing is written here. A unit
/// that is still available or listed is sold now and its listing recounted.
async fn finalize_sale(tx: &mut dyn MarketTx, order: &Order, now: DateTime<Utc>) -> ServiceResult<()> {
    for item in tx.order_items(order.id_typed()).await? {
        let Some(mut scan) = tx.get_scan(item.scan_id).await? else {
            warn!(scan_id = %item.scan_id, "order item points at a missing scan");
            continue;
        };
        match scan.status() {
            ScanStatus::Sold => {}
            ScanStatus::Discarded => {
                warn!(scan_id = %item.scan_id, "paid order includes a discarded scan");
            }
            ScanStatus::Available | ScanStatus::Listed => {
                let was_listed = scan.status() == ScanStatus::Listed;
                let previous = scan.version();
                scan.mark_sold(now)?;
                save_scan(tx, &scan, previous).await?;
                if was_listed {
                    resync_listing_stock(tx, scan.owner_id(), scan.grade(), now).await?;
                }
            }
        }
    }
    Ok(())
}
