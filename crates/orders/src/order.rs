use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use eggmart_core::{AggregateRoot, DomainError, DomainResult, ListingId, OrderId, OrderItemId, ScanId, UserId};
use eggmart_grading::Grade;

/// Order lifecycle.
///
/// `pending` may move anywhere. `paid` may still settle or be cancelled by the
/// gateway. Everything else is terminal and never reopens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Settled,
    Denied,
    Cancelled,
    Expired,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Settled,
        OrderStatus::Denied,
        OrderStatus::Cancelled,
        OrderStatus::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Settled => "settled",
            OrderStatus::Denied => "denied",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Settled | OrderStatus::Denied | OrderStatus::Cancelled | OrderStatus::Expired
        )
    }

    /// Money has been received (captured or settled).
    pub fn is_paid(self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Settled)
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        match self {
            OrderStatus::Pending => next != OrderStatus::Pending,
            OrderStatus::Paid => matches!(next, OrderStatus::Settled | OrderStatus::Cancelled),
            _ => false,
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown order status: {s:?}")))
    }
}

/// Generate a gateway order reference for a checkout against `listing_id`.
///
/// The gateway uses it as an idempotency key, so it is never reused: the tail
/// is a fresh UUIDv7. Kept under the gateway's 50 character limit.
pub fn payment_reference(listing_id: ListingId) -> String {
    let listing = listing_id.as_uuid().simple().to_string();
    let prefix = listing.get(..8).unwrap_or(&listing);
    format!("EGG-{prefix}-{}", Uuid::now_v7().simple())
}

/// Plain field bag used by stores to rehydrate a persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderParts {
    pub id: OrderId,
    pub payment_ref: String,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub listing_id: ListingId,
    pub grade: Grade,
    pub quantity: u32,
    pub unit_price: u64,
    pub total_amount: u64,
    pub payment_token: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

/// Aggregate root: Order header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    id: OrderId,
    payment_ref: String,
    buyer_id: UserId,
    seller_id: UserId,
    listing_id: ListingId,
    grade: Grade,
    quantity: u32,
    unit_price: u64,
    total_amount: u64,
    payment_token: Option<String>,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn place(
        id: OrderId,
        payment_ref: String,
        buyer_id: UserId,
        seller_id: UserId,
        listing_id: ListingId,
        grade: Grade,
        unit_price: u64,
        quantity: u32,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        let total_amount = unit_price
            .checked_mul(u64::from(quantity))
            .ok_or_else(|| DomainError::validation("order total overflows"))?;

        Ok(Self {
            id,
            payment_ref,
            buyer_id,
            seller_id,
            listing_id,
            grade,
            quantity,
            unit_price,
            total_amount,
            payment_token: None,
            status: OrderStatus::Pending,
            created_at: at,
            updated_at: at,
            version: 1,
        })
    }

    pub fn restore(parts: OrderParts) -> Self {
        Self {
            id: parts.id,
            payment_ref: parts.payment_ref,
            buyer_id: parts.buyer_id,
            seller_id: parts.seller_id,
            listing_id: parts.listing_id,
            grade: parts.grade,
            quantity: parts.quantity,
            unit_price: parts.unit_price,
            total_amount: parts.total_amount,
            payment_token: parts.payment_token,
            status: parts.status,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
            version: parts.version,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn payment_ref(&self) -> &str {
        &self.payment_ref
    }

    pub fn buyer_id(&self) -> UserId {
        self.buyer_id
    }

    pub fn seller_id(&self) -> UserId {
        self.seller_id
    }

    pub fn listing_id(&self) -> ListingId {
        self.listing_id
    }

    pub fn grade(&self) -> Grade {
        self.grade
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> u64 {
        self.unit_price
    }

    pub fn total_amount(&self) -> u64 {
        self.total_amount
    }

    pub fn payment_token(&self) -> Option<&str> {
        self.payment_token.as_deref()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn attach_token(&mut self, token: String, at: DateTime<Utc>) -> DomainResult<()> {
        if self.status != OrderStatus::Pending {
            return Err(DomainError::invalid_transition("order", self.status, "tokenized"));
        }
        self.payment_token = Some(token);
        self.updated_at = at;
        self.version += 1;
        Ok(())
    }

    /// Move to `next`. Returns `Ok(false)` when already there (no write needed).
    pub fn apply_status(&mut self, next: OrderStatus, at: DateTime<Utc>) -> DomainResult<bool> {
        if self.status == next {
            return Ok(false);
        }
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invalid_transition("order", self.status, next));
        }

        self.status = next;
        self.updated_at = at;
        self.version += 1;
        Ok(true)
    }

    /// Still pending after `window` has elapsed since creation.
    pub fn is_overdue(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.status == OrderStatus::Pending && self.created_at + window <= now
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// One sold unit: exactly one scan at the listing's unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub scan_id: ScanId,
    pub unit_price: u64,
    pub quantity: u32,
}

impl OrderItem {
    pub fn for_scan(order_id: OrderId, scan_id: ScanId, unit_price: u64) -> Self {
        Self {
            id: OrderItemId::new(),
            order_id,
            scan_id,
            unit_price,
            quantity: 1,
        }
    }
}

/// How a checkout names the listing it buys from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum ListingRef {
    Id { listing_id: ListingId },
    /// Fallback for sellers that have not published a listing row yet.
    SellerGrade { seller_id: UserId, grade: Grade },
}

/// Command: Checkout, with raw caller input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkout {
    pub buyer_id: Option<UserId>,
    pub listing_id: Option<ListingId>,
    pub seller_id: Option<UserId>,
    pub grade: Option<String>,
    pub quantity: i64,
}

/// Validated checkout request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutPlan {
    pub buyer_id: UserId,
    pub target: ListingRef,
    pub quantity: u32,
}

impl Checkout {
    pub fn validate(&self) -> DomainResult<CheckoutPlan> {
        let buyer_id = self.buyer_id.ok_or(DomainError::Unauthorized)?;

        let quantity = u32::try_from(self.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| DomainError::validation("quantity must be a positive count"))?;

        let target = match (self.listing_id, self.seller_id, self.grade.as_deref()) {
            (Some(listing_id), _, _) => ListingRef::Id { listing_id },
            (None, Some(seller_id), Some(grade)) => {
                let grade: Grade = grade.parse()?;
                if !grade.is_sellable() {
                    return Err(DomainError::validation(format!("grade {grade} is not for sale")));
                }
                ListingRef::SellerGrade { seller_id, grade }
            }
            _ => {
                return Err(DomainError::validation(
                    "checkout needs a listing id or a seller and grade",
                ));
            }
        };

        Ok(CheckoutPlan {
            buyer_id,
            target,
            quantity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn pending_order(at: DateTime<Utc>) -> Order {
        let listing_id = ListingId::new();
        Order::place(
            OrderId::new(),
            payment_reference(listing_id),
            UserId::new(),
            UserId::new(),
            listing_id,
            Grade::A,
            2800,
            3,
            at,
        )
        .unwrap()
    }

    #[test]
    fn placing_computes_total() {
        let order = pending_order(test_time());
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.total_amount(), 8400);
        assert!(order.payment_token().is_none());
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let err = Order::place(
            OrderId::new(),
            "EGG-x".into(),
            UserId::new(),
            UserId::new(),
            ListingId::new(),
            Grade::A,
            100,
            0,
            test_time(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn references_are_unique_and_short() {
        let listing_id = ListingId::new();
        let a = payment_reference(listing_id);
        let b = payment_reference(listing_id);
        assert_ne!(a, b);
        assert!(a.starts_with("EGG-"));
        assert!(a.len() <= 50);
    }

    #[test]
    fn same_status_is_a_no_op() {
        let mut order = pending_order(test_time());
        assert!(!order.apply_status(OrderStatus::Pending, test_time()).unwrap());
        assert_eq!(order.version(), 1);
    }

    #[test]
    fn paid_can_settle_but_terminal_never_reopens() {
        let mut order = pending_order(test_time());
        assert!(order.apply_status(OrderStatus::Paid, test_time()).unwrap());
        assert!(order.apply_status(OrderStatus::Settled, test_time()).unwrap());
        assert_eq!(order.version(), 3);

        let err = order.apply_status(OrderStatus::Pending, test_time()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
        assert!(order.apply_status(OrderStatus::Denied, test_time()).is_err());
        assert_eq!(order.status(), OrderStatus::Settled);
    }

    #[test]
    fn paid_cannot_fall_back_to_pending() {
        let mut order = pending_order(test_time());
        order.apply_status(OrderStatus::Paid, test_time()).unwrap();
        assert!(order.apply_status(OrderStatus::Pending, test_time()).is_err());
        assert!(order.apply_status(OrderStatus::Expired, test_time()).is_err());
    }

    #[test]
    fn token_only_attaches_while_pending() {
        let mut order = pending_order(test_time());
        order.attach_token("snap-token".into(), test_time()).unwrap();
        assert_eq!(order.payment_token(), Some("snap-token"));

        order.apply_status(OrderStatus::Expired, test_time()).unwrap();
        assert!(order.attach_token("late".into(), test_time()).is_err());
    }

    #[test]
    fn overdue_after_window() {
        let created = test_time();
        let order = pending_order(created);
        let window = Duration::minutes(60);
        assert!(!order.is_overdue(created + Duration::minutes(59), window));
        assert!(order.is_overdue(created + Duration::minutes(60), window));
    }

    #[test]
    fn terminal_statuses_have_no_successors() {
        for from in OrderStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in OrderStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn checkout_prefers_listing_id() {
        let listing_id = ListingId::new();
        let plan = Checkout {
            buyer_id: Some(UserId::new()),
            listing_id: Some(listing_id),
            seller_id: Some(UserId::new()),
            grade: Some("A".into()),
            quantity: 2,
        }
        .validate()
        .unwrap();
        assert_eq!(plan.target, ListingRef::Id { listing_id });
        assert_eq!(plan.quantity, 2);
    }

    #[test]
    fn checkout_falls_back_to_seller_and_grade() {
        let seller_id = UserId::new();
        let plan = Checkout {
            buyer_id: Some(UserId::new()),
            listing_id: None,
            seller_id: Some(seller_id),
            grade: Some("b".into()),
            quantity: 1,
        }
        .validate()
        .unwrap();
        assert_eq!(
            plan.target,
            ListingRef::SellerGrade {
                seller_id,
                grade: Grade::B
            }
        );
    }

    #[test]
    fn checkout_rejects_bad_input() {
        let base = Checkout {
            buyer_id: Some(UserId::new()),
            listing_id: Some(ListingId::new()),
            seller_id: None,
            grade: None,
            quantity: 1,
        };

        let mut no_buyer = base.clone();
        no_buyer.buyer_id = None;
        assert_eq!(no_buyer.validate().unwrap_err(), DomainError::Unauthorized);

        let mut zero = base.clone();
        zero.quantity = 0;
        assert!(matches!(zero.validate(), Err(DomainError::Validation(_))));

        let mut no_target = base.clone();
        no_target.listing_id = None;
        assert!(matches!(no_target.validate(), Err(DomainError::Validation(_))));

        let mut reject = base;
        reject.listing_id = None;
        reject.seller_id = Some(UserId::new());
        reject.grade = Some("reject".into());
        assert!(matches!(reject.validate(), Err(DomainError::Validation(_))));
    }
}
