use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use eggmart_core::{AggregateRoot, DomainError, DomainResult, ListingId, UserId};
use eggmart_grading::Grade;

/// Listing availability. A listing with no stock is always `Inactive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Inactive,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Inactive => "inactive",
        }
    }

    fn for_stock(stock: u32) -> Self {
        if stock == 0 {
            ListingStatus::Inactive
        } else {
            ListingStatus::Active
        }
    }
}

impl core::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for ListingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ListingStatus::Active),
            "inactive" => Ok(ListingStatus::Inactive),
            other => Err(DomainError::validation(format!(
                "unknown listing status: {other:?}"
            ))),
        }
    }
}

/// Plain field bag used by stores to rehydrate a persisted listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingParts {
    pub id: ListingId,
    pub seller_id: UserId,
    pub grade: Grade,
    pub stock: u32,
    pub unit_price: u64,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

/// Aggregate root: Listing, unique per (seller, grade).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    id: ListingId,
    seller_id: UserId,
    grade: Grade,
    stock: u32,
    /// Price in smallest currency unit.
    unit_price: u64,
    status: ListingStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl Listing {
    pub fn open(
        id: ListingId,
        seller_id: UserId,
        grade: Grade,
        unit_price: u64,
        stock: u32,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        ensure_sellable(grade)?;
        ensure_price(unit_price)?;

        Ok(Self {
            id,
            seller_id,
            grade,
            stock,
            unit_price,
            status: ListingStatus::for_stock(stock),
            created_at: at,
            updated_at: at,
            version: 1,
        })
    }

    pub fn restore(parts: ListingParts) -> Self {
        Self {
            id: parts.id,
            seller_id: parts.seller_id,
            grade: parts.grade,
            stock: parts.stock,
            unit_price: parts.unit_price,
            status: parts.status,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
            version: parts.version,
        }
    }

    pub fn id_typed(&self) -> ListingId {
        self.id
    }

    pub fn seller_id(&self) -> UserId {
        self.seller_id
    }

    pub fn grade(&self) -> Grade {
        self.grade
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn unit_price(&self) -> u64 {
        self.unit_price
    }

    pub fn status(&self) -> ListingStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == ListingStatus::Active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Replace the cached stock and price with freshly counted values.
    ///
    /// Status follows stock. Returns whether anything changed; the version
    /// only moves when it did.
    pub fn sync(&mut self, stock: u32, unit_price: u64, at: DateTime<Utc>) -> DomainResult<bool> {
        ensure_price(unit_price)?;

        let status = ListingStatus::for_stock(stock);
        if self.stock == stock && self.unit_price == unit_price && self.status == status {
            return Ok(false);
        }

        self.stock = stock;
        self.unit_price = unit_price;
        self.status = status;
        self.updated_at = at;
        self.version += 1;
        Ok(true)
    }

    pub fn sync_stock(&mut self, stock: u32, at: DateTime<Utc>) -> bool {
        let status = ListingStatus::for_stock(stock);
        if self.stock == stock && self.status == status {
            return false;
        }

        self.stock = stock;
        self.status = status;
        self.updated_at = at;
        self.version += 1;
        true
    }
}

impl AggregateRoot for Listing {
    type Id = ListingId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

fn ensure_sellable(grade: Grade) -> DomainResult<()> {
    if grade.is_sellable() {
        Ok(())
    } else {
        Err(DomainError::validation(format!("grade {grade} cannot be listed")))
    }
}

fn ensure_price(price: u64) -> DomainResult<()> {
    if price == 0 {
        Err(DomainError::validation("price must be positive"))
    } else {
        Ok(())
    }
}

/// Command: publish `stock` more units of `grade` at `price`.
///
/// Carries raw caller input; `validate` is the only way to get a
/// [`PublishPlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishListing {
    /// Resolved by the surrounding auth layer; `None` means no session.
    pub seller_id: Option<UserId>,
    pub grade: String,
    pub price: i64,
    pub stock: i64,
}

/// Validated publish request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishPlan {
    pub seller_id: UserId,
    pub grade: Grade,
    pub price: u64,
    pub stock: u32,
}

impl PublishListing {
    pub fn validate(&self) -> DomainResult<PublishPlan> {
        let seller_id = self.seller_id.ok_or(DomainError::Unauthorized)?;

        let grade: Grade = self.grade.parse()?;
        ensure_sellable(grade)?;

        let price = u64::try_from(self.price)
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| DomainError::validation("price must be positive"))?;

        let stock = u32::try_from(self.stock)
            .ok()
            .filter(|s| *s > 0)
            .ok_or_else(|| DomainError::validation("stock must be a positive count"))?;

        Ok(PublishPlan {
            seller_id,
            grade,
            price,
            stock,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn publish(grade: &str, price: i64, stock: i64) -> PublishListing {
        PublishListing {
            seller_id: Some(UserId::new()),
            grade: grade.to_string(),
            price,
            stock,
        }
    }

    #[test]
    fn open_with_stock_is_active() {
        let listing =
            Listing::open(ListingId::new(), UserId::new(), Grade::B, 2200, 2, test_time()).unwrap();
        assert!(listing.is_active());
        assert_eq!(listing.stock(), 2);
        assert_eq!(listing.version(), 1);
    }

    #[test]
    fn reject_grade_cannot_be_opened() {
        let err = Listing::open(ListingId::new(), UserId::new(), Grade::Reject, 100, 1, test_time())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn draining_stock_deactivates() {
        let mut listing =
            Listing::open(ListingId::new(), UserId::new(), Grade::A, 3000, 1, test_time()).unwrap();
        assert!(listing.sync_stock(0, test_time()));
        assert_eq!(listing.status(), ListingStatus::Inactive);
        assert_eq!(listing.version(), 2);

        assert!(!listing.sync_stock(0, test_time()));
        assert_eq!(listing.version(), 2);
    }

    #[test]
    fn sync_replaces_price_and_reactivates() {
        let mut listing =
            Listing::open(ListingId::new(), UserId::new(), Grade::C, 1000, 0, test_time()).unwrap();
        assert!(!listing.is_active());

        assert!(listing.sync(4, 1200, test_time()).unwrap());
        assert!(listing.is_active());
        assert_eq!(listing.unit_price(), 1200);
        assert!(!listing.sync(4, 1200, test_time()).unwrap());
    }

    #[test]
    fn publish_requires_a_seller() {
        let mut cmd = publish("B", 2200, 2);
        cmd.seller_id = None;
        assert_eq!(cmd.validate().unwrap_err(), DomainError::Unauthorized);
    }

    #[test]
    fn publish_rejects_bad_input() {
        assert!(matches!(publish("D", 2200, 2).validate(), Err(DomainError::Validation(_))));
        assert!(matches!(publish("reject", 2200, 2).validate(), Err(DomainError::Validation(_))));
        assert!(matches!(publish("B", 0, 2).validate(), Err(DomainError::Validation(_))));
        assert!(matches!(publish("B", -5, 2).validate(), Err(DomainError::Validation(_))));
        assert!(matches!(publish("B", 2200, 0).validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn publish_plan_carries_typed_values() {
        let plan = publish("b", 2200, 2).validate().unwrap();
        assert_eq!(plan.grade, Grade::B);
        assert_eq!(plan.price, 2200);
        assert_eq!(plan.stock, 2);
    }

    proptest! {
        #[test]
        fn zero_stock_is_never_active(stock in 0u32..50, price in 1u64..10_000) {
            let mut listing =
                Listing::open(ListingId::new(), UserId::new(), Grade::A, price, stock, test_time()).unwrap();
            prop_assert_eq!(listing.is_active(), stock > 0);

            listing.sync_stock(0, test_time());
            prop_assert!(!listing.is_active());
        }
    }
}
