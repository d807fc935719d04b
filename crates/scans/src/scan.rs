use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use eggmart_core::{AggregateRoot, DomainError, DomainResult, ScanId, UserId};
use eggmart_grading::{
    Classification, ClassifierInputs, Cleanliness, Freshness, Grade, Integrity, Labeled,
    ShellColor, WeightCategory,
};

/// Scan record lifecycle.
///
/// Forward only: `available → listed → sold`, `available → sold`, and
/// `any → discarded`. Nothing ever moves back to `available`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Available,
    Listed,
    Sold,
    Discarded,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Available => "available",
            ScanStatus::Listed => "listed",
            ScanStatus::Sold => "sold",
            ScanStatus::Discarded => "discarded",
        }
    }

    pub fn can_transition_to(self, next: ScanStatus) -> bool {
        use ScanStatus::*;
        matches!(
            (self, next),
            (Available, Listed) | (Available, Sold) | (Listed, Sold)
        ) || (next == Discarded && self != Discarded)
    }
}

impl core::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for ScanStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(ScanStatus::Available),
            "listed" => Ok(ScanStatus::Listed),
            "sold" => Ok(ScanStatus::Sold),
            "discarded" => Ok(ScanStatus::Discarded),
            other => Err(DomainError::validation(format!("unknown scan status: {other:?}"))),
        }
    }
}

/// Plain field bag used by stores to rehydrate a persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanParts {
    pub id: ScanId,
    pub owner_id: UserId,
    pub captured_at: DateTime<Utc>,
    pub image_ref: Option<String>,
    pub color: Option<Labeled<ShellColor>>,
    pub integrity: Option<Labeled<Integrity>>,
    pub cleanliness: Option<Labeled<Cleanliness>>,
    pub weight: Option<WeightCategory>,
    pub freshness: Freshness,
    pub grade: Grade,
    pub confidence: f64,
    pub status: ScanStatus,
    pub listed_price: Option<u64>,
    pub listed_at: Option<DateTime<Utc>>,
    pub sold_at: Option<DateTime<Utc>>,
    pub version: u64,
}

/// Aggregate root: ScanRecord.
///
/// Owned by the producing seller for its whole life. Only the transition
/// methods below change `status`; each bumps `version` by one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanRecord {
    id: ScanId,
    owner_id: UserId,
    captured_at: DateTime<Utc>,
    image_ref: Option<String>,
    color: Option<Labeled<ShellColor>>,
    integrity: Option<Labeled<Integrity>>,
    cleanliness: Option<Labeled<Cleanliness>>,
    weight: Option<WeightCategory>,
    freshness: Freshness,
    grade: Grade,
    confidence: f64,
    status: ScanStatus,
    listed_price: Option<u64>,
    listed_at: Option<DateTime<Utc>>,
    sold_at: Option<DateTime<Utc>>,
    version: u64,
}

impl ScanRecord {
    /// Create a freshly graded record. Always starts `available`.
    pub fn graded(
        id: ScanId,
        owner_id: UserId,
        captured_at: DateTime<Utc>,
        image_ref: Option<String>,
        inputs: &ClassifierInputs,
        classification: &Classification,
    ) -> Self {
        Self {
            id,
            owner_id,
            captured_at,
            image_ref,
            color: inputs.color,
            integrity: inputs.integrity,
            cleanliness: inputs.cleanliness,
            weight: inputs.weight,
            freshness: classification.freshness,
            grade: classification.grade,
            confidence: classification.confidence,
            status: ScanStatus::Available,
            listed_price: None,
            listed_at: None,
            sold_at: None,
            version: 1,
        }
    }

    pub fn restore(parts: ScanParts) -> Self {
        Self {
            id: parts.id,
            owner_id: parts.owner_id,
            captured_at: parts.captured_at,
            image_ref: parts.image_ref,
            color: parts.color,
            integrity: parts.integrity,
            cleanliness: parts.cleanliness,
            weight: parts.weight,
            freshness: parts.freshness,
            grade: parts.grade,
            confidence: parts.confidence,
            status: parts.status,
            listed_price: parts.listed_price,
            listed_at: parts.listed_at,
            sold_at: parts.sold_at,
            version: parts.version,
        }
    }

    pub fn id_typed(&self) -> ScanId {
        self.id
    }

    pub fn owner_id(&self) -> UserId {
        self.owner_id
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn image_ref(&self) -> Option<&str> {
        self.image_ref.as_deref()
    }

    pub fn color(&self) -> Option<Labeled<ShellColor>> {
        self.color
    }

    pub fn integrity(&self) -> Option<Labeled<Integrity>> {
        self.integrity
    }

    pub fn cleanliness(&self) -> Option<Labeled<Cleanliness>> {
        self.cleanliness
    }

    pub fn weight(&self) -> Option<WeightCategory> {
        self.weight
    }

    pub fn freshness(&self) -> Freshness {
        self.freshness
    }

    pub fn grade(&self) -> Grade {
        self.grade
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn status(&self) -> ScanStatus {
        self.status
    }

    pub fn listed_price(&self) -> Option<u64> {
        self.listed_price
    }

    pub fn listed_at(&self) -> Option<DateTime<Utc>> {
        self.listed_at
    }

    pub fn sold_at(&self) -> Option<DateTime<Utc>> {
        self.sold_at
    }

    fn ensure_transition(&self, next: ScanStatus) -> DomainResult<()> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::invalid_transition("scan", self.status, next))
        }
    }

    fn bump(&mut self) {
        self.version += 1;
    }

    /// `available → listed`, stamping the unit price and listing time.
    pub fn mark_listed(&mut self, price: u64, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_transition(ScanStatus::Listed)?;
        if !self.grade.is_sellable() {
            return Err(DomainError::validation(format!(
                "grade {} cannot be listed",
                self.grade
            )));
        }
        if price == 0 {
            return Err(DomainError::validation("price must be positive"));
        }

        self.status = ScanStatus::Listed;
        self.listed_price = Some(price);
        self.listed_at = Some(at);
        self.bump();
        Ok(())
    }

    /// Re-tag a listed unit with a new uniform listing price. Returns whether
    /// anything changed.
    pub fn reprice(&mut self, price: u64) -> DomainResult<bool> {
        if self.status != ScanStatus::Listed {
            return Err(DomainError::invalid_transition("scan", self.status, "repriced"));
        }
        if price == 0 {
            return Err(DomainError::validation("price must be positive"));
        }
        if self.listed_price == Some(price) {
            return Ok(false);
        }

        self.listed_price = Some(price);
        self.bump();
        Ok(true)
    }

    /// `listed | available → sold`.
    pub fn mark_sold(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_transition(ScanStatus::Sold)?;
        self.status = ScanStatus::Sold;
        self.sold_at = Some(at);
        self.bump();
        Ok(())
    }

    /// `any → discarded`.
    pub fn mark_discarded(&mut self) -> DomainResult<()> {
        self.ensure_transition(ScanStatus::Discarded)?;
        self.status = ScanStatus::Discarded;
        self.bump();
        Ok(())
    }
}

impl AggregateRoot for ScanRecord {
    type Id = ScanId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use eggmart_grading::classify;
    use proptest::prelude::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn grade_b_inputs() -> ClassifierInputs {
        ClassifierInputs {
            color: Some(Labeled::new(ShellColor::LightBrown, 90.0)),
            integrity: Some(Labeled::new(Integrity::Intact, 90.0)),
            cleanliness: Some(Labeled::new(Cleanliness::Clean, 90.0)),
            weight: Some(WeightCategory::Large),
            freshness: None,
        }
    }

    fn new_scan(inputs: ClassifierInputs) -> ScanRecord {
        let classification = classify(&inputs);
        ScanRecord::graded(
            ScanId::new(),
            UserId::new(),
            test_time(),
            None,
            &inputs,
            &classification,
        )
    }

    #[test]
    fn creation_starts_available() {
        let scan = new_scan(grade_b_inputs());
        assert_eq!(scan.status(), ScanStatus::Available);
        assert_eq!(scan.grade(), Grade::B);
        assert_eq!(scan.version(), 1);
        assert!(scan.listed_price().is_none());
    }

    #[test]
    fn listed_then_sold() {
        let mut scan = new_scan(grade_b_inputs());
        let at = test_time();
        scan.mark_listed(2200, at).unwrap();
        assert_eq!(scan.status(), ScanStatus::Listed);
        assert_eq!(scan.listed_price(), Some(2200));
        assert_eq!(scan.listed_at(), Some(at));

        scan.mark_sold(at + Duration::minutes(5)).unwrap();
        assert_eq!(scan.status(), ScanStatus::Sold);
        assert_eq!(scan.version(), 3);
    }

    #[test]
    fn available_can_be_sold_directly() {
        let mut scan = new_scan(grade_b_inputs());
        scan.mark_sold(test_time()).unwrap();
        assert_eq!(scan.status(), ScanStatus::Sold);
    }

    #[test]
    fn sold_cannot_be_listed_again() {
        let mut scan = new_scan(grade_b_inputs());
        scan.mark_sold(test_time()).unwrap();

        let err = scan.mark_listed(2200, test_time()).unwrap_err();
        assert_eq!(
            err,
            DomainError::invalid_transition("scan", ScanStatus::Sold, ScanStatus::Listed)
        );
        assert_eq!(scan.status(), ScanStatus::Sold);
    }

    #[test]
    fn sold_can_still_be_discarded() {
        let mut scan = new_scan(grade_b_inputs());
        scan.mark_sold(test_time()).unwrap();
        scan.mark_discarded().unwrap();
        assert_eq!(scan.status(), ScanStatus::Discarded);
        assert!(scan.mark_discarded().is_err());
    }

    #[test]
    fn reject_grade_cannot_be_listed() {
        let mut inputs = grade_b_inputs();
        inputs.integrity = Some(Labeled::new(Integrity::Cracked, 99.0));
        let mut scan = new_scan(inputs);
        assert_eq!(scan.grade(), Grade::Reject);

        let err = scan.mark_listed(1000, test_time()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(scan.status(), ScanStatus::Available);
        assert_eq!(scan.version(), 1);
    }

    #[test]
    fn reprice_only_applies_to_listed_units() {
        let mut scan = new_scan(grade_b_inputs());
        assert!(scan.reprice(2500).is_err());

        scan.mark_listed(2200, test_time()).unwrap();
        assert!(scan.reprice(2500).unwrap());
        assert!(!scan.reprice(2500).unwrap());
        assert_eq!(scan.listed_price(), Some(2500));
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            ScanStatus::Available,
            ScanStatus::Listed,
            ScanStatus::Sold,
            ScanStatus::Discarded,
        ] {
            assert_eq!(status.as_str().parse::<ScanStatus>().unwrap(), status);
        }
        assert!("reserved".parse::<ScanStatus>().is_err());
    }

    fn any_status() -> impl Strategy<Value = ScanStatus> {
        prop::sample::select(vec![
            ScanStatus::Available,
            ScanStatus::Listed,
            ScanStatus::Sold,
            ScanStatus::Discarded,
        ])
    }

    fn rank(s: ScanStatus) -> u8 {
        match s {
            ScanStatus::Available => 0,
            ScanStatus::Listed => 1,
            ScanStatus::Sold => 2,
            ScanStatus::Discarded => 3,
        }
    }

    proptest! {
        #[test]
        fn transitions_never_move_backwards(from in any_status(), to in any_status()) {
            if from.can_transition_to(to) {
                prop_assert!(rank(to) > rank(from));
                prop_assert_ne!(to, ScanStatus::Available);
            }
        }
    }
}
