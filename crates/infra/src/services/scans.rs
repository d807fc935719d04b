use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use eggmart_core::{AggregateRoot, DomainError, ScanId, UserId};
use eggmart_grading::{
    AspectClassifier, ClassifierInputs, Freshness, RawLabel, WeightCategory, WeightSimulator,
    classify, classify_image,
};
use eggmart_scans::{ScanRecord, ScanStatus};

use crate::clock::Clock;
use crate::store::{GradeCount, MarketStore};

use super::{ServiceError, ServiceResult, resync_listing_stock, save_scan};

/// Raw classifier outputs plus weight evidence for one egg.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanInput {
    pub color: Option<RawLabel>,
    pub integrity: Option<RawLabel>,
    pub cleanliness: Option<RawLabel>,
    /// A category from an upstream sensor wins over a gram reading.
    pub weight_category: Option<WeightCategory>,
    pub weight_grams: Option<f64>,
    pub freshness: Option<Freshness>,
    pub image_ref: Option<String>,
}

/// Creates graded scan records and owns their out-of-band transitions.
#[derive(Clone)]
pub struct ScanLifecycle {
    store: Arc<dyn MarketStore>,
    clock: Arc<dyn Clock>,
    weights: Arc<WeightSimulator>,
    classifier: Option<Arc<dyn AspectClassifier>>,
}

impl ScanLifecycle {
    pub fn new(store: Arc<dyn MarketStore>, clock: Arc<dyn Clock>, weights: Arc<WeightSimulator>) -> Self {
        Self {
            store,
            clock,
            weights,
            classifier: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn AspectClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    fn resolve_weight(&self, category: Option<WeightCategory>, grams: Option<f64>) -> WeightCategory {
        category.unwrap_or_else(|| self.weights.resolve(grams))
    }

    /// Grade one egg from classifier outputs and store it as `available`.
    #[instrument(skip(self, input), fields(owner_id = %owner_id), err)]
    pub async fn create_scan(&self, owner_id: UserId, input: ScanInput) -> ServiceResult<ScanRecord> {
        let weight = self.resolve_weight(input.weight_category, input.weight_grams);
        let inputs = ClassifierInputs::from_raw(
            input.color.as_ref(),
            input.integrity.as_ref(),
            input.cleanliness.as_ref(),
            Some(weight),
            input.freshness,
        );
        let classification = classify(&inputs);
        self.store_scan(owner_id, input.image_ref, &inputs, &classification).await
    }

    /// Run the injected aspect classifiers against an image and store the result.
    #[instrument(skip(self), fields(owner_id = %owner_id), err)]
    pub async fn scan_image(
        &self,
        owner_id: UserId,
        image_ref: &str,
        weight_grams: Option<f64>,
        freshness: Option<Freshness>,
    ) -> ServiceResult<ScanRecord> {
        let classifier = self
            .classifier
            .as_ref()
            .ok_or(ServiceError::NotConfigured("aspect classifier"))?;
        if image_ref.trim().is_empty() {
            return Err(DomainError::validation("image reference is empty").into());
        }

        let weight = self.weights.resolve(weight_grams);
        let classifier = Arc::clone(classifier);
        let image = image_ref.to_string();
        let graded = tokio::task::spawn_blocking(move || {
            classify_image(classifier.as_ref(), &image, Some(weight), freshness)
        })
        .await;
        let (inputs, classification) = match graded {
            Ok(graded) => graded,
            Err(err) => {
                // A classifier that panics counts as failing every aspect.
                warn!(error = %err, "aspect classification aborted");
                let inputs = ClassifierInputs::from_raw(None, None, None, Some(weight), freshness);
                let classification = classify(&inputs);
                (inputs, classification)
            }
        };
        self.store_scan(owner_id, Some(image_ref.to_string()), &inputs, &classification)
            .await
    }

    async fn store_scan(
        &self,
        owner_id: UserId,
        image_ref: Option<String>,
        inputs: &ClassifierInputs,
        classification: &eggmart_grading::Classification,
    ) -> ServiceResult<ScanRecord> {
        let scan = ScanRecord::graded(
            ScanId::new(),
            owner_id,
            self.clock.now(),
            image_ref,
            inputs,
            classification,
        );

        let mut tx = self.store.begin().await?;
        tx.insert_scan(&scan).await?;
        tx.commit().await?;

        info!(
            scan_id = %scan.id_typed(),
            grade = %scan.grade(),
            confidence = scan.confidence(),
            "scan graded"
        );
        Ok(scan)
    }

    /// Take a scan out of circulation. A listed scan leaves its listing's stock.
    #[instrument(skip(self), fields(owner_id = %owner_id, scan_id = %scan_id), err)]
    pub async fn discard(&self, owner_id: UserId, scan_id: ScanId) -> ServiceResult<ScanRecord> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let mut scan = tx
            .get_scan(scan_id)
            .await?
            .filter(|s| s.owner_id() == owner_id)
            .ok_or_else(|| DomainError::not_found(format!("scan {scan_id}")))?;

        let was_listed = scan.status() == ScanStatus::Listed;
        let previous = scan.version();
        scan.mark_discarded()?;
        save_scan(tx.as_mut(), &scan, previous).await?;

        if was_listed {
            let listing = resync_listing_stock(tx.as_mut(), owner_id, scan.grade(), now).await?;
            if listing.is_none() {
                warn!(grade = %scan.grade(), "discarded a listed scan with no listing row");
            }
        }

        tx.commit().await?;
        info!(status = %scan.status(), "scan discarded");
        Ok(scan)
    }

    pub async fn get(&self, owner_id: UserId, scan_id: ScanId) -> ServiceResult<ScanRecord> {
        let mut tx = self.store.begin().await?;
        tx.get_scan(scan_id)
            .await?
            .filter(|s| s.owner_id() == owner_id)
            .ok_or_else(|| DomainError::not_found(format!("scan {scan_id}")).into())
    }

    /// Newest first.
    pub async fn history(&self, owner_id: UserId, limit: u32) -> ServiceResult<Vec<ScanRecord>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.scans_for_owner(owner_id, limit).await?)
    }

    /// Scans per grade across every status.
    pub async fn grade_summary(&self, owner_id: UserId) -> ServiceResult<Vec<GradeCount>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.count_by_grade(owner_id, None).await?)
    }
}
