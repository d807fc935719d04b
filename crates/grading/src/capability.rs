//! Classification capability boundary.
//!
//! Models are loaded once by the host process and injected as an
//! `AspectClassifier`; this crate never owns model state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::{Classification, ClassifierInputs, classify};
use crate::labels::{Freshness, Labeled, WeightCategory};

/// Independently classified visual aspects of an egg.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aspect {
    Color,
    Integrity,
    Cleanliness,
}

impl core::fmt::Display for Aspect {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Aspect::Color => "color",
            Aspect::Integrity => "integrity",
            Aspect::Cleanliness => "cleanliness",
        })
    }
}

/// Raw classifier output before it is checked against the label vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLabel {
    pub label: String,
    pub confidence: f64,
}

impl RawLabel {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    /// Parse into a typed label. Out-of-vocabulary labels yield `None` so the
    /// decision table fails closed.
    pub fn typed<T: core::str::FromStr>(&self) -> Option<Labeled<T>> {
        self.label
            .parse::<T>()
            .ok()
            .map(|label| Labeled::new(label, self.confidence))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("classifier model unavailable: {0}")]
    Unavailable(String),

    #[error("inference failed for {aspect}: {reason}")]
    Inference { aspect: Aspect, reason: String },
}

/// `classify(imageRef, aspect) -> (label, confidence in [0, 100])`.
pub trait AspectClassifier: Send + Sync {
    fn classify(&self, image_ref: &str, aspect: Aspect) -> Result<RawLabel, ClassifierError>;
}

impl<C> AspectClassifier for std::sync::Arc<C>
where
    C: AspectClassifier + ?Sized,
{
    fn classify(&self, image_ref: &str, aspect: Aspect) -> Result<RawLabel, ClassifierError> {
        (**self).classify(image_ref, aspect)
    }
}

impl ClassifierInputs {
    /// Build inputs from raw classifier outputs. Failed or unparseable aspects
    /// become missing inputs.
    pub fn from_raw(
        color: Option<&RawLabel>,
        integrity: Option<&RawLabel>,
        cleanliness: Option<&RawLabel>,
        weight: Option<WeightCategory>,
        freshness: Option<Freshness>,
    ) -> Self {
        Self {
            color: color.and_then(RawLabel::typed),
            integrity: integrity.and_then(RawLabel::typed),
            cleanliness: cleanliness.and_then(RawLabel::typed),
            weight,
            freshness,
        }
    }
}

/// Run every aspect classifier against one image and grade the result.
///
/// Classifier errors never escape: an aspect that fails is simply missing,
/// which grades as `Reject`.
pub fn classify_image(
    classifier: &dyn AspectClassifier,
    image_ref: &str,
    weight: Option<WeightCategory>,
    freshness: Option<Freshness>,
) -> (ClassifierInputs, Classification) {
    let run = |aspect| classifier.classify(image_ref, aspect).ok();
    let color = run(Aspect::Color);
    let integrity = run(Aspect::Integrity);
    let cleanliness = run(Aspect::Cleanliness);

    let inputs = ClassifierInputs::from_raw(
        color.as_ref(),
        integrity.as_ref(),
        cleanliness.as_ref(),
        weight,
        freshness,
    );
    let classification = classify(&inputs);
    (inputs, classification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::{Grade, ShellColor};

    struct FixedClassifier {
        color: Result<RawLabel, ClassifierError>,
        integrity: Result<RawLabel, ClassifierError>,
        cleanliness: Result<RawLabel, ClassifierError>,
    }

    impl AspectClassifier for FixedClassifier {
        fn classify(&self, _image_ref: &str, aspect: Aspect) -> Result<RawLabel, ClassifierError> {
            match aspect {
                Aspect::Color => self.color.clone(),
                Aspect::Integrity => self.integrity.clone(),
                Aspect::Cleanliness => self.cleanliness.clone(),
            }
        }
    }

    #[test]
    fn grades_from_image_outputs() {
        let classifier = FixedClassifier {
            color: Ok(RawLabel::new("Dark Brown", 92.0)),
            integrity: Ok(RawLabel::new("Intact", 96.0)),
            cleanliness: Ok(RawLabel::new("Clean", 88.0)),
        };
        let (inputs, result) =
            classify_image(&classifier, "uploads/egg-1.jpg", Some(WeightCategory::Large), None);
        assert_eq!(inputs.color.map(|c| c.label), Some(ShellColor::DarkBrown));
        assert_eq!(result.grade, Grade::A);
        assert!((result.confidence - 92.0).abs() < 1e-9);
    }

    #[test]
    fn failed_aspect_fails_closed() {
        let classifier = FixedClassifier {
            color: Ok(RawLabel::new("Brown", 90.0)),
            integrity: Err(ClassifierError::Inference {
                aspect: Aspect::Integrity,
                reason: "tensor shape".to_string(),
            }),
            cleanliness: Ok(RawLabel::new("Clean", 90.0)),
        };
        let (inputs, result) =
            classify_image(&classifier, "uploads/egg-2.jpg", Some(WeightCategory::Medium), None);
        assert!(inputs.integrity.is_none());
        assert_eq!(result.grade, Grade::Reject);
    }

    #[test]
    fn unknown_label_fails_closed() {
        let classifier = FixedClassifier {
            color: Ok(RawLabel::new("Speckled", 70.0)),
            integrity: Ok(RawLabel::new("Intact", 90.0)),
            cleanliness: Ok(RawLabel::new("Clean", 90.0)),
        };
        let (_, result) =
            classify_image(&classifier, "uploads/egg-3.jpg", Some(WeightCategory::Medium), None);
        assert_eq!(result.grade, Grade::Reject);
        assert_eq!(result.confidence, 0.0);
    }
}
