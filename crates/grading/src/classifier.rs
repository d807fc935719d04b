//! Grade decision table.
//!
//! Evaluated in order, first match wins:
//!
//! 1. any required aspect missing → `Reject`
//! 2. freshness is derived (no dedicated sensor → always `Fresh`)
//! 3. `Cracked` or `Spoiled` → `Reject`
//! 4. `A`: Medium/Large, DarkBrown/Brown, Clean
//! 5. `B`: Small + DarkBrown/Brown + Clean, Medium/Large + LightBrown + Clean,
//!    or Medium/Large + DarkBrown/Brown + Stained
//! 6. `C`: every other intact, fresh combination
//!
//! A `Reject` always carries confidence 0. Otherwise the confidence is the mean
//! of the classifier confidences that are strictly positive.

use serde::{Deserialize, Serialize};

use crate::labels::{Cleanliness, Freshness, Grade, Integrity, Labeled, ShellColor, WeightCategory};

/// Everything the decision table consumes. `None` means the aspect could not
/// be determined (inference failure or an out-of-vocabulary label).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifierInputs {
    pub color: Option<Labeled<ShellColor>>,
    pub integrity: Option<Labeled<Integrity>>,
    pub cleanliness: Option<Labeled<Cleanliness>>,
    pub weight: Option<WeightCategory>,
    /// Dedicated freshness sensor reading, when one is fitted.
    #[serde(default)]
    pub freshness: Option<Freshness>,
}

/// Result of grading one egg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub grade: Grade,
    pub confidence: f64,
    pub freshness: Freshness,
}

/// Freshness with no sensor fitted is assumed `Fresh`. This is a documented
/// simplification of the grading line, not a bug.
pub fn derive_freshness(reading: Option<Freshness>) -> Freshness {
    reading.unwrap_or(Freshness::Fresh)
}

pub fn classify(inputs: &ClassifierInputs) -> Classification {
    let freshness = derive_freshness(inputs.freshness);
    let reject = Classification {
        grade: Grade::Reject,
        confidence: 0.0,
        freshness,
    };

    let (Some(color), Some(integrity), Some(cleanliness), Some(weight)) = (
        inputs.color,
        inputs.integrity,
        inputs.cleanliness,
        inputs.weight,
    ) else {
        return reject;
    };

    if integrity.label == Integrity::Cracked || freshness == Freshness::Spoiled {
        return reject;
    }

    let grade = grade_intact_fresh(color.label, cleanliness.label, weight);
    let confidence =
        aggregate_confidence(&[color.confidence, integrity.confidence, cleanliness.confidence]);

    Classification {
        grade,
        confidence,
        freshness,
    }
}

fn grade_intact_fresh(color: ShellColor, cleanliness: Cleanliness, weight: WeightCategory) -> Grade {
    let heavy = matches!(weight, WeightCategory::Medium | WeightCategory::Large);
    let thick = matches!(color, ShellColor::DarkBrown | ShellColor::Brown);
    let clean = cleanliness == Cleanliness::Clean;

    match (heavy, thick, clean) {
        (true, true, true) => Grade::A,
        (false, true, true) | (true, false, true) | (true, true, false) => Grade::B,
        _ => Grade::C,
    }
}

/// Mean of the strictly positive confidences, each clamped to `[0, 100]`.
/// NaN counts as zero.
fn aggregate_confidence(confidences: &[f64]) -> f64 {
    let positive: Vec<f64> = confidences
        .iter()
        .copied()
        .filter(|c| *c > 0.0)
        .map(|c| c.min(100.0))
        .collect();

    if positive.is_empty() {
        0.0
    } else {
        positive.iter().sum::<f64>() / positive.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn inputs(
        color: ShellColor,
        integrity: Integrity,
        cleanliness: Cleanliness,
        weight: WeightCategory,
    ) -> ClassifierInputs {
        ClassifierInputs {
            color: Some(Labeled::new(color, 90.0)),
            integrity: Some(Labeled::new(integrity, 90.0)),
            cleanliness: Some(Labeled::new(cleanliness, 90.0)),
            weight: Some(weight),
            freshness: None,
        }
    }

    #[test]
    fn cracked_egg_is_rejected_with_zero_confidence() {
        let result = classify(&ClassifierInputs {
            color: Some(Labeled::new(ShellColor::DarkBrown, 90.0)),
            integrity: Some(Labeled::new(Integrity::Cracked, 95.0)),
            cleanliness: Some(Labeled::new(Cleanliness::Clean, 88.0)),
            weight: Some(WeightCategory::Large),
            freshness: None,
        });
        assert_eq!(result.grade, Grade::Reject);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn missing_aspect_is_rejected() {
        let mut input = inputs(
            ShellColor::Brown,
            Integrity::Intact,
            Cleanliness::Clean,
            WeightCategory::Large,
        );
        input.cleanliness = None;
        let result = classify(&input);
        assert_eq!(result.grade, Grade::Reject);
        assert_eq!(result.confidence, 0.0);

        let mut input = inputs(
            ShellColor::Brown,
            Integrity::Intact,
            Cleanliness::Clean,
            WeightCategory::Large,
        );
        input.weight = None;
        assert_eq!(classify(&input).grade, Grade::Reject);
    }

    #[test]
    fn spoiled_reading_is_rejected() {
        let mut input = inputs(
            ShellColor::DarkBrown,
            Integrity::Intact,
            Cleanliness::Clean,
            WeightCategory::Large,
        );
        input.freshness = Some(Freshness::Spoiled);
        let result = classify(&input);
        assert_eq!(result.grade, Grade::Reject);
        assert_eq!(result.freshness, Freshness::Spoiled);
    }

    #[test]
    fn freshness_defaults_to_fresh_without_sensor() {
        assert_eq!(derive_freshness(None), Freshness::Fresh);
        let result = classify(&inputs(
            ShellColor::Brown,
            Integrity::Intact,
            Cleanliness::Clean,
            WeightCategory::Medium,
        ));
        assert_eq!(result.freshness, Freshness::Fresh);
    }

    #[test]
    fn full_decision_table_for_intact_fresh_eggs() {
        use Cleanliness::*;
        use ShellColor::*;
        use WeightCategory::*;

        let expected = [
            // grade A
            (Medium, DarkBrown, Clean, Grade::A),
            (Medium, Brown, Clean, Grade::A),
            (Large, DarkBrown, Clean, Grade::A),
            (Large, Brown, Clean, Grade::A),
            // grade B
            (Small, DarkBrown, Clean, Grade::B),
            (Small, Brown, Clean, Grade::B),
            (Medium, LightBrown, Clean, Grade::B),
            (Large, LightBrown, Clean, Grade::B),
            (Medium, DarkBrown, Stained, Grade::B),
            (Medium, Brown, Stained, Grade::B),
            (Large, DarkBrown, Stained, Grade::B),
            (Large, Brown, Stained, Grade::B),
            // grade C
            (Small, LightBrown, Clean, Grade::C),
            (Small, DarkBrown, Stained, Grade::C),
            (Small, Brown, Stained, Grade::C),
            (Medium, LightBrown, Stained, Grade::C),
            (Large, LightBrown, Stained, Grade::C),
            (Small, LightBrown, Stained, Grade::C),
        ];

        assert_eq!(expected.len(), 18, "every weight × colour × cleanliness combination");
        for (weight, color, cleanliness, grade) in expected {
            let result = classify(&inputs(color, Integrity::Intact, cleanliness, weight));
            assert_eq!(result.grade, grade, "{weight} {color} {cleanliness}");
        }
    }

    #[test]
    fn confidence_is_mean_of_positive_scores() {
        let result = classify(&ClassifierInputs {
            color: Some(Labeled::new(ShellColor::Brown, 90.0)),
            integrity: Some(Labeled::new(Integrity::Intact, 0.0)),
            cleanliness: Some(Labeled::new(Cleanliness::Clean, 80.0)),
            weight: Some(WeightCategory::Large),
            freshness: None,
        });
        assert_eq!(result.grade, Grade::A);
        assert!((result.confidence - 85.0).abs() < 1e-9);
    }

    #[test]
    fn confidence_is_zero_when_every_score_is_zero() {
        let result = classify(&ClassifierInputs {
            color: Some(Labeled::new(ShellColor::Brown, 0.0)),
            integrity: Some(Labeled::new(Integrity::Intact, 0.0)),
            cleanliness: Some(Labeled::new(Cleanliness::Clean, f64::NAN)),
            weight: Some(WeightCategory::Large),
            freshness: None,
        });
        assert_eq!(result.grade, Grade::A);
        assert_eq!(result.confidence, 0.0);
    }

    fn any_color() -> impl Strategy<Value = ShellColor> {
        prop::sample::select(ShellColor::ALL.to_vec())
    }

    fn any_cleanliness() -> impl Strategy<Value = Cleanliness> {
        prop::sample::select(Cleanliness::ALL.to_vec())
    }

    fn any_weight() -> impl Strategy<Value = Option<WeightCategory>> {
        prop::option::of(prop::sample::select(WeightCategory::ALL.to_vec()))
    }

    proptest! {
        #[test]
        fn cracked_always_rejects(
            color in any_color(),
            cleanliness in any_cleanliness(),
            weight in any_weight(),
            c1 in 0.0f64..=100.0,
            c2 in 0.0f64..=100.0,
            c3 in 0.0f64..=100.0,
        ) {
            let result = classify(&ClassifierInputs {
                color: Some(Labeled::new(color, c1)),
                integrity: Some(Labeled::new(Integrity::Cracked, c2)),
                cleanliness: Some(Labeled::new(cleanliness, c3)),
                weight,
                freshness: None,
            });
            prop_assert_eq!(result.grade, Grade::Reject);
            prop_assert_eq!(result.confidence, 0.0);
        }

        #[test]
        fn classification_is_deterministic(
            color in any_color(),
            cleanliness in any_cleanliness(),
            weight in any_weight(),
            c1 in 0.0f64..=100.0,
            c2 in 0.0f64..=100.0,
            c3 in 0.0f64..=100.0,
        ) {
            let input = ClassifierInputs {
                color: Some(Labeled::new(color, c1)),
                integrity: Some(Labeled::new(Integrity::Intact, c2)),
                cleanliness: Some(Labeled::new(cleanliness, c3)),
                weight,
                freshness: None,
            };
            prop_assert_eq!(classify(&input), classify(&input));
        }

        #[test]
        fn confidence_stays_in_range(
            c1 in -50.0f64..=150.0,
            c2 in -50.0f64..=150.0,
            c3 in -50.0f64..=150.0,
        ) {
            let result = classify(&ClassifierInputs {
                color: Some(Labeled::new(ShellColor::Brown, c1)),
                integrity: Some(Labeled::new(Integrity::Intact, c2)),
                cleanliness: Some(Labeled::new(Cleanliness::Clean, c3)),
                weight: Some(WeightCategory::Medium),
                freshness: None,
            });
            prop_assert!((0.0..=100.0).contains(&result.confidence));
        }
    }
}
