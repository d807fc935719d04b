//! Closed label vocabularies for every graded aspect.
//!
//! Classifier outputs arrive as loosely formatted strings ("Dark Brown",
//! "dark_brown", "DARKBROWN"). Parsing normalizes case and separators and
//! rejects anything outside the vocabulary.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use eggmart_core::DomainError;

fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

macro_rules! label_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $what:literal { $($variant:ident => $s:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $s),+
                }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = normalize(s);
                $(
                    if wanted == normalize($s) {
                        return Ok($name::$variant);
                    }
                )+
                Err(DomainError::validation(format!("unknown {}: {s:?}", $what)))
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

label_enum!(
    /// Shell colour, used as a proxy for shell thickness.
    ShellColor, "shell color" {
        DarkBrown => "dark_brown",
        Brown => "brown",
        LightBrown => "light_brown",
    }
);

label_enum!(
    Integrity, "integrity" {
        Cracked => "cracked",
        Intact => "intact",
    }
);

label_enum!(
    Cleanliness, "cleanliness" {
        Stained => "stained",
        Clean => "clean",
    }
);

label_enum!(
    /// Weight band of a single egg.
    WeightCategory, "weight category" {
        Small => "small",
        Medium => "medium",
        Large => "large",
    }
);

label_enum!(
    Freshness, "freshness" {
        Fresh => "fresh",
        Spoiled => "spoiled",
    }
);

label_enum!(
    /// Quality tier assigned by the grading table.
    Grade, "grade" {
        A => "A",
        B => "B",
        C => "C",
        Reject => "reject",
    }
);

impl Grade {
    /// Only A/B/C may be offered for sale.
    pub fn is_sellable(&self) -> bool {
        !matches!(self, Grade::Reject)
    }
}

impl WeightCategory {
    /// Upper bound (exclusive) of the small band, in grams.
    pub const SMALL_BELOW_GRAMS: f64 = 50.0;
    /// Upper bound (exclusive) of the medium band, in grams.
    pub const MEDIUM_BELOW_GRAMS: f64 = 60.0;

    /// Categorize a load-cell reading. Non-finite or non-positive readings are
    /// treated as no reading at all.
    pub fn from_grams(grams: f64) -> Option<Self> {
        if !grams.is_finite() || grams <= 0.0 {
            return None;
        }
        Some(if grams < Self::SMALL_BELOW_GRAMS {
            WeightCategory::Small
        } else if grams < Self::MEDIUM_BELOW_GRAMS {
            WeightCategory::Medium
        } else {
            WeightCategory::Large
        })
    }
}

/// A label together with the classifier confidence in `[0, 100]`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Labeled<T> {
    pub label: T,
    pub confidence: f64,
}

impl<T> Labeled<T> {
    pub fn new(label: T, confidence: f64) -> Self {
        Self { label, confidence }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_loose_spellings() {
        assert_eq!("Dark Brown".parse::<ShellColor>().unwrap(), ShellColor::DarkBrown);
        assert_eq!("LIGHT_BROWN".parse::<ShellColor>().unwrap(), ShellColor::LightBrown);
        assert_eq!("light-brown".parse::<ShellColor>().unwrap(), ShellColor::LightBrown);
        assert_eq!("Intact".parse::<Integrity>().unwrap(), Integrity::Intact);
        assert_eq!("b".parse::<Grade>().unwrap(), Grade::B);
        assert_eq!("Reject".parse::<Grade>().unwrap(), Grade::Reject);
    }

    #[test]
    fn unknown_labels_are_validation_errors() {
        let err = "purple".parse::<ShellColor>().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!("D".parse::<Grade>().is_err());
    }

    #[test]
    fn weight_bands() {
        assert_eq!(WeightCategory::from_grams(49.9), Some(WeightCategory::Small));
        assert_eq!(WeightCategory::from_grams(50.0), Some(WeightCategory::Medium));
        assert_eq!(WeightCategory::from_grams(59.99), Some(WeightCategory::Medium));
        assert_eq!(WeightCategory::from_grams(60.0), Some(WeightCategory::Large));
        assert_eq!(WeightCategory::from_grams(0.0), None);
        assert_eq!(WeightCategory::from_grams(f64::NAN), None);
    }

    #[test]
    fn reject_is_not_sellable() {
        assert!(Grade::A.is_sellable());
        assert!(!Grade::Reject.is_sellable());
    }
}
