//! Egg grading (pure).
//!
//! Fuses independent per-aspect classifier outputs into a grade. Model
//! inference is an injected capability; nothing here performs IO.

pub mod capability;
pub mod classifier;
pub mod labels;
pub mod weight;

pub use capability::{Aspect, AspectClassifier, ClassifierError, RawLabel, classify_image};
pub use classifier::{Classification, ClassifierInputs, classify, derive_freshness};
pub use labels::{Cleanliness, Freshness, Grade, Integrity, Labeled, ShellColor, WeightCategory};
pub use weight::WeightSimulator;
