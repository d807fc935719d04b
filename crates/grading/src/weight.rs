//! Weight category source when no load cell reading is available.

use std::sync::Mutex;

use rand::SeedableRng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;

use crate::labels::WeightCategory;

/// Relative frequency of (Small, Medium, Large) on the simulated line.
const DISTRIBUTION: [u32; 3] = [20, 50, 30];

/// Simulated weight distribution: Small 20 %, Medium 50 %, Large 30 %.
///
/// Seeded so that a given seed yields a reproducible sequence.
#[derive(Debug)]
pub struct WeightSimulator {
    rng: Mutex<StdRng>,
    index: WeightedIndex<u32>,
}

impl WeightSimulator {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            // Constant, non-empty, all-positive weights.
            index: WeightedIndex::new(DISTRIBUTION).unwrap_or_else(|_| unreachable!()),
        }
    }

    pub fn from_entropy() -> Self {
        Self::seeded(rand::random())
    }

    pub fn sample(&self) -> WeightCategory {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match self.index.sample(&mut *rng) {
            0 => WeightCategory::Small,
            1 => WeightCategory::Medium,
            _ => WeightCategory::Large,
        }
    }

    /// Prefer a real reading; fall back to the simulated distribution.
    pub fn resolve(&self, grams: Option<f64>) -> WeightCategory {
        grams
            .and_then(WeightCategory::from_grams)
            .unwrap_or_else(|| self.sample())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let a = WeightSimulator::seeded(7);
        let b = WeightSimulator::seeded(7);
        let xs: Vec<_> = (0..32).map(|_| a.sample()).collect();
        let ys: Vec<_> = (0..32).map(|_| b.sample()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn distribution_roughly_matches() {
        let sim = WeightSimulator::seeded(42);
        let mut counts = [0u32; 3];
        for _ in 0..10_000 {
            match sim.sample() {
                WeightCategory::Small => counts[0] += 1,
                WeightCategory::Medium => counts[1] += 1,
                WeightCategory::Large => counts[2] += 1,
            }
        }
        assert!((1_700..2_300).contains(&counts[0]), "{counts:?}");
        assert!((4_600..5_400).contains(&counts[1]), "{counts:?}");
        assert!((2_600..3_400).contains(&counts[2]), "{counts:?}");
    }

    #[test]
    fn real_reading_wins() {
        let sim = WeightSimulator::seeded(1);
        assert_eq!(sim.resolve(Some(45.0)), WeightCategory::Small);
        assert_eq!(sim.resolve(Some(65.0)), WeightCategory::Large);
    }
}
