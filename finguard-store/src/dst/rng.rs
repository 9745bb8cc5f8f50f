//! DeterministicRng - Seeded randomness
//!
//! TigerStyle: Same seed, same sequence, on every platform.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A seeded RNG for simulation decisions.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    seed: u64,
    rng: ChaCha8Rng,
}

impl DeterministicRng {
    /// Create from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Seed this RNG was created with.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Return true with the given probability.
    ///
    /// # Panics
    /// Panics if probability is outside `[0.0, 1.0]`.
    pub fn next_bool(&mut self, probability: f64) -> bool {
        assert!(
            (0.0..=1.0).contains(&probability),
            "probability {probability} must be within [0, 1]"
        );

        if probability >= 1.0 {
            return true;
        }
        if probability <= 0.0 {
            return false;
        }
        self.rng.gen_bool(probability)
    }

    /// Uniform integer in `[0, upper)`.
    ///
    /// # Panics
    /// Panics if upper is zero.
    pub fn next_below(&mut self, upper: u64) -> u64 {
        assert!(upper > 0, "upper bound must be positive");
        self.rng.gen_range(0..upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = DeterministicRng::new(42);
        let mut b = DeterministicRng::new(42);
        let xs: Vec<u64> = (0..16).map(|_| a.next_below(1_000)).collect();
        let ys: Vec<u64> = (0..16).map(|_| b.next_below(1_000)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_probability_edges() {
        let mut rng = DeterministicRng::new(7);
        assert!((0..100).all(|_| rng.next_bool(1.0)));
        assert!((0..100).all(|_| !rng.next_bool(0.0)));
    }

    #[test]
    #[should_panic(expected = "probability")]
    fn test_probability_out_of_range() {
        DeterministicRng::new(1).next_bool(1.5);
    }
}
