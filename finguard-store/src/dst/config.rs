//! SimConfig - Simulation parameters
//!
//! TigerStyle: Seeds are explicit and logged so every run can be replayed.

use crate::constants::DST_SEED_ENV;

/// Simulation configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimConfig {
    /// RNG seed
    pub seed: u64,
}

impl SimConfig {
    /// Use an explicit seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    /// Use `DST_SEED` if set, otherwise a random seed. The seed is logged.
    #[must_use]
    pub fn from_env_or_random() -> Self {
        let seed = std::env::var(DST_SEED_ENV)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or_else(rand::random);

        tracing::info!(seed, "DST seed (replay with {}={})", DST_SEED_ENV, seed);
        Self { seed }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::with_seed(0)
    }
}
