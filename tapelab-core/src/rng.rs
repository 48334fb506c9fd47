//! Deterministic RNG seeding.
//!
//! The configured master seed is expanded into per-component sub-seeds via
//! BLAKE3, so adding a randomized component never perturbs the streams of
//! existing ones. Each component owns its generator; nothing else may touch
//! its state (reproducibility depends on call order within a component
//! only).

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone)]
pub struct SeedSource {
    master_seed: u64,
}

impl SeedSource {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Deterministic sub-seed for a named component.
    pub fn sub_seed(&self, component: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(component.as_bytes());
        let hash = hasher.finalize();
        u64::from_le_bytes(hash.as_bytes()[..8].try_into().expect("8 bytes"))
    }

    /// Seeded generator for a named component.
    pub fn rng_for(&self, component: &str) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.sub_seed(component))
    }
}
