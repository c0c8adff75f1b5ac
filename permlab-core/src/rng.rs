//! Deterministic per-trial seeding.
//!
//! Trial `i` of a run seeded with `s` uses sub-seed `s + i` (wrapping). The
//! sub-seed depends only on the trial index, never on which worker thread
//! picks the trial up or in what order trials finish, so parallel runs are
//! reproducible regardless of thread count.

use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSequence {
    base: u64,
}

impl SeedSequence {
    pub fn new(base: u64) -> Self {
        Self { base }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    /// Sub-seed for trial `index`.
    pub fn trial_seed(&self, index: u64) -> u64 {
        self.base.wrapping_add(index)
    }

    /// Seeded `StdRng` for trial `index`.
    pub fn rng_for(&self, index: u64) -> StdRng {
        StdRng::seed_from_u64(self.trial_seed(index))
    }
}
