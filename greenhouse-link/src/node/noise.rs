//! Seedable noise source for simulated sensors
//!
//! Provides bounded uniform steps and Gaussian jitter with deterministic
//! seeding support.

use rand::prelude::*;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, StandardNormal, Uniform};

/// Noise generator with configurable seed for reproducibility
#[derive(Clone)]
pub struct NoiseGenerator {
    rng: SmallRng,
}

impl NoiseGenerator {
    /// Create a new noise generator
    ///
    /// If seed is 0, uses random entropy for non-deterministic behavior.
    /// Otherwise, uses the provided seed for reproducible results.
    pub fn new(seed: u64) -> Self {
        let rng = if seed == 0 {
            SmallRng::from_entropy()
        } else {
            SmallRng::seed_from_u64(seed)
        };
        Self { rng }
    }

    /// Generator for one node, derived from a shared seed
    ///
    /// Keeps node streams independent while staying reproducible; a zero
    /// base seed still means entropy.
    pub fn for_node(base_seed: u64, node_id: u32) -> Self {
        if base_seed == 0 {
            Self::new(0)
        } else {
            Self::new(base_seed.wrapping_mul(31).wrapping_add(node_id as u64))
        }
    }

    /// Gaussian noise with given standard deviation
    #[inline]
    pub fn gaussian(&mut self, stddev: f64) -> f64 {
        if stddev == 0.0 {
            return 0.0;
        }
        let n: f64 = self.rng.sample(StandardNormal);
        n * stddev
    }

    /// Uniform step in `[-max_step, max_step]`
    #[inline]
    pub fn step(&mut self, max_step: f64) -> f64 {
        if max_step <= 0.0 {
            return 0.0;
        }
        Uniform::new_inclusive(-max_step, max_step).sample(&mut self.rng)
    }
}
