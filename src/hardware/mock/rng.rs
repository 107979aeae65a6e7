//! Seeded RNG wrapper for reproducible behavior.
//!
//! Provides a seeded random number generator for the simulated sensor so that
//! tests can rely on deterministic noise.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seeded RNG wrapper for reproducible random behavior
pub struct MockRng {
    inner: ChaCha8Rng,
}

impl MockRng {
    /// Create a new RNG with optional seed.
    /// If seed is None, uses a random seed from the OS.
    pub fn new(seed: Option<u64>) -> Self {
        let inner = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        Self { inner }
    }

    /// Generate a random f64 value in the range [0.0, 1.0)
    pub fn next_f64(&mut self) -> f64 {
        self.inner.gen()
    }

    /// Draw from the standard normal distribution (Box-Muller).
    pub fn standard_normal(&mut self) -> f64 {
        // u1 in (0, 1] keeps ln() finite
        let u1 = 1.0 - self.next_f64();
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    /// Draw from N(mean, sigma^2).
    pub fn normal(&mut self, mean: f64, sigma: f64) -> f64 {
        mean + sigma * self.standard_normal()
    }
}

impl std::fmt::Debug for MockRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRng")
            .field("inner", &"<ChaCha8Rng>")
            .finish()
    }
}
