//! Deterministic seeding for weight initialization and synthetic inputs.

use burn::prelude::Backend;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A seed for deterministic random number generation.
///
/// The same seed gives the same initial network weights (through
/// [`Seed::seed_backend`]) and the same host-side random stream (through
/// [`Seed::to_rng`]).
///
/// # Example
///
/// ```rust
/// use dfd_core::Seed;
/// use rand::Rng;
///
/// let mut a = Seed::new(42).to_rng();
/// let mut b = Seed::new(42).to_rng();
/// assert_eq!(a.gen::<f32>(), b.gen::<f32>());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Seed(u64);

impl Seed {
    /// Create a new seed with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the underlying seed value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Create a ChaCha8 generator from this seed.
    #[must_use]
    pub fn to_rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.0)
    }

    /// Seed the backend's global generator, which burn uses for parameter
    /// initialization.
    pub fn seed_backend<B: Backend>(&self) {
        B::seed(self.0);
    }
}

impl From<u64> for Seed {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}
