//! Random tower heights for skip list nodes

use rand::Rng;

/// Draws node heights from a geometric distribution capped at `max_level`.
///
/// With the default skip factor of 2 each extra level is a fair coin flip,
/// so the expected height is about 2.
#[derive(Debug, Clone, Copy)]
pub struct LevelGenerator {
    max_level: u8,
    probability: f64,
}

impl LevelGenerator {
    pub const DEFAULT_SKIP_FACTOR: u32 = 2;

    pub fn new(max_level: u8) -> Self {
        Self::with_skip_factor(max_level, Self::DEFAULT_SKIP_FACTOR)
    }

    pub fn with_skip_factor(max_level: u8, skip_factor: u32) -> Self {
        Self {
            max_level: max_level.max(1),
            probability: 1.0 / f64::from(skip_factor.max(2)),
        }
    }

    pub fn max_level(&self) -> u8 {
        self.max_level
    }

    /// Generate a height using the thread-local RNG
    pub fn generate(&self) -> u8 {
        self.generate_with(&mut rand::thread_rng())
    }

    /// Generate a height from a caller-supplied RNG (seeded in tests)
    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> u8 {
        let mut level = 1;
        while level < self.max_level && rng.gen::<f64>() < self.probability {
            level += 1;
        }
        level
    }
}
