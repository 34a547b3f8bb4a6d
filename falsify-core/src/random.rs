//! The random source owned by a falsification run.

use crate::data::Seed;
use rand::Rng;

/// Hands out one independent [`Seed`] per trial.
///
/// A source is owned by a single run and remembers the `u64` it was seeded
/// with; passing that value to [`crate::Config::with_seed`] reproduces the
/// exact sequence of trial seeds.
#[derive(Debug, Clone)]
pub struct RandomSource {
    seed: u64,
    current: Seed,
}

impl RandomSource {
    /// Create a source that starts from a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        RandomSource {
            seed,
            current: Seed::from_u64(seed),
        }
    }

    /// Create a source seeded from the thread-local entropy pool.
    pub fn from_entropy() -> Self {
        Self::seeded(rand::thread_rng().gen())
    }

    /// The value this source was seeded with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Split off the seed for the next trial.
    pub fn next_seed(&mut self) -> Seed {
        let (trial, rest) = self.current.split();
        self.current = rest;
        trial
    }

    /// Restart the stream from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        *self = Self::seeded(seed);
    }
}
