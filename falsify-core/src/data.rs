//! Core data types: size, seeds and run configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Size parameter for controlling test data generation.
///
/// Size ramps from 0 up to [`Config::size_limit`] over a run, so early trials
/// draw small values and later trials draw larger ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Size(pub usize);

impl Size {
    /// Create a new size value.
    pub fn new(value: usize) -> Self {
        Size(value)
    }

    /// Get the inner size value.
    pub fn get(&self) -> usize {
        self.0
    }

    /// Size for step `step` of a run of `limit` steps, growing from 0 toward
    /// `max` and wrapping around after `limit` steps.
    pub fn ramp(step: usize, limit: usize, max: usize) -> Self {
        if limit == 0 {
            return Size(0);
        }
        Size(((step % limit) * max) / limit)
    }
}

impl From<usize> for Size {
    fn from(value: usize) -> Self {
        Size(value)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Size({})", self.0)
    }
}

/// Splittable random seed for deterministic generation.
///
/// The same seed always yields the same stream, which is what makes stored
/// failures replayable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Seed(pub u64, pub u64);

impl Seed {
    /// Create a new seed from a single value.
    pub fn from_u64(value: u64) -> Self {
        let state = splitmix64_mix(value);
        let gamma = mix_gamma(state);
        Seed(state, gamma)
    }

    /// Split a seed into two independent seeds.
    pub fn split(self) -> (Self, Self) {
        let Seed(state, gamma) = self;
        let new_state = state.wrapping_add(gamma);
        let output = splitmix64_mix(new_state);
        let new_gamma = mix_gamma(output);

        (Seed(new_state, gamma), Seed(output, new_gamma))
    }

    /// Generate the next random value and advance the seed.
    pub fn next_u64(self) -> (u64, Self) {
        let Seed(state, gamma) = self;
        let new_state = state.wrapping_add(gamma);
        let output = splitmix64_mix(new_state);
        (output, Seed(new_state, gamma))
    }

    /// Generate a bounded random value in `[0, bound)`. A zero bound yields 0.
    pub fn next_bounded(self, bound: u64) -> (u64, Self) {
        let (value, new_seed) = self.next_u64();
        (((value as u128 * bound as u128) >> 64) as u64, new_seed)
    }

    /// Generate a random value in the inclusive range `[lo, hi]`.
    pub fn next_in_range(self, lo: i64, hi: i64) -> (i64, Self) {
        let (value, new_seed) = self.next_u64();
        let span = (hi as i128 - lo as i128 + 1) as u128;
        let offset = ((value as u128 * span) >> 64) as i128;
        ((lo as i128 + offset) as i64, new_seed)
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seed({}, {})", self.0, self.1)
    }
}

/// Consecutive rejections a `filter` tolerates when no config says otherwise.
pub const DEFAULT_FILTER_LIMIT: usize = 100;

/// Configuration for a falsification run.
///
/// All limits are policy knobs; none of them change which values a strategy
/// can produce, only how long the engine keeps looking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number of valid (non-rejected) trials to run before declaring a pass.
    pub test_limit: usize,

    /// Maximum number of shrink candidates to try after a failure.
    pub shrink_limit: usize,

    /// Maximum size parameter to use.
    pub size_limit: usize,

    /// Maximum number of rejected trials (assume or filter) before giving up.
    pub discard_limit: usize,

    /// Maximum number of consecutive candidates a `filter` may reject within
    /// one generation attempt.
    pub filter_limit: usize,

    /// Fixed seed for deterministic runs. `None` draws one from entropy.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            test_limit: 100,
            shrink_limit: 1000,
            size_limit: 100,
            discard_limit: 1000,
            filter_limit: DEFAULT_FILTER_LIMIT,
            seed: None,
        }
    }
}

impl Config {
    /// Create a new config with the given number of tests.
    pub fn with_tests(mut self, tests: usize) -> Self {
        self.test_limit = tests;
        self
    }

    /// Create a new config with the given shrink limit.
    pub fn with_shrinks(mut self, shrinks: usize) -> Self {
        self.shrink_limit = shrinks;
        self
    }

    /// Create a new config with the given size limit.
    pub fn with_size_limit(mut self, size: usize) -> Self {
        self.size_limit = size;
        self
    }

    /// Create a new config with the given discard limit.
    pub fn with_discards(mut self, discards: usize) -> Self {
        self.discard_limit = discards;
        self
    }

    /// Create a new config with the given filter rejection limit.
    pub fn with_filter_limit(mut self, limit: usize) -> Self {
        self.filter_limit = limit;
        self
    }

    /// Create a new config that always starts from `seed`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// SplitMix64 mixing function for high-quality output.
fn splitmix64_mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e3779b97f4a7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// Generate a good gamma value for SplitMix64 splitting.
fn mix_gamma(mut z: u64) -> u64 {
    z = splitmix64_mix(z);
    // Odd gamma for maximal period
    (z | 1).wrapping_mul(0x9e3779b97f4a7c15)
}
