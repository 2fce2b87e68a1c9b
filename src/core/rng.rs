//! Seeded random source shared by every battle in a turn
//!
//! Replays depend on the exact number and order of draws, so every draw goes
//! through `GameRng` and is counted.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Game random number generator
///
/// Wraps ChaCha8Rng for reproducible battles.
#[derive(Debug, Clone)]
pub struct GameRng {
    rng: ChaCha8Rng,
    seed: u64,
    draws: u64,
}

impl GameRng {
    /// Create a new RNG with the given seed
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            draws: 0,
        }
    }

    /// Create a new RNG with a random seed
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of values drawn so far
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Uniform integer in `lo..=hi`
    ///
    /// Returns `lo` without drawing when the range holds a single value
    /// (or is inverted).
    pub fn rnd(&mut self, lo: u32, hi: u32) -> u32 {
        if hi <= lo {
            return lo;
        }
        self.draws += 1;
        self.rng.gen_range(lo..=hi)
    }

    /// Fair coin; true on heads
    pub fn coin(&mut self) -> bool {
        self.rnd(1, 2) == 1
    }

    /// Returns true with probability percent/100
    pub fn percent(&mut self, percent: u32) -> bool {
        self.rnd(1, 100) <= percent
    }

    /// Fisher-Yates shuffle, walking from the back of the slice
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.rnd(0, i as u32) as usize;
            items.swap(i, j);
        }
    }
}

impl Default for GameRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}
