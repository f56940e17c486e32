// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Seedable random source.
//!
//! Engines never touch a platform RNG. Every random decision (bubble neighbor
//! choice, population shuffles, trial seeds) flows through [`RandomSource`],
//! so a run is reproducible from its seed.

/// Uniform integer source consumed by engines and population builders.
pub trait RandomSource: Send {
    /// Returns a value uniformly distributed in `[0, bound)`.
    ///
    /// `bound == 0` and `bound == 1` both return 0 and must still consume
    /// whatever state the implementation uses for a draw, so call sequences
    /// stay aligned regardless of the bounds requested.
    fn next_below(&mut self, bound: usize) -> usize;
}

/// Stateful `xoroshiro128+` generator.
///
/// * Not cryptographically secure.
/// * Matching seeds yield identical sequences across supported platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prng {
    state: [u64; 2],
}

const GOLDEN_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(GOLDEN_GAMMA);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

impl Prng {
    /// Constructs a generator from two 64-bit seeds.
    pub fn from_seed(seed0: u64, seed1: u64) -> Self {
        let mut state = [seed0, seed1];
        if state == [0, 0] {
            state[0] = GOLDEN_GAMMA;
        }
        Self { state }
    }

    /// Constructs a generator from one seed via SplitMix64 expansion.
    pub fn from_seed_u64(seed: u64) -> Self {
        let mut sm = seed;
        let a = splitmix64(&mut sm);
        let b = splitmix64(&mut sm);
        Self::from_seed(a, b)
    }

    /// Seed for the `index`-th independent stream derived from `base`.
    ///
    /// Used to give every trial in a batch its own reproducible generator.
    pub fn derive_seed(base: u64, index: u64) -> u64 {
        let mut sm = base ^ index.wrapping_mul(GOLDEN_GAMMA);
        splitmix64(&mut sm)
    }

    /// Next raw 64-bit output.
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(55) ^ s1 ^ (s1 << 14);
        self.state[1] = s1.rotate_left(36);

        result
    }

    /// Next value in `[0, span)` by rejection sampling (no modulo bias).
    fn next_in_span(&mut self, span: u64) -> u64 {
        // Always draw once so degenerate spans keep the stream aligned.
        let first = self.next_u64();
        if span <= 1 {
            return 0;
        }
        if span.is_power_of_two() {
            return first & (span - 1);
        }
        let zone = u64::MAX - u64::MAX % span;
        let mut candidate = first;
        while candidate >= zone {
            candidate = self.next_u64();
        }
        candidate % span
    }

    /// Fisher-Yates shuffle driven by this generator.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_below(i + 1);
            items.swap(i, j);
        }
    }
}

impl RandomSource for Prng {
    fn next_below(&mut self, bound: usize) -> usize {
        // usize -> u64 is lossless on every supported target.
        let value = self.next_in_span(bound as u64);
        usize::try_from(value).unwrap_or(0)
    }
}
