//! Seeded PCG random number generator.
//!
//! Used for bootstrap sampling, per-node feature sampling, and the
//! train/test shuffle. A fixed seed makes every fit reproducible.

/// PCG-XSH-RR 32-bit generator.
#[derive(Clone, Debug)]
pub struct Pcg32 {
    state: u64,
    inc: u64,
}

impl Pcg32 {
    /// Default increment (must be odd)
    const DEFAULT_INC: u64 = 1_442_695_040_888_963_407;
    const MULTIPLIER: u64 = 6_364_136_223_846_793_005;

    /// Creates a generator from a seed.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        let mut rng = Self {
            state: 0,
            inc: Self::DEFAULT_INC,
        };
        rng.state = seed.wrapping_add(rng.inc);
        rng.step();
        rng
    }

    const fn step(&mut self) {
        self.state = self
            .state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(self.inc);
    }

    /// Generates the next `u32`.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn next_u32(&mut self) -> u32 {
        let old_state = self.state;
        self.step();

        let xorshifted = (((old_state >> 18) ^ old_state) >> 27) as u32;
        let rot = (old_state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    /// Generates the next `u64` from two consecutive outputs.
    #[allow(clippy::cast_lossless)]
    pub const fn next_u64(&mut self) -> u64 {
        let hi = self.next_u32() as u64;
        let lo = self.next_u32() as u64;
        (hi << 32) | lo
    }

    /// Generates an index in `[0, bound)` without modulo bias.
    ///
    /// Returns `0` when `bound` is `0`.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn next_index(&mut self, bound: usize) -> usize {
        if bound == 0 {
            return 0;
        }
        let bound = bound as u64;
        let threshold = bound.wrapping_neg() % bound;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return (r % bound) as usize;
            }
        }
    }

    /// Derives an independent generator, e.g. one per tree.
    pub const fn fork(&mut self) -> Self {
        Self::new(self.next_u64())
    }

    /// Fisher-Yates shuffle in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_index(i + 1);
            items.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = Pcg32::new(42);
        let mut b = Pcg32::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = Pcg32::new(1);
        let mut b = Pcg32::new(2);
        let same = (0..32).filter(|_| a.next_u32() == b.next_u32()).count();
        assert!(same < 4);
    }

    #[test]
    fn next_index_stays_in_bounds() {
        let mut rng = Pcg32::new(7);
        for bound in [1usize, 2, 3, 10, 97] {
            for _ in 0..200 {
                assert!(rng.next_index(bound) < bound);
            }
        }
        assert_eq!(rng.next_index(0), 0);
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = Pcg32::new(42);
        let mut items: Vec<usize> = (0..50).collect();
        rng.shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
        assert_ne!(items, sorted, "a 50-element shuffle should move something");
    }
}
