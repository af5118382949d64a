//! Deterministic permutation source
//!
//! Row order must be bit-identical across platforms and crate upgrades, so
//! the generator is a fixed 64-bit LCG with a pinned output stream.

use std::num::Wrapping;

/// 64-bit Linear Congruential Generator (Knuth MMIX constants)
#[derive(Clone, Debug)]
pub struct LcgRng {
    state: Wrapping<u64>,
}

impl LcgRng {
    const MULTIPLIER: u64 = 6364136223846793005;
    const INCREMENT: u64 = 1442695040888963407;

    pub fn new(seed: u64) -> Self {
        let mut rng = Self {
            state: Wrapping(seed),
        };
        // Decorrelate small neighbouring seeds
        rng.next_u64();
        rng
    }

    /// Advance the state and return it with the high bits folded down.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state * Wrapping(Self::MULTIPLIER) + Wrapping(Self::INCREMENT);
        let x = self.state.0;
        x ^ (x >> 29)
    }

    /// Generate a value in `[0, bound)` without modulo bias.
    pub fn next_below(&mut self, bound: u64) -> u64 {
        if bound <= 1 {
            return 0;
        }
        let zone = u64::MAX - (u64::MAX % bound);
        loop {
            let r = self.next_u64();
            if r < zone {
                return r % bound;
            }
        }
    }
}

/// Draw a permutation of `0..n` with a Fisher–Yates shuffle seeded by `seed`.
///
/// `permutation(n, seed)` always returns the same vector for the same inputs.
pub fn permutation(n: usize, seed: u64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = LcgRng::new(seed);
    for i in (1..n).rev() {
        let j = rng.next_below(i as u64 + 1) as usize;
        order.swap(i, j);
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcg_determinism() {
        let mut rng1 = LcgRng::new(42);
        let mut rng2 = LcgRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_lcg_range() {
        let mut rng = LcgRng::new(42);
        for _ in 0..1000 {
            assert!(rng.next_below(10) < 10);
        }
        assert_eq!(rng.next_below(0), 0);
        assert_eq!(rng.next_below(1), 0);
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut rng1 = LcgRng::new(42);
        let mut rng2 = LcgRng::new(43);
        assert_ne!(rng1.next_u64(), rng2.next_u64());
    }

    #[test]
    fn test_permutation_is_bijection() {
        let mut order = permutation(257, 7);
        order.sort_unstable();
        assert_eq!(order, (0..257).collect::<Vec<_>>());
    }

    #[test]
    fn test_permutation_shuffles() {
        let order = permutation(100, 42);
        assert_ne!(order, (0..100).collect::<Vec<_>>());
        assert_ne!(order, permutation(100, 43));
    }

    #[test]
    fn test_permutation_edge_sizes() {
        assert!(permutation(0, 1).is_empty());
        assert_eq!(permutation(1, 1), vec![0]);
    }
}
