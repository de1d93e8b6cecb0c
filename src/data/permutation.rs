//! Shuffled index stream for epoch-wise sampling without replacement

use rand::seq::SliceRandom;
use rand::Rng;

/// A random permutation of `0..n` consumed batch by batch.
pub struct IndexPermutation {
    order: Vec<usize>,
    cursor: usize,
}

impl IndexPermutation {
    /// Shuffle `0..n` with the caller's RNG.
    pub fn new<R: Rng>(n: usize, rng: &mut R) -> Self {
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(rng);
        Self { order, cursor: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.order.len() - self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume up to `max` indexes. The final batch of an epoch may be
    /// shorter; an exhausted permutation yields an empty slice.
    pub fn take(&mut self, max: usize) -> &[usize] {
        let count = max.min(self.remaining());
        let start = self.cursor;
        self.cursor += count;
        &self.order[start..start + count]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn covers_every_index_exactly_once() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut perm = IndexPermutation::new(10, &mut rng);

        let mut seen = Vec::new();
        while !perm.is_exhausted() {
            seen.extend_from_slice(perm.take(3));
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn final_batch_is_short() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut perm = IndexPermutation::new(7, &mut rng);

        assert_eq!(perm.take(4).len(), 4);
        assert_eq!(perm.remaining(), 3);
        assert_eq!(perm.take(4).len(), 3);
        assert!(perm.is_exhausted());
        assert!(perm.take(4).is_empty());
    }

    #[test]
    fn same_seed_same_order() {
        let mut rng_a = StdRng::seed_from_u64(7);
        let mut rng_b = StdRng::seed_from_u64(7);
        let mut a = IndexPermutation::new(16, &mut rng_a);
        let mut b = IndexPermutation::new(16, &mut rng_b);
        assert_eq!(a.take(16), b.take(16));
    }
}
