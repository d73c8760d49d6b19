//! Batch planning and deterministic merging.
//!
//! A run's simulation count is cut into fixed-size batches with the last
//! batch taking the remainder. Batches may finish in any order;
//! [`BatchMerger`] holds early arrivals until every lower sequence number has
//! been released, so rows are always numbered in dispatch order.

use std::collections::BTreeMap;

/// Default number of simulations per batch.
pub const DEFAULT_BATCH_SIZE: usize = 5_000;

/// Partition of a run into batch sizes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchPlan {
    sizes: Vec<usize>,
}

impl BatchPlan {
    /// Splits `total` simulations into batches of `batch_size`.
    ///
    /// A `batch_size` of zero is treated as one.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pricer_forecast::batch::BatchPlan;
    ///
    /// let plan = BatchPlan::partition(12_000, 5_000);
    /// assert_eq!(plan.sizes(), &[5_000, 5_000, 2_000]);
    /// ```
    pub fn partition(total: usize, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        let full = total / batch_size;
        let remainder = total % batch_size;

        let mut sizes = vec![batch_size; full];
        if remainder > 0 {
            sizes.push(remainder);
        }
        Self { sizes }
    }

    /// Batch sizes in sequence order.
    #[inline]
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Number of batches.
    #[inline]
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Whether the plan has no batches.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Total simulations across all batches.
    pub fn total(&self) -> usize {
        self.sizes.iter().sum()
    }
}

/// Reorders completed batches into sequence order.
///
/// # Examples
///
/// ```rust
/// use pricer_forecast::batch::BatchMerger;
///
/// let mut merger = BatchMerger::new(3);
/// assert!(merger.accept(1, vec![2.0]).is_empty());
/// let ready = merger.accept(0, vec![1.0]);
/// assert_eq!(ready, vec![(0, vec![1.0]), (1, vec![2.0])]);
/// ```
#[derive(Debug)]
pub struct BatchMerger {
    expected: usize,
    next: usize,
    pending: BTreeMap<usize, Vec<f64>>,
}

impl BatchMerger {
    /// Creates a merger for `expected` batches numbered `0..expected`.
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Accepts the output of batch `sequence` and returns every batch that
    /// is now releasable, in order.
    ///
    /// Duplicate or already-released sequence numbers are ignored.
    pub fn accept(&mut self, sequence: usize, prices: Vec<f64>) -> Vec<(usize, Vec<f64>)> {
        if sequence < self.next || sequence >= self.expected {
            return Vec::new();
        }
        self.pending.entry(sequence).or_insert(prices);

        let mut ready = Vec::new();
        while let Some(prices) = self.pending.remove(&self.next) {
            ready.push((self.next, prices));
            self.next += 1;
        }
        ready
    }

    /// Number of batches released so far.
    #[inline]
    pub fn released(&self) -> usize {
        self.next
    }

    /// Whether every expected batch has been released.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.next == self.expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_partition_exact_multiple() {
        let plan = BatchPlan::partition(10_000, 5_000);
        assert_eq!(plan.sizes(), &[5_000, 5_000]);
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_partition_smaller_than_batch() {
        let plan = BatchPlan::partition(1, 5_000);
        assert_eq!(plan.sizes(), &[1]);
    }

    #[test]
    fn test_partition_zero_batch_size() {
        let plan = BatchPlan::partition(3, 0);
        assert_eq!(plan.sizes(), &[1, 1, 1]);
    }

    #[test]
    fn test_merger_out_of_order() {
        let mut merger = BatchMerger::new(4);
        assert!(merger.accept(2, vec![3.0]).is_empty());
        assert!(merger.accept(3, vec![4.0]).is_empty());
        assert_eq!(merger.accept(0, vec![1.0]), vec![(0, vec![1.0])]);
        assert!(!merger.is_complete());

        let ready = merger.accept(1, vec![2.0]);
        let order: Vec<usize> = ready.iter().map(|(s, _)| *s).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert!(merger.is_complete());
        assert_eq!(merger.released(), 4);
    }

    #[test]
    fn test_merger_ignores_duplicates() {
        let mut merger = BatchMerger::new(2);
        merger.accept(0, vec![1.0]);
        assert!(merger.accept(0, vec![9.0]).is_empty());
        assert!(merger.accept(7, vec![9.0]).is_empty());
    }

    proptest! {
        #[test]
        fn prop_partition_covers_total(total in 1usize..200_000, batch in 1usize..20_000) {
            let plan = BatchPlan::partition(total, batch);
            prop_assert_eq!(plan.total(), total);
            prop_assert!(plan.sizes().iter().all(|s| *s >= 1 && *s <= batch));
            prop_assert_eq!(plan.len(), total.div_ceil(batch));
        }

        #[test]
        fn prop_merger_restores_order(order in Just((0usize..16).collect::<Vec<_>>()).prop_shuffle()) {
            let mut merger = BatchMerger::new(order.len());
            let mut released = Vec::new();
            for seq in order {
                for (s, prices) in merger.accept(seq, vec![seq as f64]) {
                    prop_assert_eq!(prices[0], s as f64);
                    released.push(s);
                }
            }
            prop_assert_eq!(released, (0usize..16).collect::<Vec<_>>());
            prop_assert!(merger.is_complete());
        }
    }
}
