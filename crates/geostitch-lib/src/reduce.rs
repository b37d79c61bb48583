//! Map-reduce merging over the rayon pool
//!
//! The pool is cut into W contiguous partitions that are merged independently, then the
//! partial results are recombined pairwise and re-merged until one list is left. Every
//! round only joins strands that meet at an endpoint, so the final list is a fixed
//! point of [`ContinuityMerger::merge`] over the whole pool.

use crate::{Config, ContinuityMerger, Strand};
use rayon::prelude::*;

/// Upper bound on the number of partitions for configured runs
pub const MAX_WORKERS: usize = 20;

/// Parallel driver around [`ContinuityMerger`]
#[derive(Debug, Clone, Copy)]
pub struct ParallelReducer {
    workers: usize,
    merger: ContinuityMerger,
}

impl Default for ParallelReducer {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ParallelReducer {
    /// Reducer with an explicit partition count (at least one)
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            merger: ContinuityMerger::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.worker_count())
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Merge a comparison class into maximal chains
    pub fn reduce(&self, pool: Vec<Strand>) -> Vec<Strand> {
        #[cfg(feature = "profiling")]
        profiling::scope!("reduce::reduce");

        if pool.is_empty() {
            tracing::trace!("{}", crate::StitchError::EmptyPartition);
            return pool;
        }

        let input_len = pool.len();
        let partitions = partition(pool, self.workers);
        tracing::debug!(
            "Reducing {} strands in {} partitions",
            input_len,
            partitions.len()
        );

        let mut lists: Vec<Vec<Strand>> = partitions
            .into_par_iter()
            .map(|part| self.merger.merge(part))
            .collect();

        let mut round = 0;
        while lists.len() > 1 {
            round += 1;
            let mut pairs = Vec::with_capacity(lists.len().div_ceil(2));
            let mut iter = lists.into_iter();
            while let Some(left) = iter.next() {
                pairs.push((left, iter.next()));
            }

            lists = pairs
                .into_par_iter()
                .map(|(mut left, right)| match right {
                    Some(right) => {
                        left.extend(right);
                        self.merger.merge(left)
                    }
                    // Odd list out carries over to the next round unchanged
                    None => left,
                })
                .collect();
            tracing::trace!("Reduce round {} left {} lists", round, lists.len());
        }

        let merged = lists.pop().unwrap_or_default();
        tracing::debug!(
            "Reduced {} strands to {} chains in {} rounds",
            input_len,
            merged.len(),
            round
        );
        merged
    }
}

/// Split a pool into at most `count` contiguous, non-empty partitions
fn partition(pool: Vec<Strand>, count: usize) -> Vec<Vec<Strand>> {
    let size = pool.len().div_ceil(count.max(1)).max(1);
    let mut partitions = Vec::with_capacity(count);
    let mut iter = pool.into_iter().peekable();
    while iter.peek().is_some() {
        partitions.push(iter.by_ref().take(size).collect());
    }
    partitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::coord_key;
    use crate::{Chain, FeatureCategory, Fragment, FragmentId};

    fn strand(id: FragmentId, points: &[(f64, f64)]) -> Strand {
        Strand::from(&Fragment::new(
            id,
            None,
            FeatureCategory::Highway,
            0,
            Chain::from_lon_lat(points).unwrap(),
        ))
    }

    /// Two disjoint paths split into unit pieces, interleaved and partly reversed
    fn shuffled_paths() -> Vec<Strand> {
        let mut pool = Vec::new();
        for i in 0..40u64 {
            let x = i as f64;
            let piece = if i % 3 == 0 {
                strand(i + 1, &[(x + 1.0, 0.0), (x, 0.0)])
            } else {
                strand(i + 1, &[(x, 0.0), (x + 1.0, 0.0)])
            };
            pool.push(piece);
            pool.push(strand(100 + i, &[(x, 10.0), (x + 1.0, 10.0)]));
        }
        // Deterministic shuffle
        let len = pool.len();
        for i in 0..len {
            pool.swap(i, (i * 17 + 5) % len);
        }
        pool
    }

    fn summary(strands: &[Strand]) -> Vec<([(u64, u64); 2], usize)> {
        let mut out: Vec<_> = strands
            .iter()
            .map(|s| {
                let mut ends = [coord_key(s.chain.head()), coord_key(s.chain.tail())];
                ends.sort_unstable();
                (ends, s.constituents.len())
            })
            .collect();
        out.sort_unstable();
        out
    }

    #[test]
    fn test_partition() {
        let pool = shuffled_paths();
        let parts = partition(pool.clone(), 3);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts.iter().map(Vec::len).sum::<usize>(), pool.len());

        let parts = partition(pool[..2].to_vec(), 8);
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn test_reduce_empty() {
        assert!(ParallelReducer::new(4).reduce(Vec::new()).is_empty());
    }

    #[test]
    fn test_reduce_worker_count_clamped() {
        assert_eq!(ParallelReducer::new(0).workers(), 1);
        assert!(ParallelReducer::default().workers() <= MAX_WORKERS);
    }

    #[test]
    fn test_partition_invariance() {
        let pool = shuffled_paths();
        let single = ParallelReducer::new(1).reduce(pool.clone());
        assert_eq!(single.len(), 2);

        for workers in [2, 3, 7, 20] {
            let parallel = ParallelReducer::new(workers).reduce(pool.clone());
            assert_eq!(summary(&parallel), summary(&single), "workers = {workers}");
            let total_km: f64 = parallel.iter().map(|s| s.chain.approx_length_km()).sum();
            let expected_km: f64 = single.iter().map(|s| s.chain.approx_length_km()).sum();
            assert!((total_km - expected_km).abs() < 1e-6);
        }
    }
}
