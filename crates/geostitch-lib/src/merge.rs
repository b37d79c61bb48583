//! Endpoint-continuity merging
//!
//! Fragments are stitched wherever one ends exactly where another begins. Direction is
//! irrelevant: when two chains meet head-to-head or tail-to-tail, one of them is
//! reversed before joining.
//!
//! The merger keeps every strand in an arena and looks candidates up through an index
//! from endpoint coordinate to arena slots, so each strand is visited once instead of
//! rescanning the whole pool after every join.

use crate::utils::{CoordKey, coord_key};
use crate::{Chain, Fragment, Strand};
use smallvec::SmallVec;
use std::collections::HashMap;

/// Arena slots keyed by endpoint coordinate. Most endpoints are shared by at most two
/// strands, so the slots stay inline.
pub(crate) type EndpointIndex = HashMap<CoordKey, SmallVec<[usize; 2]>>;

/// Merges strands into maximal connected chains
///
/// Seeds are taken in pool order. A seed is grown at its tail first, then at its head,
/// until neither end has a partner or the chain closes. When several strands share an
/// endpoint, the one earliest in the pool wins, so results are deterministic for a
/// given input order.
///
/// Strands that are already closed are complete rings and are never joined with
/// anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContinuityMerger;

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ContinuityMerger {
    pub fn new() -> Self {
        Self
    }

    /// Merge raw fragments
    pub fn merge_fragments(&self, fragments: &[Fragment]) -> Vec<Strand> {
        self.merge(fragments.iter().map(Strand::from).collect())
    }

    /// Merge a pool of strands into maximal chains
    ///
    /// Every input strand ends up in exactly one output strand; constituent ids are
    /// concatenated in the order strands were absorbed.
    pub fn merge(&self, pool: Vec<Strand>) -> Vec<Strand> {
        if pool.len() < 2 {
            return pool;
        }

        let mut index = index_endpoints(&pool);
        let mut slots: Vec<Option<Strand>> = pool.into_iter().map(Some).collect();
        let mut merged = Vec::new();

        for seed in 0..slots.len() {
            let Some(mut current) = slots[seed].take() else {
                continue;
            };
            unindex(&mut index, &current.chain, seed);

            while !current.chain.is_closed() {
                let tail = current.chain.tail();
                if let Some(candidate) = take_candidate(&mut index, &mut slots, tail) {
                    let oriented = if candidate.chain.head() == tail {
                        candidate.chain
                    } else {
                        candidate.chain.reversed()
                    };
                    tracing::debug!(
                        "Appending strand {} to chain {}",
                        candidate.constituents[0],
                        current.seed_id()
                    );
                    current.chain = current.chain.concat(&oriented);
                    current.constituents.extend(candidate.constituents);
                    continue;
                }

                let head = current.chain.head();
                if let Some(candidate) = take_candidate(&mut index, &mut slots, head) {
                    let oriented = if candidate.chain.tail() == head {
                        candidate.chain
                    } else {
                        candidate.chain.reversed()
                    };
                    tracing::debug!(
                        "Prepending strand {} to chain {}",
                        candidate.constituents[0],
                        current.seed_id()
                    );
                    current.chain = oriented.concat(&current.chain);
                    current.constituents.extend(candidate.constituents);
                    continue;
                }

                break;
            }

            merged.push(current);
        }

        merged
    }
}

/// Index both endpoints of every open strand of a pool
pub(crate) fn index_endpoints(pool: &[Strand]) -> EndpointIndex {
    let mut index = EndpointIndex::with_capacity(pool.len() * 2);
    for (slot, strand) in pool.iter().enumerate() {
        if strand.chain.is_closed() {
            continue;
        }
        index
            .entry(coord_key(strand.chain.head()))
            .or_default()
            .push(slot);
        index
            .entry(coord_key(strand.chain.tail()))
            .or_default()
            .push(slot);
    }
    index
}

/// Remove a slot from the index entries of both of its endpoints
pub(crate) fn unindex(index: &mut EndpointIndex, chain: &Chain, slot: usize) {
    for endpoint in [chain.head(), chain.tail()] {
        if let Some(entries) = index.get_mut(&coord_key(endpoint)) {
            entries.retain(|s| *s != slot);
        }
    }
}

/// Take the lowest-slot strand with an endpoint at `at` out of the pool
pub(crate) fn take_candidate(
    index: &mut EndpointIndex,
    slots: &mut [Option<Strand>],
    at: geo::Coord<f64>,
) -> Option<Strand> {
    // Entries are pushed in slot order and only ever removed, so the first is the lowest
    let slot = *index.get(&coord_key(at))?.first()?;
    let strand = slots[slot].take()?;
    unindex(index, &strand.chain, slot);
    Some(strand)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FeatureCategory, FragmentId};

    fn strand(id: FragmentId, points: &[(f64, f64)]) -> Strand {
        Strand::from(&Fragment::new(
            id,
            None,
            FeatureCategory::Coastline,
            0,
            Chain::from_lon_lat(points).unwrap(),
        ))
    }

    /// Merging two adjacent strands adds their lengths and keeps only the free endpoints
    fn assert_merge_closure(a: &Strand, b: &Strand, merged: &Strand) {
        let expected_km = a.chain.approx_length_km() + b.chain.approx_length_km();
        assert!((merged.chain.approx_length_km() - expected_km).abs() < 1e-9);

        let mut free: Vec<(u64, u64)> = Vec::new();
        for end in endpoints(a).into_iter().chain(endpoints(b)) {
            match free.iter().position(|e| *e == end) {
                Some(i) => {
                    free.remove(i);
                }
                None => free.push(end),
            }
        }
        free.sort_unstable();
        assert_eq!(endpoints(merged).to_vec(), free);
    }

    fn endpoints(strand: &Strand) -> [(u64, u64); 2] {
        let mut ends = [
            coord_key(strand.chain.head()),
            coord_key(strand.chain.tail()),
        ];
        ends.sort_unstable();
        ends
    }

    #[test]
    fn test_merge_empty_and_single() {
        let merger = ContinuityMerger::new();
        assert!(merger.merge(Vec::new()).is_empty());

        let single = vec![strand(1, &[(0.0, 0.0), (1.0, 0.0)])];
        assert_eq!(merger.merge(single.clone()), single);
    }

    #[test]
    fn test_merge_appends_at_tail() {
        let a = strand(1, &[(0.0, 0.0), (1.0, 0.0)]);
        let b = strand(2, &[(1.0, 0.0), (2.0, 0.5)]);
        let merged = ContinuityMerger::new().merge(vec![a.clone(), b.clone()]);
        assert_eq!(merged.len(), 1);
        assert_merge_closure(&a, &b, &merged[0]);
        assert_eq!(merged[0].constituents, vec![1, 2]);
        assert_eq!(merged[0].chain.len(), 3);
        assert_eq!(merged[0].chain.head(), geo::Coord { x: 0.0, y: 0.0 });
        assert_eq!(merged[0].chain.tail(), geo::Coord { x: 2.0, y: 0.5 });
    }

    #[test]
    fn test_merge_reverses_same_direction_chains() {
        // Both fragments end at (1, 0)
        let a = strand(1, &[(0.0, 0.0), (1.0, 0.0)]);
        let b = strand(2, &[(2.0, 0.0), (1.5, 0.3), (1.0, 0.0)]);
        let merged = ContinuityMerger::new().merge(vec![a.clone(), b.clone()]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].chain.tail(), geo::Coord { x: 2.0, y: 0.0 });
        assert_merge_closure(&a, &b, &merged[0]);

        // Both fragments start at (0, 0)
        let a = strand(1, &[(0.0, 0.0), (1.0, 0.0)]);
        let b = strand(2, &[(0.0, 0.0), (0.0, 1.0)]);
        let merged = ContinuityMerger::new().merge(vec![a.clone(), b.clone()]);
        assert_eq!(merged.len(), 1);
        assert_merge_closure(&a, &b, &merged[0]);
        assert_eq!(merged[0].chain.head(), geo::Coord { x: 0.0, y: 1.0 });
        assert_eq!(merged[0].chain.tail(), geo::Coord { x: 1.0, y: 0.0 });
    }

    #[test]
    fn test_merge_prepends_at_head() {
        let merged = ContinuityMerger::new().merge(vec![
            strand(2, &[(1.0, 0.0), (2.0, 0.0)]),
            strand(1, &[(0.0, 0.0), (1.0, 0.0)]),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].constituents, vec![2, 1]);
        assert_eq!(merged[0].seed_id(), 2);
        assert_eq!(merged[0].chain.head(), geo::Coord { x: 0.0, y: 0.0 });
    }

    #[test]
    fn test_merge_closes_triangle() {
        let merged = ContinuityMerger::new().merge(vec![
            strand(1, &[(0.0, 0.0), (1.0, 0.0)]),
            strand(2, &[(1.0, 0.0), (0.0, 1.0)]),
            strand(3, &[(0.0, 0.0), (0.0, 1.0)]),
        ]);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].chain.is_closed());
        assert_eq!(merged[0].chain.len(), 4);
        assert_eq!(merged[0].constituents, vec![1, 2, 3]);
    }

    #[test]
    fn test_merge_branch_lowest_slot_wins() {
        let merged = ContinuityMerger::new().merge(vec![
            strand(1, &[(0.0, 0.0), (1.0, 0.0)]),
            strand(2, &[(1.0, 0.0), (2.0, 0.0)]),
            strand(3, &[(1.0, 0.0), (1.0, 1.0)]),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].constituents, vec![1, 2]);
        assert_eq!(merged[1].constituents, vec![3]);
    }

    #[test]
    fn test_closed_strands_are_left_alone() {
        let ring = strand(1, &[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]);
        let spur = strand(2, &[(0.0, 0.0), (-1.0, 0.0)]);
        let merged = ContinuityMerger::new().merge(vec![ring.clone(), spur.clone()]);
        assert_eq!(merged, vec![ring, spur]);
    }

    #[test]
    fn test_merge_closure_and_idempotence() {
        // Star with four arms plus a path split into shuffled pieces
        let pool = vec![
            strand(1, &[(0.0, 0.0), (1.0, 0.0)]),
            strand(2, &[(0.0, 0.0), (0.0, 1.0)]),
            strand(3, &[(0.0, 0.0), (-1.0, 0.0)]),
            strand(4, &[(0.0, 0.0), (0.0, -1.0)]),
            strand(5, &[(12.0, 5.0), (13.0, 5.0)]),
            strand(6, &[(10.0, 5.0), (11.0, 5.0)]),
            strand(7, &[(12.0, 5.0), (11.0, 5.0)]),
        ];
        let merger = ContinuityMerger::new();
        let merged = merger.merge(pool.clone());

        // Every input id lands in exactly one output
        let mut ids: Vec<FragmentId> = merged
            .iter()
            .flat_map(|s| s.constituents.iter().copied())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=7).collect::<Vec<_>>());

        // No two outputs share an endpoint
        let mut ends: Vec<_> = merged.iter().flat_map(endpoints).collect();
        let total = ends.len();
        ends.sort_unstable();
        ends.dedup();
        assert_eq!(ends.len(), total);

        let again = merger.merge(merged.clone());
        assert_eq!(again, merged);
    }
}
