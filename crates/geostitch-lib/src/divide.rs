//! Bounded-length re-segmentation of long merged chains
//!
//! A long merged line (a coastline, a motorway) is rebuilt from its fragments and cut
//! into pieces of at most `length_threshold_km`, starting from the end closest to the
//! original chain's head so the pieces follow the same direction.

use crate::merge::{index_endpoints, take_candidate, unindex};
use crate::utils::{CoordKey, coord_key, planar_distance};
use crate::{CategoryConfig, Chain, Fragment, HasChain, MergedFeature, SpatialIndex, Strand};
use geo::Coord;
use std::collections::HashSet;

/// Re-splits a chain's fragments into segments bounded by a length threshold
///
/// - A segment is cut when the next fragment would make it strictly longer than
///   `length_threshold_km`; that fragment starts the next segment. A segment still
///   shorter than `tolerance_km` is never cut, it takes the fragment and overshoots.
/// - When a connected run ends on a piece shorter than `tolerance_km`, the piece is
///   joined back onto the previous segment of the run instead of being emitted alone.
/// - Fragments that do not connect to the run start new runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdDivider {
    pub length_threshold_km: f64,
    pub tolerance_km: f64,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ThresholdDivider {
    pub fn new(length_threshold_km: f64, tolerance_km: f64) -> Self {
        Self {
            length_threshold_km,
            tolerance_km,
        }
    }

    pub fn from_category(config: &CategoryConfig) -> Self {
        Self::new(config.length_threshold_km, config.tolerance_km)
    }

    /// Divide the fragments of `origin` into bounded segments
    ///
    /// Every strand of `pool` ends up in exactly one segment.
    pub fn divide(&self, origin: &Chain, pool: Vec<Strand>) -> Vec<Strand> {
        if pool.is_empty() {
            return pool;
        }

        let (start, reverse_start) = start_slot(&pool, origin.head());
        let mut index = index_endpoints(&pool);
        let mut slots: Vec<Option<Strand>> = pool.into_iter().map(Some).collect();
        let mut segments: Vec<Strand> = Vec::new();
        let mut next_seed = Some(start);

        loop {
            let seed = match next_seed.take() {
                Some(seed) => seed,
                None => match slots.iter().position(Option::is_some) {
                    Some(seed) => seed,
                    None => break,
                },
            };
            let Some(mut current) = slots[seed].take() else {
                continue;
            };
            unindex(&mut index, &current.chain, seed);
            if seed == start && reverse_start {
                current.chain = current.chain.reversed();
            }

            let run_start = segments.len();
            loop {
                let tail = current.chain.tail();
                if let Some(candidate) = take_candidate(&mut index, &mut slots, tail) {
                    let candidate = if candidate.chain.head() == tail {
                        candidate
                    } else {
                        candidate.with_chain(candidate.chain.reversed())
                    };
                    let joined = current.chain.concat(&candidate.chain);
                    if self.cuts_before(&current.chain, &joined) {
                        tracing::debug!(
                            "Segment {} reached {:.1} km, next segment starts at {}",
                            current.seed_id(),
                            current.chain.approx_length_km(),
                            candidate.seed_id()
                        );
                        segments.push(std::mem::replace(&mut current, candidate));
                    } else {
                        current.chain = joined;
                        current.constituents.extend(candidate.constituents);
                    }
                    continue;
                }

                let head = current.chain.head();
                if let Some(candidate) = take_candidate(&mut index, &mut slots, head) {
                    let candidate = if candidate.chain.tail() == head {
                        candidate
                    } else {
                        candidate.with_chain(candidate.chain.reversed())
                    };
                    let joined = candidate.chain.concat(&current.chain);
                    if self.cuts_before(&current.chain, &joined) {
                        segments.push(std::mem::replace(&mut current, candidate));
                    } else {
                        current.chain = joined;
                        current.constituents.extend(candidate.constituents);
                    }
                    continue;
                }

                break;
            }

            self.finish_run(&mut segments, run_start, current);
        }

        tracing::debug!(
            "Divided {:.1} km chain into {} segments",
            origin.approx_length_km(),
            segments.len()
        );
        segments
    }

    /// Whether `current` is emitted instead of growing into `joined`
    fn cuts_before(&self, current: &Chain, joined: &Chain) -> bool {
        joined.approx_length_km() > self.length_threshold_km
            && current.approx_length_km() >= self.tolerance_km
    }

    /// Emit the last segment of a run, joining it onto the previous one when too short
    fn finish_run(&self, segments: &mut Vec<Strand>, run_start: usize, last: Strand) {
        if segments.len() > run_start && last.chain.approx_length_km() < self.tolerance_km {
            if let Some(previous) = segments.last_mut() {
                if let Some(chain) = join_adjacent(&previous.chain, &last.chain) {
                    previous.chain = chain;
                    previous.constituents.extend(last.constituents);
                    return;
                }
            }
        }
        segments.push(last);
    }
}

/// Slot of the strand with an endpoint closest to `anchor`, and whether that endpoint
/// is its tail. Falls back to the first strand when no distance is comparable.
fn start_slot(pool: &[Strand], anchor: Coord<f64>) -> (usize, bool) {
    pool.iter()
        .enumerate()
        .flat_map(|(slot, strand)| {
            [
                (slot, false, planar_distance(strand.chain.head(), anchor)),
                (slot, true, planar_distance(strand.chain.tail(), anchor)),
            ]
        })
        .filter(|(_, _, distance)| !distance.is_nan())
        .min_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(slot, reverse, _)| (slot, reverse))
        .unwrap_or((0, false))
}

/// Join two chains that share an endpoint, in whatever orientation they meet
fn join_adjacent(a: &Chain, b: &Chain) -> Option<Chain> {
    if a.tail() == b.head() {
        Some(a.concat(b))
    } else if a.tail() == b.tail() {
        Some(a.concat(&b.reversed()))
    } else if a.head() == b.tail() {
        Some(b.concat(a))
    } else if a.head() == b.head() {
        Some(b.reversed().concat(a))
    } else {
        None
    }
}

/// Re-divide a previously emitted feature
///
/// The fragments making up the feature are recovered from `fragments`: candidates come
/// from a bounding-box query and are kept when every one of their vertices lies on the
/// feature.
pub fn divide_feature(
    feature: &MergedFeature,
    fragments: &[Fragment],
    config: &CategoryConfig,
) -> Vec<Strand> {
    #[cfg(feature = "profiling")]
    profiling::scope!("divide::divide_feature");

    let chain = feature.chain();
    let vertices: HashSet<CoordKey> = chain.coords().iter().map(|c| coord_key(*c)).collect();
    let index = SpatialIndex::from_items(fragments);

    let pool: Vec<Strand> = index
        .query_rect(chain.bounding_rect())
        .into_iter()
        .filter_map(|slot| fragments.get(slot))
        .filter(|fragment| {
            fragment.category == feature.category
                && fragment
                    .chain
                    .coords()
                    .iter()
                    .all(|c| vertices.contains(&coord_key(*c)))
        })
        .map(Strand::from)
        .collect();

    tracing::info!(
        "Re-dividing feature {} ({:.1} km) from {} fragments",
        feature.polygon_id,
        feature.length_km(),
        pool.len()
    );
    ThresholdDivider::from_category(config).divide(chain, pool)
}
