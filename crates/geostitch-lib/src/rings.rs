//! Ring assembly for multi-ring relations
//!
//! Outer members of a relation are merged into closed rings. Inner members are merged
//! the same way and, for categories that ask for it (water), turned into standalone
//! island features. Chains that fail to close are reported and kept aside instead of
//! being dropped silently.

use crate::{
    CategoryConfig, ClosedRing, ContinuityMerger, Diagnostic, FeatureCategory, FragmentId,
    HasChain, RelationGroup, Strand, StitchError,
};
use geo::MultiPolygon;

/// A merged strand that closed into a ring
#[derive(Clone, Debug, PartialEq)]
pub struct RingStrand {
    pub constituents: Vec<FragmentId>,
    pub name: Option<String>,
    pub category: FeatureCategory,
    pub level: i32,
    pub ring: ClosedRing,
}

impl RingStrand {
    /// Polygonize a strand, giving it back unchanged on failure
    fn polygonize(strand: Strand) -> std::result::Result<Self, (Strand, StitchError)> {
        match ClosedRing::try_from(strand.chain.clone()) {
            Ok(ring) => Ok(Self {
                constituents: strand.constituents,
                name: strand.name,
                category: strand.category,
                level: strand.level,
                ring,
            }),
            Err(err) => Err((strand, err)),
        }
    }
}

impl HasChain for RingStrand {
    #[inline]
    fn chain(&self) -> &crate::Chain {
        self.ring.chain()
    }
}

/// Output of ring assembly for one relation or one batch of standalone fragments
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RingAssembly {
    /// Closed outer rings
    pub rings: Vec<RingStrand>,
    /// Closed inner rings re-tagged as islands
    pub islands: Vec<RingStrand>,
    /// Chains that could not be closed, kept for inspection
    pub unclosed: Vec<Strand>,
    pub diagnostics: Vec<Diagnostic>,
}

impl RingAssembly {
    /// Append another assembly, preserving order
    pub fn extend(&mut self, other: RingAssembly) {
        self.rings.extend(other.rings);
        self.islands.extend(other.islands);
        self.unclosed.extend(other.unclosed);
        self.diagnostics.extend(other.diagnostics);
    }
}

/// Builds closed rings from relation members or standalone fragments
#[derive(Debug, Clone, Copy)]
pub struct RingAssembler {
    merger: ContinuityMerger,
    extract_islands: bool,
    retain_unclosed: bool,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl RingAssembler {
    pub fn new(config: &CategoryConfig) -> Self {
        Self {
            merger: ContinuityMerger::new(),
            extract_islands: config.extract_islands,
            retain_unclosed: config.retain_unclosed,
        }
    }

    /// Merge and polygonize the members of one relation
    pub fn assemble_group(&self, group: &RelationGroup) -> RingAssembly {
        tracing::debug!(
            "Relation {}: assembling {} outer and {} inner members",
            group.relation_id,
            group.outer.len(),
            group.inner.len()
        );

        let mut assembly = RingAssembly::default();
        let outer = self
            .merger
            .merge(group.outer.iter().map(Strand::from).collect());
        for strand in outer {
            if let Some(ring) = self.close(strand, &mut assembly) {
                assembly.rings.push(ring);
            }
        }

        if self.extract_islands && !group.inner.is_empty() {
            let inner = self
                .merger
                .merge(group.inner.iter().map(Strand::from).collect());
            for strand in inner {
                if let Some(mut island) = self.close(strand, &mut assembly) {
                    island.category = FeatureCategory::Island;
                    island.level = 0;
                    assembly.islands.push(island);
                }
            }
        }

        assembly
    }

    /// Polygonize fragments that are rings on their own, without merging
    pub fn assemble_standalone(&self, strands: Vec<Strand>) -> RingAssembly {
        let mut assembly = RingAssembly::default();
        for strand in strands {
            if let Some(ring) = self.close(strand, &mut assembly) {
                assembly.rings.push(ring);
            }
        }
        assembly
    }

    /// Polygonize one strand, recording the failure in `assembly` when it does not close
    fn close(&self, strand: Strand, assembly: &mut RingAssembly) -> Option<RingStrand> {
        match RingStrand::polygonize(strand) {
            Ok(ring) => Some(ring),
            Err((strand, err)) => {
                tracing::debug!("Chain {} is not a ring: {}", strand.seed_id(), err);
                assembly
                    .diagnostics
                    .extend(Diagnostic::from_error(strand.seed_id(), &err));
                if self.retain_unclosed {
                    assembly.unclosed.push(strand);
                }
                None
            }
        }
    }
}

/// Build a territorial boundary from the outer members of a relation
///
/// Outer members are merged and every chain that closes becomes one polygon of the
/// result. Chains that stay open are skipped.
pub fn boundary_from_group(group: &RelationGroup) -> MultiPolygon<f64> {
    let merged = ContinuityMerger::new().merge(group.outer.iter().map(Strand::from).collect());
    let polygons = merged
        .into_iter()
        .filter_map(|strand| match RingStrand::polygonize(strand) {
            Ok(ring) => Some(ring.ring.to_polygon()),
            Err((strand, err)) => {
                tracing::warn!(
                    "Boundary relation {}: skipping open chain {}: {}",
                    group.relation_id,
                    strand.seed_id(),
                    err
                );
                None
            }
        })
        .collect::<Vec<_>>();

    tracing::info!(
        "Boundary relation {} yields {} polygons",
        group.relation_id,
        polygons.len()
    );
    MultiPolygon::new(polygons)
}
