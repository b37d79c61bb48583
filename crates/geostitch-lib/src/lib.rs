//! geostitch - Geometry Reconstruction and Merge Engine
//!
//! This library rebuilds geographic features (coastlines, roads, water bodies,
//! administrative rings, buildings) from disconnected map fragments. Fragments are
//! stitched into continuous lines or closed rings by exact endpoint matching, long
//! results are re-split at length thresholds, slivers are dropped, and everything is
//! restricted to a territorial boundary.
//!
//! # Architecture
//!
//! - **[`Chain`] / [`ClosedRing`]**: geometry primitives with approximate length and area
//! - **[`SpatialIndex`]**: quadtree for bulk intersects-queries against a clip polygon
//! - **[`ContinuityMerger`]**: endpoint-continuity merging into maximal chains
//! - **[`RingAssembler`]**: relation outer/inner ring assembly and island extraction
//! - **[`ThresholdDivider`]**: bounded-length re-segmentation of long chains
//! - **[`SmallFeatureFilter`]**: area and length based filtering
//! - **[`ParallelReducer`]**: map-reduce merging across rayon workers
//! - **[`Reconstructor`]**: top-level run coordinator owning the used-id set
//!
//! # Performance Characteristics
//!
//! - **Merge**: O(n) expected per comparison class thanks to the endpoint index,
//!   O(n²) worst case on pathological shared endpoints
//! - **Reduce**: W parallel partitions, then ⌈log₂ W⌉ pairwise recombination rounds
//! - **Clip**: O(log D + K) candidate lookup per query, exact tests in parallel

mod chain;
mod config;
mod diagnostics;
mod divide;
mod engine;
mod feature;
mod filter;
mod ids;
mod merge;
mod reduce;
mod relation;
mod rings;
mod spatial_index;
pub mod utils;

// Public API exports
pub use chain::{Chain, ClosedRing};
pub use config::{CategoryConfig, ComparisonKey, Config};
pub use diagnostics::{Diagnostic, DiagnosticReason};
pub use divide::{ThresholdDivider, divide_feature};
pub use engine::{Reconstructor, RunInput, RunOutput, RunStats};
pub use feature::{
    FeatureCategory, FeatureKind, Fragment, FragmentId, Geometry, HasChain, MergedFeature,
    Strand,
};
pub use filter::SmallFeatureFilter;
pub use ids::UsedIds;
pub use merge::ContinuityMerger;
pub use reduce::ParallelReducer;
pub use relation::{RelationGroup, RelationMember, Role, build_relation_groups};
pub use rings::{RingAssembler, RingAssembly, RingStrand, boundary_from_group};
pub use spatial_index::{SpatialIndex, clip_to_boundary};

/// Error types for the reconstruction engine
///
/// None of these are fatal to a run: the engine turns them into [`Diagnostic`]s.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StitchError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Relation {relation_id} references missing fragment {member_id}")]
    UnresolvedRelationMember { relation_id: u64, member_id: FragmentId },

    #[error("Empty partition")]
    EmptyPartition,

    #[error("Polygonization failure: {0}")]
    PolygonizationFailure(String),

    #[error("Unknown feature category: {0}")]
    UnknownCategory(String),

    #[error("Unknown relation member role: {0}")]
    UnknownRole(String),
}

pub type Result<T> = std::result::Result<T, StitchError>;
