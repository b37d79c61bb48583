//! Run coordinator
//!
//! [`Reconstructor::run`] takes one batch of fragments and relation members through the
//! whole pipeline:
//!
//! 1. Drop duplicate fragment ids
//! 2. Resolve relation members against the pool
//! 3. Clip fragments to the territorial boundary, if any
//! 4. Assemble rings: standalone closed fragments, then relation groups, then islands
//! 5. Merge line fragments per comparison class with the parallel reducer, after
//!    merging the members of each line relation among themselves
//! 6. Drop small rings and short lines
//! 7. Re-divide long lines of categories with division enabled
//! 8. Assign output ids sequentially
//!
//! Every per-feature failure ends up in the returned diagnostics; nothing aborts a run.

use crate::{
    Chain, ComparisonKey, Config, ContinuityMerger, Diagnostic, DiagnosticReason,
    FeatureCategory, FeatureKind, Fragment, FragmentId, Geometry, HasChain, MergedFeature,
    ParallelReducer, RelationGroup, RelationMember, RingAssembler, RingAssembly, RingStrand,
    SmallFeatureFilter, Strand, ThresholdDivider, UsedIds, build_relation_groups,
    clip_to_boundary, divide_feature,
};
use geo::{Coord, MultiPolygon};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};

/// One batch of input
#[derive(Debug, Clone, Default)]
pub struct RunInput {
    pub fragments: Vec<Fragment>,
    pub members: Vec<RelationMember>,
    /// Territorial clip region; `None` keeps everything
    pub boundary: Option<MultiPolygon<f64>>,
    /// Input records rejected before they became fragments
    rejected: Vec<Diagnostic>,
}

impl RunInput {
    pub fn new(fragments: Vec<Fragment>, members: Vec<RelationMember>) -> Self {
        Self {
            fragments,
            members,
            boundary: None,
            rejected: Vec::new(),
        }
    }

    pub fn with_boundary(mut self, boundary: MultiPolygon<f64>) -> Self {
        self.boundary = Some(boundary);
        self
    }

    /// Add a fragment from raw coordinates
    ///
    /// Coordinates that do not form a valid chain are recorded as an
    /// [`DiagnosticReason::InvalidGeometry`] diagnostic of the run instead.
    pub fn add_raw(
        &mut self,
        id: FragmentId,
        name: Option<String>,
        category: FeatureCategory,
        level: i32,
        coords: Vec<Coord<f64>>,
    ) {
        match Chain::new(coords) {
            Ok(chain) => self
                .fragments
                .push(Fragment::new(id, name, category, level, chain)),
            Err(err) => {
                tracing::debug!("Fragment {} rejected: {}", id, err);
                self.rejected.extend(Diagnostic::from_error(id, &err));
            }
        }
    }
}

/// Counters of one run, logged at the end and returned to the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub fragments: usize,
    pub duplicates: usize,
    pub clipped: usize,
    pub relation_groups: usize,
    /// Line fragments merged within their relation before class merging
    pub route_members: usize,
    pub rings: usize,
    pub islands: usize,
    pub lines: usize,
    pub unclosed: usize,
    pub dropped_small: usize,
    pub divided: usize,
}

/// Result of one run
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    /// Reconstructed features with unique `polygon_id`s
    pub features: Vec<MergedFeature>,
    pub diagnostics: Vec<Diagnostic>,
    /// Ring chains that could not be closed, carrying their seed id
    pub rejected: Vec<MergedFeature>,
    /// Fragments the run worked on: deduplicated and clipped to the boundary
    pub fragments: Vec<Fragment>,
    pub stats: RunStats,
}

/// Comparison class of a line fragment: category, plus level when the category asks for it
type LineClass = (FeatureCategory, Option<i32>);

/// Top-level coordinator owning the configuration of a reconstruction run
#[derive(Debug, Clone, Default)]
pub struct Reconstructor {
    config: Config,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Reconstructor {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the whole pipeline over one batch
    pub fn run(&self, input: RunInput) -> RunOutput {
        #[cfg(feature = "profiling")]
        profiling::scope!("engine::run");

        let RunInput {
            fragments: raw,
            members,
            boundary,
            rejected,
        } = input;
        let mut diagnostics = rejected;
        let mut stats = RunStats::default();

        tracing::info!(
            "[1/8] Validating {} fragments and {} relation members",
            raw.len(),
            members.len()
        );
        let mut seen = HashSet::with_capacity(raw.len());
        let mut fragments = Vec::with_capacity(raw.len());
        for fragment in raw {
            if seen.insert(fragment.id) {
                fragments.push(fragment);
            } else {
                stats.duplicates += 1;
                diagnostics.push(Diagnostic::new(
                    fragment.id,
                    DiagnosticReason::DuplicateFragment,
                    "fragment id appears more than once, first occurrence kept",
                ));
            }
        }
        stats.fragments = fragments.len();

        tracing::info!("[2/8] Resolving relation members");
        let (mut groups, relation_diagnostics) = {
            let by_id: HashMap<FragmentId, &Fragment> =
                fragments.iter().map(|f| (f.id, f)).collect();
            build_relation_groups(&members, &by_id)
        };
        diagnostics.extend(relation_diagnostics);
        let ring_members: HashSet<FragmentId> = groups
            .iter()
            .filter(|group| group_category(group).is_some_and(|c| c.kind() == FeatureKind::Ring))
            .flat_map(|group| group.member_ids())
            .collect();

        if let Some(boundary) = &boundary {
            tracing::info!("[3/8] Clipping to boundary");
            let before = fragments.len();
            fragments = clip_to_boundary(fragments, boundary);
            stats.clipped = before - fragments.len();

            let kept: HashSet<FragmentId> = fragments.iter().map(|f| f.id).collect();
            for group in &mut groups {
                group.outer.retain(|f| kept.contains(&f.id));
                group.inner.retain(|f| kept.contains(&f.id));
            }
            groups.retain(|group| !group.is_empty());
        } else {
            tracing::info!("[3/8] No boundary, keeping every fragment");
        }
        stats.relation_groups = groups.len();

        // Line relations (routes) are merged on their own first, so a route keeps its
        // ways together where it crosses other ways of the same class. Their strands
        // lead the class pools.
        let merger = ContinuityMerger::new();
        let mut route_members: HashSet<FragmentId> = HashSet::new();
        let mut line_classes: BTreeMap<LineClass, Vec<Strand>> = BTreeMap::new();
        for group in groups
            .iter()
            .filter(|group| group_category(group).is_some_and(|c| c.kind() == FeatureKind::Line))
        {
            let mut classes: BTreeMap<LineClass, Vec<Strand>> = BTreeMap::new();
            for fragment in group.outer.iter().chain(&group.inner) {
                if fragment.category.kind() == FeatureKind::Line
                    && route_members.insert(fragment.id)
                {
                    classes
                        .entry(self.line_class(fragment))
                        .or_default()
                        .push(Strand::from(fragment));
                }
            }
            for (class, pool) in classes {
                line_classes
                    .entry(class)
                    .or_default()
                    .extend(merger.merge(pool));
            }
        }
        stats.route_members = route_members.len();

        let mut standalone_rings: BTreeMap<FeatureCategory, Vec<Strand>> = BTreeMap::new();
        for fragment in &fragments {
            match fragment.category.kind() {
                FeatureKind::Ring if ring_members.contains(&fragment.id) => {}
                FeatureKind::Ring => standalone_rings
                    .entry(fragment.category)
                    .or_default()
                    .push(Strand::from(fragment)),
                FeatureKind::Line if route_members.contains(&fragment.id) => {}
                FeatureKind::Line => line_classes
                    .entry(self.line_class(fragment))
                    .or_default()
                    .push(Strand::from(fragment)),
            }
        }

        tracing::info!(
            "[4/8] Assembling rings: {} standalone categories, {} relations",
            standalone_rings.len(),
            groups.len()
        );
        let mut standalone = RingAssembly::default();
        for (category, strands) in standalone_rings {
            standalone.extend(
                RingAssembler::new(self.config.category(category)).assemble_standalone(strands),
            );
        }
        let relation_assemblies: Vec<RingAssembly> = groups
            .par_iter()
            .filter_map(|group| {
                let category = group_category(group)?;
                if category.kind() != FeatureKind::Ring {
                    tracing::debug!(
                        "Relation {} has line category {}, merged as a route",
                        group.relation_id,
                        category.name()
                    );
                    return None;
                }
                Some(RingAssembler::new(self.config.category(category)).assemble_group(group))
            })
            .collect();
        let mut relations = RingAssembly::default();
        for assembly in relation_assemblies {
            relations.extend(assembly);
        }
        diagnostics.append(&mut standalone.diagnostics);
        diagnostics.append(&mut relations.diagnostics);

        tracing::info!("[5/8] Merging {} line classes", line_classes.len());
        let reducer = ParallelReducer::from_config(&self.config);
        let mut lines: Vec<Strand> = Vec::new();
        for ((category, level), pool) in line_classes {
            tracing::debug!(
                "Merging {} {} fragments at level {:?}",
                pool.len(),
                category.name(),
                level
            );
            lines.extend(reducer.reduce(pool));
        }

        tracing::info!("[6/8] Filtering small features");
        let before_filter =
            standalone.rings.len() + relations.rings.len() + relations.islands.len() + lines.len();
        standalone.rings = self.filter_by_category(standalone.rings);
        relations.rings = self.filter_by_category(relations.rings);
        relations.islands = self.filter_by_category(relations.islands);
        lines = self.filter_by_category(lines);
        stats.dropped_small = before_filter
            - (standalone.rings.len()
                + relations.rings.len()
                + relations.islands.len()
                + lines.len());

        tracing::info!("[7/8] Dividing long lines");
        let by_id: HashMap<FragmentId, &Fragment> = fragments.iter().map(|f| (f.id, f)).collect();
        let mut divided_lines = Vec::with_capacity(lines.len());
        for strand in lines {
            let settings = self.config.category(strand.category);
            if !settings.divide || strand.chain.approx_length_km() <= settings.length_threshold_km
            {
                divided_lines.push(strand);
                continue;
            }
            let pool: Vec<Strand> = strand
                .constituents
                .iter()
                .filter_map(|id| by_id.get(id))
                .map(|fragment| Strand::from(*fragment))
                .collect();
            let segments =
                ThresholdDivider::from_category(settings).divide(&strand.chain, pool);
            stats.divided += segments.len();
            divided_lines.extend(segments);
        }

        tracing::info!("[8/8] Assigning ids");
        let mut used = UsedIds::new();
        let mut features = Vec::new();
        let mut emit_ring = |ring: RingStrand, used: &mut UsedIds| {
            let (polygon_id, diagnostic) = used.assign(&ring.constituents);
            diagnostics.extend(diagnostic);
            features.push(MergedFeature {
                polygon_id,
                name: ring.name,
                category: ring.category,
                level: ring.level,
                geometry: Geometry::Ring(ring.ring),
            });
        };
        stats.rings = standalone.rings.len() + relations.rings.len();
        stats.islands = relations.islands.len();
        for ring in standalone
            .rings
            .into_iter()
            .chain(relations.rings)
            .chain(relations.islands)
        {
            emit_ring(ring, &mut used);
        }

        stats.lines = divided_lines.len();
        for strand in divided_lines {
            let (polygon_id, diagnostic) = used.assign(&strand.constituents);
            diagnostics.extend(diagnostic);
            features.push(MergedFeature {
                polygon_id,
                name: strand.name,
                category: strand.category,
                level: strand.level,
                geometry: Geometry::Line(strand.chain),
            });
        }

        let rejected: Vec<MergedFeature> = standalone
            .unclosed
            .into_iter()
            .chain(relations.unclosed)
            .map(|strand| MergedFeature {
                polygon_id: strand.seed_id(),
                name: strand.name,
                category: strand.category,
                level: strand.level,
                geometry: Geometry::Line(strand.chain),
            })
            .collect();
        stats.unclosed = rejected.len();

        tracing::info!(
            "Run complete: {} rings, {} islands, {} lines, {} rejected, {} diagnostics",
            stats.rings,
            stats.islands,
            stats.lines,
            stats.unclosed,
            diagnostics.len()
        );

        RunOutput {
            features,
            diagnostics,
            rejected,
            fragments,
            stats,
        }
    }

    fn line_class(&self, fragment: &Fragment) -> LineClass {
        let level = match self.config.category(fragment.category).comparison_key {
            ComparisonKey::Category => None,
            ComparisonKey::CategoryAndLevel => Some(fragment.level),
        };
        (fragment.category, level)
    }

    /// Re-divide previously emitted features by id
    ///
    /// Features listed in `targets` are rebuilt from `fragments` and split with their
    /// category's thresholds; the others are passed through. Ids of the passed-through
    /// features stay reserved, so new segment ids never collide with them.
    pub fn redivide(
        &self,
        features: Vec<MergedFeature>,
        targets: &[FragmentId],
        fragments: &[Fragment],
    ) -> (Vec<MergedFeature>, Vec<Diagnostic>) {
        let targets: HashSet<FragmentId> = targets.iter().copied().collect();
        let mut used = UsedIds::new();
        for feature in features.iter().filter(|f| !targets.contains(&f.polygon_id)) {
            used.reserve(feature.polygon_id);
        }

        let mut diagnostics = Vec::new();
        let mut output = Vec::with_capacity(features.len());
        for feature in features {
            if !targets.contains(&feature.polygon_id) {
                output.push(feature);
                continue;
            }

            let segments =
                divide_feature(&feature, fragments, self.config.category(feature.category));
            if segments.is_empty() {
                tracing::warn!(
                    "No fragments found for feature {}, keeping it undivided",
                    feature.polygon_id
                );
                used.reserve(feature.polygon_id);
                output.push(feature);
                continue;
            }

            for segment in segments {
                let (polygon_id, diagnostic) = used.assign(&segment.constituents);
                diagnostics.extend(diagnostic);
                output.push(MergedFeature {
                    polygon_id,
                    name: feature.name.clone(),
                    category: feature.category,
                    level: feature.level,
                    geometry: Geometry::Line(segment.chain),
                });
            }
        }

        (output, diagnostics)
    }

    /// Apply each item's category thresholds
    fn filter_by_category<T: HasChain + Categorized>(&self, items: Vec<T>) -> Vec<T> {
        let mut by_category: HashMap<FeatureCategory, SmallFeatureFilter> = HashMap::new();
        items
            .into_iter()
            .filter(|item| {
                by_category
                    .entry(item.category())
                    .or_insert_with(|| {
                        SmallFeatureFilter::from_category(self.config.category(item.category()))
                    })
                    .keeps(item)
            })
            .collect()
    }
}

/// Category of a relation: the category of its first member
fn group_category(group: &RelationGroup) -> Option<FeatureCategory> {
    group
        .outer
        .first()
        .or_else(|| group.inner.first())
        .map(|fragment| fragment.category)
}

/// Items that carry a feature category
trait Categorized {
    fn category(&self) -> FeatureCategory;
}

impl Categorized for Strand {
    fn category(&self) -> FeatureCategory {
        self.category
    }
}

impl Categorized for RingStrand {
    fn category(&self) -> FeatureCategory {
        self.category
    }
}
