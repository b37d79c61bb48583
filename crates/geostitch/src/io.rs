//! JSON documents read and written by the binary
//!
//! Coordinates are `[lon, lat]` pairs in degrees. Categories are accepted by
//! snake_case name or numeric code and written back as the two-digit code plus name.

use crate::error::{CliError, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use geostitch_lib::{
    Config, Diagnostic, FeatureCategory, FragmentId, Geometry, MergedFeature, RelationMember,
    RunInput, RunStats, boundary_from_group, build_relation_groups,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// One input way
#[derive(Debug, Clone, Deserialize)]
pub struct FragmentRecord {
    pub id: FragmentId,
    #[serde(default)]
    pub name: Option<String>,
    pub category: String,
    #[serde(default)]
    pub level: i32,
    pub coordinates: Vec<[f64; 2]>,
}

/// Input document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputDocument {
    #[serde(default)]
    pub fragments: Vec<FragmentRecord>,
    #[serde(default)]
    pub members: Vec<RelationMember>,
    /// Polygons of rings of points; the first ring of each polygon is the exterior
    #[serde(default)]
    pub boundary: Option<Vec<Vec<Vec<[f64; 2]>>>>,
}

impl InputDocument {
    /// Convert into engine input
    ///
    /// With `boundary_relation`, that relation's members are turned into the clip
    /// boundary and removed from the member list.
    pub fn into_run_input(self, boundary_relation: Option<u64>) -> Result<RunInput> {
        let mut input = RunInput::default();
        for record in self.fragments {
            let category = record
                .category
                .parse::<FeatureCategory>()
                .map_err(|source| CliError::Category {
                    id: record.id,
                    source,
                })?;
            input.add_raw(
                record.id,
                record.name,
                category,
                record.level,
                record.coordinates.iter().map(|p| to_coord(*p)).collect(),
            );
        }

        match boundary_relation {
            Some(relation_id) => {
                let (boundary_members, members): (Vec<_>, Vec<_>) = self
                    .members
                    .into_iter()
                    .partition(|m| m.relation_id == relation_id);
                let by_id: HashMap<FragmentId, _> =
                    input.fragments.iter().map(|f| (f.id, f)).collect();
                let (groups, _) = build_relation_groups(&boundary_members, &by_id);
                let boundary = groups
                    .first()
                    .map(boundary_from_group)
                    .filter(|b| !b.0.is_empty())
                    .ok_or(CliError::EmptyBoundary(relation_id))?;
                input.members = members;
                input.boundary = Some(boundary);
            }
            None => {
                input.members = self.members;
                input.boundary = self.boundary.map(to_multipolygon);
            }
        }

        Ok(input)
    }
}

fn to_coord([x, y]: [f64; 2]) -> Coord<f64> {
    Coord { x, y }
}

fn to_multipolygon(polygons: Vec<Vec<Vec<[f64; 2]>>>) -> MultiPolygon<f64> {
    let polygons = polygons
        .into_iter()
        .filter(|rings| !rings.is_empty())
        .map(|rings| {
            let mut rings = rings
                .into_iter()
                .map(|ring| ring.into_iter().map(to_coord).collect::<LineString<f64>>());
            let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
            Polygon::new(exterior, rings.collect())
        })
        .collect();
    MultiPolygon::new(polygons)
}

/// One output feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRecord {
    pub polygon_id: FragmentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Two-digit category code
    pub category: String,
    pub category_name: &'static str,
    pub level: i32,
    /// `line` or `ring`
    pub geometry: &'static str,
    pub coordinates: Vec<[f64; 2]>,
}

impl From<&MergedFeature> for FeatureRecord {
    fn from(feature: &MergedFeature) -> Self {
        Self {
            polygon_id: feature.polygon_id,
            name: feature.name.clone(),
            category: feature.category.to_string(),
            category_name: feature.category.name(),
            level: feature.level,
            geometry: match feature.geometry {
                Geometry::Line(_) => "line",
                Geometry::Ring(_) => "ring",
            },
            coordinates: feature
                .geometry
                .chain()
                .coords()
                .iter()
                .map(|c| [c.x, c.y])
                .collect(),
        }
    }
}

/// Run counters as written to the output
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsRecord {
    pub fragments: usize,
    pub duplicates: usize,
    pub clipped: usize,
    pub relation_groups: usize,
    pub route_members: usize,
    pub rings: usize,
    pub islands: usize,
    pub lines: usize,
    pub unclosed: usize,
    pub dropped_small: usize,
    pub divided: usize,
}

impl From<RunStats> for StatsRecord {
    fn from(stats: RunStats) -> Self {
        Self {
            fragments: stats.fragments,
            duplicates: stats.duplicates,
            clipped: stats.clipped,
            relation_groups: stats.relation_groups,
            route_members: stats.route_members,
            rings: stats.rings,
            islands: stats.islands,
            lines: stats.lines,
            unclosed: stats.unclosed,
            dropped_small: stats.dropped_small,
            divided: stats.divided,
        }
    }
}

/// Output document
#[derive(Debug, Clone, Serialize)]
pub struct OutputDocument {
    pub features: Vec<FeatureRecord>,
    pub rejected: Vec<FeatureRecord>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: StatsRecord,
}

impl OutputDocument {
    pub fn new(
        features: &[MergedFeature],
        rejected: &[MergedFeature],
        diagnostics: Vec<Diagnostic>,
        stats: RunStats,
    ) -> Self {
        Self {
            features: features.iter().map(FeatureRecord::from).collect(),
            rejected: rejected.iter().map(FeatureRecord::from).collect(),
            diagnostics,
            stats: stats.into(),
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_input(path: &Path) -> Result<InputDocument> {
    let document: InputDocument = read_json(path)?;
    tracing::info!(
        "Read {} fragments and {} relation members from {}",
        document.fragments.len(),
        document.members.len(),
        path.display()
    );
    Ok(document)
}

/// Load the configuration file, or the defaults when none is given
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            tracing::info!("Loading configuration from {}", path.display());
            read_json(path)
        }
        None => Ok(Config::default()),
    }
}

pub fn encode(document: &OutputDocument, pretty: bool) -> Result<String> {
    let encoded = if pretty {
        serde_json::to_string_pretty(document)
    } else {
        serde_json::to_string(document)
    };
    encoded.map_err(CliError::Encode)
}
