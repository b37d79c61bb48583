//! Feature model: input fragments, merge-internal strands and output features

use crate::{Chain, ClosedRing, StitchError};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of an input fragment (a source way id)
pub type FragmentId = u64;

/// Closed set of feature categories, each with a two-digit output code
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FeatureCategory {
    Water,
    Coastline,
    UndergroundMrt,
    Bridge,
    Island,
    Tunnel,
    Highway,
    HighwayInDesert,
    Building,
    Ferry,
    Village,
    Field,
    Forest,
    Railway,
    CableCar,
}

/// Whether a category is reconstructed as open lines or as closed rings
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FeatureKind {
    Line,
    Ring,
}

impl FeatureCategory {
    /// Every category, in code order
    pub const ALL: [FeatureCategory; 15] = [
        Self::Water,
        Self::Coastline,
        Self::UndergroundMrt,
        Self::Bridge,
        Self::Island,
        Self::Tunnel,
        Self::Highway,
        Self::HighwayInDesert,
        Self::Building,
        Self::Ferry,
        Self::Village,
        Self::Field,
        Self::Forest,
        Self::Railway,
        Self::CableCar,
    ];

    /// Numeric category code written to the output
    pub fn code(self) -> u8 {
        match self {
            Self::Water => 1,
            Self::Coastline => 2,
            Self::UndergroundMrt => 3,
            Self::Bridge => 4,
            Self::Island => 5,
            Self::Tunnel => 6,
            Self::Highway => 7,
            Self::HighwayInDesert => 8,
            Self::Building => 9,
            Self::Ferry => 10,
            Self::Village => 11,
            Self::Field => 12,
            Self::Forest => 13,
            Self::Railway => 14,
            Self::CableCar => 15,
        }
    }

    /// Look a category up by its numeric code
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// Default reconstruction kind of the category
    pub fn kind(self) -> FeatureKind {
        match self {
            Self::Water
            | Self::Island
            | Self::Building
            | Self::Village
            | Self::Field
            | Self::Forest => FeatureKind::Ring,
            _ => FeatureKind::Line,
        }
    }

    /// snake_case name, as used in input feeds and configuration files
    pub fn name(self) -> &'static str {
        match self {
            Self::Water => "water",
            Self::Coastline => "coastline",
            Self::UndergroundMrt => "underground_mrt",
            Self::Bridge => "bridge",
            Self::Island => "island",
            Self::Tunnel => "tunnel",
            Self::Highway => "highway",
            Self::HighwayInDesert => "highway_in_desert",
            Self::Building => "building",
            Self::Ferry => "ferry",
            Self::Village => "village",
            Self::Field => "field",
            Self::Forest => "forest",
            Self::Railway => "railway",
            Self::CableCar => "cable_car",
        }
    }
}

impl fmt::Display for FeatureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.code())
    }
}

impl FromStr for FeatureCategory {
    type Err = StitchError;

    /// Accepts the snake_case name or the numeric code
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<u8>() {
            return Self::from_code(code)
                .ok_or_else(|| StitchError::UnknownCategory(s.to_string()));
        }
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| StitchError::UnknownCategory(s.to_string()))
    }
}

/// Access to the chain of anything that carries one
pub trait HasChain {
    fn chain(&self) -> &Chain;
}

/// One atomic input polyline with identity metadata
///
/// Fragments are never mutated once built; merging produces new [`Strand`]s.
#[derive(Clone, Debug, PartialEq)]
pub struct Fragment {
    pub id: FragmentId,
    pub name: Option<String>,
    pub category: FeatureCategory,
    pub level: i32,
    pub chain: Chain,
}

impl Fragment {
    pub fn new(
        id: FragmentId,
        name: Option<String>,
        category: FeatureCategory,
        level: i32,
        chain: Chain,
    ) -> Self {
        Self {
            id,
            name,
            category,
            level,
            chain,
        }
    }
}

impl HasChain for Fragment {
    #[inline]
    fn chain(&self) -> &Chain {
        &self.chain
    }
}

/// A merged (or not yet merged) chain together with the fragment ids it is made of
///
/// `constituents` is kept in the order fragments were absorbed; the output id of the
/// strand is later drawn from it. Metadata comes from the seed fragment.
#[derive(Clone, Debug, PartialEq)]
pub struct Strand {
    pub constituents: Vec<FragmentId>,
    pub name: Option<String>,
    pub category: FeatureCategory,
    pub level: i32,
    pub chain: Chain,
}

impl Strand {
    /// Seed fragment id
    #[inline]
    pub fn seed_id(&self) -> FragmentId {
        self.constituents[0]
    }

    /// Same metadata and constituents, different geometry
    pub(crate) fn with_chain(&self, chain: Chain) -> Self {
        Self {
            constituents: self.constituents.clone(),
            name: self.name.clone(),
            category: self.category,
            level: self.level,
            chain,
        }
    }
}

impl From<&Fragment> for Strand {
    fn from(fragment: &Fragment) -> Self {
        Self {
            constituents: vec![fragment.id],
            name: fragment.name.clone(),
            category: fragment.category,
            level: fragment.level,
            chain: fragment.chain.clone(),
        }
    }
}

impl HasChain for Strand {
    #[inline]
    fn chain(&self) -> &Chain {
        &self.chain
    }
}

/// Output geometry: an open chain or a closed ring
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Line(Chain),
    Ring(ClosedRing),
}

impl Geometry {
    #[inline]
    pub fn chain(&self) -> &Chain {
        match self {
            Geometry::Line(chain) => chain,
            Geometry::Ring(ring) => ring.chain(),
        }
    }

    #[inline]
    pub fn is_ring(&self) -> bool {
        matches!(self, Geometry::Ring(_))
    }
}

/// One reconstructed output feature
#[derive(Clone, Debug, PartialEq)]
pub struct MergedFeature {
    pub polygon_id: FragmentId,
    pub name: Option<String>,
    pub category: FeatureCategory,
    pub level: i32,
    pub geometry: Geometry,
}

impl MergedFeature {
    /// Approximate length of the feature's chain in kilometers
    pub fn length_km(&self) -> f64 {
        self.geometry.chain().approx_length_km()
    }
}

impl HasChain for MergedFeature {
    #[inline]
    fn chain(&self) -> &Chain {
        self.geometry.chain()
    }
}
