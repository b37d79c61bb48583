//! Polyline and ring primitives
//!
//! A [`Chain`] is an ordered sequence of at least two coordinates. Chains are treated as
//! undirected for merging purposes: a chain and its reverse describe the same path.
//! A [`ClosedRing`] is a chain whose head equals its tail.

use crate::{Result, StitchError, utils};
use geo::{Area, BoundingRect, Coord, LineString, Polygon, Rect};

/// Ordered coordinate sequence with at least two points
#[derive(Clone, Debug, PartialEq)]
pub struct Chain(LineString<f64>);

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Chain {
    /// Create a chain from raw coordinates
    ///
    /// Fails with [`StitchError::InvalidGeometry`] when fewer than two points are given.
    pub fn new(coords: Vec<Coord<f64>>) -> Result<Self> {
        if coords.len() < 2 {
            return Err(StitchError::InvalidGeometry(format!(
                "chain needs at least 2 points, got {}",
                coords.len()
            )));
        }
        Ok(Self(LineString::new(coords)))
    }

    /// Create a chain from `(lon, lat)` pairs
    pub fn from_lon_lat(points: &[(f64, f64)]) -> Result<Self> {
        Self::new(points.iter().map(|&(x, y)| Coord { x, y }).collect())
    }

    /// First coordinate
    #[inline]
    pub fn head(&self) -> Coord<f64> {
        self.0.0[0]
    }

    /// Last coordinate
    #[inline]
    pub fn tail(&self) -> Coord<f64> {
        self.0.0[self.0.0.len() - 1]
    }

    /// New chain with the coordinate order inverted
    pub fn reversed(&self) -> Self {
        let mut coords = self.0.0.clone();
        coords.reverse();
        Self(LineString::new(coords))
    }

    /// Append `other` after `self`, dropping the duplicated shared endpoint
    ///
    /// The caller is responsible for `self.tail() == other.head()`; the head of `other`
    /// is dropped unconditionally.
    pub fn concat(&self, other: &Chain) -> Self {
        let mut coords = Vec::with_capacity(self.len() + other.len() - 1);
        coords.extend_from_slice(&self.0.0);
        coords.extend_from_slice(&other.0.0[1..]);
        Self(LineString::new(coords))
    }

    /// Whether head and tail coincide
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.head() == self.tail()
    }

    /// Approximate length in kilometers (planar degree length scaled to the mean sphere)
    pub fn approx_length_km(&self) -> f64 {
        let degrees: f64 = self
            .0
            .0
            .windows(2)
            .map(|pair| utils::planar_distance(pair[0], pair[1]))
            .sum();
        utils::degrees_to_km(degrees)
    }

    /// Approximate enclosed area in square meters (planar shoelace area in degree space)
    ///
    /// Only meaningful for closed chains. An open chain is implicitly closed by the
    /// polygon constructor.
    pub fn approx_area_m2(&self) -> f64 {
        let polygon = Polygon::new(self.0.clone(), vec![]);
        utils::square_degrees_to_m2(polygon.unsigned_area())
    }

    /// Bounding rectangle in degrees
    pub fn bounding_rect(&self) -> Rect<f64> {
        // A chain always has points, so the bounding rect always exists
        self.0
            .bounding_rect()
            .unwrap_or_else(|| Rect::new(self.head(), self.head()))
    }

    /// All coordinates in order
    #[inline]
    pub fn coords(&self) -> &[Coord<f64>] {
        &self.0.0
    }

    /// Number of coordinates
    #[inline]
    pub fn len(&self) -> usize {
        self.0.0.len()
    }

    /// A chain is never empty; provided for API symmetry with `len`
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Borrow the underlying line string
    #[inline]
    pub fn line_string(&self) -> &LineString<f64> {
        &self.0
    }
}

impl TryFrom<LineString<f64>> for Chain {
    type Error = StitchError;

    fn try_from(line: LineString<f64>) -> Result<Self> {
        Self::new(line.0)
    }
}

impl From<Chain> for LineString<f64> {
    fn from(chain: Chain) -> Self {
        chain.0
    }
}

/// A chain whose head equals its tail: the boundary of a polygon
#[derive(Clone, Debug, PartialEq)]
pub struct ClosedRing(Chain);

impl ClosedRing {
    /// The boundary chain
    #[inline]
    pub fn chain(&self) -> &Chain {
        &self.0
    }

    /// Build the polygon enclosed by this ring
    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(self.0.line_string().clone(), vec![])
    }

    /// Approximate enclosed area in square meters
    #[inline]
    pub fn approx_area_m2(&self) -> f64 {
        self.0.approx_area_m2()
    }

    /// Unwrap into the boundary chain
    pub fn into_chain(self) -> Chain {
        self.0
    }
}

impl TryFrom<Chain> for ClosedRing {
    type Error = StitchError;

    /// Polygonize a chain; fails when head and tail differ or when the ring cannot
    /// enclose an area (fewer than four points)
    fn try_from(chain: Chain) -> Result<Self> {
        if !chain.is_closed() {
            return Err(StitchError::PolygonizationFailure(format!(
                "chain is open: head {:?} != tail {:?}",
                chain.head(),
                chain.tail()
            )));
        }
        if chain.len() < 4 {
            return Err(StitchError::PolygonizationFailure(format!(
                "closed chain has only {} points",
                chain.len()
            )));
        }
        Ok(Self(chain))
    }
}
