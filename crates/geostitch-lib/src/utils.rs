//! Utility functions for coordinate conversions and exact coordinate matching

use geo::Coord;

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Kilometers per degree of arc on the mean sphere
pub const DEGREE_TO_KM: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;

/// Meters per degree of arc on the mean sphere.
///
/// Areas are approximated as planar degree² areas scaled by this factor squared, which
/// only holds for features that are small relative to the Earth's curvature.
pub const DEGREE_TO_METERS: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

/// Hashable, bit-exact key for a coordinate.
///
/// Two coordinates map to the same key if and only if they compare equal with `==`
/// (`-0.0` is folded into `0.0`). NaN coordinates never match anything by `==`, and
/// their keys are not expected to be looked up.
pub type CoordKey = (u64, u64);

/// Build the exact-match key of a coordinate
#[inline(always)]
pub fn coord_key(coord: Coord<f64>) -> CoordKey {
    // Adding 0.0 turns -0.0 into +0.0 and leaves every other value untouched
    ((coord.x + 0.0).to_bits(), (coord.y + 0.0).to_bits())
}

/// Convert a length in degrees of arc to kilometers
#[inline(always)]
pub fn degrees_to_km(degrees: f64) -> f64 {
    degrees * DEGREE_TO_KM
}

/// Convert a planar area in square degrees to square meters
#[inline(always)]
pub fn square_degrees_to_m2(area: f64) -> f64 {
    area * DEGREE_TO_METERS * DEGREE_TO_METERS
}

/// Planar distance between two coordinates, in degrees
#[inline(always)]
pub fn planar_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degree_constants() {
        assert!((DEGREE_TO_KM - 111.19492664455873).abs() < 1e-9);
        assert!((DEGREE_TO_METERS - DEGREE_TO_KM * 1000.0).abs() < 1e-6);
    }

    #[test]
    fn test_coord_key_negative_zero() {
        let a = coord_key(Coord { x: -0.0, y: 0.0 });
        let b = coord_key(Coord { x: 0.0, y: -0.0 });
        assert_eq!(a, b);
    }

    #[test]
    fn test_coord_key_distinguishes_close_values() {
        let a = coord_key(Coord { x: 121.5, y: 25.0 });
        let b = coord_key(Coord {
            x: 121.5 + 1e-12,
            y: 25.0,
        });
        assert_ne!(a, b);
    }

    #[test]
    fn test_conversions() {
        assert!((degrees_to_km(1.0) - DEGREE_TO_KM).abs() < f64::EPSILON);
        let one_sq_degree = square_degrees_to_m2(1.0);
        assert!((one_sq_degree - DEGREE_TO_METERS.powi(2)).abs() < 1.0);
    }

    #[test]
    fn test_planar_distance() {
        let d = planar_distance(Coord { x: 0.0, y: 0.0 }, Coord { x: 3.0, y: 4.0 });
        assert!((d - 5.0).abs() < f64::EPSILON);
    }
}
