//! Geodesic helpers shared by the elevation pipeline and the A* heuristics.

use geo::{Coord, LineString};
use itertools::Itertools;

/// Mean earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two (lon, lat) coordinates in meters.
///
/// Haversine on a spherical earth. Accurate to well under a centimeter per
/// kilometer, which is all the sampling and heuristics here need.
pub fn sphere_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let lat1 = a.y.to_radians();
    let lat2 = b.y.to_radians();
    let delta_lat = (b.y - a.y).to_radians();
    let delta_lon = (b.x - a.x).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);

    EARTH_RADIUS_M * 2.0 * h.sqrt().asin()
}

/// Total geodesic length of a polyline in meters.
pub fn line_length_m(line: &LineString<f64>) -> f64 {
    line.coords()
        .tuple_windows()
        .map(|(a, b)| sphere_distance(*a, *b))
        .sum()
}

/// Linear interpolation between two coordinates.
///
/// The interpolation is done in plain (lon, lat) space; segments are short
/// enough in street data that the planar approximation is fine.
pub fn point_along_segment(a: Coord<f64>, b: Coord<f64>, fraction: f64) -> Coord<f64> {
    Coord {
        x: a.x + fraction * (b.x - a.x),
        y: a.y + fraction * (b.y - a.y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;

    #[test]
    fn seattle_to_portland() {
        // Roughly 233 km apart
        let seattle = Coord {
            x: -122.3321,
            y: 47.6062,
        };
        let portland = Coord {
            x: -122.6784,
            y: 45.5152,
        };
        let d = sphere_distance(seattle, portland);
        assert!((d - 233_000.0).abs() < 5_000.0);
    }

    #[test]
    fn one_degree_of_longitude_at_the_equator() {
        let a = Coord { x: 0.0, y: 0.0 };
        let b = Coord { x: 1.0, y: 0.0 };
        let d = sphere_distance(a, b);
        // one degree of arc on the mean-radius sphere
        let expected = EARTH_RADIUS_M * 1.0_f64.to_radians();
        assert!((d - expected).abs() < 1e-6 * expected);
    }

    #[test]
    fn zero_distance() {
        let a = Coord { x: 10.0, y: 50.0 };
        assert_eq!(sphere_distance(a, a), 0.0);
    }

    #[test]
    fn polyline_length_sums_segments() {
        let line = line_string![
            (x: 0.0, y: 0.0),
            (x: 0.001, y: 0.0),
            (x: 0.002, y: 0.0),
        ];
        let total = line_length_m(&line);
        let single = sphere_distance(Coord { x: 0.0, y: 0.0 }, Coord { x: 0.001, y: 0.0 });
        assert!((total - 2.0 * single).abs() < 1e-9);
    }

    #[test]
    fn interpolation_endpoints() {
        let a = Coord { x: 1.0, y: 2.0 };
        let b = Coord { x: 3.0, y: 6.0 };
        assert_eq!(point_along_segment(a, b, 0.0), a);
        assert_eq!(point_along_segment(a, b, 1.0), b);
        let mid = point_along_segment(a, b, 0.5);
        assert_eq!(mid, Coord { x: 2.0, y: 4.0 });
    }
}
