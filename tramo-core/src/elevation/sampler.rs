//! Samples an edge's polyline into an arc-length elevation profile.
//!
//! Walks the segments of the geometry, tracking cumulative geodesic distance,
//! and queries the coverage at every multiple of the configured sample
//! spacing. Any failed query abandons the whole edge; per-point outcomes are
//! tallied in process-wide counters so the driver can judge overall coverage
//! quality.

use std::sync::atomic::{AtomicUsize, Ordering};

use geo::{Coord, LineString};

use super::coverage::{Coverage, CoverageError};
use super::geoid;
use crate::geometry::{point_along_segment, sphere_distance};
use crate::model::{ElevationProfile, ProfileSample};

/// Process-wide tallies of coverage queries.
#[derive(Debug, Default)]
pub struct SampleCounters {
    pub points_evaluated: AtomicUsize,
    pub points_outside_coverage: AtomicUsize,
}

#[derive(Debug, Clone)]
pub struct SamplerSettings {
    pub distance_between_samples_m: f64,
    pub elevation_unit_multiplier: f64,
    pub include_ellipsoid_to_geoid_difference: bool,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            distance_between_samples_m: crate::DEFAULT_DISTANCE_BETWEEN_SAMPLES_M,
            elevation_unit_multiplier: 1.0,
            include_ellipsoid_to_geoid_difference: true,
        }
    }
}

/// Build the elevation profile for one edge geometry.
///
/// Samples sit at 0, d, 2d, ... along the arc plus one final sample at the
/// total length; an intermediate sample closer than half a spacing to the end
/// is dropped in favor of the final one.
pub fn sample_edge_profile(
    edge_geometry: &LineString<f64>,
    coverage: &mut (dyn Coverage + Send),
    settings: &SamplerSettings,
    counters: &SampleCounters,
) -> Result<ElevationProfile, CoverageError> {
    let coords = &edge_geometry.0;
    if coords.len() < 2 {
        return Err(CoverageError::Transform(
            "edge geometry has fewer than two coordinates".to_string(),
        ));
    }

    let mut samples = Vec::new();

    // initial sample (x = 0)
    samples.push(ProfileSample::new(
        0.0,
        sample_elevation(coverage, coords[0], settings, counters)?,
    ));

    // walk the segments, inserting a sample every time the accumulated
    // length passes the next spacing multiple
    let spacing = settings.distance_between_samples_m;
    let mut edge_len_m = 0.0;
    let mut sample_distance = spacing;
    let mut previous_distance = 0.0;
    let mut start = coords[0];
    for &end in &coords[1..] {
        let segment_distance = sphere_distance(start, end);
        edge_len_m += segment_distance;
        while edge_len_m > sample_distance {
            let pct_along_segment = (sample_distance - previous_distance) / segment_distance;
            let at = point_along_segment(start, end, pct_along_segment);
            samples.push(ProfileSample::new(
                sample_distance,
                sample_elevation(coverage, at, settings, counters)?,
            ));
            sample_distance += spacing;
        }
        previous_distance = edge_len_m;
        start = end;
    }

    if edge_len_m <= 0.0 {
        return Err(CoverageError::Transform(
            "edge geometry has zero length".to_string(),
        ));
    }

    // drop an intermediate sample that crowds the final one; never the
    // initial sample
    if samples.len() > 1 && edge_len_m - samples[samples.len() - 1].x < spacing / 2.0 {
        samples.pop();
    }

    // final sample (x = edge length)
    samples.push(ProfileSample::new(
        edge_len_m,
        sample_elevation(coverage, coords[coords.len() - 1], settings, counters)?,
    ));

    Ok(ElevationProfile::new(samples))
}

/// One coverage query, converted to meters above the geoid.
fn sample_elevation(
    coverage: &mut (dyn Coverage + Send),
    at: Coord<f64>,
    settings: &SamplerSettings,
    counters: &SampleCounters,
) -> Result<f64, CoverageError> {
    let raw = match coverage.evaluate(at.x, at.y) {
        Ok(value) => value,
        Err(e) => {
            if e == CoverageError::OutsideCoverage {
                counters.points_outside_coverage.fetch_add(1, Ordering::Relaxed);
            }
            return Err(e);
        }
    };
    counters.points_evaluated.fetch_add(1, Ordering::Relaxed);

    let mut elevation = raw * settings.elevation_unit_multiplier;
    if settings.include_ellipsoid_to_geoid_difference {
        elevation -= geoid::ellipsoid_to_geoid_difference(at.y, at.x);
    }
    Ok(elevation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::EARTH_RADIUS_M;
    use geo::LineString;

    /// Degrees of longitude along the equator spanning `meters`.
    fn lon_deg(meters: f64) -> f64 {
        meters / (EARTH_RADIUS_M * 1.0_f64.to_radians())
    }

    fn no_geoid(spacing: f64) -> SamplerSettings {
        SamplerSettings {
            distance_between_samples_m: spacing,
            elevation_unit_multiplier: 1.0,
            include_ellipsoid_to_geoid_difference: false,
        }
    }

    struct ConstantCoverage(f64);
    impl Coverage for ConstantCoverage {
        fn evaluate(&mut self, _lon: f64, _lat: f64) -> Result<f64, CoverageError> {
            Ok(self.0)
        }
    }

    struct FnCoverage<F: Fn(f64, f64) -> Result<f64, CoverageError>>(F);
    impl<F: Fn(f64, f64) -> Result<f64, CoverageError>> Coverage for FnCoverage<F> {
        fn evaluate(&mut self, lon: f64, lat: f64) -> Result<f64, CoverageError> {
            (self.0)(lon, lat)
        }
    }

    #[test]
    fn flat_hundred_meter_edge_at_ten_meter_spacing() {
        let line = LineString::from(vec![(0.0, 0.0), (lon_deg(100.0), 0.0)]);
        let counters = SampleCounters::default();
        let profile = sample_edge_profile(
            &line,
            &mut ConstantCoverage(25.0),
            &no_geoid(10.0),
            &counters,
        )
        .unwrap();

        assert_eq!(profile.len(), 11);
        for (k, sample) in profile.samples().iter().enumerate().take(10) {
            assert!((sample.x - 10.0 * k as f64).abs() < 1e-9);
            assert_eq!(sample.y, 25.0);
        }
        let last = profile.samples()[10];
        assert!((last.x - 100.0).abs() < 0.01);
        assert_eq!(last.y, 25.0);
        assert!(counters.points_evaluated.load(Ordering::Relaxed) >= 11);
    }

    #[test]
    fn two_segment_polyline_interpolates_positions() {
        // 40 m east, then 60 m north, sampled every 25 m
        let bend = lon_deg(40.0);
        let north = lon_deg(60.0); // same degree length for latitude
        let line = LineString::from(vec![(0.0, 0.0), (bend, 0.0), (bend, north)]);

        // elevation encodes the queried position
        let mut coverage = FnCoverage(|lon, lat| Ok(lon * 1e6 + lat * 2e6));
        let counters = SampleCounters::default();
        let profile = sample_edge_profile(&line, &mut coverage, &no_geoid(25.0), &counters).unwrap();

        let xs: Vec<f64> = profile.samples().iter().map(|s| s.x).collect();
        assert_eq!(xs.len(), 5);
        for (actual, expected) in xs.iter().zip([0.0, 25.0, 50.0, 75.0, 100.0]) {
            assert!((actual - expected).abs() < 0.01, "{actual} != {expected}");
        }

        // x=25 lies on the first segment at 25/40 of its lon span
        let expected_25 = (bend * 25.0 / 40.0) * 1e6;
        assert!((profile.samples()[1].y - expected_25).abs() < 1e-3);
        // x=50 lies on the second segment, 10 m up
        let expected_50 = bend * 1e6 + (north * 10.0 / 60.0) * 2e6;
        assert!((profile.samples()[2].y - expected_50).abs() < 1e-3);
    }

    #[test]
    fn near_final_intermediate_sample_is_dropped() {
        // 92 m long: the x=90 sample sits within half a spacing of the end
        let line = LineString::from(vec![(0.0, 0.0), (lon_deg(92.0), 0.0)]);
        let counters = SampleCounters::default();
        let profile = sample_edge_profile(
            &line,
            &mut ConstantCoverage(1.0),
            &no_geoid(10.0),
            &counters,
        )
        .unwrap();

        let xs: Vec<f64> = profile.samples().iter().map(|s| s.x).collect();
        assert!((xs[xs.len() - 2] - 80.0).abs() < 1e-9);
        assert!((xs[xs.len() - 1] - 92.0).abs() < 0.01);
    }

    #[test]
    fn point_outside_coverage_abandons_the_edge() {
        let half = lon_deg(50.0);
        let line = LineString::from(vec![(0.0, 0.0), (lon_deg(100.0), 0.0)]);
        let mut coverage = FnCoverage(move |lon, _| {
            if (lon - half).abs() < lon_deg(20.0) {
                Err(CoverageError::OutsideCoverage)
            } else {
                Ok(10.0)
            }
        });
        let counters = SampleCounters::default();
        let result = sample_edge_profile(&line, &mut coverage, &no_geoid(10.0), &counters);

        assert_eq!(result, Err(CoverageError::OutsideCoverage));
        assert!(counters.points_outside_coverage.load(Ordering::Relaxed) >= 1);
    }

    #[test]
    fn unit_multiplier_scales_raw_values() {
        // decimeter source data
        let line = LineString::from(vec![(0.0, 0.0), (lon_deg(30.0), 0.0)]);
        let settings = SamplerSettings {
            distance_between_samples_m: 10.0,
            elevation_unit_multiplier: 0.1,
            include_ellipsoid_to_geoid_difference: false,
        };
        let counters = SampleCounters::default();
        let profile =
            sample_edge_profile(&line, &mut ConstantCoverage(250.0), &settings, &counters).unwrap();
        assert!(profile.samples().iter().all(|s| s.y == 25.0));
    }

    #[test]
    fn degenerate_geometry_is_rejected() {
        let line = LineString::from(vec![(1.0, 1.0), (1.0, 1.0)]);
        let counters = SampleCounters::default();
        let result = sample_edge_profile(
            &line,
            &mut ConstantCoverage(1.0),
            &no_geoid(10.0),
            &counters,
        );
        assert!(matches!(result, Err(CoverageError::Transform(_))));
    }
}
