//! The elevation coverage oracle consumed by the sampling pipeline.
//!
//! A [`Coverage`] answers point queries against a digital elevation model in
//! the model's native units. Implementations are explicitly not thread-safe;
//! the pipeline builds one instance per worker through a [`CoverageFactory`].

use std::sync::Arc;

use geo::Coord;
use thiserror::Error;

use crate::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoverageError {
    /// The queried point lies outside the elevation model.
    #[error("point outside coverage")]
    OutsideCoverage,
    /// Transforming the coordinate into the model's reference system failed.
    #[error("coordinate transform failed: {0}")]
    Transform(String),
}

/// Point sampler over a digital elevation model.
///
/// `evaluate` takes `&mut self`: instances keep internal scratch state and
/// must not be shared between workers. Obtain one per worker from the
/// factory.
pub trait Coverage {
    /// Surface elevation at (lon, lat), in the coverage's native units.
    fn evaluate(&mut self, lon: f64, lat: f64) -> Result<f64, CoverageError>;
}

/// Produces per-worker [`Coverage`] instances.
///
/// The factory itself is shared across workers; its constructor work is not
/// reentrant, so the pipeline serializes `grid_coverage` calls behind a lock.
pub trait CoverageFactory: Sync {
    fn grid_coverage(&self) -> Box<dyn Coverage + Send>;

    /// Validate configured inputs before the build starts.
    fn check_inputs(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// An in-memory elevation raster with bilinear sampling.
///
/// Rows run south to north, columns west to east; `origin` is the center of
/// the southwestern cell. Cells holding NaN are treated as nodata holes.
#[derive(Debug)]
pub struct RasterGrid {
    origin: Coord<f64>,
    cell_size: (f64, f64),
    width: usize,
    height: usize,
    values: Vec<f64>,
}

impl RasterGrid {
    pub fn new(
        origin: Coord<f64>,
        cell_size: (f64, f64),
        width: usize,
        height: usize,
        values: Vec<f64>,
    ) -> Result<Self, Error> {
        if values.len() != width * height {
            return Err(Error::InvalidData(format!(
                "raster data length {} does not match {width}x{height}",
                values.len()
            )));
        }
        if width < 2 || height < 2 || cell_size.0 <= 0.0 || cell_size.1 <= 0.0 {
            return Err(Error::InvalidData("degenerate raster grid".to_string()));
        }
        Ok(Self {
            origin,
            cell_size,
            width,
            height,
            values,
        })
    }

    /// Fill a grid by evaluating `f(lon, lat)` at every cell center.
    pub fn from_fn(
        origin: Coord<f64>,
        cell_size: (f64, f64),
        width: usize,
        height: usize,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Self, Error> {
        let mut values = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                let lon = origin.x + col as f64 * cell_size.0;
                let lat = origin.y + row as f64 * cell_size.1;
                values.push(f(lon, lat));
            }
        }
        Self::new(origin, cell_size, width, height, values)
    }

    fn value(&self, col: usize, row: usize) -> f64 {
        self.values[row * self.width + col]
    }

    fn sample(&self, lon: f64, lat: f64, corners: &mut [f64; 4]) -> Result<f64, CoverageError> {
        let fx = (lon - self.origin.x) / self.cell_size.0;
        let fy = (lat - self.origin.y) / self.cell_size.1;
        if fx < 0.0 || fy < 0.0 || fx > (self.width - 1) as f64 || fy > (self.height - 1) as f64 {
            return Err(CoverageError::OutsideCoverage);
        }

        let col0 = (fx.floor() as usize).min(self.width - 2);
        let row0 = (fy.floor() as usize).min(self.height - 2);
        let tx = fx - col0 as f64;
        let ty = fy - row0 as f64;

        corners[0] = self.value(col0, row0);
        corners[1] = self.value(col0 + 1, row0);
        corners[2] = self.value(col0, row0 + 1);
        corners[3] = self.value(col0 + 1, row0 + 1);
        if corners.iter().any(|v| v.is_nan()) {
            // nodata hole
            return Err(CoverageError::OutsideCoverage);
        }

        let south = corners[0] * (1.0 - tx) + corners[1] * tx;
        let north = corners[2] * (1.0 - tx) + corners[3] * tx;
        Ok(south * (1.0 - ty) + north * ty)
    }
}

/// [`Coverage`] over a shared [`RasterGrid`].
pub struct RasterCoverage {
    grid: Arc<RasterGrid>,
    // per-instance interpolation scratch; this is what makes instances
    // single-worker
    corners: [f64; 4],
}

impl Coverage for RasterCoverage {
    fn evaluate(&mut self, lon: f64, lat: f64) -> Result<f64, CoverageError> {
        self.grid.sample(lon, lat, &mut self.corners)
    }
}

/// Factory handing each worker its own [`RasterCoverage`] over one shared
/// grid.
pub struct RasterCoverageFactory {
    grid: Arc<RasterGrid>,
}

impl RasterCoverageFactory {
    pub fn new(grid: RasterGrid) -> Self {
        Self {
            grid: Arc::new(grid),
        }
    }
}

impl CoverageFactory for RasterCoverageFactory {
    fn grid_coverage(&self) -> Box<dyn Coverage + Send> {
        Box::new(RasterCoverage {
            grid: Arc::clone(&self.grid),
            corners: [0.0; 4],
        })
    }
}
