//! Digital-elevation enrichment of the street graph.
//!
//! The pipeline samples an elevation profile for every
//! street-with-elevation edge from a coverage oracle, repairs the vertices
//! sampling missed by interpolating across the graph, and can persist the
//! computed profiles between builds.

pub mod cache;
pub mod coverage;
pub mod geoid;
pub mod pipeline;
pub(crate) mod repair;
pub mod sampler;

pub use cache::{CACHE_FILE_NAME, ElevationCache};
pub use coverage::{
    Coverage, CoverageError, CoverageFactory, RasterCoverage, RasterCoverageFactory, RasterGrid,
};
pub use pipeline::{ElevationConfig, ElevationModule, ElevationStats};
pub use repair::ELEVATION_PROPAGATION_LIMIT_M;
pub use sampler::{SampleCounters, SamplerSettings};
