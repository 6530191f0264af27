// Re-export key components
pub use crate::elevation::{
    Coverage, CoverageError, CoverageFactory, ElevationConfig, ElevationModule, ElevationStats,
    RasterCoverageFactory, RasterGrid,
};
pub use crate::issues::{DataImportIssue, IssueStore};
pub use crate::model::{
    EdgeClass, ElevationProfile, ProfileSample, StreetEdge, StreetGraph, StreetVertex,
};
pub use crate::routing::astar::{
    AStarBuilder, RemainingWeightHeuristic, SphereDistanceHeuristic, ZeroHeuristic,
};
pub use crate::routing::path::GraphPath;
pub use crate::routing::spt::{DominanceFunction, MinimumWeight, ShortestPathTree};
pub use crate::routing::state::{State, StateEditor};

// Core identifier types for the street network
pub use crate::EdgeId;
pub use crate::VertexId;

pub use crate::DEFAULT_DISTANCE_BETWEEN_SAMPLES_M;
