//! Core library for the tramo journey planner.
//!
//! Two engines live here: a digital-elevation enrichment pipeline that
//! attaches sampled elevation profiles to every street segment of a routable
//! street graph (and repairs the gaps by interpolating across the graph), and
//! a generalized A* search over that graph with pluggable heuristic,
//! dominance, termination and edge-skipping strategies.

pub mod elevation;
pub mod error;
pub mod geometry;
pub mod issues;
pub mod model;
pub mod prelude;
pub mod routing;

pub use error::Error;
pub use model::{EdgeClass, ElevationProfile, ProfileSample, StreetEdge, StreetGraph, StreetVertex};

/// Identifier of a street graph vertex.
pub type VertexId = petgraph::graph::NodeIndex;
/// Identifier of a street graph edge.
pub type EdgeId = petgraph::graph::EdgeIndex;

/// Default spacing between elevation samples along an edge, in meters.
pub const DEFAULT_DISTANCE_BETWEEN_SAMPLES_M: f64 = 10.0;

/// Default walking speed used to derive traversal durations from edge lengths.
pub const DEFAULT_WALK_SPEED_MPS: f64 = 1.4;

/// Slope above which a sampled elevation profile is considered bogus and the
/// edge is flattened instead of carrying the profile.
pub const MAX_USABLE_SLOPE: f64 = 0.35;
