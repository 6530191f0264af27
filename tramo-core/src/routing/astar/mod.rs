// Generalized A* over the street graph

pub mod engine;
pub mod heuristic;
pub mod strategies;

pub use engine::{AStar, AStarBuilder};
pub use heuristic::{RemainingWeightHeuristic, SphereDistanceHeuristic, ZeroHeuristic};
pub use strategies::{
    MaxWeightTermination, SearchTerminationStrategy, SkipEdgeStrategy, TraverseVisitor,
};
