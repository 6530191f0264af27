//! Remaining-weight heuristics for A*.

use geo::Point;
use hashbrown::HashSet;

use crate::model::StreetGraph;
use crate::routing::state::State;
use crate::{VertexId, geometry};

/// Estimates the weight still needed to reach a target from a state.
///
/// A negative or infinite estimate prunes the state. Returning zero
/// everywhere turns the search into plain Dijkstra.
pub trait RemainingWeightHeuristic {
    fn estimate_remaining_weight(&self, state: &State) -> f64;
}

/// The trivial heuristic: no remaining weight anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroHeuristic;

impl RemainingWeightHeuristic for ZeroHeuristic {
    fn estimate_remaining_weight(&self, _state: &State) -> f64 {
        0.0
    }
}

/// Great-circle distance to the closest target vertex.
///
/// Admissible as long as edge weights are at least the geodesic length of the
/// edge, which holds for the street traversal weights in this crate.
pub struct SphereDistanceHeuristic<'g> {
    graph: &'g StreetGraph,
    targets: Vec<Point<f64>>,
}

impl<'g> SphereDistanceHeuristic<'g> {
    pub fn new(graph: &'g StreetGraph, to_vertices: &HashSet<VertexId>) -> Self {
        let targets = to_vertices
            .iter()
            .filter_map(|&v| graph.vertex_point(v))
            .collect();
        Self { graph, targets }
    }
}

impl RemainingWeightHeuristic for SphereDistanceHeuristic<'_> {
    fn estimate_remaining_weight(&self, state: &State) -> f64 {
        if self.targets.is_empty() {
            return 0.0;
        }
        let Some(position) = self.graph.vertex_point(state.vertex()) else {
            return 0.0;
        };
        self.targets
            .iter()
            .map(|target| geometry::sphere_distance(position.into(), (*target).into()))
            .fold(f64::INFINITY, f64::min)
    }
}
