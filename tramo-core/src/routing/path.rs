//! A concrete path through the graph, reconstructed from a search state.

use std::rc::Rc;

use crate::routing::state::State;
use crate::{EdgeId, VertexId};

/// The chain of states from an initial state to an accepted target state.
#[derive(Debug, Clone)]
pub struct GraphPath {
    states: Vec<Rc<State>>,
}

impl GraphPath {
    /// Back-trace a path from its final state.
    pub fn new(target: &Rc<State>) -> Self {
        let mut states = Vec::new();
        let mut cursor = Some(target);
        while let Some(state) = cursor {
            states.push(state.clone());
            cursor = state.back_state();
        }
        states.reverse();
        Self { states }
    }

    pub fn states(&self) -> &[Rc<State>] {
        &self.states
    }

    pub fn vertices(&self) -> Vec<VertexId> {
        self.states.iter().map(|s| s.vertex()).collect()
    }

    /// Edges walked, in order.
    pub fn edges(&self) -> Vec<EdgeId> {
        self.states.iter().filter_map(|s| s.back_edge()).collect()
    }

    /// Total weight of the path.
    pub fn weight(&self) -> f64 {
        self.states.last().map_or(0.0, |s| s.weight())
    }

    /// Elapsed time along the path in seconds, independent of direction.
    pub fn duration_secs(&self) -> i64 {
        match (self.states.first(), self.states.last()) {
            (Some(first), Some(last)) => (last.time_secs() - first.time_secs()).abs(),
            _ => 0,
        }
    }
}
