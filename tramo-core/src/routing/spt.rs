//! Shortest-path tree: the best-known states per vertex under a dominance
//! relation.

use std::rc::Rc;

use hashbrown::HashMap;

use crate::VertexId;
use crate::routing::state::State;

/// Decides whether one state renders another useless.
///
/// `better_or_equal_and_comparable(a, b)` answers: is `a` at least as good as
/// `b` in every respect the search cares about, such that `b` can be
/// discarded when `a` is kept?
pub trait DominanceFunction {
    fn better_or_equal_and_comparable(&self, a: &State, b: &State) -> bool;
}

/// Dominance on accumulated weight alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct MinimumWeight;

impl DominanceFunction for MinimumWeight {
    fn better_or_equal_and_comparable(&self, a: &State, b: &State) -> bool {
        a.weight() <= b.weight()
    }
}

/// Keyed container of undominated states per vertex.
///
/// A search that runs out of time marks the tree aborted instead of failing,
/// so partial results stay usable.
pub struct ShortestPathTree {
    states: HashMap<VertexId, Vec<Rc<State>>>,
    dominance: Box<dyn DominanceFunction>,
    aborted: bool,
}

impl ShortestPathTree {
    pub fn new(dominance: Box<dyn DominanceFunction>) -> Self {
        Self {
            states: HashMap::new(),
            dominance,
            aborted: false,
        }
    }

    /// Offer a state to the tree.
    ///
    /// Returns `false` (not kept) when an already-retained state at the same
    /// vertex dominates it. Otherwise evicts the states the newcomer
    /// dominates, retains it, and returns `true`.
    pub fn add(&mut self, state: &Rc<State>) -> bool {
        let dominance = &self.dominance;
        let vertex_states = self.states.entry(state.vertex()).or_default();

        if vertex_states
            .iter()
            .any(|kept| dominance.better_or_equal_and_comparable(kept, state))
        {
            return false;
        }
        vertex_states.retain(|kept| !dominance.better_or_equal_and_comparable(state, kept));
        vertex_states.push(state.clone());
        true
    }

    /// Check a popped state on its way out of the queue.
    ///
    /// Returns `false` when the state has been dominated since it was
    /// enqueued (it is no longer retained at its vertex) and should be
    /// dropped without expansion.
    pub fn visit(&self, state: &Rc<State>) -> bool {
        self.states
            .get(&state.vertex())
            .is_some_and(|kept| kept.iter().any(|s| Rc::ptr_eq(s, state)))
    }

    /// All retained states at a vertex.
    pub fn states_at(&self, vertex: VertexId) -> &[Rc<State>] {
        self.states
            .get(&vertex)
            .map_or(&[], |states| states.as_slice())
    }

    /// Retained state with the lowest weight at a vertex.
    pub fn best_state(&self, vertex: VertexId) -> Option<&Rc<State>> {
        self.states_at(vertex)
            .iter()
            .min_by(|a, b| a.weight().total_cmp(&b.weight()))
    }

    /// Number of vertices with at least one retained state.
    pub fn vertex_count(&self) -> usize {
        self.states.len()
    }

    pub fn set_aborted(&mut self) {
        self.aborted = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}
