//! Search states and the editor that builds them.
//!
//! A [`State`] is one point of a search: a vertex, the accumulated weight and
//! time to reach it, and back-pointers to replay the path. States are
//! immutable once built; edge traversals construct children through a
//! [`StateEditor`], which is the single place where degenerate weight
//! increments are rejected.

use std::rc::Rc;

use crate::{EdgeId, VertexId};

/// One search state.
///
/// Back-pointers form a tree rooted at the initial states (shared `Rc`
/// handles, acyclic by construction). When one edge traversal yields several
/// outcomes they are linked into a linear list through `next_result`.
#[derive(Debug, Clone)]
pub struct State {
    vertex: VertexId,
    weight: f64,
    time_secs: i64,
    arrive_by: bool,
    back_state: Option<Rc<State>>,
    back_edge: Option<EdgeId>,
    next_result: Option<Box<State>>,
}

impl State {
    /// Initial state of a search, with zero accumulated weight.
    pub fn origin(vertex: VertexId, time_secs: i64, arrive_by: bool) -> Self {
        Self {
            vertex,
            weight: 0.0,
            time_secs,
            arrive_by,
            back_state: None,
            back_edge: None,
            next_result: None,
        }
    }

    pub fn vertex(&self) -> VertexId {
        self.vertex
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn time_secs(&self) -> i64 {
        self.time_secs
    }

    pub fn is_arrive_by(&self) -> bool {
        self.arrive_by
    }

    pub fn back_state(&self) -> Option<&Rc<State>> {
        self.back_state.as_ref()
    }

    pub fn back_edge(&self) -> Option<EdgeId> {
        self.back_edge
    }

    /// Whether this state may be accepted as a search result. Mid-transition
    /// states (e.g. halfway through a vehicle pickup) would answer false;
    /// plain street walking never produces any.
    pub fn is_final(&self) -> bool {
        true
    }

    pub fn next_result(&self) -> Option<&State> {
        self.next_result.as_deref()
    }

    /// Prepend this state to an existing result chain.
    pub fn add_to_existing_result_chain(mut self, existing: Option<State>) -> State {
        debug_assert!(self.next_result.is_none());
        self.next_result = existing.map(Box::new);
        self
    }

    pub(crate) fn take_next_result(&mut self) -> Option<State> {
        self.next_result.take().map(|boxed| *boxed)
    }
}

/// Builder for a child [`State`].
///
/// Collects weight and time increments and refuses to produce a state when
/// any increment was NaN, infinite or negative - such traversals are
/// unsatisfiable, not errors.
pub struct StateEditor {
    child: State,
    defective: bool,
}

impl StateEditor {
    /// Editor for the state reached by walking `back_edge` from `parent` to
    /// `vertex`.
    pub fn child(parent: &Rc<State>, back_edge: EdgeId, vertex: VertexId) -> Self {
        Self {
            child: State {
                vertex,
                weight: parent.weight,
                time_secs: parent.time_secs,
                arrive_by: parent.arrive_by,
                back_state: Some(parent.clone()),
                back_edge: Some(back_edge),
                next_result: None,
            },
            defective: false,
        }
    }

    /// Editor for an initial state.
    pub fn origin(vertex: VertexId, time_secs: i64, arrive_by: bool) -> Self {
        Self {
            child: State::origin(vertex, time_secs, arrive_by),
            defective: false,
        }
    }

    pub fn set_time_secs(&mut self, time_secs: i64) {
        self.child.time_secs = time_secs;
    }

    /// Advance time by `secs`; arrive-by searches run backwards in time.
    pub fn increment_time_secs(&mut self, secs: i64) {
        if self.child.arrive_by {
            self.child.time_secs -= secs;
        } else {
            self.child.time_secs += secs;
        }
    }

    pub fn increment_weight(&mut self, weight: f64) {
        if weight.is_nan() || weight.is_infinite() || weight < 0.0 {
            log::debug!("rejected weight increment {weight}; traversal is unsatisfiable");
            self.defective = true;
            return;
        }
        self.child.weight += weight;
    }

    /// Finish editing. Returns `None` when the traversal was marked
    /// unsatisfiable.
    pub fn make_state(self) -> Option<State> {
        if self.defective { None } else { Some(self.child) }
    }
}
