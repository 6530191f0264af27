//! Find the shortest path between graph vertices using A*. A basic Dijkstra
//! search is a special case of A* where the heuristic is always zero.

use std::rc::Rc;
use std::time::{Duration, Instant};

use hashbrown::HashSet;
use log::{debug, warn};
use petgraph::visit::EdgeRef;

use super::heuristic::{RemainingWeightHeuristic, ZeroHeuristic};
use super::strategies::{SearchTerminationStrategy, SkipEdgeStrategy, TraverseVisitor};
use crate::VertexId;
use crate::model::StreetGraph;
use crate::routing::binheap::BinHeap;
use crate::routing::path::GraphPath;
use crate::routing::spt::{DominanceFunction, MinimumWeight, ShortestPathTree};
use crate::routing::state::State;

/// Configures and creates an [`AStar`] search.
pub struct AStarBuilder<'g> {
    graph: &'g StreetGraph,
    heuristic: Box<dyn RemainingWeightHeuristic + 'g>,
    dominance: Box<dyn DominanceFunction>,
    skip_edge: Option<Box<dyn SkipEdgeStrategy + 'g>>,
    visitor: Option<Box<dyn TraverseVisitor + 'g>>,
    termination: Option<Box<dyn SearchTerminationStrategy + 'g>>,
    arrive_by: bool,
    from_vertices: HashSet<VertexId>,
    to_vertices: HashSet<VertexId>,
    timeout: Option<Duration>,
    departure_time_secs: i64,
    initial_states: Vec<State>,
}

impl<'g> AStarBuilder<'g> {
    /// A forward search with a zero heuristic and minimum-weight dominance.
    pub fn new(graph: &'g StreetGraph) -> Self {
        Self {
            graph,
            heuristic: Box::new(ZeroHeuristic),
            dominance: Box::new(MinimumWeight),
            skip_edge: None,
            visitor: None,
            termination: None,
            arrive_by: false,
            from_vertices: HashSet::new(),
            to_vertices: HashSet::new(),
            timeout: None,
            departure_time_secs: 0,
            initial_states: Vec::new(),
        }
    }

    pub fn with_heuristic(mut self, heuristic: impl RemainingWeightHeuristic + 'g) -> Self {
        self.heuristic = Box::new(heuristic);
        self
    }

    pub fn with_dominance_function(mut self, dominance: impl DominanceFunction + 'static) -> Self {
        self.dominance = Box::new(dominance);
        self
    }

    pub fn with_skip_edge_strategy(mut self, strategy: impl SkipEdgeStrategy + 'g) -> Self {
        self.skip_edge = Some(Box::new(strategy));
        self
    }

    pub fn with_traverse_visitor(mut self, visitor: impl TraverseVisitor + 'g) -> Self {
        self.visitor = Some(Box::new(visitor));
        self
    }

    pub fn with_termination_strategy(
        mut self,
        strategy: impl SearchTerminationStrategy + 'g,
    ) -> Self {
        self.termination = Some(Box::new(strategy));
        self
    }

    /// Search backwards in time from the destination.
    pub fn arrive_by(mut self, arrive_by: bool) -> Self {
        self.arrive_by = arrive_by;
        self
    }

    pub fn from_vertices(mut self, vertices: impl IntoIterator<Item = VertexId>) -> Self {
        self.from_vertices = vertices.into_iter().collect();
        self
    }

    pub fn to_vertices(mut self, vertices: impl IntoIterator<Item = VertexId>) -> Self {
        self.to_vertices = vertices.into_iter().collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn departure_time_secs(mut self, time_secs: i64) -> Self {
        self.departure_time_secs = time_secs;
        self
    }

    /// Seed the search with explicit states instead of origins derived from
    /// the from-vertex set.
    pub fn with_initial_states(mut self, states: Vec<State>) -> Self {
        self.initial_states = states;
        self
    }

    pub fn build(self) -> AStar<'g> {
        let mut spt = ShortestPathTree::new(self.dominance);
        let mut pq = BinHeap::with_capacity(1000);

        let initial_states = if self.initial_states.is_empty() {
            self.from_vertices
                .iter()
                .map(|&v| State::origin(v, self.departure_time_secs, self.arrive_by))
                .collect()
        } else {
            self.initial_states
        };

        for state in initial_states {
            let weight = state.weight();
            let state = Rc::new(state);
            spt.add(&state);
            pq.insert(state, weight);
        }

        AStar {
            graph: self.graph,
            heuristic: self.heuristic,
            skip_edge: self.skip_edge,
            visitor: self.visitor,
            termination: self.termination,
            arrive_by: self.arrive_by,
            from_vertices: self.from_vertices,
            to_vertices: self.to_vertices,
            timeout: self.timeout,
            spt,
            pq,
            target_accepted_states: Vec::new(),
            n_visited: 0,
            ran: false,
        }
    }
}

/// A single A* search over the street graph.
pub struct AStar<'g> {
    graph: &'g StreetGraph,
    heuristic: Box<dyn RemainingWeightHeuristic + 'g>,
    skip_edge: Option<Box<dyn SkipEdgeStrategy + 'g>>,
    visitor: Option<Box<dyn TraverseVisitor + 'g>>,
    termination: Option<Box<dyn SearchTerminationStrategy + 'g>>,
    arrive_by: bool,
    from_vertices: HashSet<VertexId>,
    to_vertices: HashSet<VertexId>,
    timeout: Option<Duration>,

    spt: ShortestPathTree,
    pq: BinHeap<Rc<State>>,
    target_accepted_states: Vec<Rc<State>>,
    n_visited: usize,
    ran: bool,
}

impl<'g> AStar<'g> {
    /// Run the search (if not already run) and hand out the tree, including
    /// partial trees of timed-out searches.
    pub fn shortest_path_tree(mut self) -> ShortestPathTree {
        self.run_search();
        self.spt
    }

    /// Run the search (if not already run) and back-trace the accepted target
    /// states into paths.
    pub fn paths_to_target(&mut self) -> Vec<GraphPath> {
        self.run_search();
        self.target_accepted_states
            .iter()
            .filter(|s| s.is_final())
            .map(GraphPath::new)
            .collect()
    }

    /// States accepted at target vertices so far.
    pub fn target_accepted_states(&self) -> &[Rc<State>] {
        &self.target_accepted_states
    }

    pub fn n_visited(&self) -> usize {
        self.n_visited
    }

    pub fn is_aborted(&self) -> bool {
        self.spt.is_aborted()
    }

    /// Relax the minimum-key state.
    ///
    /// Returns `None` when the popped state had been dominated since it was
    /// enqueued; it is dropped without touching the termination checks.
    fn iterate(&mut self) -> Option<Rc<State>> {
        if log::log_enabled!(log::Level::Debug) {
            if let Some(w) = self.pq.peek_min_key() {
                debug!("pq min key = {w}");
            }
        }

        // get the lowest-weight state in the queue
        let u = self.pq.extract_min()?;

        // check that this state has not been dominated and mark it visited
        if !self.spt.visit(&u) {
            return None;
        }

        if let Some(visitor) = &mut self.visitor {
            visitor.visit_vertex(&u);
        }
        self.n_visited += 1;

        let u_vertex = u.vertex();
        debug!("   vertex {u_vertex:?}");

        let graph = self.graph;
        let edges: Box<
            dyn Iterator<Item = petgraph::graph::EdgeReference<'g, crate::StreetEdge>> + 'g,
        > = if self.arrive_by {
            Box::new(graph.incoming(u_vertex))
        } else {
            Box::new(graph.outgoing(u_vertex))
        };

        for edge_ref in edges {
            let edge_id = edge_ref.id();
            if let Some(skip) = &self.skip_edge {
                if skip.should_skip_edge(&u, edge_id) {
                    continue;
                }
            }

            let neighbor = if self.arrive_by {
                edge_ref.source()
            } else {
                edge_ref.target()
            };

            // Iterate over traversal results. An edge that leads nowhere
            // yields no state and ends the chain immediately.
            let mut next = edge_ref.weight().traverse(&u, edge_id, neighbor);
            while let Some(mut v) = next {
                next = v.take_next_result();

                if let Some(visitor) = &mut self.visitor {
                    visitor.visit_edge(edge_id);
                }

                let remaining_weight = self.heuristic.estimate_remaining_weight(&v);
                if remaining_weight < 0.0
                    || remaining_weight.is_infinite()
                    || remaining_weight.is_nan()
                {
                    continue;
                }
                let estimate = v.weight() + remaining_weight;

                // enqueue the state only while it is hopeful
                let v = Rc::new(v);
                if self.spt.add(&v) {
                    if let Some(visitor) = &mut self.visitor {
                        visitor.visit_enqueue();
                    }
                    self.pq.insert(v, estimate);
                }
            }
        }

        Some(u)
    }

    fn run_search(&mut self) {
        if self.ran {
            return;
        }
        self.ran = true;

        let abort_time = self.timeout.map(|t| Instant::now() + t);

        /* the core of the A* algorithm */
        while !self.pq.is_empty() {
            if let Some(abort_time) = abort_time {
                if Instant::now() >= abort_time {
                    warn!(
                        "Search timeout. origin={:?} target={:?}",
                        self.from_vertices, self.to_vertices
                    );
                    // Rather than failing, flag the tree and return it anyway
                    // so partial results stay available.
                    self.spt.set_aborted();
                    break;
                }
            }

            // Termination is checked after adjacent states are generated, so
            // the search is always left in a restartable position. A dominated
            // pop ends the iteration without reaching the checks at all.
            let Some(u) = self.iterate() else {
                continue;
            };

            if let Some(termination) = &mut self.termination {
                if termination.should_search_terminate(&u) {
                    break;
                }
            }
            if self.to_vertices.contains(&u.vertex()) && u.is_final() {
                self.target_accepted_states.push(u);

                // One path per search for now; stop at the first accepted
                // target state.
                debug!("total vertices visited {}", self.n_visited);
                break;
            }
        }
    }
}
