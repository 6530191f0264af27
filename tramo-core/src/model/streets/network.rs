//! The routable street graph: a directed petgraph with a spatial vertex index.

use geo::Point;
use petgraph::Direction;
use petgraph::graph::DiGraph;
use petgraph::visit::EdgeRef;
use rstar::RTree;
use rstar::primitives::GeomWithData;

use super::components::{EdgeClass, StreetEdge, StreetVertex};
use crate::{EdgeId, VertexId};

/// A vertex position indexed for nearest-neighbor queries.
pub type IndexedPoint = GeomWithData<[f64; 2], VertexId>;

/// Directed street graph with per-edge geometry and elevation profiles.
///
/// Construction is two-phase: add vertices and edges, then call
/// [`StreetGraph::build_spatial_index`] once to enable snapping queries.
#[derive(Debug, Default)]
pub struct StreetGraph {
    pub graph: DiGraph<StreetVertex, StreetEdge>,
    rtree: RTree<IndexedPoint>,
    distance_between_elevation_samples: Option<f64>,
}

impl StreetGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, vertex: StreetVertex) -> VertexId {
        self.graph.add_node(vertex)
    }

    pub fn add_edge(&mut self, from: VertexId, to: VertexId, edge: StreetEdge) -> EdgeId {
        self.graph.add_edge(from, to, edge)
    }

    /// (Re)build the R-tree over vertex positions.
    pub fn build_spatial_index(&mut self) {
        let points: Vec<IndexedPoint> = self
            .graph
            .node_indices()
            .map(|idx| {
                let p = self.graph[idx].geometry;
                IndexedPoint::new([p.x(), p.y()], idx)
            })
            .collect();
        self.rtree = RTree::bulk_load(points);
    }

    /// Snap a point to the closest graph vertex.
    ///
    /// Returns `None` on an empty graph or before the spatial index was built.
    pub fn nearest_vertex(&self, point: &Point<f64>) -> Option<VertexId> {
        self.rtree
            .nearest_neighbor(&[point.x(), point.y()])
            .map(|indexed| indexed.data)
    }

    pub fn vertex(&self, id: VertexId) -> Option<&StreetVertex> {
        self.graph.node_weight(id)
    }

    pub fn vertex_point(&self, id: VertexId) -> Option<Point<f64>> {
        self.graph.node_weight(id).map(|v| v.geometry)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&StreetEdge> {
        self.graph.edge_weight(id)
    }

    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.graph.node_indices()
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.graph.edge_indices()
    }

    pub fn outgoing(
        &self,
        vertex: VertexId,
    ) -> impl Iterator<Item = petgraph::graph::EdgeReference<'_, StreetEdge>> {
        self.graph.edges_directed(vertex, Direction::Outgoing)
    }

    pub fn incoming(
        &self,
        vertex: VertexId,
    ) -> impl Iterator<Item = petgraph::graph::EdgeReference<'_, StreetEdge>> {
        self.graph.edges_directed(vertex, Direction::Incoming)
    }

    /// Ids of all edges that are supposed to carry an elevation profile.
    pub fn elevation_edge_ids(&self) -> Vec<EdgeId> {
        self.graph
            .edge_references()
            .filter(|e| e.weight().class() == EdgeClass::StreetWithElevation)
            .map(|e| e.id())
            .collect()
    }

    /// Record the sample spacing used by the elevation build; slope
    /// calculations downstream need to know it.
    pub fn set_distance_between_elevation_samples(&mut self, meters: f64) {
        self.distance_between_elevation_samples = Some(meters);
    }

    pub fn distance_between_elevation_samples(&self) -> Option<f64> {
        self.distance_between_elevation_samples
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;

    #[test]
    fn nearest_vertex_snaps_to_closest() {
        let mut graph = StreetGraph::new();
        let a = graph.add_vertex(StreetVertex::new(1, Point::new(0.0, 0.0)));
        let b = graph.add_vertex(StreetVertex::new(2, Point::new(0.01, 0.0)));
        graph.build_spatial_index();

        assert_eq!(
            graph.nearest_vertex(&Point::new(0.001, 0.0005)),
            Some(a)
        );
        assert_eq!(graph.nearest_vertex(&Point::new(0.009, 0.0)), Some(b));
    }

    #[test]
    fn elevation_edges_are_filtered_by_class() {
        let mut graph = StreetGraph::new();
        let a = graph.add_vertex(StreetVertex::new(1, Point::new(0.0, 0.0)));
        let b = graph.add_vertex(StreetVertex::new(2, Point::new(0.001, 0.0)));
        let line = line_string![(x: 0.0, y: 0.0), (x: 0.001, y: 0.0)];
        let with = graph.add_edge(
            a,
            b,
            StreetEdge::new(line.clone(), EdgeClass::StreetWithElevation),
        );
        graph.add_edge(b, a, StreetEdge::new(line.clone(), EdgeClass::Street));
        graph.add_edge(a, b, StreetEdge::new(line, EdgeClass::Link));

        assert_eq!(graph.elevation_edge_ids(), vec![with]);
    }
}
