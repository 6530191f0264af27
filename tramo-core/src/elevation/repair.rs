//! Missing-elevation repair.
//!
//! Sampling never covers every vertex: tunnels, data holes and freshly cut
//! islands leave gaps. This pass grows a shortest-path tree (by meters of
//! street distance) outward from every vertex with a known elevation; when a
//! branch reaches a vertex seeded by another anchor, the chain between the
//! two anchors gets its elevations by linear interpolation along the
//! accumulated distance. Afterwards every street-with-elevation edge whose
//! endpoints both have elevations, but which never got a sampled profile,
//! receives a flat two-point profile.

use std::rc::Rc;

use fixedbitset::FixedBitSet;
use hashbrown::HashMap;
use log::{debug, warn};
use petgraph::Direction;
use petgraph::visit::EdgeRef;

use crate::issues::{DataImportIssue, IssueStore};
use crate::model::{EdgeClass, ElevationProfile, StreetGraph};
use crate::{EdgeId, VertexId};

/// Elevation propagation stops growing a branch past this street distance,
/// so islands without any anchor cannot grow forever.
pub const ELEVATION_PROPAGATION_LIMIT_M: f64 = 2000.0;

/// One node of the repair tree, back-linked towards its anchor.
struct ElevationRepairState {
    back_edge: Option<EdgeId>,
    back_state: Option<Rc<ElevationRepairState>>,
    vertex: VertexId,
    /// Street distance accumulated from the anchor.
    distance: f64,
    /// Elevation of the anchor this branch grew from.
    initial_elevation: f64,
}

/// Interpolate an elevation for every vertex no sampled edge touched, then
/// flatten profile-less edges. Returns the final per-vertex elevations.
pub(crate) fn assign_missing_elevations(
    graph: &mut StreetGraph,
    edges_with_elevation: &[EdgeId],
    known_elevations: Option<&HashMap<VertexId, f64>>,
    issue_store: &IssueStore,
) -> HashMap<VertexId, f64> {
    debug!("Assigning missing elevations");

    let mut pq: crate::routing::binheap::BinHeap<Rc<ElevationRepairState>> =
        crate::routing::binheap::BinHeap::new();

    // elevation for each vertex (known or interpolated); overrides from the
    // source data participate as anchors of their own
    let mut elevations: HashMap<VertexId, f64> = known_elevations.cloned().unwrap_or_default();

    let mut closed = FixedBitSet::with_capacity(graph.vertex_count());

    // seed with the endpoints of every sampled profile
    for &edge_id in edges_with_elevation {
        let Some((from, to)) = graph.graph.edge_endpoints(edge_id) else {
            continue;
        };
        let Some(profile) = graph.graph[edge_id].elevation_profile() else {
            continue;
        };
        let (first, last) = (profile.first_elevation(), profile.last_elevation());

        if !elevations.contains_key(&from) {
            pq.insert(
                Rc::new(ElevationRepairState {
                    back_edge: None,
                    back_state: None,
                    vertex: from,
                    distance: 0.0,
                    initial_elevation: first,
                }),
                0.0,
            );
            elevations.insert(from, first);
        }
        if !elevations.contains_key(&to) {
            pq.insert(
                Rc::new(ElevationRepairState {
                    back_edge: None,
                    back_state: None,
                    vertex: to,
                    distance: 0.0,
                    initial_elevation: last,
                }),
                0.0,
            );
            elevations.insert(to, last);
        }
    }

    // Grow the tree outward into the region of unknown elevation. When a
    // branch hits a vertex with known elevation, follow the back pointers
    // through the unknown region, interpolating as we go.
    while let Some(state) = pq.extract_min() {
        if closed.contains(state.vertex.index()) {
            continue;
        }
        closed.insert(state.vertex.index());

        // recover the anchor this branch grew from
        let mut root: &ElevationRepairState = &state;
        while let Some(back) = &root.back_state {
            root = back.as_ref();
        }
        let initial_vertex = root.vertex;

        let mut best_distance = f64::MAX;
        let mut best_elevation = 0.0;
        for direction in [Direction::Outgoing, Direction::Incoming] {
            for edge_ref in graph.graph.edges_directed(state.vertex, direction) {
                if !edge_ref.weight().class().is_street() {
                    continue;
                }
                let neighbor = match direction {
                    Direction::Outgoing => edge_ref.target(),
                    Direction::Incoming => edge_ref.source(),
                };
                if neighbor == initial_vertex {
                    continue;
                }

                let edge_length = edge_ref.weight().length_m();
                if let Some(&elevation) = elevations.get(&neighbor) {
                    // reached another anchor's region
                    if edge_length < best_distance {
                        best_distance = edge_length;
                        best_elevation = elevation;
                    }
                } else {
                    pq.insert(
                        Rc::new(ElevationRepairState {
                            back_edge: Some(edge_ref.id()),
                            back_state: Some(Rc::clone(&state)),
                            vertex: neighbor,
                            distance: state.distance + edge_length,
                            initial_elevation: state.initial_elevation,
                        }),
                        state.distance + edge_length,
                    );
                }
            }
        }

        if best_distance == f64::MAX && state.distance > ELEVATION_PROPAGATION_LIMIT_M {
            // nothing with known elevation in reach; accept the anchor's
            // elevation for this branch instead of growing it forever
            issue_store.add(DataImportIssue::ElevationPropagationLimit {
                vertex: state.vertex.index(),
            });
            best_distance = state.distance;
            best_elevation = state.initial_elevation;
        }

        if best_distance != f64::MAX {
            // a second elevation is known; interpolate backwards along the
            // chain between the two
            let total_distance = best_distance + state.distance;
            let mut best_distance = best_distance;
            let mut cursor = state;
            loop {
                if total_distance == 0.0 {
                    // both ends coincide; avoid dividing into NaN
                    elevations.insert(cursor.vertex, best_elevation);
                } else {
                    let elevation = (best_elevation * cursor.distance
                        + cursor.initial_elevation * best_distance)
                        / total_distance;
                    elevations.insert(cursor.vertex, elevation);
                }
                let Some(back) = cursor.back_state.clone() else {
                    break;
                };
                if let Some(back_edge) = cursor.back_edge {
                    best_distance += graph.graph[back_edge].length_m();
                }
                cursor = back;
                if elevations.contains_key(&cursor.vertex) {
                    break;
                }
            }
        }
    }

    // flatten every elevation edge that sampling skipped but whose endpoint
    // elevations are now known
    let mut to_flatten: Vec<(EdgeId, f64, f64, f64)> = Vec::new();
    for edge_ref in graph.graph.edge_references() {
        let edge = edge_ref.weight();
        if edge.class() != EdgeClass::StreetWithElevation {
            continue;
        }
        let endpoint_elevations = (
            elevations.get(&edge_ref.source()),
            elevations.get(&edge_ref.target()),
        );
        let (Some(&from_elevation), Some(&to_elevation)) = endpoint_elevations else {
            if !edge.is_elevation_flattened() && !edge.is_slope_override() {
                warn!(
                    "Unexpectedly missing elevation for edge between {:?} and {:?}",
                    edge_ref.source(),
                    edge_ref.target()
                );
            }
            continue;
        };
        if edge.elevation_profile().is_some_and(|p| p.len() > 2) {
            continue;
        }
        to_flatten.push((edge_ref.id(), from_elevation, to_elevation, edge.length_m()));
    }

    for (edge_id, from_elevation, to_elevation, length_m) in to_flatten {
        let profile = ElevationProfile::two_point(length_m, from_elevation, to_elevation);
        if let Some(edge) = graph.graph.edge_weight_mut(edge_id) {
            if edge.set_elevation_profile(profile, true) {
                issue_store.add(DataImportIssue::ElevationFlattened {
                    edge: edge_id.index(),
                });
            }
        }
    }

    elevations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::EARTH_RADIUS_M;
    use crate::model::{ProfileSample, StreetEdge, StreetVertex};
    use geo::{LineString, Point};

    /// Degrees of longitude along the equator spanning `meters`.
    fn lon_deg(meters: f64) -> f64 {
        meters / (EARTH_RADIUS_M * 1.0_f64.to_radians())
    }

    fn street_edge(from_lon: f64, to_lon: f64) -> StreetEdge {
        StreetEdge::new(
            LineString::from(vec![(from_lon, 0.0), (to_lon, 0.0)]),
            EdgeClass::StreetWithElevation,
        )
    }

    /// Give a vertex a known elevation by attaching a stub edge with a
    /// sampled (constant) profile.
    fn anchor(
        graph: &mut StreetGraph,
        at: VertexId,
        at_lon: f64,
        stub_id: u64,
        elevation: f64,
    ) -> EdgeId {
        let stub_lon = at_lon - lon_deg(5.0);
        let stub = graph.add_vertex(StreetVertex::new(stub_id, Point::new(stub_lon, 0.0)));
        let mut edge = street_edge(stub_lon, at_lon);
        let length = edge.length_m();
        edge.set_elevation_profile(
            ElevationProfile::new(vec![
                ProfileSample::new(0.0, elevation),
                ProfileSample::new(length / 2.0, elevation),
                ProfileSample::new(length, elevation),
            ]),
            false,
        );
        graph.add_edge(stub, at, edge)
    }

    #[test]
    fn interpolates_between_two_anchors() {
        // A(100m) --100m-- B --100m-- C(200m)
        let mut graph = StreetGraph::new();
        let a = graph.add_vertex(StreetVertex::new(1, Point::new(0.0, 0.0)));
        let b = graph.add_vertex(StreetVertex::new(2, Point::new(lon_deg(100.0), 0.0)));
        let c = graph.add_vertex(StreetVertex::new(3, Point::new(lon_deg(200.0), 0.0)));
        let ab = graph.add_edge(a, b, street_edge(0.0, lon_deg(100.0)));
        let bc = graph.add_edge(b, c, street_edge(lon_deg(100.0), lon_deg(200.0)));
        let anchor_a = anchor(&mut graph, a, 0.0, 10, 100.0);
        let anchor_c = anchor(&mut graph, c, lon_deg(200.0), 11, 200.0);

        let issues = IssueStore::new();
        let elevations = assign_missing_elevations(
            &mut graph,
            &[anchor_a, anchor_c],
            None,
            &issues,
        );

        let b_elevation = elevations[&b];
        assert!((b_elevation - 150.0).abs() < 1e-6, "B at {b_elevation}");

        // both chain edges got flat two-point profiles
        for (edge_id, from, to) in [(ab, 100.0, 150.0), (bc, 150.0, 200.0)] {
            let edge = graph.edge(edge_id).unwrap();
            assert!(edge.is_elevation_flattened());
            let profile = edge.elevation_profile().unwrap();
            assert_eq!(profile.len(), 2);
            assert!((profile.first_elevation() - from).abs() < 1e-6);
            assert!((profile.last_elevation() - to).abs() < 1e-6);
        }
        assert!(
            issues
                .issues()
                .iter()
                .filter(|i| matches!(i, DataImportIssue::ElevationFlattened { .. }))
                .count()
                >= 2
        );
    }

    #[test]
    fn interpolation_stays_within_anchor_interval() {
        // A(10m) --d1-- x --d2-- B(50m), for several distance splits
        for (d1, d2) in [(120.0, 40.0), (40.0, 120.0), (100.0, 100.0), (10.0, 300.0)] {
            let mut graph = StreetGraph::new();
            let a = graph.add_vertex(StreetVertex::new(1, Point::new(0.0, 0.0)));
            let x = graph.add_vertex(StreetVertex::new(2, Point::new(lon_deg(d1), 0.0)));
            let b = graph.add_vertex(StreetVertex::new(3, Point::new(lon_deg(d1 + d2), 0.0)));
            graph.add_edge(a, x, street_edge(0.0, lon_deg(d1)));
            graph.add_edge(x, b, street_edge(lon_deg(d1), lon_deg(d1 + d2)));
            let anchor_a = anchor(&mut graph, a, 0.0, 10, 10.0);
            let anchor_b = anchor(&mut graph, b, lon_deg(d1 + d2), 11, 50.0);

            let issues = IssueStore::new();
            let elevations =
                assign_missing_elevations(&mut graph, &[anchor_a, anchor_b], None, &issues);

            let e = elevations[&x];
            assert!((10.0..=50.0).contains(&e), "elevation {e} escapes anchors");
            let expected = 10.0 + d1 / (d1 + d2) * 40.0;
            assert!((e - expected).abs() < 0.2, "{e} != {expected} for ({d1},{d2})");
        }
    }

    #[test]
    fn isolated_branch_hits_propagation_limit() {
        // anchor A(50m) --2500m-- dead end B
        let mut graph = StreetGraph::new();
        let a = graph.add_vertex(StreetVertex::new(1, Point::new(0.0, 0.0)));
        let b = graph.add_vertex(StreetVertex::new(2, Point::new(lon_deg(2500.0), 0.0)));
        let ab = graph.add_edge(a, b, street_edge(0.0, lon_deg(2500.0)));
        let anchor_a = anchor(&mut graph, a, 0.0, 10, 50.0);

        let issues = IssueStore::new();
        let elevations = assign_missing_elevations(&mut graph, &[anchor_a], None, &issues);

        assert!((elevations[&b] - 50.0).abs() < 1e-6);
        assert!(
            issues
                .issues()
                .iter()
                .any(|i| matches!(i, DataImportIssue::ElevationPropagationLimit { .. }))
        );
        // the long edge still gets its flat profile
        assert!(graph.edge(ab).unwrap().is_elevation_flattened());
    }

    #[test]
    fn override_map_seeds_other_anchors() {
        // B has a user-supplied elevation; the chain from anchored A reaches
        // it and interpolation uses it
        let mut graph = StreetGraph::new();
        let a = graph.add_vertex(StreetVertex::new(1, Point::new(0.0, 0.0)));
        let m = graph.add_vertex(StreetVertex::new(2, Point::new(lon_deg(100.0), 0.0)));
        let b = graph.add_vertex(StreetVertex::new(3, Point::new(lon_deg(200.0), 0.0)));
        graph.add_edge(a, m, street_edge(0.0, lon_deg(100.0)));
        graph.add_edge(m, b, street_edge(lon_deg(100.0), lon_deg(200.0)));
        let anchor_a = anchor(&mut graph, a, 0.0, 10, 0.0);

        let mut known = HashMap::new();
        known.insert(b, 80.0);

        let issues = IssueStore::new();
        let elevations =
            assign_missing_elevations(&mut graph, &[anchor_a], Some(&known), &issues);

        assert_eq!(elevations[&b], 80.0);
        let mid = elevations[&m];
        assert!((mid - 40.0).abs() < 1e-6, "midpoint at {mid}");
    }
}
