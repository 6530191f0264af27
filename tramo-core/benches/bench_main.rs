use criterion::{Criterion, criterion_group, criterion_main};
use geo::{LineString, Point};
use tramo_core::prelude::*;

/// Degrees spanning `meters` along a great circle.
fn deg(meters: f64) -> f64 {
    meters / (tramo_core::geometry::EARTH_RADIUS_M * 1.0_f64.to_radians())
}

/// A 30x30 two-way street grid with 100 m blocks.
fn build_grid(side: usize) -> (StreetGraph, VertexId, VertexId) {
    let mut graph = StreetGraph::new();
    let mut ids = Vec::with_capacity(side * side);
    for row in 0..side {
        for col in 0..side {
            let point = Point::new(deg(100.0 * col as f64), deg(100.0 * row as f64));
            ids.push(graph.add_vertex(StreetVertex::new((row * side + col) as u64, point)));
        }
    }
    let connect = |graph: &mut StreetGraph, a: VertexId, b: VertexId| {
        let pa = graph.vertex_point(a).unwrap();
        let pb = graph.vertex_point(b).unwrap();
        graph.add_edge(
            a,
            b,
            StreetEdge::new(
                LineString::from(vec![(pa.x(), pa.y()), (pb.x(), pb.y())]),
                EdgeClass::Street,
            ),
        );
        graph.add_edge(
            b,
            a,
            StreetEdge::new(
                LineString::from(vec![(pb.x(), pb.y()), (pa.x(), pa.y())]),
                EdgeClass::Street,
            ),
        );
    };
    for row in 0..side {
        for col in 0..side {
            let here = row * side + col;
            if col + 1 < side {
                connect(&mut graph, ids[here], ids[here + 1]);
            }
            if row + 1 < side {
                connect(&mut graph, ids[here], ids[here + side]);
            }
        }
    }
    (graph, ids[0], ids[side * side - 1])
}

fn bench_astar(c: &mut Criterion) {
    let (graph, from, to) = build_grid(30);

    c.bench_function("astar_grid_dijkstra", |b| {
        b.iter(|| {
            let mut search = AStarBuilder::new(&graph)
                .from_vertices([from])
                .to_vertices([to])
                .build();
            search.paths_to_target()
        });
    });

    let targets: hashbrown::HashSet<VertexId> = [to].into_iter().collect();
    c.bench_function("astar_grid_sphere_heuristic", |b| {
        b.iter(|| {
            let mut search = AStarBuilder::new(&graph)
                .with_heuristic(SphereDistanceHeuristic::new(&graph, &targets))
                .from_vertices([from])
                .to_vertices([to])
                .build();
            search.paths_to_target()
        });
    });
}

criterion_group!(benches, bench_astar);
criterion_main!(benches);
