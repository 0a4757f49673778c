//! Per-vehicle path graph in CSR form.
//!
//! # Data layout
//!
//! Every navigable (path, direction) pair becomes one directed edge.  Edges
//! are sorted by source point and then by `(PathId, Orientation)`, and the
//! outgoing edges of point `n` occupy
//!
//! ```text
//! edges[ out_start[n] .. out_start[n+1] ]
//! ```
//!
//! so Dijkstra's inner loop is a contiguous scan, and the scan order is the
//! same on every rebuild.
//!
//! # Vehicle restrictions
//!
//! A path contributes no edge in a direction if it is locked, forbidden for
//! the vehicle, or either the path or the vehicle has a zero velocity limit
//! in that direction.

use fk_core::{Orientation, PathId, PlantModel, PointId, Vehicle};

use crate::EdgeEvaluator;

/// One directed, weighted traversal of a plant path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphEdge {
    pub path:        PathId,
    pub from:        PointId,
    pub to:          PointId,
    pub orientation: Orientation,
    pub cost:        u64,
}

impl GraphEdge {
    /// Tie-break key: lower path ID first, forward before backward.
    #[inline]
    pub fn tie_key(&self) -> (PathId, u8) {
        (self.path, self.orientation as u8)
    }
}

/// Directed, weighted graph of the plant as seen by one vehicle.
pub struct PathGraph {
    point_count: usize,
    /// CSR row pointer; length = `point_count + 1`.
    out_start:   Vec<u32>,
    /// Edges sorted by `(from, path, orientation)`.
    edges:       Vec<GraphEdge>,
}

impl PathGraph {
    /// Build the graph of `plant` for `vehicle`, weighting each edge with the
    /// sum of `evaluators`.
    ///
    /// Time complexity: O(E log E) for the edge sort.
    pub fn build(plant: &dyn PlantModel, vehicle: &Vehicle, evaluators: &[EdgeEvaluator]) -> Self {
        let point_count = plant.points().len();
        let mut edges = Vec::with_capacity(plant.paths().len() * 2);

        for path in plant.paths() {
            if path.locked || vehicle.forbidden_paths.contains(&path.id) {
                continue;
            }
            if path.navigable_forward() && vehicle.max_velocity > 0 {
                edges.push(GraphEdge {
                    path:        path.id,
                    from:        path.source,
                    to:          path.destination,
                    orientation: Orientation::Forward,
                    cost:        edge_cost(evaluators, path, vehicle, Orientation::Forward),
                });
            }
            if path.navigable_reverse() && vehicle.max_reverse_velocity > 0 {
                edges.push(GraphEdge {
                    path:        path.id,
                    from:        path.destination,
                    to:          path.source,
                    orientation: Orientation::Backward,
                    cost:        edge_cost(evaluators, path, vehicle, Orientation::Backward),
                });
            }
        }

        edges.sort_unstable_by_key(|e| (e.from, e.tie_key()));

        let mut out_start = vec![0u32; point_count + 1];
        for e in &edges {
            out_start[e.from.index() + 1] += 1;
        }
        for i in 1..=point_count {
            out_start[i] += out_start[i - 1];
        }
        debug_assert_eq!(out_start[point_count] as usize, edges.len());

        Self { point_count, out_start, edges }
    }

    pub fn point_count(&self) -> usize {
        self.point_count
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn edge(&self, idx: u32) -> &GraphEdge {
        &self.edges[idx as usize]
    }

    /// Indices of the outgoing edges of `point`; a contiguous range.
    #[inline]
    pub fn out_edges(&self, point: PointId) -> std::ops::Range<u32> {
        self.out_start[point.index()]..self.out_start[point.index() + 1]
    }
}

fn edge_cost(
    evaluators:  &[EdgeEvaluator],
    path:        &fk_core::Path,
    vehicle:     &Vehicle,
    orientation: Orientation,
) -> u64 {
    evaluators
        .iter()
        .fold(0u64, |acc, ev| acc.saturating_add(ev.evaluate(path, vehicle, orientation)))
}
