//! All-pairs routing table for one vehicle.
//!
//! # Layout
//!
//! `dist` and `prev` are row-major `N × N` arrays indexed by
//! `src * N + dst`.  `prev[src][dst]` is the index of the graph edge that
//! reaches `dst` on the chosen shortest route from `src`; routes are rebuilt
//! on demand by walking those edges backwards.
//!
//! # Tie-breaking
//!
//! Among equal-cost routes the one whose final edge has the lowest
//! `(PathId, orientation)` wins, applied at every point along the route.
//! Only edges coming from already-settled points may replace a predecessor,
//! so the predecessor chains are acyclic even with zero-cost edges.  The
//! result depends only on the graph, never on heap internals, so repeated
//! computations over an unchanged model return identical routes.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use fk_core::{INFINITE_COSTS, PointId, Route, Step};

use crate::PathGraph;

const NO_EDGE: u32 = u32::MAX;

/// Shortest routes and costs between every pair of points.
pub struct RoutingTable {
    graph: PathGraph,
    n:     usize,
    dist:  Vec<u64>,
    prev:  Vec<u32>,
}

impl RoutingTable {
    /// Run Dijkstra from every point of `graph`.
    ///
    /// With the `parallel` feature, rows are computed on Rayon's thread pool.
    pub fn compute(graph: PathGraph) -> Self {
        let n = graph.point_count();
        let mut dist = vec![INFINITE_COSTS; n * n];
        let mut prev = vec![NO_EDGE; n * n];

        if n > 0 {
            #[cfg(feature = "parallel")]
            {
                use rayon::prelude::*;
                dist.par_chunks_mut(n)
                    .zip(prev.par_chunks_mut(n))
                    .enumerate()
                    .for_each(|(src, (d, p))| single_source(&graph, PointId(src as u32), d, p));
            }
            #[cfg(not(feature = "parallel"))]
            {
                for (src, (d, p)) in dist.chunks_mut(n).zip(prev.chunks_mut(n)).enumerate() {
                    single_source(&graph, PointId(src as u32), d, p);
                }
            }
        }

        Self { graph, n, dist, prev }
    }

    pub fn point_count(&self) -> usize {
        self.n
    }

    pub fn graph(&self) -> &PathGraph {
        &self.graph
    }

    #[inline]
    fn in_range(&self, p: PointId) -> bool {
        p.index() < self.n
    }

    /// Cost of the cheapest route, `0` if `src == dst`, or [`INFINITE_COSTS`]
    /// if `dst` is unreachable or either point is unknown.
    pub fn costs(&self, src: PointId, dst: PointId) -> u64 {
        if !self.in_range(src) || !self.in_range(dst) {
            return INFINITE_COSTS;
        }
        self.dist[src.index() * self.n + dst.index()]
    }

    /// `true` if a route exists.
    pub fn is_reachable(&self, src: PointId, dst: PointId) -> bool {
        self.costs(src, dst) != INFINITE_COSTS
    }

    /// Steps of the cheapest route; empty if `src == dst`, `None` if
    /// unreachable.
    pub fn route_steps(&self, src: PointId, dst: PointId) -> Option<Vec<Step>> {
        if !self.is_reachable(src, dst) {
            return None;
        }
        let row = src.index() * self.n;
        let mut edges = Vec::new();
        let mut cur = dst;
        while cur != src {
            let e = self.prev[row + cur.index()];
            debug_assert_ne!(e, NO_EDGE, "reachable point without predecessor");
            if e == NO_EDGE {
                return None;
            }
            let edge = self.graph.edge(e);
            edges.push(edge);
            cur = edge.from;
        }
        edges.reverse();

        Some(
            edges
                .into_iter()
                .enumerate()
                .map(|(i, e)| Step {
                    path:        e.path,
                    source:      e.from,
                    destination: e.to,
                    orientation: e.orientation,
                    route_index: i,
                    cost:        e.cost,
                })
                .collect(),
        )
    }

    /// The cheapest route as a [`Route`], or `None` if unreachable.
    pub fn route(&self, src: PointId, dst: PointId) -> Option<Route> {
        self.route_steps(src, dst).map(Route::new)
    }
}

// ── Dijkstra internals ────────────────────────────────────────────────────────

fn single_source(graph: &PathGraph, src: PointId, dist: &mut [u64], prev: &mut [u32]) {
    let mut settled = vec![false; dist.len()];
    dist[src.index()] = 0;

    // Min-heap on (cost, point).  Secondary key PointId makes pop order total.
    let mut heap: BinaryHeap<Reverse<(u64, PointId)>> = BinaryHeap::new();
    heap.push(Reverse((0, src)));

    while let Some(Reverse((cost, node))) = heap.pop() {
        // Skip stale heap entries.
        if settled[node.index()] || cost > dist[node.index()] {
            continue;
        }
        settled[node.index()] = true;

        for idx in graph.out_edges(node) {
            let edge = graph.edge(idx);
            let to = edge.to.index();
            if settled[to] {
                continue;
            }
            let new_cost = cost.saturating_add(edge.cost);
            if new_cost == INFINITE_COSTS {
                continue;
            }

            if new_cost < dist[to] {
                dist[to] = new_cost;
                prev[to] = idx;
                heap.push(Reverse((new_cost, edge.to)));
            } else if new_cost == dist[to] && edge.tie_key() < graph.edge(prev[to]).tie_key() {
                prev[to] = idx;
            }
        }
    }
}
