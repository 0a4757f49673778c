//! Table cache, point-to-point queries, and route-sequence selection.
//!
//! Vehicles with identical routing restrictions (forbidden paths and
//! velocity limits) share one [`RoutingTable`].  Tables are computed lazily
//! on first use and dropped by [`RoutingService::update_topology`] whenever
//! the plant model changes (e.g. a path is locked).

use std::collections::BTreeSet;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use fk_core::{
    Destination, DestinationTarget, OP_MOVE, OP_NOP, OP_PARK, PathId, PlantModel, PointId, Route,
    Vehicle, VehicleId, INFINITE_COSTS,
};

use crate::{DijkstraRouter, Router, RoutingResult, RoutingTable};

/// The vehicle attributes a routing table depends on.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct RoutingKey {
    forbidden_paths:      BTreeSet<PathId>,
    max_velocity:         u32,
    max_reverse_velocity: u32,
}

impl RoutingKey {
    fn of(vehicle: &Vehicle) -> Self {
        Self {
            forbidden_paths:      vehicle.forbidden_paths.clone(),
            max_velocity:         vehicle.max_velocity,
            max_reverse_velocity: vehicle.max_reverse_velocity,
        }
    }
}

/// Routing façade used by the dispatcher.
pub struct RoutingService<R: Router = DijkstraRouter> {
    router: R,
    plant:  Arc<dyn PlantModel>,
    tables: FxHashMap<RoutingKey, Arc<RoutingTable>>,
}

impl<R: Router> RoutingService<R> {
    pub fn new(router: R, plant: Arc<dyn PlantModel>) -> Self {
        Self { router, plant, tables: FxHashMap::default() }
    }

    pub fn plant(&self) -> &Arc<dyn PlantModel> {
        &self.plant
    }

    /// Replace the plant model and drop all cached tables.
    pub fn set_plant(&mut self, plant: Arc<dyn PlantModel>) {
        self.plant = plant;
        self.update_topology();
    }

    /// Drop all cached tables; they are recomputed on next use.
    pub fn update_topology(&mut self) {
        debug!(tables = self.tables.len(), "routing topology invalidated");
        self.tables.clear();
    }

    /// The routing table for `vehicle`, computing it if necessary.
    pub fn table_for(&mut self, vehicle: &Vehicle) -> Arc<RoutingTable> {
        let key = RoutingKey::of(vehicle);
        if let Some(table) = self.tables.get(&key) {
            return Arc::clone(table);
        }
        debug!(vehicle = %vehicle.name, "computing routing table");
        let table = Arc::new(self.router.compute_table(self.plant.as_ref(), vehicle));
        self.tables.insert(key, Arc::clone(&table));
        table
    }

    /// Cost from `src` to `dst` for `vehicle`; [`INFINITE_COSTS`] if unreachable.
    pub fn costs(&mut self, vehicle: &Vehicle, src: PointId, dst: PointId) -> u64 {
        self.table_for(vehicle).costs(src, dst)
    }

    /// Cheapest route from `src` to `dst` for `vehicle`.
    pub fn route(&mut self, vehicle: &Vehicle, src: PointId, dst: PointId) -> Option<Route> {
        self.table_for(vehicle).route(src, dst)
    }

    /// Points at which `destination` can be reached, ascending.
    ///
    /// A point destination yields itself.  A location yields its linked
    /// points, or nothing if it is locked or does not allow the operation.
    pub fn destination_points(&self, destination: &Destination) -> RoutingResult<Vec<PointId>> {
        match destination.target {
            DestinationTarget::Point(p) => {
                self.plant.point(p)?;
                Ok(vec![p])
            }
            DestinationTarget::Location(l) => {
                let location = self.plant.location(l)?;
                let op = destination.operation.as_str();
                let op_allowed = op == OP_NOP
                    || op == OP_MOVE
                    || op == OP_PARK
                    || location.allowed_operations.contains(op);
                if location.locked || !op_allowed {
                    return Ok(Vec::new());
                }
                let mut points = location.links.clone();
                points.sort_unstable();
                points.dedup();
                Ok(points)
            }
        }
    }

    /// Select the cheapest full route sequence visiting `destinations` in
    /// order, starting at `start`.
    ///
    /// Each location destination may be reached via any of its linked
    /// points, so several sequences can exist.  The lowest total cost wins;
    /// equal-cost sequences are ordered lexicographically by the path IDs
    /// they traverse, then by their destination points.
    ///
    /// Returns `Ok(None)` if no sequence exists.
    pub fn select_route_sequence(
        &mut self,
        vehicle:      &Vehicle,
        start:        PointId,
        destinations: &[Destination],
    ) -> RoutingResult<Option<Vec<Route>>> {
        let legs: Vec<Vec<PointId>> = destinations
            .iter()
            .map(|d| self.destination_points(d))
            .collect::<RoutingResult<_>>()?;
        if legs.iter().any(Vec::is_empty) {
            return Ok(None);
        }

        let table = self.table_for(vehicle);
        let mut search = SequenceSearch { table: &table, legs: &legs, best: None };
        let mut partial = Vec::with_capacity(legs.len());
        search.descend(start, 0, 0, &mut partial);

        Ok(search.best.map(|b| b.routes))
    }

    /// `true` if some vehicle in `vehicles` (or an unrestricted vehicle when
    /// the slice is empty) can travel between consecutive destinations.
    ///
    /// The start point is unknown at order creation, so only the legs
    /// between destinations are checked.
    pub fn is_routable(&mut self, vehicles: &[&Vehicle], destinations: &[Destination]) -> RoutingResult<bool> {
        let legs: Vec<Vec<PointId>> = destinations
            .iter()
            .map(|d| self.destination_points(d))
            .collect::<RoutingResult<_>>()?;
        if legs.iter().any(Vec::is_empty) {
            return Ok(false);
        }

        let unrestricted;
        let candidates: Vec<&Vehicle> = if vehicles.is_empty() {
            unrestricted = Vehicle::new(VehicleId::INVALID, "");
            vec![&unrestricted]
        } else {
            vehicles.to_vec()
        };

        for vehicle in candidates {
            let table = self.table_for(vehicle);
            let mut reachable: Vec<PointId> = legs[0].clone();
            for leg in &legs[1..] {
                reachable = leg
                    .iter()
                    .copied()
                    .filter(|&to| reachable.iter().any(|&from| table.is_reachable(from, to)))
                    .collect();
                if reachable.is_empty() {
                    break;
                }
            }
            if !reachable.is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

// ── Sequence search ───────────────────────────────────────────────────────────

struct BestSequence {
    cost:   u64,
    paths:  Vec<PathId>,
    points: Vec<PointId>,
    routes: Vec<Route>,
}

struct SequenceSearch<'a> {
    table: &'a RoutingTable,
    legs:  &'a [Vec<PointId>],
    best:  Option<BestSequence>,
}

impl SequenceSearch<'_> {
    fn descend(&mut self, from: PointId, leg: usize, cost: u64, partial: &mut Vec<(PointId, Route)>) {
        if let Some(best) = &self.best {
            if cost > best.cost {
                return;
            }
        }
        if leg == self.legs.len() {
            self.offer(cost, partial);
            return;
        }

        for &to in &self.legs[leg] {
            let leg_cost = self.table.costs(from, to);
            if leg_cost == INFINITE_COSTS {
                continue;
            }
            let Some(route) = self.table.route(from, to) else {
                continue;
            };
            partial.push((to, route));
            self.descend(to, leg + 1, cost.saturating_add(leg_cost), partial);
            partial.pop();
        }
    }

    fn offer(&mut self, cost: u64, partial: &[(PointId, Route)]) {
        let paths: Vec<PathId> = partial.iter().flat_map(|(_, r)| r.path_key()).collect();
        let points: Vec<PointId> = partial.iter().map(|(p, _)| *p).collect();

        let better = match &self.best {
            None => true,
            Some(b) => (cost, &paths, &points) < (b.cost, &b.paths, &b.points),
        };
        if better {
            self.best = Some(BestSequence {
                cost,
                paths,
                points,
                routes: partial.iter().map(|(_, r)| r.clone()).collect(),
            });
        }
    }
}
