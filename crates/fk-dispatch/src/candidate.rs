//! Assignment candidates: one (order, vehicle, routes) pairing per cycle.

use fk_core::{OrderId, Route, Timestamp, TransportOrder, Vehicle, VehicleId};

/// An admissible pairing produced during one dispatch cycle.  Never stored
/// beyond the cycle that created it.
#[derive(Clone, Debug)]
pub struct AssignmentCandidate {
    pub order:                  OrderId,
    pub vehicle:                VehicleId,
    /// One route per drive order.
    pub routes:                 Vec<Route>,
    /// Cost of the route to the first destination.
    pub initial_routing_costs:  u64,
    /// Cost of all routes together.
    pub complete_routing_costs: u64,

    // ── Ranking inputs, copied at creation ───────────────────────────────
    pub order_name:       String,
    pub vehicle_name:     String,
    pub deadline:         Timestamp,
    pub creation_time:    Timestamp,
    pub deadline_at_risk: bool,
    pub energy_level:     u8,
    /// The vehicle has no order at all (as opposed to a dispensable one).
    pub vehicle_idle:     bool,
}

impl AssignmentCandidate {
    pub fn new(
        order:          &TransportOrder,
        vehicle:        &Vehicle,
        routes:         Vec<Route>,
        now:            Timestamp,
        at_risk_period: u64,
    ) -> Self {
        let initial_routing_costs = routes.first().map_or(0, |r| r.costs);
        let complete_routing_costs = routes.iter().map(|r| r.costs).sum();
        Self {
            order: order.id,
            vehicle: vehicle.id,
            routes,
            initial_routing_costs,
            complete_routing_costs,
            order_name: order.name.clone(),
            vehicle_name: vehicle.name.clone(),
            deadline: order.deadline,
            creation_time: order.creation_time,
            deadline_at_risk: order.deadline_at_risk(now, at_risk_period),
            energy_level: vehicle.energy_level,
            vehicle_idle: vehicle.has_no_order(),
        }
    }
}
