//! The order-assignment control loop.
//!
//! # Phases of one run
//!
//! ```text
//! activate orders      RAW ─► ACTIVE ─► DISPATCHABLE (dependencies finished)
//! reserved orders      vehicles that became available take their reservations
//! sequence successors  vehicles bound to a sequence take its next order
//! free orders          rank every admissible (order, vehicle) pair, commit greedily
//! recharge             idle vehicles with degraded energy go to a charger
//! park                 idle vehicles go to a free park position
//! ```
//!
//! A run is triggered by a new order, a vehicle becoming available, an order
//! finishing or failing, or the periodic fallback timer.  Orders without an
//! admissible vehicle stay DISPATCHABLE until the next run; there is no
//! backoff.  A candidate whose routing fails is logged and skipped without
//! aborting the run.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, info, warn};

use fk_core::{
    Clock, Destination, DestinationTarget, DispatcherConfig, DriveOrderState, IntegrationLevel,
    LocationId, OrderId, PlantModel, Point, PointId, PointType, ProcessingState, Resource, ResourceSet,
    Route, RoutingConfig, SequenceId, TransportOrderSpec, TransportOrderState, Vehicle,
    VehicleId, VehicleState, INFINITE_COSTS, OP_PARK, ORDER_TYPE_CHARGE, ORDER_TYPE_PARK,
};
use fk_routing::{DijkstraRouter, RoutingService};
use fk_scheduler::{vehicle_client, Scheduler};

use crate::filter::{self, Verdict};
use crate::{
    AssignmentCandidate, ComparatorChain, DispatchError, DispatchResult, Fleet,
    OrderReservationPool, VehicleClient, VehicleController,
};

/// Something the dispatcher did that observers may want to know about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchEvent {
    OrderStateChanged {
        order: OrderId,
        from:  TransportOrderState,
        to:    TransportOrderState,
    },
    OrderAssigned { order: OrderId, vehicle: VehicleId },
    OrderReserved { order: OrderId, vehicle: VehicleId },
}

/// Restricts a run to one vehicle or one order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Scope {
    All,
    Vehicle(VehicleId),
    Order(OrderId),
}

impl Scope {
    fn covers_vehicle(self, vehicle: VehicleId) -> bool {
        !matches!(self, Scope::Vehicle(v) if v != vehicle)
    }

    fn covers_order(self, order: OrderId) -> bool {
        !matches!(self, Scope::Order(o) if o != order)
    }
}

pub struct Dispatcher {
    config:       DispatcherConfig,
    clock:        Arc<dyn Clock>,
    fleet:        Fleet,
    routing:      RoutingService,
    comparators:  ComparatorChain,
    reservations: OrderReservationPool,
    controllers:  BTreeMap<VehicleId, Arc<dyn VehicleController>>,
    /// Events since the last [`take_events`](Self::take_events).
    events:       Vec<DispatchEvent>,
}

impl Dispatcher {
    /// # Errors
    ///
    /// Unknown comparator or edge evaluator keys.
    pub fn new(
        plant:   Arc<dyn PlantModel>,
        config:  &DispatcherConfig,
        routing: &RoutingConfig,
        clock:   Arc<dyn Clock>,
    ) -> DispatchResult<Self> {
        let comparators = ComparatorChain::from_keys(&config.candidate_priorities)?;
        let router = DijkstraRouter::from_config(routing)?;
        Ok(Self {
            config: config.clone(),
            clock,
            fleet: Fleet::new(),
            routing: RoutingService::new(router, plant),
            comparators,
            reservations: OrderReservationPool::new(),
            controllers: BTreeMap::new(),
            events: Vec::new(),
        })
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn comparators(&self) -> &ComparatorChain {
        &self.comparators
    }

    pub fn reservations(&self) -> &OrderReservationPool {
        &self.reservations
    }

    pub fn plant(&self) -> &Arc<dyn PlantModel> {
        self.routing.plant()
    }

    pub fn routing_mut(&mut self) -> &mut RoutingService {
        &mut self.routing
    }

    /// Drain the events recorded since the last call, in order.
    pub fn take_events(&mut self) -> Vec<DispatchEvent> {
        std::mem::take(&mut self.events)
    }

    /// Swap the plant model; cached routing tables are dropped.
    pub fn set_plant(&mut self, plant: Arc<dyn PlantModel>) {
        self.routing.set_plant(plant);
    }

    /// Drop cached routing tables after the plant topology changed.
    pub fn update_topology(&mut self) {
        self.routing.update_topology();
    }

    // ── Vehicles ──────────────────────────────────────────────────────────

    /// Register `vehicle` with the dispatcher and as a scheduler client.
    pub fn add_vehicle(
        &mut self,
        mut vehicle: Vehicle,
        controller:  Arc<dyn VehicleController>,
        scheduler:   &mut Scheduler,
    ) -> DispatchResult<()> {
        let id = vehicle.id;
        if self.fleet.vehicle(id).is_ok() {
            return Err(DispatchError::VehicleExists(id));
        }
        scheduler.register_client(Box::new(VehicleClient::new(id, Arc::clone(&controller))))?;
        scheduler.set_vehicle_paused(id, vehicle.paused)?;
        scheduler.set_envelope_key(id, vehicle.envelope_key.clone());

        vehicle.idle_since = self.clock.now();
        info!(vehicle = %vehicle.name, %id, "vehicle added");
        self.fleet.add_vehicle(vehicle)?;
        self.controllers.insert(id, controller);
        Ok(())
    }

    /// Withdraw the vehicle's order, release its resources, and forget it.
    pub fn remove_vehicle(&mut self, id: VehicleId, scheduler: &mut Scheduler) -> DispatchResult<Vehicle> {
        self.withdraw_order_by_vehicle(id, false, scheduler)?;
        self.reservations.remove_vehicle(id);
        scheduler.unregister_client(vehicle_client(id))?;
        self.controllers.remove(&id);
        info!(%id, "vehicle removed");
        self.fleet.remove_vehicle(id)
    }

    pub fn update_vehicle_state(&mut self, id: VehicleId, state: VehicleState) -> DispatchResult<()> {
        let now = self.clock.now();
        let vehicle = self.fleet.vehicle_mut(id)?;
        if vehicle.state != state {
            debug!(vehicle = %vehicle.name, from = ?vehicle.state, to = ?state, "vehicle state changed");
            if state == VehicleState::Idle {
                vehicle.idle_since = now;
            }
            vehicle.state = state;
        }
        Ok(())
    }

    pub fn update_vehicle_position(&mut self, id: VehicleId, position: Option<PointId>) -> DispatchResult<()> {
        if let Some(p) = position {
            self.routing.plant().point(p)?;
        }
        self.fleet.vehicle_mut(id)?.current_position = position;
        Ok(())
    }

    /// Set the energy level in percent, clamped to 100.
    pub fn update_vehicle_energy(&mut self, id: VehicleId, level: u8) -> DispatchResult<()> {
        self.fleet.vehicle_mut(id)?.energy_level = level.min(100);
        Ok(())
    }

    pub fn set_vehicle_paused(&mut self, id: VehicleId, paused: bool, scheduler: &mut Scheduler) -> DispatchResult<()> {
        self.fleet.vehicle_mut(id)?.paused = paused;
        scheduler.set_vehicle_paused(id, paused)?;
        Ok(())
    }

    /// Change how far the vehicle is integrated.
    ///
    /// Below `ToBeUtilized` the vehicle loses its order and reservations;
    /// below `ToBeRespected` it also loses every allocated resource.
    pub fn update_vehicle_integration_level(
        &mut self,
        id:        VehicleId,
        level:     IntegrationLevel,
        scheduler: &mut Scheduler,
    ) -> DispatchResult<()> {
        let vehicle = self.fleet.vehicle_mut(id)?;
        if vehicle.integration_level == level {
            return Ok(());
        }
        info!(vehicle = %vehicle.name, from = ?vehicle.integration_level, to = ?level, "integration level changed");
        vehicle.integration_level = level;
        let has_order = vehicle.transport_order.is_some();

        if level < IntegrationLevel::ToBeUtilized {
            if has_order {
                self.withdraw_order_by_vehicle(id, false, scheduler)?;
            }
            self.reservations.remove_vehicle(id);
        }
        if level < IntegrationLevel::ToBeRespected {
            scheduler.free_all(vehicle_client(id))?;
        }
        Ok(())
    }

    /// Copy each vehicle's remaining scheduler claim into its bookkeeping.
    pub fn sync_vehicle_claims(&mut self, scheduler: &Scheduler) {
        for id in self.fleet.vehicle_ids() {
            let claims = scheduler.claims_of(vehicle_client(id));
            if let Ok(vehicle) = self.fleet.vehicle_mut(id) {
                vehicle.claimed_resources = claims;
            }
        }
    }

    // ── Orders & sequences ────────────────────────────────────────────────

    /// Validate and store a new transport order in state RAW.
    ///
    /// Orders no eligible vehicle could route become UNROUTABLE at once when
    /// `dismiss_unroutable_orders` is set.
    ///
    /// # Errors
    ///
    /// Unknown references (vehicle, dependency, sequence, destination) and
    /// malformed orders are rejected without storing anything.
    pub fn create_order(&mut self, spec: TransportOrderSpec) -> DispatchResult<OrderId> {
        if spec.destinations.is_empty() {
            return Err(DispatchError::InvalidOrder(format!("{:?} has no destinations", spec.name)));
        }
        if let Some(v) = spec.intended_vehicle {
            self.fleet.vehicle(v)?;
        }
        for &dep in &spec.dependencies {
            self.fleet.order(dep)?;
        }
        if let Some(seq_id) = spec.sequence {
            let sequence = self.fleet.sequence(seq_id)?;
            if sequence.complete {
                return Err(DispatchError::InvalidOrder(format!("sequence {:?} is complete", sequence.name)));
            }
            if let (Some(a), Some(b)) = (sequence.intended_vehicle, spec.intended_vehicle) {
                if a != b {
                    return Err(DispatchError::InvalidOrder(format!(
                        "{:?} is intended for {b} but its sequence for {a}",
                        spec.name
                    )));
                }
            }
        }
        for destination in &spec.destinations {
            self.routing.destination_points(destination)?;
        }

        let routable = {
            let candidates: Vec<&Vehicle> = match spec.intended_vehicle {
                Some(v) => vec![self.fleet.vehicle(v)?],
                None => self
                    .fleet
                    .vehicles()
                    .filter(|v| v.integration_level == IntegrationLevel::ToBeUtilized)
                    .filter(|v| v.accepts_order_type(&spec.order_type))
                    .collect(),
            };
            self.routing.is_routable(&candidates, &spec.destinations)?
        };

        let sequence = spec.sequence;
        let id = self.fleet.insert_order(spec, self.clock.now());
        if let Some(seq_id) = sequence {
            self.fleet.sequence_mut(seq_id)?.orders.push(id);
        }
        info!(order = %id, name = %self.fleet.order(id)?.name, "transport order created");

        if !routable {
            if self.config.dismiss_unroutable_orders {
                warn!(order = %id, "order is unroutable");
                self.change_state(id, TransportOrderState::Unroutable)?;
                self.on_order_terminal(id)?;
            } else {
                warn!(order = %id, "order is currently unroutable");
            }
        }
        Ok(id)
    }

    /// Create an empty order sequence.
    pub fn create_sequence(
        &mut self,
        name:             &str,
        intended_vehicle: Option<VehicleId>,
        failure_fatal:    bool,
    ) -> DispatchResult<SequenceId> {
        if let Some(v) = intended_vehicle {
            self.fleet.vehicle(v)?;
        }
        let id = self.fleet.insert_sequence(name);
        let sequence = self.fleet.sequence_mut(id)?;
        sequence.intended_vehicle = intended_vehicle;
        sequence.failure_fatal = failure_fatal;
        debug!(sequence = %id, name, "order sequence created");
        Ok(id)
    }

    /// Declare that no more orders will be added to `id`.
    pub fn mark_sequence_complete(&mut self, id: SequenceId) -> DispatchResult<()> {
        self.fleet.sequence_mut(id)?.complete = true;
        self.refresh_sequence(id)
    }

    /// Withdraw `order`.  A BEING_PROCESSED order is withdrawn through its
    /// vehicle; withdrawing a terminal order is a no-op.
    pub fn withdraw_order(&mut self, order: OrderId, disable_vehicle: bool, scheduler: &mut Scheduler) -> DispatchResult<()> {
        let o = self.fleet.order(order)?;
        if o.state.is_terminal() {
            debug!(%order, state = %o.state, "order already terminal");
            return Ok(());
        }
        if o.state == TransportOrderState::BeingProcessed {
            if let Some(vehicle) = o.processing_vehicle {
                return self.withdraw_order_by_vehicle(vehicle, disable_vehicle, scheduler);
            }
        }
        info!(%order, "withdrawing order");
        self.change_state(order, TransportOrderState::Withdrawn)?;
        self.on_order_terminal(order)
    }

    /// Withdraw the current order of `vehicle` and release everything it
    /// holds except the point it stands on.
    ///
    /// Pending allocation requests are dropped first, so no partial grant
    /// survives.  The vehicle is available again on the next run unless
    /// `disable_vehicle` lowers it to `ToBeRespected`.
    pub fn withdraw_order_by_vehicle(
        &mut self,
        vehicle:         VehicleId,
        disable_vehicle: bool,
        scheduler:       &mut Scheduler,
    ) -> DispatchResult<()> {
        let current = self.fleet.vehicle(vehicle)?.transport_order;
        if let Some(order) = current {
            info!(%vehicle, %order, disable_vehicle, "withdrawing order from vehicle");
            if let Some(controller) = self.controllers.get(&vehicle) {
                controller.abort_order(false);
            }
            self.change_state(order, TransportOrderState::Withdrawn)?;
        }
        self.release_vehicle(vehicle, scheduler)?;
        if let Some(order) = current {
            self.on_order_terminal(order)?;
        }
        if disable_vehicle {
            self.fleet.vehicle_mut(vehicle)?.integration_level = IntegrationLevel::ToBeRespected;
            self.reservations.remove_vehicle(vehicle);
        }
        Ok(())
    }

    /// The vehicle completed its current drive order.
    ///
    /// Returns `true` if that finished the whole transport order.
    pub fn vehicle_finished_drive_order(&mut self, vehicle: VehicleId, scheduler: &mut Scheduler) -> DispatchResult<bool> {
        let id = self.fleet.vehicle(vehicle)?.transport_order.ok_or(DispatchError::NoOrder(vehicle))?;
        let order = self.fleet.order_mut(id)?;
        let index = order.current_drive_order;
        if let Some(drive) = order.drive_orders.get_mut(index) {
            drive.state = DriveOrderState::Finished;
        }
        if !order.on_last_drive_order() {
            order.current_drive_order += 1;
            if let Some(next) = order.drive_orders.get_mut(index + 1) {
                next.state = DriveOrderState::Travelling;
            }
            debug!(order = %id, %vehicle, drive_order = index + 1, "next drive order");
            return Ok(false);
        }

        info!(order = %id, %vehicle, "order finished");
        self.change_state(id, TransportOrderState::Finished)?;
        scheduler.unclaim(vehicle_client(vehicle))?;
        self.mark_vehicle_idle(vehicle)?;
        self.on_order_terminal(id)?;
        Ok(true)
    }

    /// The vehicle could not complete its current order.
    pub fn vehicle_failed_order(&mut self, vehicle: VehicleId, scheduler: &mut Scheduler) -> DispatchResult<()> {
        let id = self.fleet.vehicle(vehicle)?.transport_order.ok_or(DispatchError::NoOrder(vehicle))?;
        warn!(order = %id, %vehicle, "order failed");
        let order = self.fleet.order_mut(id)?;
        let index = order.current_drive_order;
        if let Some(drive) = order.drive_orders.get_mut(index) {
            drive.state = DriveOrderState::Failed;
        }
        self.change_state(id, TransportOrderState::Failed)?;
        self.release_vehicle(vehicle, scheduler)?;
        self.on_order_terminal(id)
    }

    // ── Dispatch entry points ─────────────────────────────────────────────

    /// Run every phase for all vehicles and orders.
    pub fn dispatch(&mut self, scheduler: &mut Scheduler) -> DispatchResult<()> {
        self.run(Scope::All, scheduler)
    }

    /// Run the assignment phases for a single vehicle.
    pub fn dispatch_vehicle(&mut self, vehicle: VehicleId, scheduler: &mut Scheduler) -> DispatchResult<()> {
        self.fleet.vehicle(vehicle)?;
        self.run(Scope::Vehicle(vehicle), scheduler)
    }

    /// Run the assignment phases for a single order.
    pub fn dispatch_order(&mut self, order: OrderId, scheduler: &mut Scheduler) -> DispatchResult<()> {
        self.fleet.order(order)?;
        self.run(Scope::Order(order), scheduler)
    }

    fn run(&mut self, scope: Scope, scheduler: &mut Scheduler) -> DispatchResult<()> {
        debug!(?scope, "dispatch run");
        self.activate_orders()?;
        self.assign_reserved_orders(scope, scheduler)?;
        self.assign_sequence_successors(scope, scheduler)?;
        self.assign_free_orders(scope, scheduler)?;
        if !matches!(scope, Scope::Order(_)) {
            self.recharge_idle_vehicles(scope, scheduler)?;
            self.park_idle_vehicles(scope, scheduler)?;
        }
        Ok(())
    }

    // ── Phase: activation ─────────────────────────────────────────────────

    fn activate_orders(&mut self) -> DispatchResult<()> {
        for id in self.fleet.orders_in_state(TransportOrderState::Raw) {
            if self.fleet.order(id)?.state != TransportOrderState::Raw {
                continue;
            }
            if self.dependency_failed(id)? {
                self.fail_for_dependency(id)?;
            } else {
                self.change_state(id, TransportOrderState::Active)?;
            }
        }
        for id in self.fleet.orders_in_state(TransportOrderState::Active) {
            if self.fleet.order(id)?.state != TransportOrderState::Active {
                continue;
            }
            if self.dependency_failed(id)? {
                self.fail_for_dependency(id)?;
            } else if self.dependencies_finished(id)? {
                self.change_state(id, TransportOrderState::Dispatchable)?;
            }
        }
        Ok(())
    }

    fn dependency_failed(&self, id: OrderId) -> DispatchResult<bool> {
        let order = self.fleet.order(id)?;
        Ok(order.dependencies.iter().any(|&d| {
            self.fleet
                .order(d)
                .is_ok_and(|o| o.state.is_terminal() && o.state != TransportOrderState::Finished)
        }))
    }

    fn dependencies_finished(&self, id: OrderId) -> DispatchResult<bool> {
        let order = self.fleet.order(id)?;
        Ok(order
            .dependencies
            .iter()
            .all(|&d| self.fleet.order(d).is_ok_and(|o| o.state == TransportOrderState::Finished)))
    }

    fn fail_for_dependency(&mut self, id: OrderId) -> DispatchResult<()> {
        warn!(order = %id, "dependency failed; failing order");
        self.change_state(id, TransportOrderState::Failed)?;
        self.on_order_terminal(id)
    }

    // ── Phase: reserved orders ────────────────────────────────────────────

    fn assign_reserved_orders(&mut self, scope: Scope, scheduler: &mut Scheduler) -> DispatchResult<()> {
        for vid in self.fleet.vehicle_ids() {
            if !scope.covers_vehicle(vid) {
                continue;
            }
            let reserved = self.reservations.reservations_for(vid).to_vec();
            if reserved.is_empty() || !self.vehicle_available(vid)? {
                continue;
            }
            for oid in reserved {
                if scope.covers_order(oid) && self.pair_admissible(oid, vid)? {
                    if let Some(candidate) = self.candidate(oid, vid) {
                        self.assign(candidate, scheduler)?;
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    // ── Phase: sequence successors ────────────────────────────────────────

    fn assign_sequence_successors(&mut self, scope: Scope, scheduler: &mut Scheduler) -> DispatchResult<()> {
        for vid in self.fleet.vehicle_ids() {
            if !scope.covers_vehicle(vid) {
                continue;
            }
            let Some(seq_id) = self.fleet.vehicle(vid)?.order_sequence else {
                continue;
            };
            let Ok(sequence) = self.fleet.sequence(seq_id) else {
                continue;
            };
            if sequence.finished {
                self.fleet.vehicle_mut(vid)?.order_sequence = None;
                continue;
            }
            let Some(next) = sequence.next_unfinished_order() else {
                continue;
            };
            if !scope.covers_order(next) || !self.vehicle_available(vid)? || !self.pair_admissible(next, vid)? {
                continue;
            }
            if let Some(candidate) = self.candidate(next, vid) {
                self.assign(candidate, scheduler)?;
            }
        }
        Ok(())
    }

    // ── Phase: free orders ────────────────────────────────────────────────

    fn assign_free_orders(&mut self, scope: Scope, scheduler: &mut Scheduler) -> DispatchResult<()> {
        let plant = Arc::clone(self.routing.plant());
        let mut orders: Vec<OrderId> = Vec::new();
        for order in self.fleet.orders() {
            if !scope.covers_order(order.id) || self.reservations.reserved_for(order.id).is_some() {
                continue;
            }
            if let Err(reason) = filter::order_dispatchable(&self.fleet, plant.as_ref(), order) {
                if order.state == TransportOrderState::Dispatchable {
                    debug!(order = %order.id, reason, "order filtered");
                }
                continue;
            }
            orders.push(order.id);
        }
        if orders.is_empty() {
            return Ok(());
        }

        let mut vehicles: Vec<VehicleId> = Vec::new();
        for vid in self.fleet.vehicle_ids() {
            if scope.covers_vehicle(vid) && self.vehicle_available(vid)? {
                vehicles.push(vid);
            }
        }

        orders.retain(|&oid| !self.reserve_for_busy_vehicle(oid, &vehicles));
        if vehicles.is_empty() {
            return Ok(());
        }

        let mut candidates = Vec::new();
        for &oid in &orders {
            for &vid in &vehicles {
                if self.pair_admissible(oid, vid)? {
                    candidates.extend(self.candidate(oid, vid));
                }
            }
        }
        self.comparators.sort(&mut candidates);

        let mut taken_orders = BTreeSet::new();
        let mut taken_vehicles = BTreeSet::new();
        for candidate in candidates {
            if taken_orders.contains(&candidate.order) || taken_vehicles.contains(&candidate.vehicle) {
                continue;
            }
            taken_orders.insert(candidate.order);
            taken_vehicles.insert(candidate.vehicle);
            self.assign(candidate, scheduler)?;
        }
        for oid in orders.into_iter().filter(|o| !taken_orders.contains(o)) {
            debug!(order = %oid, "no admissible vehicle");
        }
        Ok(())
    }

    /// Reserve `order` for its intended vehicle if that vehicle is busy with
    /// a regular order and has no reservation yet.  Returns `true` if the
    /// order is reserved now.
    fn reserve_for_busy_vehicle(&mut self, order: OrderId, available: &[VehicleId]) -> bool {
        let Ok(o) = self.fleet.order(order) else { return false };
        let Some(vid) = o.intended_vehicle else { return false };
        if available.contains(&vid) || o.wrapping_sequence.is_some() {
            return false;
        }
        let Ok(vehicle) = self.fleet.vehicle(vid) else { return false };
        let busy = vehicle.integration_level == IntegrationLevel::ToBeUtilized
            && vehicle.transport_order.is_some()
            && self.reservations.reservations_for(vid).is_empty();
        if !busy {
            return false;
        }
        debug!(%order, vehicle = %vid, "order reserved for busy vehicle");
        self.reservations.reserve(order, vid);
        self.events.push(DispatchEvent::OrderReserved { order, vehicle: vid });
        true
    }

    // ── Phase: recharge ───────────────────────────────────────────────────

    fn recharge_idle_vehicles(&mut self, scope: Scope, scheduler: &mut Scheduler) -> DispatchResult<()> {
        if !self.config.recharge_idle_vehicles {
            return Ok(());
        }
        let now = self.clock.now();
        for vid in self.fleet.vehicle_ids() {
            if !scope.covers_vehicle(vid) || !self.idle_for_auxiliary_order(vid, ORDER_TYPE_CHARGE)? {
                continue;
            }
            let vehicle = self.fleet.vehicle(vid)?;
            if !vehicle.is_energy_degraded() {
                continue;
            }
            if !vehicle.is_energy_critical()
                && now.since(vehicle.idle_since) < self.config.recharge_idle_vehicles_delay_ms
            {
                continue;
            }
            let Some(location) = self.nearest_recharge_location(vid)? else {
                debug!(vehicle = %vid, "no recharge location available");
                continue;
            };
            let vehicle = self.fleet.vehicle(vid)?;
            let spec = TransportOrderSpec::new(
                &format!("Recharge {}", vehicle.name),
                vec![Destination::location(location, &vehicle.recharge_operation)],
            )
            .with_order_type(ORDER_TYPE_CHARGE)
            .with_intended_vehicle(vid)
            .dispensable();
            info!(vehicle = %vid, %location, energy = vehicle.energy_level, "sending vehicle to recharge");
            self.inject_order(spec, vid, scheduler)?;
        }
        Ok(())
    }

    fn nearest_recharge_location(&mut self, vid: VehicleId) -> DispatchResult<Option<LocationId>> {
        let plant = Arc::clone(self.routing.plant());
        let (points, locations) = self.targets_of_others(vid);
        let vehicle = self.fleet.vehicle(vid)?;
        let Some(position) = vehicle.current_position else {
            return Ok(None);
        };

        let mut best: Option<(u64, LocationId)> = None;
        for location in plant.locations() {
            if location.locked || !location.allowed_operations.contains(&vehicle.recharge_operation) {
                continue;
            }
            if location.links.contains(&position) {
                // Already at a charger.
                return Ok(None);
            }
            if locations.contains(&location.id) || location.links.iter().any(|p| points.contains(p)) {
                continue;
            }
            for &link in &location.links {
                let costs = self.routing.costs(vehicle, position, link);
                if costs != INFINITE_COSTS && best.is_none_or(|b| (costs, location.id) < b) {
                    best = Some((costs, location.id));
                }
            }
        }
        Ok(best.map(|(_, l)| l))
    }

    // ── Phase: park ───────────────────────────────────────────────────────

    fn park_idle_vehicles(&mut self, scope: Scope, scheduler: &mut Scheduler) -> DispatchResult<()> {
        if !self.config.park_idle_vehicles {
            return Ok(());
        }
        let now = self.clock.now();
        let plant = Arc::clone(self.routing.plant());
        for vid in self.fleet.vehicle_ids() {
            if !scope.covers_vehicle(vid) || !self.idle_for_auxiliary_order(vid, ORDER_TYPE_PARK)? {
                continue;
            }
            let vehicle = self.fleet.vehicle(vid)?;
            if vehicle.is_energy_critical() || filter::at_park_position(plant.as_ref(), vehicle) {
                continue;
            }
            if now.since(vehicle.idle_since) < self.config.park_idle_vehicles_delay_ms {
                continue;
            }
            let Some(point) = self.nearest_park_position(vid)? else {
                debug!(vehicle = %vid, "no free park position");
                continue;
            };
            let name = format!("Park {}", self.fleet.vehicle(vid)?.name);
            let destination = Destination { target: DestinationTarget::Point(point), operation: OP_PARK.to_owned() };
            let spec = TransportOrderSpec::new(&name, vec![destination])
                .with_order_type(ORDER_TYPE_PARK)
                .with_intended_vehicle(vid)
                .dispensable();
            info!(vehicle = %vid, %point, "sending vehicle to park");
            self.inject_order(spec, vid, scheduler)?;
        }
        Ok(())
    }

    fn nearest_park_position(&mut self, vid: VehicleId) -> DispatchResult<Option<PointId>> {
        let plant = Arc::clone(self.routing.plant());
        let (occupied, _) = self.targets_of_others(vid);
        let vehicle = self.fleet.vehicle(vid)?;
        let Some(position) = vehicle.current_position else {
            return Ok(None);
        };

        let mut best: Option<(u64, PointId)> = None;
        for point in plant.fetch_points(&|p: &Point| p.point_type == PointType::Park) {
            if occupied.contains(&point.id) {
                continue;
            }
            let costs = self.routing.costs(vehicle, position, point.id);
            if costs != INFINITE_COSTS && best.is_none_or(|b| (costs, point.id) < b) {
                best = Some((costs, point.id));
            }
        }
        Ok(best.map(|(_, p)| p))
    }

    /// Points and locations other vehicles stand on or are heading to.
    fn targets_of_others(&self, vid: VehicleId) -> (BTreeSet<PointId>, BTreeSet<LocationId>) {
        let mut points = BTreeSet::new();
        let mut locations = BTreeSet::new();
        for other in self.fleet.vehicles().filter(|v| v.id != vid) {
            points.extend(other.current_position);
            let Some(order) = other.transport_order.and_then(|o| self.fleet.order(o).ok()) else {
                continue;
            };
            let Some(last) = order.drive_orders.last() else { continue };
            points.extend(last.route.as_ref().and_then(Route::final_point));
            match last.destination.target {
                DestinationTarget::Point(p) => {
                    points.insert(p);
                }
                DestinationTarget::Location(l) => {
                    locations.insert(l);
                }
            }
        }
        (points, locations)
    }

    fn idle_for_auxiliary_order(&self, vid: VehicleId, order_type: &str) -> DispatchResult<bool> {
        let vehicle = self.fleet.vehicle(vid)?;
        Ok(vehicle.state == VehicleState::Idle
            && vehicle.has_no_order()
            && vehicle.accepts_order_type(order_type)
            && !filter::bound_to_sequence(&self.fleet, vehicle)
            && self.reservations.reservations_for(vid).is_empty()
            && filter::vehicle_available(&self.fleet, vehicle).is_ok())
    }

    /// Create a synthetic order and hand it straight to `vid`.
    fn inject_order(&mut self, spec: TransportOrderSpec, vid: VehicleId, scheduler: &mut Scheduler) -> DispatchResult<()> {
        let id = self.create_order(spec)?;
        if self.fleet.order(id)?.state != TransportOrderState::Raw {
            return Ok(());
        }
        self.change_state(id, TransportOrderState::Active)?;
        self.change_state(id, TransportOrderState::Dispatchable)?;
        match self.candidate(id, vid) {
            Some(candidate) => self.assign(candidate, scheduler),
            None => {
                warn!(order = %id, vehicle = %vid, "no route for synthetic order");
                self.change_state(id, TransportOrderState::Withdrawn)?;
                self.on_order_terminal(id)
            }
        }
    }

    // ── Candidates & commit ───────────────────────────────────────────────

    fn vehicle_available(&self, vid: VehicleId) -> DispatchResult<bool> {
        let vehicle = self.fleet.vehicle(vid)?;
        Ok(log_verdict(filter::vehicle_available(&self.fleet, vehicle), "vehicle", vid))
    }

    fn pair_admissible(&self, oid: OrderId, vid: VehicleId) -> DispatchResult<bool> {
        let order = self.fleet.order(oid)?;
        let vehicle = self.fleet.vehicle(vid)?;
        let plant = self.routing.plant();
        let verdict = filter::order_dispatchable(&self.fleet, plant.as_ref(), order)
            .and_then(|()| filter::assignable(&self.fleet, &self.reservations, order, vehicle));
        Ok(match verdict {
            Ok(()) => true,
            Err(reason) => {
                debug!(order = %oid, vehicle = %vid, reason, "pair rejected");
                false
            }
        })
    }

    /// Route `oid` for `vid`.  Routing failures are logged and yield `None`.
    fn candidate(&mut self, oid: OrderId, vid: VehicleId) -> Option<AssignmentCandidate> {
        let (Ok(order), Ok(vehicle)) = (self.fleet.order(oid), self.fleet.vehicle(vid)) else {
            return None;
        };
        let start = vehicle.current_position?;
        let destinations: Vec<Destination> = order.drive_orders.iter().map(|d| d.destination.clone()).collect();
        match self.routing.select_route_sequence(vehicle, start, &destinations) {
            Ok(Some(routes)) => Some(AssignmentCandidate::new(
                order,
                vehicle,
                routes,
                self.clock.now(),
                self.config.deadline_at_risk_period_ms,
            )),
            Ok(None) => {
                debug!(order = %oid, vehicle = %vid, "no route");
                None
            }
            Err(error) => {
                warn!(order = %oid, vehicle = %vid, %error, "skipping candidate");
                None
            }
        }
    }

    /// Commit `candidate`: route the order, bind it to the vehicle, claim
    /// the route's resources, and notify the controller.
    fn assign(&mut self, candidate: AssignmentCandidate, scheduler: &mut Scheduler) -> DispatchResult<()> {
        let AssignmentCandidate { order: oid, vehicle: vid, routes, complete_routing_costs, .. } = candidate;

        if let Some(current) = self.fleet.vehicle(vid)?.transport_order {
            info!(vehicle = %vid, order = %current, "preempting dispensable order");
            self.withdraw_order_by_vehicle(vid, false, scheduler)?;
        }

        let claim = self.claim_sequence(oid, &routes)?;
        let order = self.fleet.order_mut(oid)?;
        for (drive, route) in order.drive_orders.iter_mut().zip(routes) {
            drive.route = Some(route);
        }
        order.current_drive_order = 0;
        if let Some(first) = order.drive_orders.first_mut() {
            first.state = DriveOrderState::Travelling;
        }
        order.processing_vehicle = Some(vid);
        let sequence = order.wrapping_sequence;
        self.change_state(oid, TransportOrderState::BeingProcessed)?;
        self.reservations.remove_order(oid);

        if let Some(seq_id) = sequence {
            self.fleet.sequence_mut(seq_id)?.processing_vehicle = Some(vid);
        }
        let vehicle = self.fleet.vehicle_mut(vid)?;
        vehicle.transport_order = Some(oid);
        vehicle.processing_state = ProcessingState::ProcessingOrder;
        if sequence.is_some() {
            vehicle.order_sequence = sequence;
        }
        vehicle.claimed_resources = claim.clone();
        scheduler.claim(vehicle_client(vid), claim)?;

        info!(order = %oid, vehicle = %vid, costs = complete_routing_costs, "order assigned");
        self.events.push(DispatchEvent::OrderAssigned { order: oid, vehicle: vid });
        if let Some(controller) = self.controllers.get(&vid) {
            controller.assign_order(self.fleet.order(oid)?);
        }
        Ok(())
    }

    /// Per-step resource sets of all routes; a location destination joins
    /// the last step of its drive order.
    fn claim_sequence(&self, oid: OrderId, routes: &[Route]) -> DispatchResult<Vec<ResourceSet>> {
        let order = self.fleet.order(oid)?;
        let mut claim = Vec::new();
        for (drive, route) in order.drive_orders.iter().zip(routes) {
            let mut steps = route.resource_sequence();
            if let DestinationTarget::Location(l) = drive.destination.target {
                let location = Resource::Location(l);
                match steps.last_mut() {
                    Some(last) => {
                        last.insert(location);
                    }
                    None => steps.push(ResourceSet::from([location])),
                }
            }
            claim.extend(steps);
        }
        Ok(claim)
    }

    // ── Bookkeeping ───────────────────────────────────────────────────────

    fn change_state(&mut self, id: OrderId, to: TransportOrderState) -> DispatchResult<()> {
        let from = self.fleet.set_order_state(id, to)?;
        debug!(order = %id, %from, %to, "order state changed");
        if to.is_terminal() {
            self.fleet.order_mut(id)?.finished_time = Some(self.clock.now());
        }
        self.events.push(DispatchEvent::OrderStateChanged { order: id, from, to });
        Ok(())
    }

    /// Drop pending requests, the claim, and every allocation but the
    /// current position; then mark the vehicle idle.
    fn release_vehicle(&mut self, vid: VehicleId, scheduler: &mut Scheduler) -> DispatchResult<()> {
        let client = vehicle_client(vid);
        let keep: ResourceSet = self
            .fleet
            .vehicle(vid)?
            .current_position
            .map(Resource::Point)
            .into_iter()
            .collect();
        scheduler.clear_pending(client);
        scheduler.unclaim(client)?;
        scheduler.free_all_except(client, &keep)?;
        self.mark_vehicle_idle(vid)
    }

    fn mark_vehicle_idle(&mut self, vid: VehicleId) -> DispatchResult<()> {
        let now = self.clock.now();
        let vehicle = self.fleet.vehicle_mut(vid)?;
        vehicle.transport_order = None;
        vehicle.processing_state = ProcessingState::Idle;
        vehicle.claimed_resources.clear();
        vehicle.idle_since = now;
        Ok(())
    }

    /// Propagate a terminal state: drop the reservation, fail dependents of
    /// unsuccessful orders, and advance the wrapping sequence (failing its
    /// remaining orders when failure is fatal).
    fn on_order_terminal(&mut self, root: OrderId) -> DispatchResult<()> {
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            self.reservations.remove_order(id);
            let order = self.fleet.order(id)?;
            let succeeded = order.state == TransportOrderState::Finished;
            let sequence = order.wrapping_sequence;

            let mut doomed = Vec::new();
            if !succeeded {
                doomed.extend(self.fleet.dependents_of(id));
            }
            if let Some(seq_id) = sequence {
                let seq = self.fleet.sequence(seq_id)?;
                if !succeeded && seq.failure_fatal {
                    let position = seq.orders.iter().position(|&o| o == id);
                    doomed.extend(position.into_iter().flat_map(|i| seq.orders[i + 1..].iter().copied()));
                }
            }

            for dependent in doomed {
                let state = self.fleet.order(dependent)?.state;
                if state.is_terminal() {
                    continue;
                }
                if state == TransportOrderState::BeingProcessed {
                    warn!(order = %dependent, cause = %id, "cannot fail an order being processed");
                    continue;
                }
                warn!(order = %dependent, cause = %id, "failing order");
                self.change_state(dependent, TransportOrderState::Failed)?;
                queue.push_back(dependent);
            }
            if let Some(seq_id) = sequence {
                self.refresh_sequence(seq_id)?;
            }
        }
        Ok(())
    }

    fn refresh_sequence(&mut self, id: SequenceId) -> DispatchResult<()> {
        if !self.fleet.refresh_sequence(id)? {
            return Ok(());
        }
        info!(sequence = %id, "order sequence finished");
        if let Some(vid) = self.fleet.sequence(id)?.processing_vehicle {
            if let Ok(vehicle) = self.fleet.vehicle_mut(vid) {
                if vehicle.order_sequence == Some(id) {
                    vehicle.order_sequence = None;
                }
            }
        }
        Ok(())
    }
}

fn log_verdict(verdict: Verdict, what: &'static str, vehicle: VehicleId) -> bool {
    match verdict {
        Ok(()) => true,
        Err(reason) => {
            debug!(%vehicle, reason, "{what} unavailable");
            false
        }
    }
}
