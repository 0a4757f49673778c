//! `Fleet`: the dispatcher's object store for vehicles, orders, and sequences.
//!
//! Everything is kept in `BTreeMap`s keyed by typed IDs so that iteration
//! order (and with it every dispatch decision that scans the store) is
//! deterministic.  Order state changes go through
//! [`set_order_state`](Fleet::set_order_state), which enforces the order
//! state graph.

use std::collections::BTreeMap;

use fk_core::{
    OrderId, OrderSequence, SequenceId, Timestamp, TransportOrder, TransportOrderSpec,
    TransportOrderState, Vehicle, VehicleId,
};

use crate::{DispatchError, DispatchResult};

#[derive(Default)]
pub struct Fleet {
    vehicles:      BTreeMap<VehicleId, Vehicle>,
    orders:        BTreeMap<OrderId, TransportOrder>,
    sequences:     BTreeMap<SequenceId, OrderSequence>,
    next_order:    u32,
    next_sequence: u32,
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Vehicles ──────────────────────────────────────────────────────────

    pub fn add_vehicle(&mut self, vehicle: Vehicle) -> DispatchResult<()> {
        if self.vehicles.contains_key(&vehicle.id) {
            return Err(DispatchError::VehicleExists(vehicle.id));
        }
        self.vehicles.insert(vehicle.id, vehicle);
        Ok(())
    }

    pub fn remove_vehicle(&mut self, id: VehicleId) -> DispatchResult<Vehicle> {
        self.vehicles.remove(&id).ok_or(DispatchError::VehicleUnknown(id))
    }

    pub fn vehicle(&self, id: VehicleId) -> DispatchResult<&Vehicle> {
        self.vehicles.get(&id).ok_or(DispatchError::VehicleUnknown(id))
    }

    pub fn vehicle_mut(&mut self, id: VehicleId) -> DispatchResult<&mut Vehicle> {
        self.vehicles.get_mut(&id).ok_or(DispatchError::VehicleUnknown(id))
    }

    /// All vehicles in ID order.
    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    pub fn vehicle_ids(&self) -> Vec<VehicleId> {
        self.vehicles.keys().copied().collect()
    }

    // ── Orders ────────────────────────────────────────────────────────────

    /// Store a new RAW order built from `spec` and return its ID.
    pub fn insert_order(&mut self, spec: TransportOrderSpec, now: Timestamp) -> OrderId {
        let id = OrderId(self.next_order);
        self.next_order += 1;
        self.orders.insert(id, TransportOrder::from_spec(id, spec, now));
        id
    }

    pub fn order(&self, id: OrderId) -> DispatchResult<&TransportOrder> {
        self.orders.get(&id).ok_or(DispatchError::OrderUnknown(id))
    }

    pub fn order_mut(&mut self, id: OrderId) -> DispatchResult<&mut TransportOrder> {
        self.orders.get_mut(&id).ok_or(DispatchError::OrderUnknown(id))
    }

    /// All orders in ID (creation) order.
    pub fn orders(&self) -> impl Iterator<Item = &TransportOrder> {
        self.orders.values()
    }

    /// IDs of the orders currently in `state`, ascending.
    pub fn orders_in_state(&self, state: TransportOrderState) -> Vec<OrderId> {
        self.orders.values().filter(|o| o.state == state).map(|o| o.id).collect()
    }

    /// Move `id` to `to`, returning the previous state.
    ///
    /// # Errors
    ///
    /// [`DispatchError::InvalidTransition`] if the state graph forbids the
    /// move.  This is an invariant violation and is fatal to the kernel.
    pub fn set_order_state(&mut self, id: OrderId, to: TransportOrderState) -> DispatchResult<TransportOrderState> {
        let order = self.order_mut(id)?;
        let from = order.state;
        if !from.can_transition_to(to) {
            return Err(DispatchError::InvalidTransition { order: id, from, to });
        }
        order.state = to;
        Ok(from)
    }

    /// Non-terminal orders that list `id` as a dependency.
    pub fn dependents_of(&self, id: OrderId) -> Vec<OrderId> {
        self.orders
            .values()
            .filter(|o| !o.state.is_terminal() && o.dependencies.contains(&id))
            .map(|o| o.id)
            .collect()
    }

    // ── Sequences ─────────────────────────────────────────────────────────

    pub fn insert_sequence(&mut self, name: &str) -> SequenceId {
        let id = SequenceId(self.next_sequence);
        self.next_sequence += 1;
        self.sequences.insert(id, OrderSequence::new(id, name));
        id
    }

    pub fn sequence(&self, id: SequenceId) -> DispatchResult<&OrderSequence> {
        self.sequences.get(&id).ok_or(DispatchError::SequenceUnknown(id))
    }

    pub fn sequence_mut(&mut self, id: SequenceId) -> DispatchResult<&mut OrderSequence> {
        self.sequences.get_mut(&id).ok_or(DispatchError::SequenceUnknown(id))
    }

    pub fn sequences(&self) -> impl Iterator<Item = &OrderSequence> {
        self.sequences.values()
    }

    /// Move `finished_index` past every leading order in a terminal state and
    /// mark the sequence finished once it is complete and fully processed.
    ///
    /// Returns the sequence's `finished` flag.
    pub fn refresh_sequence(&mut self, id: SequenceId) -> DispatchResult<bool> {
        let processed = self
            .sequence(id)?
            .orders
            .iter()
            .take_while(|o| self.orders.get(*o).is_none_or(|o| o.state.is_terminal()))
            .count();
        let sequence = self.sequence_mut(id)?;
        sequence.finished_index = processed.checked_sub(1);
        sequence.finished = sequence.complete && processed == sequence.orders.len();
        Ok(sequence.finished)
    }
}
