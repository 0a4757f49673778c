//! Orders reserved for vehicles that are still busy.
//!
//! When the vehicle an order is intended for is processing another order,
//! the order is reserved for it instead of waiting in the free pool.  The
//! reserved-orders phase hands it over as soon as the vehicle is available.

use std::collections::BTreeMap;

use fk_core::{OrderId, VehicleId};

#[derive(Default, Debug)]
pub struct OrderReservationPool {
    by_vehicle: BTreeMap<VehicleId, Vec<OrderId>>,
    by_order:   BTreeMap<OrderId, VehicleId>,
}

impl OrderReservationPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `order` for `vehicle`.  An existing reservation of the order
    /// is replaced.
    pub fn reserve(&mut self, order: OrderId, vehicle: VehicleId) {
        self.remove_order(order);
        self.by_vehicle.entry(vehicle).or_default().push(order);
        self.by_order.insert(order, vehicle);
    }

    /// Orders reserved for `vehicle`, oldest reservation first.
    pub fn reservations_for(&self, vehicle: VehicleId) -> &[OrderId] {
        self.by_vehicle.get(&vehicle).map_or(&[], Vec::as_slice)
    }

    pub fn reserved_for(&self, order: OrderId) -> Option<VehicleId> {
        self.by_order.get(&order).copied()
    }

    /// `true` if `order` is reserved for a vehicle other than `vehicle`.
    pub fn is_reserved_for_other(&self, order: OrderId, vehicle: VehicleId) -> bool {
        self.reserved_for(order).is_some_and(|v| v != vehicle)
    }

    pub fn remove_order(&mut self, order: OrderId) {
        let Some(vehicle) = self.by_order.remove(&order) else { return };
        if let Some(orders) = self.by_vehicle.get_mut(&vehicle) {
            orders.retain(|&o| o != order);
            if orders.is_empty() {
                self.by_vehicle.remove(&vehicle);
            }
        }
    }

    /// Drop every reservation of `vehicle`.
    pub fn remove_vehicle(&mut self, vehicle: VehicleId) {
        for order in self.by_vehicle.remove(&vehicle).unwrap_or_default() {
            self.by_order.remove(&order);
        }
    }

    pub fn len(&self) -> usize {
        self.by_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_order.is_empty()
    }
}
