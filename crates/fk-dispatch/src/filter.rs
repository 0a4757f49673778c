//! Selection filters for vehicles, orders, and (order, vehicle) pairs.
//!
//! Each filter returns `Ok(())` to accept or `Err(reason)` with a static
//! reason string that ends up in the dispatcher's debug log.

use fk_core::{
    DestinationTarget, IntegrationLevel, PlantModel, PointType, ProcessingState, TransportOrder,
    TransportOrderState, Vehicle, VehicleState, ORDER_TYPE_CHARGE,
};

use crate::{Fleet, OrderReservationPool};

/// Outcome of a filter: accepted, or rejected with a reason.
pub type Verdict = Result<(), &'static str>;

/// Can `vehicle` take a new order at all?
///
/// The vehicle must be fully integrated, located, unpaused, idle (or
/// charging with enough energy), and either without an order or busy with a
/// dispensable one.
pub fn vehicle_available(fleet: &Fleet, vehicle: &Vehicle) -> Verdict {
    if vehicle.integration_level != IntegrationLevel::ToBeUtilized {
        return Err("not to be utilized");
    }
    if vehicle.current_position.is_none() {
        return Err("position unknown");
    }
    if vehicle.paused {
        return Err("paused");
    }
    match vehicle.state {
        VehicleState::Idle => {}
        VehicleState::Charging if vehicle.is_sufficiently_recharged() => {}
        VehicleState::Charging => return Err("charging"),
        // A vehicle working on a dispensable order reports Executing.
        VehicleState::Executing if current_order_dispensable(fleet, vehicle) => {}
        _ => return Err("vehicle state"),
    }
    match vehicle.processing_state {
        ProcessingState::Idle if vehicle.transport_order.is_none() => Ok(()),
        ProcessingState::ProcessingOrder | ProcessingState::AwaitingOrder
            if current_order_dispensable(fleet, vehicle) =>
        {
            Ok(())
        }
        _ => Err("processing order"),
    }
}

fn current_order_dispensable(fleet: &Fleet, vehicle: &Vehicle) -> bool {
    vehicle
        .transport_order
        .and_then(|id| fleet.order(id).ok())
        .is_some_and(|o| o.dispensable)
}

/// Is `order` ready to be handed to some vehicle?
///
/// Checks dispatchability, locked destination locations, and sequence
/// position.  Reservations are checked per vehicle in [`assignable`].
pub fn order_dispatchable(fleet: &Fleet, plant: &dyn PlantModel, order: &TransportOrder) -> Verdict {
    if order.state != TransportOrderState::Dispatchable {
        return Err("not dispatchable");
    }
    for drive in &order.drive_orders {
        if let DestinationTarget::Location(l) = drive.destination.target {
            match plant.location(l) {
                Ok(location) if location.locked => return Err("destination locked"),
                Ok(_) => {}
                Err(_) => return Err("destination unknown"),
            }
        }
    }
    if let Some(seq_id) = order.wrapping_sequence {
        let Ok(sequence) = fleet.sequence(seq_id) else {
            return Err("sequence unknown");
        };
        if sequence.next_unfinished_order() != Some(order.id) {
            return Err("not next in sequence");
        }
    }
    Ok(())
}

/// May `order` be assigned to `vehicle`?
pub fn assignable(
    fleet:        &Fleet,
    reservations: &OrderReservationPool,
    order:        &TransportOrder,
    vehicle:      &Vehicle,
) -> Verdict {
    if order.intended_vehicle.is_some_and(|v| v != vehicle.id) {
        return Err("intended for another vehicle");
    }
    if reservations.is_reserved_for_other(order.id, vehicle.id) {
        return Err("reserved for another vehicle");
    }
    if !vehicle.accepts_order_type(&order.order_type) {
        return Err("order type not accepted");
    }
    if vehicle.is_energy_critical() && order.order_type != ORDER_TYPE_CHARGE {
        return Err("energy critical");
    }
    if order.dispensable && current_order_dispensable(fleet, vehicle) {
        return Err("would replace a dispensable order");
    }
    if bound_to_sequence(fleet, vehicle) && order.wrapping_sequence != vehicle.order_sequence {
        return Err("vehicle bound to another sequence");
    }
    if let Some(seq_id) = order.wrapping_sequence {
        let Ok(sequence) = fleet.sequence(seq_id) else {
            return Err("sequence unknown");
        };
        if sequence.intended_vehicle.is_some_and(|v| v != vehicle.id) {
            return Err("sequence intended for another vehicle");
        }
        if sequence.processing_vehicle.is_some_and(|v| v != vehicle.id) {
            return Err("sequence bound to another vehicle");
        }
    }
    Ok(())
}

/// `true` if `vehicle` is bound to an unfinished order sequence.
pub fn bound_to_sequence(fleet: &Fleet, vehicle: &Vehicle) -> bool {
    vehicle
        .order_sequence
        .and_then(|id| fleet.sequence(id).ok())
        .is_some_and(|s| !s.finished)
}

/// Is `vehicle` standing on a park position?
pub fn at_park_position(plant: &dyn PlantModel, vehicle: &Vehicle) -> bool {
    vehicle
        .current_position
        .and_then(|p| plant.point(p).ok())
        .is_some_and(|p| p.point_type == PointType::Park)
}
