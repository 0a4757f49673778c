//! Vehicle state as seen by the kernel.
//!
//! The vehicle controller layer reports position, state, and energy; the
//! dispatcher writes `processing_state`, `transport_order`, and the resource
//! claim bookkeeping.  No other component mutates a [`Vehicle`].

use std::collections::BTreeSet;

use crate::{OrderId, PathId, PointId, ResourceSet, SequenceId, Timestamp, VehicleId};

/// Order type accepted by every vehicle that lists it; matches all types.
pub const ANY_ORDER_TYPE: &str = "*";

/// Physical/communication state reported by the vehicle controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VehicleState {
    #[default]
    Unknown,
    Unavailable,
    Error,
    Idle,
    Executing,
    Charging,
}

/// What the dispatcher is currently doing with the vehicle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProcessingState {
    /// No order assigned.
    #[default]
    Idle,
    /// Finished a drive order; waiting for the next one.
    AwaitingOrder,
    /// Executing a drive order.
    ProcessingOrder,
}

/// How far the kernel integrates the vehicle into fleet control.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IntegrationLevel {
    /// Position is ignored entirely.
    ToBeIgnored,
    /// Position is shown but no resources are allocated for it.
    ToBeNoticed,
    /// Resources it occupies are respected, but it receives no orders.
    #[default]
    ToBeRespected,
    /// Fully integrated: receives orders.
    ToBeUtilized,
}

/// Energy thresholds in percent.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnergyThresholds {
    /// At or below this the vehicle must recharge before anything else.
    pub critical:               u8,
    /// At or below this an idle vehicle is sent to recharge.
    pub good:                   u8,
    /// A charging vehicle at or above this may accept new orders.
    pub sufficiently_recharged: u8,
    /// A charging vehicle at or above this stops charging.
    pub fully_recharged:        u8,
}

impl Default for EnergyThresholds {
    fn default() -> Self {
        Self { critical: 30, good: 90, sufficiently_recharged: 30, fully_recharged: 90 }
    }
}

/// A vehicle known to the kernel.
#[derive(Clone, Debug)]
pub struct Vehicle {
    pub id:                VehicleId,
    pub name:              String,
    pub state:             VehicleState,
    pub processing_state:  ProcessingState,
    pub integration_level: IntegrationLevel,
    /// Paused vehicles keep their orders but receive no new allocations.
    pub paused:            bool,
    /// Energy level in percent (0–100).
    pub energy_level:      u8,
    pub energy_thresholds: EnergyThresholds,
    pub current_position:  Option<PointId>,
    /// Order types this vehicle may be assigned; [`ANY_ORDER_TYPE`] matches all.
    pub acceptable_order_types: BTreeSet<String>,
    /// Location operation that charges this vehicle.
    pub recharge_operation: String,
    /// Maximum forward velocity in mm/s.
    pub max_velocity:      u32,
    /// Maximum reverse velocity in mm/s.
    pub max_reverse_velocity: u32,
    /// Selects which envelope of a point/path applies to this vehicle.
    pub envelope_key:      Option<String>,
    /// Paths this vehicle must never be routed over.
    pub forbidden_paths:   BTreeSet<PathId>,

    // ── Dispatcher bookkeeping ────────────────────────────────────────────
    pub transport_order:   Option<OrderId>,
    pub order_sequence:    Option<SequenceId>,
    /// Remaining resource sets of the current route, in travel order.
    pub claimed_resources: Vec<ResourceSet>,
    /// When the vehicle last became idle (used for park/recharge delays).
    pub idle_since:        Timestamp,
}

impl Vehicle {
    /// A vehicle with default attributes accepting every order type.
    pub fn new(id: VehicleId, name: &str) -> Self {
        Self {
            id,
            name: name.to_owned(),
            state: VehicleState::Unknown,
            processing_state: ProcessingState::Idle,
            integration_level: IntegrationLevel::default(),
            paused: false,
            energy_level: 100,
            energy_thresholds: EnergyThresholds::default(),
            current_position: None,
            acceptable_order_types: BTreeSet::from([ANY_ORDER_TYPE.to_owned()]),
            recharge_operation: "Charge".to_owned(),
            max_velocity: 1_000,
            max_reverse_velocity: 1_000,
            envelope_key: None,
            forbidden_paths: BTreeSet::new(),
            transport_order: None,
            order_sequence: None,
            claimed_resources: Vec::new(),
            idle_since: Timestamp::ZERO,
        }
    }

    /// `true` if `order_type` is in the acceptable set (or the set has the wildcard).
    pub fn accepts_order_type(&self, order_type: &str) -> bool {
        self.acceptable_order_types.contains(ANY_ORDER_TYPE)
            || self.acceptable_order_types.contains(order_type)
    }

    #[inline]
    pub fn is_energy_critical(&self) -> bool {
        self.energy_level <= self.energy_thresholds.critical
    }

    /// `true` if an idle vehicle should be sent to recharge.
    #[inline]
    pub fn is_energy_degraded(&self) -> bool {
        self.energy_level <= self.energy_thresholds.good
    }

    #[inline]
    pub fn is_sufficiently_recharged(&self) -> bool {
        self.energy_level >= self.energy_thresholds.sufficiently_recharged
    }

    /// `true` if the vehicle is not processing any order.
    #[inline]
    pub fn has_no_order(&self) -> bool {
        self.transport_order.is_none() && self.processing_state == ProcessingState::Idle
    }
}
