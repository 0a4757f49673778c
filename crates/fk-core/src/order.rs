//! Transport orders, drive orders, and order sequences.
//!
//! # State graph
//!
//! ```text
//! RAW ──► ACTIVE ──► DISPATCHABLE ──► BEING_PROCESSED ──► FINISHED
//!  │        │             │                  │
//!  │        └─────────────┴──────────────────┴──► FAILED | WITHDRAWN
//!  └──► UNROUTABLE | FAILED | WITHDRAWN
//! ```
//!
//! Terminal states are absorbing; [`TransportOrderState::can_transition_to`]
//! is the single source of truth for allowed moves.

use std::collections::BTreeSet;
use std::fmt;

use crate::{LocationId, OrderId, PointId, Route, SequenceId, Timestamp, VehicleId};

/// Operation meaning "just be there".
pub const OP_NOP: &str = "NOP";
/// Operation of a plain move-to-point destination.
pub const OP_MOVE: &str = "MOVE";
/// Operation of a park destination.
pub const OP_PARK: &str = "PARK";

/// Order type of regular transport orders.
pub const ORDER_TYPE_TRANSPORT: &str = "Transport";
/// Order type of synthetic park orders.
pub const ORDER_TYPE_PARK: &str = "Park";
/// Order type of synthetic recharge orders.
pub const ORDER_TYPE_CHARGE: &str = "Charge";

// ── TransportOrderState ───────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransportOrderState {
    Raw,
    Active,
    Dispatchable,
    BeingProcessed,
    Withdrawn,
    Finished,
    Failed,
    Unroutable,
}

impl TransportOrderState {
    /// `true` for absorbing states.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Withdrawn | Self::Finished | Self::Failed | Self::Unroutable
        )
    }

    /// Whether the state graph permits moving from `self` to `to`.
    pub fn can_transition_to(self, to: TransportOrderState) -> bool {
        use TransportOrderState::*;
        match self {
            Raw            => matches!(to, Active | Unroutable | Failed | Withdrawn),
            Active         => matches!(to, Dispatchable | Failed | Withdrawn),
            Dispatchable   => matches!(to, BeingProcessed | Failed | Withdrawn),
            BeingProcessed => matches!(to, Finished | Failed | Withdrawn),
            Withdrawn | Finished | Failed | Unroutable => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw            => "RAW",
            Self::Active         => "ACTIVE",
            Self::Dispatchable   => "DISPATCHABLE",
            Self::BeingProcessed => "BEING_PROCESSED",
            Self::Withdrawn      => "WITHDRAWN",
            Self::Finished       => "FINISHED",
            Self::Failed         => "FAILED",
            Self::Unroutable     => "UNROUTABLE",
        }
    }
}

impl fmt::Display for TransportOrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Destinations & drive orders ───────────────────────────────────────────────

/// Where a drive order leads.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DestinationTarget {
    Point(PointId),
    Location(LocationId),
}

/// A destination plus the operation to perform there.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Destination {
    pub target:    DestinationTarget,
    pub operation: String,
}

impl Destination {
    pub fn point(point: PointId) -> Self {
        Self { target: DestinationTarget::Point(point), operation: OP_MOVE.to_owned() }
    }

    pub fn location(location: LocationId, operation: &str) -> Self {
        Self { target: DestinationTarget::Location(location), operation: operation.to_owned() }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DriveOrderState {
    #[default]
    Pristine,
    Travelling,
    Finished,
    Failed,
}

/// One leg of a transport order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriveOrder {
    pub destination: Destination,
    /// Assigned when the order is committed to a vehicle.
    pub route:       Option<Route>,
    pub state:       DriveOrderState,
}

impl DriveOrder {
    pub fn new(destination: Destination) -> Self {
        Self { destination, route: None, state: DriveOrderState::Pristine }
    }
}

// ── TransportOrder ────────────────────────────────────────────────────────────

/// Parameters for creating a transport order.
#[derive(Clone, Debug)]
pub struct TransportOrderSpec {
    pub name:             String,
    pub order_type:       String,
    pub destinations:     Vec<Destination>,
    /// `None` means no deadline.
    pub deadline:         Option<Timestamp>,
    pub intended_vehicle: Option<VehicleId>,
    pub dependencies:     BTreeSet<OrderId>,
    /// Dispensable orders may be withdrawn when a vehicle is needed elsewhere.
    pub dispensable:      bool,
    pub sequence:         Option<SequenceId>,
}

impl TransportOrderSpec {
    /// A regular transport order with no constraints.
    pub fn new(name: &str, destinations: Vec<Destination>) -> Self {
        Self {
            name: name.to_owned(),
            order_type: ORDER_TYPE_TRANSPORT.to_owned(),
            destinations,
            deadline: None,
            intended_vehicle: None,
            dependencies: BTreeSet::new(),
            dispensable: false,
            sequence: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Timestamp) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_intended_vehicle(mut self, vehicle: VehicleId) -> Self {
        self.intended_vehicle = Some(vehicle);
        self
    }

    pub fn with_order_type(mut self, order_type: &str) -> Self {
        self.order_type = order_type.to_owned();
        self
    }

    pub fn with_dependency(mut self, order: OrderId) -> Self {
        self.dependencies.insert(order);
        self
    }

    pub fn with_sequence(mut self, sequence: SequenceId) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn dispensable(mut self) -> Self {
        self.dispensable = true;
        self
    }
}

/// A unit of work: ordered drive orders executed by a single vehicle.
#[derive(Clone, Debug)]
pub struct TransportOrder {
    pub id:                 OrderId,
    pub name:               String,
    pub order_type:         String,
    pub drive_orders:       Vec<DriveOrder>,
    /// Index into `drive_orders` of the leg being executed.
    pub current_drive_order: usize,
    pub deadline:           Timestamp,
    pub creation_time:      Timestamp,
    pub finished_time:      Option<Timestamp>,
    pub intended_vehicle:   Option<VehicleId>,
    pub processing_vehicle: Option<VehicleId>,
    pub dependencies:       BTreeSet<OrderId>,
    pub state:              TransportOrderState,
    pub dispensable:        bool,
    pub wrapping_sequence:  Option<SequenceId>,
}

impl TransportOrder {
    /// Materialise a RAW order from `spec`.
    pub fn from_spec(id: OrderId, spec: TransportOrderSpec, now: Timestamp) -> Self {
        Self {
            id,
            name: spec.name,
            order_type: spec.order_type,
            drive_orders: spec.destinations.into_iter().map(DriveOrder::new).collect(),
            current_drive_order: 0,
            deadline: spec.deadline.unwrap_or(Timestamp::MAX),
            creation_time: now,
            finished_time: None,
            intended_vehicle: spec.intended_vehicle,
            processing_vehicle: None,
            dependencies: spec.dependencies,
            state: TransportOrderState::Raw,
            dispensable: spec.dispensable,
            wrapping_sequence: spec.sequence,
        }
    }

    pub fn current_drive_order(&self) -> Option<&DriveOrder> {
        self.drive_orders.get(self.current_drive_order)
    }

    /// `true` if the current drive order is the last one.
    pub fn on_last_drive_order(&self) -> bool {
        self.current_drive_order + 1 >= self.drive_orders.len()
    }

    /// Sum of the costs of all assigned routes.
    pub fn total_route_costs(&self) -> u64 {
        self.drive_orders
            .iter()
            .filter_map(|d| d.route.as_ref())
            .map(|r| r.costs)
            .sum()
    }

    /// `true` if the deadline falls within `period_ms` of `now` (or has passed).
    pub fn deadline_at_risk(&self, now: Timestamp, period_ms: u64) -> bool {
        self.deadline != Timestamp::MAX && self.deadline <= now.plus_ms(period_ms)
    }
}

// ── OrderSequence ─────────────────────────────────────────────────────────────

/// An ordered series of transport orders processed by one vehicle.
#[derive(Clone, Debug)]
pub struct OrderSequence {
    pub id:                 SequenceId,
    pub name:               String,
    pub orders:             Vec<OrderId>,
    /// Index of the last finished order, if any.
    pub finished_index:     Option<usize>,
    /// No more orders will be appended.
    pub complete:           bool,
    /// Complete and every order processed.
    pub finished:           bool,
    /// A failed order fails all following orders of the sequence.
    pub failure_fatal:      bool,
    pub intended_vehicle:   Option<VehicleId>,
    pub processing_vehicle: Option<VehicleId>,
}

impl OrderSequence {
    pub fn new(id: SequenceId, name: &str) -> Self {
        Self {
            id,
            name: name.to_owned(),
            orders: Vec::new(),
            finished_index: None,
            complete: false,
            finished: false,
            failure_fatal: false,
            intended_vehicle: None,
            processing_vehicle: None,
        }
    }

    /// The order following the last finished one, if it has been added.
    pub fn next_unfinished_order(&self) -> Option<OrderId> {
        let next = self.finished_index.map_or(0, |i| i + 1);
        self.orders.get(next).copied()
    }
}
