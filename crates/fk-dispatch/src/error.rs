//! Dispatcher error type.

use thiserror::Error;

use fk_core::{
    CoreError, LocationId, OrderId, PeripheralJobId, SequenceId, TransportOrderState, VehicleId,
};
use fk_routing::RoutingError;
use fk_scheduler::SchedulerError;

/// Errors produced by `fk-dispatch`.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("vehicle {0} not found")]
    VehicleUnknown(VehicleId),

    #[error("transport order {0} not found")]
    OrderUnknown(OrderId),

    #[error("order sequence {0} not found")]
    SequenceUnknown(SequenceId),

    #[error("peripheral device at {0} not found")]
    DeviceUnknown(LocationId),

    #[error("peripheral job {0} not found")]
    JobUnknown(PeripheralJobId),

    #[error("vehicle {0} is already registered")]
    VehicleExists(VehicleId),

    #[error("peripheral device at {0} is already registered")]
    DeviceExists(LocationId),

    #[error("vehicle {0} has no transport order")]
    NoOrder(VehicleId),

    #[error("invalid transport order: {0}")]
    InvalidOrder(String),

    #[error("unknown candidate comparator key {0:?}")]
    UnknownComparator(String),

    /// The order state graph was violated.  Treat as fatal.
    #[error("order {order}: illegal transition {from} -> {to}")]
    InvalidTransition {
        order: OrderId,
        from:  TransportOrderState,
        to:    TransportOrderState,
    },

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl DispatchError {
    /// `true` for invariant violations that must stop the kernel.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::InvalidTransition { .. } => true,
            Self::Scheduler(e) => e.is_fatal(),
            _ => false,
        }
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;
