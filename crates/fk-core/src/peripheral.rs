//! Stationary peripheral devices (doors, lifts, conveyors) and their jobs.
//!
//! A peripheral device is attached to exactly one location and is addressed
//! by that location's ID.  A device can be *reserved* by a token (typically a
//! vehicle or order name) so that a multi-job interaction is not interleaved
//! with jobs from other clients.

use crate::{LocationId, OrderId, PeripheralJobId, Timestamp, VehicleId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PeripheralDeviceState {
    #[default]
    Unknown,
    Unavailable,
    Error,
    Idle,
    Executing,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PeripheralProcessingState {
    #[default]
    Idle,
    ProcessingJob,
}

/// Kernel view of a peripheral device.
#[derive(Clone, Debug)]
pub struct PeripheralDevice {
    pub location:         LocationId,
    pub name:             String,
    pub state:            PeripheralDeviceState,
    pub processing_state: PeripheralProcessingState,
    /// Reservation token of the client currently owning the device.
    pub reserved_by:      Option<String>,
    pub current_job:      Option<PeripheralJobId>,
}

impl PeripheralDevice {
    pub fn new(location: LocationId, name: &str) -> Self {
        Self {
            location,
            name: name.to_owned(),
            state: PeripheralDeviceState::Unknown,
            processing_state: PeripheralProcessingState::Idle,
            reserved_by: None,
            current_job: None,
        }
    }

    /// Idle and not working on a job.
    pub fn is_idle(&self) -> bool {
        self.state == PeripheralDeviceState::Idle
            && self.processing_state == PeripheralProcessingState::Idle
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PeripheralJobState {
    ToBeProcessed,
    BeingProcessed,
    Finished,
    Failed,
}

impl PeripheralJobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

/// A single operation to be executed by the device at `location`.
#[derive(Clone, Debug)]
pub struct PeripheralJob {
    pub id:                PeripheralJobId,
    pub name:              String,
    pub reservation_token: String,
    pub location:          LocationId,
    /// Operation name understood by the device.
    pub operation:         String,
    pub related_vehicle:   Option<VehicleId>,
    pub related_order:     Option<OrderId>,
    pub state:             PeripheralJobState,
    pub creation_time:     Timestamp,
    pub finished_time:     Option<Timestamp>,
}
