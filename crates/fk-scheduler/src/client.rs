//! The contract between the scheduler and whoever requests resources.

use fk_core::{ClientId, ResourceSet, VehicleId};

/// A party that claims, allocates, and frees resources.
///
/// In the kernel every vehicle is represented by exactly one client; other
/// clients (e.g. maintenance tools) may hold resources without a vehicle.
///
/// # Callbacks
///
/// [`on_allocation`](Self::on_allocation) runs synchronously on the
/// scheduler's thread while it is mutating its state, so implementations
/// must not call back into the scheduler.  Forward the grant to the
/// controller task instead.
pub trait SchedulerClient: Send + Sync {
    fn id(&self) -> ClientId;

    /// The vehicle this client acts for, if any.
    fn related_vehicle(&self) -> Option<VehicleId>;

    /// Called when `resources` have been allocated to this client.
    ///
    /// Returning `false` means the client no longer needs them; the
    /// scheduler frees them again immediately.
    fn on_allocation(&self, resources: &ResourceSet) -> bool;
}

/// The scheduler client ID used for `vehicle`.
#[inline]
pub fn vehicle_client(vehicle: VehicleId) -> ClientId {
    ClientId(vehicle.0)
}

/// A completed allocation, reported after the client callback returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grant {
    pub client:    ClientId,
    pub resources: ResourceSet,
    /// `false` if the client refused the resources in its callback.
    pub accepted:  bool,
}

/// Result of [`Scheduler::allocate`](crate::Scheduler::allocate).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AllocationOutcome {
    /// Allocated now and accepted by the client.
    Granted,
    /// Allocated now but refused by the client; already freed again.
    Declined,
    /// Not admissible now; queued until resources are released.
    Deferred,
}
