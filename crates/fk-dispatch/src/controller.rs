//! Callbacks into the vehicle and peripheral controller layers.
//!
//! Controllers translate kernel decisions into whatever their devices
//! understand.  Every method runs on the kernel executor while it holds the
//! kernel state, so implementations must return quickly and must not call
//! back into the kernel synchronously; forward the work to the controller's
//! own task and report progress through the kernel handle.

use std::sync::Arc;

use fk_core::{ClientId, PeripheralJob, PeripheralJobId, ResourceSet, TransportOrder, VehicleId};
use fk_scheduler::{vehicle_client, SchedulerClient};

/// Vehicle-side counterpart of the dispatcher and scheduler.
pub trait VehicleController: Send + Sync {
    /// A transport order (with routes for every drive order) was assigned.
    fn assign_order(&self, order: &TransportOrder);

    /// The current order was withdrawn.  `immediate` requests an emergency
    /// stop rather than finishing the current movement.
    fn abort_order(&self, immediate: bool);

    /// Resources were allocated.  Return `false` if they are no longer needed.
    fn on_allocation(&self, resources: &ResourceSet) -> bool;
}

/// Peripheral-device counterpart of the peripheral job dispatcher.
pub trait PeripheralController: Send + Sync {
    /// Start executing `job`.
    fn process_job(&self, job: &PeripheralJob);

    /// Stop executing `job`; the default ignores the request.
    fn abort_job(&self, _job: PeripheralJobId) {}
}

/// Scheduler client acting for one vehicle through its controller.
pub struct VehicleClient {
    vehicle:    VehicleId,
    controller: Arc<dyn VehicleController>,
}

impl VehicleClient {
    pub fn new(vehicle: VehicleId, controller: Arc<dyn VehicleController>) -> Self {
        Self { vehicle, controller }
    }
}

impl SchedulerClient for VehicleClient {
    fn id(&self) -> ClientId {
        vehicle_client(self.vehicle)
    }

    fn related_vehicle(&self) -> Option<VehicleId> {
        Some(self.vehicle)
    }

    fn on_allocation(&self, resources: &ResourceSet) -> bool {
        self.controller.on_allocation(resources)
    }
}
