//! The `Kernel`: scheduler, dispatcher, and peripheral dispatcher behind one
//! `&mut self`.
//!
//! Every mutating operation runs to completion on the single writer and is
//! followed by a flush that forwards the recorded grants, order events, and
//! peripheral events to the [`KernelObserver`], in that order.  Operations
//! that can make a vehicle or order newly eligible (a new order, an order
//! reaching a terminal state, a vehicle becoming idle, unpaused, or fully
//! integrated) trigger a dispatch run before returning.

use std::sync::Arc;

use tracing::{debug, warn};

use fk_core::{
    ClientId, IntegrationLevel, KernelConfig, LocationId, OrderId, PeripheralDevice,
    PeripheralDeviceState, PeripheralJobId, PlantModel, PointId, ResourceSet, SequenceId,
    TransportOrderSpec, TransportOrderState, Vehicle, VehicleId, VehicleState,
};
use fk_dispatch::{
    DispatchError, DispatchEvent, Dispatcher, PeripheralController, PeripheralJobDispatcher,
    PeripheralJobSpec, VehicleController,
};
use fk_scheduler::{AllocationOutcome, Scheduler};

use crate::{KernelError, KernelObserver, KernelResult};

pub struct Kernel {
    pub(crate) config:      KernelConfig,
    pub(crate) scheduler:   Scheduler,
    pub(crate) dispatcher:  Dispatcher,
    pub(crate) peripherals: PeripheralJobDispatcher,
    pub(crate) observer:    Box<dyn KernelObserver>,
}

impl Kernel {
    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn peripherals(&self) -> &PeripheralJobDispatcher {
        &self.peripherals
    }

    pub fn plant(&self) -> &Arc<dyn PlantModel> {
        self.dispatcher.plant()
    }

    /// Replace the plant model in the scheduler and the router.
    pub fn set_plant(&mut self, plant: Arc<dyn PlantModel>) -> KernelResult<()> {
        self.scheduler.set_plant(Arc::clone(&plant))?;
        self.dispatcher.set_plant(plant);
        self.trigger_dispatch("plant model replaced")
    }

    /// Verify reservation pool consistency.
    pub fn check_invariants(&self) -> KernelResult<()> {
        Ok(self.scheduler.check_invariants()?)
    }

    // ── Vehicles ──────────────────────────────────────────────────────────

    pub fn add_vehicle(&mut self, vehicle: Vehicle, controller: Arc<dyn VehicleController>) -> KernelResult<()> {
        let result = self.dispatcher.add_vehicle(vehicle, controller, &mut self.scheduler);
        self.settle(result)?;
        self.trigger_dispatch("vehicle added")
    }

    pub fn remove_vehicle(&mut self, id: VehicleId) -> KernelResult<Vehicle> {
        let result = self.dispatcher.remove_vehicle(id, &mut self.scheduler);
        let vehicle = self.settle(result)?;
        self.trigger_dispatch("vehicle removed")?;
        Ok(vehicle)
    }

    pub fn update_vehicle_state(&mut self, id: VehicleId, state: VehicleState) -> KernelResult<()> {
        let before = self.dispatcher.fleet().vehicle(id)?.state;
        self.dispatcher.update_vehicle_state(id, state)?;
        if state == VehicleState::Idle && before != VehicleState::Idle {
            self.trigger_dispatch("vehicle became idle")?;
        }
        Ok(())
    }

    /// A vehicle that reports its first known position may become eligible.
    pub fn update_vehicle_position(&mut self, id: VehicleId, position: Option<PointId>) -> KernelResult<()> {
        let before = self.dispatcher.fleet().vehicle(id)?.current_position;
        self.dispatcher.update_vehicle_position(id, position)?;
        if before.is_none() && position.is_some() {
            self.trigger_dispatch("vehicle position known")?;
        }
        Ok(())
    }

    /// Energy reports alone do not trigger a run; the periodic timer picks
    /// up vehicles that recharged enough.
    pub fn update_vehicle_energy(&mut self, id: VehicleId, level: u8) -> KernelResult<()> {
        Ok(self.dispatcher.update_vehicle_energy(id, level)?)
    }

    pub fn set_vehicle_paused(&mut self, id: VehicleId, paused: bool) -> KernelResult<()> {
        let result = self.dispatcher.set_vehicle_paused(id, paused, &mut self.scheduler);
        self.settle(result)?;
        if !paused {
            self.trigger_dispatch("vehicle unpaused")?;
        }
        Ok(())
    }

    pub fn update_vehicle_integration_level(&mut self, id: VehicleId, level: IntegrationLevel) -> KernelResult<()> {
        let result = self.dispatcher.update_vehicle_integration_level(id, level, &mut self.scheduler);
        self.settle(result)?;
        if level == IntegrationLevel::ToBeUtilized {
            self.trigger_dispatch("vehicle fully integrated")?;
        }
        Ok(())
    }

    // ── Orders ────────────────────────────────────────────────────────────

    pub fn create_order(&mut self, spec: TransportOrderSpec) -> KernelResult<OrderId> {
        let result = self.dispatcher.create_order(spec);
        let id = self.settle(result)?;
        self.trigger_dispatch("order created")?;
        Ok(id)
    }

    pub fn create_sequence(
        &mut self,
        name:             &str,
        intended_vehicle: Option<VehicleId>,
        failure_fatal:    bool,
    ) -> KernelResult<SequenceId> {
        Ok(self.dispatcher.create_sequence(name, intended_vehicle, failure_fatal)?)
    }

    pub fn mark_sequence_complete(&mut self, id: SequenceId) -> KernelResult<()> {
        let result = self.dispatcher.mark_sequence_complete(id);
        self.settle(result)
    }

    pub fn withdraw_order(&mut self, order: OrderId, disable_vehicle: bool) -> KernelResult<()> {
        let result = self.dispatcher.withdraw_order(order, disable_vehicle, &mut self.scheduler);
        self.settle(result)?;
        self.trigger_dispatch("order withdrawn")
    }

    pub fn withdraw_order_by_vehicle(&mut self, vehicle: VehicleId, disable_vehicle: bool) -> KernelResult<()> {
        let result = self.dispatcher.withdraw_order_by_vehicle(vehicle, disable_vehicle, &mut self.scheduler);
        self.settle(result)?;
        self.trigger_dispatch("order withdrawn")
    }

    /// Returns `true` if the whole transport order finished.
    pub fn vehicle_finished_drive_order(&mut self, vehicle: VehicleId) -> KernelResult<bool> {
        let result = self.dispatcher.vehicle_finished_drive_order(vehicle, &mut self.scheduler);
        let finished = self.settle(result)?;
        if finished {
            self.trigger_dispatch("order finished")?;
        }
        Ok(finished)
    }

    pub fn vehicle_failed_order(&mut self, vehicle: VehicleId) -> KernelResult<()> {
        let result = self.dispatcher.vehicle_failed_order(vehicle, &mut self.scheduler);
        self.settle(result)?;
        self.trigger_dispatch("order failed")
    }

    // ── Dispatch ──────────────────────────────────────────────────────────

    pub fn dispatch(&mut self) -> KernelResult<()> {
        let result = self.dispatcher.dispatch(&mut self.scheduler);
        self.settle(result)
    }

    pub fn dispatch_vehicle(&mut self, vehicle: VehicleId) -> KernelResult<()> {
        let result = self.dispatcher.dispatch_vehicle(vehicle, &mut self.scheduler);
        self.settle(result)
    }

    pub fn dispatch_order(&mut self, order: OrderId) -> KernelResult<()> {
        let result = self.dispatcher.dispatch_order(order, &mut self.scheduler);
        self.settle(result)
    }

    // ── Allocation ────────────────────────────────────────────────────────

    /// Forwarded from a vehicle controller.  A deferred request is granted
    /// later through the client's `on_allocation` callback.
    pub fn allocate(&mut self, client: ClientId, resources: ResourceSet) -> KernelResult<AllocationOutcome> {
        let result = self.scheduler.allocate(client, resources.clone());
        if let Ok(AllocationOutcome::Deferred) = result {
            self.observer.on_allocation_deferred(client, &resources);
        }
        self.settle(result)
    }

    /// Release resources the vehicle has passed.
    pub fn free(&mut self, client: ClientId, resources: &ResourceSet) -> KernelResult<()> {
        let result = self.scheduler.free(client, resources);
        self.settle(result)
    }

    pub fn free_all(&mut self, client: ClientId) -> KernelResult<()> {
        let result = self.scheduler.free_all(client);
        self.settle(result)
    }

    // ── Peripherals ───────────────────────────────────────────────────────

    pub fn add_peripheral_device(
        &mut self,
        device:     PeripheralDevice,
        controller: Arc<dyn PeripheralController>,
    ) -> KernelResult<()> {
        Ok(self.peripherals.add_device(device, controller)?)
    }

    /// Device state reports do not trigger a run; the idle-peripheral timer
    /// covers devices that become available with work waiting.
    pub fn update_peripheral_state(&mut self, location: LocationId, state: PeripheralDeviceState) -> KernelResult<()> {
        Ok(self.peripherals.update_device_state(location, state)?)
    }

    pub fn create_peripheral_job(&mut self, spec: PeripheralJobSpec) -> KernelResult<PeripheralJobId> {
        let location = spec.location;
        let result = self.peripherals.create_job(spec);
        let id = self.settle(result)?;
        let result = self.peripherals.dispatch_device(location);
        self.settle(result)?;
        Ok(id)
    }

    pub fn peripheral_job_finished(&mut self, job: PeripheralJobId) -> KernelResult<()> {
        let result = self.peripherals.job_finished(job);
        self.settle(result)?;
        self.dispatch_peripherals()
    }

    pub fn peripheral_job_failed(&mut self, job: PeripheralJobId) -> KernelResult<()> {
        let result = self.peripherals.job_failed(job);
        self.settle(result)?;
        self.dispatch_peripherals()
    }

    pub fn dispatch_peripherals(&mut self) -> KernelResult<()> {
        let result = self.peripherals.dispatch();
        self.settle(result)
    }

    /// Periodic check: run the peripheral dispatcher only if some idle
    /// device has a job waiting.  Returns whether a run happened.
    pub fn redispatch_idle_peripherals(&mut self) -> KernelResult<bool> {
        if !self.peripherals.has_idle_work() {
            return Ok(false);
        }
        debug!("idle peripheral with pending work; redispatching");
        self.dispatch_peripherals()?;
        Ok(true)
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn trigger_dispatch(&mut self, reason: &'static str) -> KernelResult<()> {
        debug!(reason, "dispatch triggered");
        self.dispatch()
    }

    /// Flush events recorded so far, then surface `result`.
    fn settle<T, E>(&mut self, result: Result<T, E>) -> KernelResult<T>
    where
        E: Into<KernelError>,
    {
        let flushed = self.flush();
        let value = result.map_err(Into::into)?;
        flushed?;
        Ok(value)
    }

    fn flush(&mut self) -> KernelResult<()> {
        self.dispatcher.sync_vehicle_claims(&self.scheduler);
        for grant in self.scheduler.take_grants() {
            self.observer.on_allocation(&grant);
        }
        let mut failure: Option<DispatchError> = None;
        for event in self.dispatcher.take_events() {
            match event {
                DispatchEvent::OrderStateChanged { order, from, to } => {
                    self.observer.on_order_state_changed(order, from, to);
                    if to.is_terminal() && to != TransportOrderState::Finished {
                        if let Err(e) = self.peripherals.fail_jobs_of_order(order) {
                            warn!(%order, error = %e, "could not fail peripheral jobs of order");
                            failure.get_or_insert(e);
                        }
                    }
                }
                DispatchEvent::OrderAssigned { order, vehicle } => self.observer.on_order_assigned(order, vehicle),
                DispatchEvent::OrderReserved { order, vehicle } => self.observer.on_order_reserved(order, vehicle),
            }
        }
        for event in self.peripherals.take_events() {
            self.observer.on_peripheral_job_changed(&event);
        }
        match failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}
