//! Job dispatching for stationary peripheral devices.
//!
//! Structurally a small sibling of [`Dispatcher`](crate::Dispatcher): a
//! [`PeripheralReleaseStrategy`] first decides which device reservations to
//! drop, then a [`JobSelectionStrategy`] picks the next job for every idle
//! device.  The periodic redispatch check
//! ([`has_idle_work`](PeripheralJobDispatcher::has_idle_work)) only reports
//! work when some idle device actually has a selectable job.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use fk_core::{
    Clock, LocationId, OrderId, PeripheralDevice, PeripheralDeviceState, PeripheralJob,
    PeripheralJobId, PeripheralJobState, PeripheralProcessingState, VehicleId,
};

use crate::{DispatchError, DispatchResult, PeripheralController};

// ── Strategies ────────────────────────────────────────────────────────────────

/// Picks the next job for an idle device.
pub trait JobSelectionStrategy: Send + Sync {
    /// `jobs` holds every job in state TO_BE_PROCESSED, oldest first.
    fn select_job(&self, device: &PeripheralDevice, jobs: &[&PeripheralJob]) -> Option<PeripheralJobId>;
}

/// Decides which device reservations to release before jobs are assigned.
pub trait PeripheralReleaseStrategy: Send + Sync {
    /// Locations of the reserved devices whose reservation should be dropped.
    fn devices_to_release(&self, devices: &[&PeripheralDevice], jobs: &[&PeripheralJob]) -> Vec<LocationId>;
}

/// Oldest job at the device's location.  A reserved device only takes jobs
/// carrying its reservation token.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultJobSelectionStrategy;

impl JobSelectionStrategy for DefaultJobSelectionStrategy {
    fn select_job(&self, device: &PeripheralDevice, jobs: &[&PeripheralJob]) -> Option<PeripheralJobId> {
        jobs.iter()
            .filter(|j| j.location == device.location)
            .filter(|j| device.reserved_by.as_ref().is_none_or(|t| *t == j.reservation_token))
            .min_by_key(|j| (j.creation_time, j.id))
            .map(|j| j.id)
    }
}

/// Releases idle devices with no pending job for their reservation token.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultPeripheralReleaseStrategy;

impl PeripheralReleaseStrategy for DefaultPeripheralReleaseStrategy {
    fn devices_to_release(&self, devices: &[&PeripheralDevice], jobs: &[&PeripheralJob]) -> Vec<LocationId> {
        devices
            .iter()
            .filter(|d| d.is_idle())
            .filter_map(|d| d.reserved_by.as_ref().map(|token| (d.location, token)))
            .filter(|(location, token)| {
                !jobs.iter().any(|j| j.location == *location && j.reservation_token == **token)
            })
            .map(|(location, _)| location)
            .collect()
    }
}

// ── Job creation ──────────────────────────────────────────────────────────────

/// Parameters for creating a peripheral job.
#[derive(Clone, Debug)]
pub struct PeripheralJobSpec {
    pub name:              String,
    pub reservation_token: String,
    pub location:          LocationId,
    pub operation:         String,
    pub related_vehicle:   Option<VehicleId>,
    pub related_order:     Option<OrderId>,
}

impl PeripheralJobSpec {
    pub fn new(name: &str, reservation_token: &str, location: LocationId, operation: &str) -> Self {
        Self {
            name: name.to_owned(),
            reservation_token: reservation_token.to_owned(),
            location,
            operation: operation.to_owned(),
            related_vehicle: None,
            related_order: None,
        }
    }

    pub fn with_related_vehicle(mut self, vehicle: VehicleId) -> Self {
        self.related_vehicle = Some(vehicle);
        self
    }

    pub fn with_related_order(mut self, order: OrderId) -> Self {
        self.related_order = Some(order);
        self
    }
}

/// A job changed state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeripheralEvent {
    pub job:  PeripheralJobId,
    pub from: Option<PeripheralJobState>,
    pub to:   PeripheralJobState,
}

// ── PeripheralJobDispatcher ───────────────────────────────────────────────────

pub struct PeripheralJobDispatcher {
    clock:       Arc<dyn Clock>,
    devices:     BTreeMap<LocationId, PeripheralDevice>,
    controllers: BTreeMap<LocationId, Arc<dyn PeripheralController>>,
    jobs:        BTreeMap<PeripheralJobId, PeripheralJob>,
    next_job:    u32,
    selection:   Box<dyn JobSelectionStrategy>,
    release:     Box<dyn PeripheralReleaseStrategy>,
    events:      Vec<PeripheralEvent>,
}

impl PeripheralJobDispatcher {
    /// A dispatcher using the default strategies.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_strategies(
            clock,
            Box::new(DefaultJobSelectionStrategy),
            Box::new(DefaultPeripheralReleaseStrategy),
        )
    }

    pub fn with_strategies(
        clock:     Arc<dyn Clock>,
        selection: Box<dyn JobSelectionStrategy>,
        release:   Box<dyn PeripheralReleaseStrategy>,
    ) -> Self {
        Self {
            clock,
            devices: BTreeMap::new(),
            controllers: BTreeMap::new(),
            jobs: BTreeMap::new(),
            next_job: 0,
            selection,
            release,
            events: Vec::new(),
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn device(&self, location: LocationId) -> DispatchResult<&PeripheralDevice> {
        self.devices.get(&location).ok_or(DispatchError::DeviceUnknown(location))
    }

    pub fn devices(&self) -> impl Iterator<Item = &PeripheralDevice> {
        self.devices.values()
    }

    pub fn job(&self, id: PeripheralJobId) -> DispatchResult<&PeripheralJob> {
        self.jobs.get(&id).ok_or(DispatchError::JobUnknown(id))
    }

    pub fn jobs(&self) -> impl Iterator<Item = &PeripheralJob> {
        self.jobs.values()
    }

    pub fn take_events(&mut self) -> Vec<PeripheralEvent> {
        std::mem::take(&mut self.events)
    }

    // ── Devices ───────────────────────────────────────────────────────────

    pub fn add_device(&mut self, device: PeripheralDevice, controller: Arc<dyn PeripheralController>) -> DispatchResult<()> {
        let location = device.location;
        if self.devices.contains_key(&location) {
            return Err(DispatchError::DeviceExists(location));
        }
        info!(device = %device.name, %location, "peripheral device added");
        self.devices.insert(location, device);
        self.controllers.insert(location, controller);
        Ok(())
    }

    pub fn update_device_state(&mut self, location: LocationId, state: PeripheralDeviceState) -> DispatchResult<()> {
        let device = self.devices.get_mut(&location).ok_or(DispatchError::DeviceUnknown(location))?;
        if device.state != state {
            debug!(device = %device.name, from = ?device.state, to = ?state, "device state changed");
            device.state = state;
        }
        Ok(())
    }

    // ── Jobs ──────────────────────────────────────────────────────────────

    pub fn create_job(&mut self, spec: PeripheralJobSpec) -> DispatchResult<PeripheralJobId> {
        self.device(spec.location)?;
        let id = PeripheralJobId(self.next_job);
        self.next_job += 1;
        info!(job = %id, name = %spec.name, location = %spec.location, "peripheral job created");
        self.jobs.insert(id, PeripheralJob {
            id,
            name: spec.name,
            reservation_token: spec.reservation_token,
            location: spec.location,
            operation: spec.operation,
            related_vehicle: spec.related_vehicle,
            related_order: spec.related_order,
            state: PeripheralJobState::ToBeProcessed,
            creation_time: self.clock.now(),
            finished_time: None,
        });
        self.events.push(PeripheralEvent { job: id, from: None, to: PeripheralJobState::ToBeProcessed });
        Ok(id)
    }

    /// The device finished `job`.
    pub fn job_finished(&mut self, job: PeripheralJobId) -> DispatchResult<()> {
        self.complete_job(job, PeripheralJobState::Finished)
    }

    /// The device could not execute `job`.
    pub fn job_failed(&mut self, job: PeripheralJobId) -> DispatchResult<()> {
        warn!(%job, "peripheral job failed");
        self.complete_job(job, PeripheralJobState::Failed)
    }

    /// Fail every non-terminal job related to `order`, aborting running ones.
    pub fn fail_jobs_of_order(&mut self, order: OrderId) -> DispatchResult<()> {
        let related: Vec<PeripheralJobId> = self
            .jobs
            .values()
            .filter(|j| j.related_order == Some(order) && !j.state.is_terminal())
            .map(|j| j.id)
            .collect();
        for id in related {
            let job = self.job(id)?;
            if job.state == PeripheralJobState::BeingProcessed {
                if let Some(controller) = self.controllers.get(&job.location) {
                    controller.abort_job(id);
                }
            }
            self.job_failed(id)?;
        }
        Ok(())
    }

    fn complete_job(&mut self, id: PeripheralJobId, to: PeripheralJobState) -> DispatchResult<()> {
        let now = self.clock.now();
        let job = self.jobs.get_mut(&id).ok_or(DispatchError::JobUnknown(id))?;
        if job.state.is_terminal() {
            debug!(job = %id, state = ?job.state, "job already terminal");
            return Ok(());
        }
        let from = job.state;
        job.state = to;
        job.finished_time = Some(now);
        let location = job.location;

        if let Some(device) = self.devices.get_mut(&location) {
            if device.current_job == Some(id) {
                device.current_job = None;
                device.processing_state = PeripheralProcessingState::Idle;
            }
        }
        debug!(job = %id, ?from, ?to, "peripheral job state changed");
        self.events.push(PeripheralEvent { job: id, from: Some(from), to });
        Ok(())
    }

    // ── Dispatch ──────────────────────────────────────────────────────────

    /// Release reservations, then assign a job to every idle device.
    pub fn dispatch(&mut self) -> DispatchResult<()> {
        self.release_devices();
        let locations: Vec<LocationId> = self.devices.keys().copied().collect();
        for location in locations {
            self.assign_next_job(location)?;
        }
        Ok(())
    }

    /// Release and assign for the device at `location` only.
    pub fn dispatch_device(&mut self, location: LocationId) -> DispatchResult<()> {
        self.device(location)?;
        self.release_devices();
        self.assign_next_job(location)
    }

    /// `true` if some idle device has a job the selection strategy would pick
    /// once releasable reservations are dropped.
    pub fn has_idle_work(&self) -> bool {
        let pending = self.pending_jobs();
        if pending.is_empty() {
            return false;
        }
        let reserved: Vec<&PeripheralDevice> = self.devices.values().filter(|d| d.reserved_by.is_some()).collect();
        let released = self.release.devices_to_release(&reserved, &pending);

        self.devices.values().filter(|d| d.is_idle()).any(|d| {
            if released.contains(&d.location) {
                let unreserved = PeripheralDevice { reserved_by: None, ..d.clone() };
                self.selection.select_job(&unreserved, &pending).is_some()
            } else {
                self.selection.select_job(d, &pending).is_some()
            }
        })
    }

    fn pending_jobs(&self) -> Vec<&PeripheralJob> {
        let mut jobs: Vec<&PeripheralJob> = self
            .jobs
            .values()
            .filter(|j| j.state == PeripheralJobState::ToBeProcessed)
            .collect();
        jobs.sort_by_key(|j| (j.creation_time, j.id));
        jobs
    }

    fn release_devices(&mut self) {
        let release = {
            let devices: Vec<&PeripheralDevice> = self.devices.values().filter(|d| d.reserved_by.is_some()).collect();
            if devices.is_empty() {
                return;
            }
            let pending = self.pending_jobs();
            self.release.devices_to_release(&devices, &pending)
        };
        for location in release {
            if let Some(device) = self.devices.get_mut(&location) {
                debug!(device = %device.name, token = ?device.reserved_by, "device reservation released");
                device.reserved_by = None;
            }
        }
    }

    fn assign_next_job(&mut self, location: LocationId) -> DispatchResult<()> {
        let selected = {
            let device = self.device(location)?;
            if !device.is_idle() {
                return Ok(());
            }
            let pending = self.pending_jobs();
            self.selection.select_job(device, &pending)
        };
        let Some(id) = selected else { return Ok(()) };

        let job = self.jobs.get_mut(&id).ok_or(DispatchError::JobUnknown(id))?;
        job.state = PeripheralJobState::BeingProcessed;
        let token = job.reservation_token.clone();

        let device = self.devices.get_mut(&location).ok_or(DispatchError::DeviceUnknown(location))?;
        device.processing_state = PeripheralProcessingState::ProcessingJob;
        device.current_job = Some(id);
        device.reserved_by = Some(token);

        info!(job = %id, %location, "peripheral job assigned");
        self.events.push(PeripheralEvent {
            job:  id,
            from: Some(PeripheralJobState::ToBeProcessed),
            to:   PeripheralJobState::BeingProcessed,
        });
        if let (Some(controller), Ok(job)) = (self.controllers.get(&location), self.job(id)) {
            controller.process_job(job);
        }
        Ok(())
    }
}
