//! Kernel observer trait for event logs and monitoring.

use fk_core::{ClientId, OrderId, ResourceSet, TransportOrderState, VehicleId};
use fk_dispatch::PeripheralEvent;
use fk_scheduler::Grant;

/// Callbacks invoked by the [`Kernel`][crate::Kernel] after each operation,
/// in the order the underlying events happened.
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.  Callbacks run on the kernel's single
/// writer; they must not block.
///
/// # Example — order history
///
/// ```rust,ignore
/// struct History(Vec<(OrderId, TransportOrderState)>);
///
/// impl KernelObserver for History {
///     fn on_order_state_changed(&mut self, order: OrderId, _from: TransportOrderState, to: TransportOrderState) {
///         self.0.push((order, to));
///     }
/// }
/// ```
pub trait KernelObserver: Send {
    fn on_order_state_changed(&mut self, _order: OrderId, _from: TransportOrderState, _to: TransportOrderState) {}

    /// An order was committed to a vehicle and its routes claimed.
    fn on_order_assigned(&mut self, _order: OrderId, _vehicle: VehicleId) {}

    /// An order was put aside for a vehicle that is still busy.
    fn on_order_reserved(&mut self, _order: OrderId, _vehicle: VehicleId) {}

    /// The scheduler granted a request, immediately or from the pending
    /// queue.  `grant.accepted` is `false` if the client declined it.
    fn on_allocation(&mut self, _grant: &Grant) {}

    /// An allocation request could not be granted and was queued.
    fn on_allocation_deferred(&mut self, _client: ClientId, _resources: &ResourceSet) {}

    fn on_peripheral_job_changed(&mut self, _event: &PeripheralEvent) {}
}

/// A [`KernelObserver`] that does nothing.
pub struct NoopObserver;

impl KernelObserver for NoopObserver {}
