//! `fk-scheduler` — resource arbitration between vehicles.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                   |
//! |---------------|------------------------------------------------------------|
//! | [`pool`]      | `ReservationPool`: resource → holding client               |
//! | [`module`]    | Allocation modules (`ModuleKind`, `AllocationModule`)      |
//! | [`envelope`]  | `EnvelopeIndex`: R-tree over held resource envelopes       |
//! | [`deadlock`]  | `DeadlockPredictor`, `Safety`                              |
//! | [`client`]    | `SchedulerClient` trait, `Grant`, `AllocationOutcome`      |
//! | [`scheduler`] | `Scheduler` façade and the pending-request queue           |
//! | [`error`]     | `SchedulerError`, `SchedulerResult<T>`                     |
//!
//! The scheduler is not thread-safe by itself; the kernel owns it on a single
//! executor task and funnels every mutation through that task.

pub mod client;
pub mod deadlock;
pub mod envelope;
pub mod error;
pub mod module;
pub mod pool;
pub mod scheduler;

#[cfg(test)]
mod tests;

pub use client::{vehicle_client, AllocationOutcome, Grant, SchedulerClient};
pub use deadlock::{DeadlockPredictor, Safety};
pub use envelope::EnvelopeIndex;
pub use error::{SchedulerError, SchedulerResult};
pub use module::{AllocationContext, AllocationModule, AllocationPredicate, ModuleKind, VehicleInfo};
pub use pool::ReservationPool;
pub use scheduler::Scheduler;
