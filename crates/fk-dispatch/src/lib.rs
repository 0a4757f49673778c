//! `fk-dispatch` — order assignment and peripheral job dispatching.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                     |
//! |----------------|--------------------------------------------------------------|
//! | [`fleet`]      | `Fleet`: vehicles, transport orders, order sequences         |
//! | [`order_pool`] | `OrderReservationPool`: orders waiting for a busy vehicle    |
//! | [`filter`]     | Vehicle, order, and pair selection filters                   |
//! | [`candidate`]  | `AssignmentCandidate`                                        |
//! | [`comparator`] | `CandidateComparator` keys and the `ComparatorChain`         |
//! | [`dispatcher`] | `Dispatcher`: activation, assignment, park/recharge phases   |
//! | [`peripheral`] | `PeripheralJobDispatcher` and its strategies                 |
//! | [`controller`] | `VehicleController`, `PeripheralController`, `VehicleClient` |
//! | [`error`]      | `DispatchError`, `DispatchResult<T>`                         |
//!
//! The dispatcher does not own the scheduler.  Operations that claim or
//! release resources take `&mut Scheduler`, so both can live side by side
//! inside the kernel's single-writer state.

pub mod candidate;
pub mod comparator;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod fleet;
pub mod order_pool;
pub mod peripheral;

#[cfg(test)]
mod tests;

pub use candidate::AssignmentCandidate;
pub use comparator::{CandidateComparator, ComparatorChain};
pub use controller::{PeripheralController, VehicleClient, VehicleController};
pub use dispatcher::{DispatchEvent, Dispatcher};
pub use error::{DispatchError, DispatchResult};
pub use fleet::Fleet;
pub use order_pool::OrderReservationPool;
pub use peripheral::{
    DefaultJobSelectionStrategy, DefaultPeripheralReleaseStrategy, JobSelectionStrategy,
    PeripheralEvent, PeripheralJobDispatcher, PeripheralJobSpec, PeripheralReleaseStrategy,
};
