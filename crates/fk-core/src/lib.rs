//! `fk-core` — foundational types for the fleet-control kernel.
//!
//! This crate is a dependency of every other `fk-*` crate.  It has no `fk-*`
//! dependencies and minimal external ones (only `thiserror`, plus optional
//! `serde`).
//!
//! # What lives here
//!
//! | Module          | Contents                                                  |
//! |-----------------|-----------------------------------------------------------|
//! | [`ids`]         | `PointId`, `PathId`, `VehicleId`, `OrderId`, …            |
//! | [`resource`]    | `Resource`, `ResourceSet`                                 |
//! | [`geo`]         | `Couple`, `Envelope` (polygon overlap)                    |
//! | [`time`]        | `Timestamp`, `Clock`, `SystemClock`, `ManualClock`        |
//! | [`plant`]       | `PlantModel` trait, `Plant`, `PlantBuilder`               |
//! | [`route`]       | `Route`, `Step`, `Orientation`, `INFINITE_COSTS`          |
//! | [`vehicle`]     | `Vehicle`, `VehicleState`, `IntegrationLevel`             |
//! | [`order`]       | `TransportOrder`, `DriveOrder`, `OrderSequence`           |
//! | [`peripheral`]  | `PeripheralDevice`, `PeripheralJob`                       |
//! | [`config`]      | `KernelConfig` and its sections                           |
//! | [`error`]       | `CoreError`, `CoreResult`                                 |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to config and value types.  |

pub mod config;
pub mod error;
pub mod geo;
pub mod ids;
pub mod order;
pub mod peripheral;
pub mod plant;
pub mod resource;
pub mod route;
pub mod time;
pub mod vehicle;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::{DispatcherConfig, KernelConfig, PeripheralConfig, RoutingConfig, SchedulerConfig};
pub use error::{CoreError, CoreResult};
pub use geo::{Couple, Envelope};
pub use ids::{
    BlockId, ClientId, LocationId, OrderId, PathId, PeripheralJobId, PointId, SequenceId,
    VehicleId,
};
pub use order::{
    Destination, DestinationTarget, DriveOrder, DriveOrderState, OrderSequence, TransportOrder,
    TransportOrderSpec, TransportOrderState, OP_MOVE, OP_NOP, OP_PARK, ORDER_TYPE_CHARGE,
    ORDER_TYPE_PARK, ORDER_TYPE_TRANSPORT,
};
pub use peripheral::{
    PeripheralDevice, PeripheralDeviceState, PeripheralJob, PeripheralJobState,
    PeripheralProcessingState,
};
pub use plant::{
    Block, BlockType, Location, Path, Plant, PlantBuilder, PlantModel, Point, PointType,
};
pub use resource::{intersects, resource_set, Resource, ResourceSet};
pub use route::{Orientation, Route, Step, INFINITE_COSTS};
pub use time::{Clock, ManualClock, SystemClock, Timestamp};
pub use vehicle::{
    EnergyThresholds, IntegrationLevel, ProcessingState, Vehicle, VehicleState, ANY_ORDER_TYPE,
};
