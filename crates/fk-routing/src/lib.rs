//! `fk-routing` — shortest routes over the plant model.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                   |
//! |---------------|------------------------------------------------------------|
//! | [`graph`]     | `PathGraph` (CSR), `GraphEdge`                             |
//! | [`evaluator`] | `EdgeEvaluator` (`DISTANCE`, `TRAVELTIME`, `HOPS`, …)      |
//! | [`table`]     | `RoutingTable`: all-pairs costs and routes                 |
//! | [`router`]    | `Router` trait, `DijkstraRouter`                           |
//! | [`service`]   | `RoutingService`: table cache, route-sequence selection    |
//! | [`error`]     | `RoutingError`, `RoutingResult<T>`                         |
//!
//! # Feature flags
//!
//! | Flag       | Effect                                                   |
//! |------------|----------------------------------------------------------|
//! | `parallel` | Computes routing-table rows in parallel with Rayon.      |

pub mod error;
pub mod evaluator;
pub mod graph;
pub mod router;
pub mod service;
pub mod table;


pub use error::{RoutingError, RoutingResult};
pub use evaluator::EdgeEvaluator;
pub use graph::{GraphEdge, PathGraph};
pub use router::{DijkstraRouter, Router};
pub use service::RoutingService;
pub use table::RoutingTable;
