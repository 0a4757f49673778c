//! `fk-kernel` — the fleet-control kernel's single-writer core.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                          |
//! |--------------|-------------------------------------------------------------------|
//! | [`kernel`]   | `Kernel`: scheduler + dispatcher + peripheral dispatcher, flushes events to the observer |
//! | [`builder`]  | `KernelBuilder`: resolves configuration keys once at startup      |
//! | [`executor`] | `KernelExecutor` / `KernelHandle`: tokio task owning the kernel   |
//! | [`observer`] | `KernelObserver` hooks and `NoopObserver`                         |
//! | [`logging`]  | `init_logging` for binaries and tests                             |
//! | [`error`]    | `KernelError`, `KernelResult<T>`                                  |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use fk_core::{KernelConfig, TransportOrderSpec, Destination};
//! use fk_kernel::{init_logging, KernelBuilder, KernelExecutor};
//!
//! init_logging("info");
//! let kernel = KernelBuilder::new(KernelConfig::default(), Arc::new(plant)).build()?;
//! let executor = KernelExecutor::spawn(kernel);
//! let handle = executor.handle();
//!
//! handle.call(move |k| k.add_vehicle(vehicle, controller)).await?;
//! let order = handle
//!     .call(move |k| k.create_order(TransportOrderSpec::new("T-1", vec![Destination::point(p)])))
//!     .await?;
//! let kernel = executor.shutdown().await?;
//! ```

pub mod builder;
pub mod error;
pub mod executor;
pub mod kernel;
pub mod logging;
pub mod observer;


pub use builder::KernelBuilder;
pub use error::{KernelError, KernelResult};
pub use executor::{KernelExecutor, KernelHandle};
pub use kernel::Kernel;
pub use logging::init_logging;
pub use observer::{KernelObserver, NoopObserver};
