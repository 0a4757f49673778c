//! Kernel-wide base error type.
//!
//! Sub-crates define their own error enums and wrap `CoreError` as one
//! variant via `#[from]`.

use thiserror::Error;

use crate::{BlockId, LocationId, PathId, PointId};

/// Errors raised by plant-model queries and configuration resolution.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("point {0} not found in plant model")]
    PointUnknown(PointId),

    #[error("path {0} not found in plant model")]
    PathUnknown(PathId),

    #[error("location {0} not found in plant model")]
    LocationUnknown(LocationId),

    #[error("block {0} not found in plant model")]
    BlockUnknown(BlockId),

    #[error("object {0:?} not found")]
    ObjectUnknown(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Shorthand result type for `fk-core`.
pub type CoreResult<T> = Result<T, CoreError>;
