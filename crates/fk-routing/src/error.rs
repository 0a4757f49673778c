//! Routing-subsystem error type.

use thiserror::Error;

use fk_core::{CoreError, PointId};

/// Errors produced by `fk-routing`.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("no route from {from} to {to}")]
    NoRoute { from: PointId, to: PointId },

    #[error("point {0} not found in routing table")]
    PointUnknown(PointId),

    #[error("unknown edge evaluator key {0:?}")]
    UnknownEvaluator(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type RoutingResult<T> = Result<T, RoutingError>;
