//! Scheduler error type.

use thiserror::Error;

use fk_core::{ClientId, CoreError};

/// Errors produced by `fk-scheduler`.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler client {0} is not registered")]
    ClientUnknown(ClientId),

    #[error("scheduler client {0} is already registered")]
    ClientExists(ClientId),

    #[error("unknown allocation module key {0:?}")]
    UnknownModule(String),

    /// The reservation pool no longer reflects a consistent ownership state.
    /// Treat as fatal: resource ownership can no longer be trusted.
    #[error("reservation pool inconsistent: {0}")]
    Inconsistent(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl SchedulerError {
    /// `true` for invariant violations that must stop the kernel.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Inconsistent(_))
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
