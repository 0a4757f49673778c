use fk_core::CoreError;
use fk_dispatch::DispatchError;
use fk_routing::RoutingError;
use fk_scheduler::SchedulerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("kernel configuration error: {0}")]
    Config(String),

    /// The executor has stopped (shutdown or a fatal error) and accepts no
    /// further commands.
    #[error("kernel executor is not running")]
    Stopped,

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl KernelError {
    /// `true` for invariant violations.  The executor stops on these.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Dispatch(e) => e.is_fatal(),
            Self::Scheduler(e) => e.is_fatal(),
            _ => false,
        }
    }
}

pub type KernelResult<T> = Result<T, KernelError>;
