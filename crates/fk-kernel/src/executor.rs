//! The kernel executor: a tokio task that owns the [`Kernel`] and is the
//! only place it is ever mutated.
//!
//! ```text
//! ┌────────────────────┐
//! │ vehicle controller │──┐
//! └────────────────────┘  │  call / submit      ┌──────────────────────┐
//! ┌────────────────────┐  ├──── Command ──────► │ KernelExecutor task  │
//! │ order frontend     │──┘   (unbounded)       │  owns Kernel         │
//! └────────────────────┘                        │  + dispatch timer    │
//!          ▲                                    │  + peripheral timer  │
//!          └──────────── oneshot reply ──────── └──────────────────────┘
//! ```
//!
//! Commands are closures over `&mut Kernel` and run strictly in arrival
//! order.  [`KernelHandle::submit`] never blocks, so controller callbacks
//! running inside the executor (e.g. `on_allocation`) can safely enqueue
//! follow-up work.  A fatal error stops the executor; every later call
//! returns [`KernelError::Stopped`].

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::{Kernel, KernelError, KernelResult};

type Job = Box<dyn FnOnce(&mut Kernel) -> Flow + Send>;

enum Command {
    Run(Job),
    Shutdown,
}

/// Whether the executor keeps going after a command.
enum Flow {
    Continue,
    Fatal(String),
}

impl Flow {
    fn of<T>(result: &KernelResult<T>) -> Self {
        match result {
            Err(e) if e.is_fatal() => Flow::Fatal(e.to_string()),
            _ => Flow::Continue,
        }
    }

    /// Like [`Flow::of`], logging non-fatal errors nobody waits for.
    fn logged(result: KernelResult<()>, what: &'static str) -> Self {
        match result {
            Err(e) if e.is_fatal() => Flow::Fatal(e.to_string()),
            Err(e) => {
                warn!(error = %e, "{what} failed");
                Flow::Continue
            }
            Ok(()) => Flow::Continue,
        }
    }
}

// ── Handle ────────────────────────────────────────────────────────────────────

/// Cheap, cloneable sender side of the executor.
#[derive(Clone)]
pub struct KernelHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl KernelHandle {
    /// Run `f` on the kernel and wait for its result.
    pub async fn call<T, F>(&self, f: F) -> KernelResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Kernel) -> KernelResult<T> + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let job: Job = Box::new(move |kernel| {
            let result = f(kernel);
            let flow = Flow::of(&result);
            // The caller may have given up waiting.
            let _ = reply.send(result);
            flow
        });
        self.tx.send(Command::Run(job)).map_err(|_| KernelError::Stopped)?;
        response.await.map_err(|_| KernelError::Stopped)?
    }

    /// Enqueue `f` without waiting.  Errors are logged by the executor.
    pub fn submit<F>(&self, f: F) -> KernelResult<()>
    where
        F: FnOnce(&mut Kernel) -> KernelResult<()> + Send + 'static,
    {
        let job: Job = Box::new(move |kernel| Flow::logged(f(kernel), "submitted command"));
        self.tx.send(Command::Run(job)).map_err(|_| KernelError::Stopped)
    }

    /// `false` once the executor has stopped.
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

// ── Executor ──────────────────────────────────────────────────────────────────

pub struct KernelExecutor {
    handle: KernelHandle,
    task:   JoinHandle<Kernel>,
}

impl KernelExecutor {
    /// Move `kernel` into a new task on the current tokio runtime.
    ///
    /// `dispatch_interval_ms` and `idle_peripheral_redispatching_interval_ms`
    /// drive the periodic timers; zero disables a timer.
    pub fn spawn(kernel: Kernel) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(kernel, rx));
        Self { handle: KernelHandle { tx }, task }
    }

    pub fn handle(&self) -> KernelHandle {
        self.handle.clone()
    }

    /// Stop after the commands already queued and hand the kernel back.
    pub async fn shutdown(self) -> KernelResult<Kernel> {
        // Already stopped after a fatal error: nothing to send.
        let _ = self.handle.tx.send(Command::Shutdown);
        self.task.await.map_err(|e| {
            error!(error = %e, "kernel executor task failed");
            KernelError::Stopped
        })
    }
}

async fn run(mut kernel: Kernel, mut rx: mpsc::UnboundedReceiver<Command>) -> Kernel {
    let dispatch_ms = kernel.config().dispatcher.dispatch_interval_ms;
    let peripheral_ms = kernel.config().peripherals.idle_peripheral_redispatching_interval_ms;
    let mut dispatch_timer = timer(dispatch_ms);
    let mut peripheral_timer = timer(peripheral_ms);
    info!(dispatch_ms, peripheral_ms, "kernel executor started");

    loop {
        let flow = tokio::select! {
            biased;

            command = rx.recv() => match command {
                Some(Command::Run(job)) => job(&mut kernel),
                Some(Command::Shutdown) | None => break,
            },

            () = tick(&mut dispatch_timer) => {
                debug!("periodic dispatch");
                Flow::logged(kernel.dispatch(), "periodic dispatch")
            },

            () = tick(&mut peripheral_timer) => {
                let result = kernel.redispatch_idle_peripherals().map(|_| ());
                Flow::logged(result, "peripheral redispatch")
            },
        };
        if let Flow::Fatal(error) = flow {
            error!(%error, "fatal kernel error; executor stopping");
            break;
        }
    }

    // Queued commands are dropped unanswered; their callers see `Stopped`.
    rx.close();
    info!("kernel executor stopped");
    kernel
}

fn timer(period_ms: u64) -> Option<Interval> {
    (period_ms > 0).then(|| {
        let period = Duration::from_millis(period_ms);
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    })
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
