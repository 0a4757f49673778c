//! Fluent builder for constructing a [`Kernel`].

use std::sync::Arc;

use fk_core::{Clock, KernelConfig, PlantModel, SystemClock};
use fk_dispatch::{
    DefaultJobSelectionStrategy, DefaultPeripheralReleaseStrategy, Dispatcher, JobSelectionStrategy,
    PeripheralJobDispatcher, PeripheralReleaseStrategy,
};
use fk_scheduler::{AllocationModule, DeadlockPredictor, ModuleKind, Scheduler};
use tracing::info;

use crate::{Kernel, KernelError, KernelObserver, KernelResult, NoopObserver};

/// Fluent builder for [`Kernel`].
///
/// # Required inputs
///
/// - [`KernelConfig`] — dispatcher, scheduler, routing, and peripheral options
/// - the plant model
///
/// # Optional inputs (have defaults)
///
/// | Method                        | Default                                   |
/// |-------------------------------|-------------------------------------------|
/// | `.clock(c)`                   | [`SystemClock`]                           |
/// | `.observer(o)`                | [`NoopObserver`]                          |
/// | `.extra_allocation_module(m)` | none; only the configured module chain    |
/// | `.peripheral_strategies(s, r)`| oldest-job selection, idle-token release  |
///
/// # Example
///
/// ```rust,ignore
/// let kernel = KernelBuilder::new(KernelConfig::default(), Arc::new(plant))
///     .observer(Box::new(history))
///     .build()?;
/// let executor = KernelExecutor::spawn(kernel);
/// ```
pub struct KernelBuilder {
    config:        KernelConfig,
    plant:         Arc<dyn PlantModel>,
    clock:         Option<Arc<dyn Clock>>,
    observer:      Option<Box<dyn KernelObserver>>,
    extra_modules: Vec<AllocationModule>,
    selection:     Option<Box<dyn JobSelectionStrategy>>,
    release:       Option<Box<dyn PeripheralReleaseStrategy>>,
}

impl KernelBuilder {
    pub fn new(config: KernelConfig, plant: Arc<dyn PlantModel>) -> Self {
        Self {
            config,
            plant,
            clock:         None,
            observer:      None,
            extra_modules: Vec::new(),
            selection:     None,
            release:       None,
        }
    }

    /// Time source for idle delays, deadlines, and order timestamps.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn observer(mut self, observer: Box<dyn KernelObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Append a custom module after the configured allocation modules.
    pub fn extra_allocation_module(mut self, module: AllocationModule) -> Self {
        self.extra_modules.push(module);
        self
    }

    pub fn peripheral_strategies(
        mut self,
        selection: Box<dyn JobSelectionStrategy>,
        release:   Box<dyn PeripheralReleaseStrategy>,
    ) -> Self {
        self.selection = Some(selection);
        self.release = Some(release);
        self
    }

    /// Resolve every configured key and return a ready [`Kernel`].
    ///
    /// # Errors
    ///
    /// [`KernelError::Config`] for unknown comparator, module, or evaluator
    /// keys and for a zero deadlock search limit.
    pub fn build(self) -> KernelResult<Kernel> {
        let config = self.config;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        // ── Scheduler ─────────────────────────────────────────────────────
        let mut modules = ModuleKind::chain_from_keys(&config.scheduler.allocation_modules)
            .map_err(|e| KernelError::Config(e.to_string()))?;
        modules.extend(self.extra_modules);
        let predictor = if config.scheduler.deadlock_avoidance {
            if config.scheduler.deadlock_search_limit == 0 {
                return Err(KernelError::Config("deadlock_search_limit must be positive".to_owned()));
            }
            Some(DeadlockPredictor::new(config.scheduler.deadlock_search_limit))
        } else {
            None
        };
        let scheduler = Scheduler::with_modules(Arc::clone(&self.plant), modules, predictor);

        // ── Dispatchers ───────────────────────────────────────────────────
        let dispatcher = Dispatcher::new(self.plant, &config.dispatcher, &config.routing, Arc::clone(&clock))
            .map_err(|e| KernelError::Config(e.to_string()))?;
        let peripherals = PeripheralJobDispatcher::with_strategies(
            clock,
            self.selection.unwrap_or_else(|| Box::new(DefaultJobSelectionStrategy)),
            self.release.unwrap_or_else(|| Box::new(DefaultPeripheralReleaseStrategy)),
        );

        info!(
            modules = ?scheduler.modules().collect::<Vec<_>>(),
            comparators = ?dispatcher.comparators().links(),
            deadlock_avoidance = scheduler.deadlock_avoidance(),
            "kernel built"
        );
        Ok(Kernel {
            config,
            scheduler,
            dispatcher,
            peripherals,
            observer: self.observer.unwrap_or_else(|| Box::new(NoopObserver)),
        })
    }
}
