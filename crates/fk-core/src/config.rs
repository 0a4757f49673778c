//! Kernel configuration.
//!
//! Typically deserialised from a TOML/JSON file by the application (enable the
//! `serde` feature) and handed to `fk_kernel::KernelBuilder`.  Every field has
//! a default, so `KernelConfig::default()` yields a working kernel.
//!
//! List-valued options (`candidate_priorities`, `allocation_modules`,
//! `edge_evaluators`) hold string keys exactly as they appear in the
//! configuration file.  Each consuming crate resolves them once, at build
//! time, into an ordered list of enum values; an unknown key fails the build.

/// Top-level kernel configuration.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct KernelConfig {
    pub dispatcher:  DispatcherConfig,
    pub scheduler:   SchedulerConfig,
    pub routing:     RoutingConfig,
    pub peripherals: PeripheralConfig,
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DispatcherConfig {
    /// Send idle vehicles to park positions.
    pub park_idle_vehicles:              bool,
    /// Milliseconds a vehicle must be idle before it is sent to park.
    pub park_idle_vehicles_delay_ms:     u64,
    /// Send idle vehicles with degraded energy to a charging location.
    pub recharge_idle_vehicles:          bool,
    /// Milliseconds a vehicle must be idle before it is sent to recharge.
    pub recharge_idle_vehicles_delay_ms: u64,
    /// Window before a deadline during which an order counts as "at risk".
    pub deadline_at_risk_period_ms:      u64,
    /// Interval of the periodic safety-net dispatch run.  Zero disables it.
    pub dispatch_interval_ms:            u64,
    /// Comparator keys ranking assignment candidates, most significant first.
    pub candidate_priorities:            Vec<String>,
    /// Withdraw orders that cannot be routed at creation time.
    pub dismiss_unroutable_orders:       bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            park_idle_vehicles:              false,
            park_idle_vehicles_delay_ms:     60_000,
            recharge_idle_vehicles:          false,
            recharge_idle_vehicles_delay_ms: 60_000,
            deadline_at_risk_period_ms:      60_000,
            dispatch_interval_ms:            10_000,
            candidate_priorities:            vec![
                "DEADLINE_AT_RISK_FIRST".to_owned(),
                "BY_AGE".to_owned(),
                "BY_INITIAL_ROUTING_COSTS".to_owned(),
                "IDLE_FIRST".to_owned(),
            ],
            dismiss_unroutable_orders:       true,
        }
    }
}

// ── Scheduler ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SchedulerConfig {
    /// Allocation module keys, evaluated in order.
    pub allocation_modules:    Vec<String>,
    /// Run the deadlock predictor before granting requests.
    pub deadlock_avoidance:    bool,
    /// Maximum number of simulated states per deadlock check.
    pub deadlock_search_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            allocation_modules:    vec![
                "PAUSED_VEHICLE".to_owned(),
                "SINGLE_VEHICLE_BLOCK".to_owned(),
                "SAME_DIRECTION_BLOCK".to_owned(),
            ],
            deadlock_avoidance:    false,
            deadlock_search_limit: 10_000,
        }
    }
}

// ── Routing ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RoutingConfig {
    /// Edge evaluator keys; the edge weight is the sum of all evaluators.
    pub edge_evaluators: Vec<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self { edge_evaluators: vec!["DISTANCE".to_owned()] }
    }
}

// ── Peripherals ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PeripheralConfig {
    /// Interval of the idle-peripheral redispatch check.  Zero disables it.
    pub idle_peripheral_redispatching_interval_ms: u64,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self { idle_peripheral_redispatching_interval_ms: 10_000 }
    }
}
