//! Routing trait and default Dijkstra implementation.
//!
//! # Pluggability
//!
//! The dispatcher reaches routing only through [`RoutingService`], which is
//! generic over the [`Router`] trait, so applications can swap in a custom
//! table builder (contraction hierarchies, congestion-aware weights) without
//! touching the rest of the kernel.
//!
//! # Cost units
//!
//! Costs are `u64` in whatever unit the configured edge evaluators produce
//! (millimetres for `DISTANCE`, milliseconds for `TRAVELTIME`, …).
//! [`INFINITE_COSTS`] marks unreachable pairs.
//!
//! [`RoutingService`]: crate::RoutingService
//! [`INFINITE_COSTS`]: fk_core::INFINITE_COSTS

use fk_core::{PlantModel, RoutingConfig, Vehicle};

use crate::{EdgeEvaluator, PathGraph, RoutingResult, RoutingTable};

// ── Router trait ──────────────────────────────────────────────────────────────

/// Pluggable routing-table builder.
///
/// # Thread safety
///
/// Implementations must be `Send + Sync`; the kernel executor may move the
/// router between threads.
pub trait Router: Send + Sync {
    /// Compute the full point-to-point table for `vehicle`.
    ///
    /// Paths the vehicle may not use (locked, forbidden, zero velocity) must
    /// be excluded from the table.
    fn compute_table(&self, plant: &dyn PlantModel, vehicle: &Vehicle) -> RoutingTable;
}

// ── DijkstraRouter ────────────────────────────────────────────────────────────

/// Dijkstra from every point over the vehicle's [`PathGraph`].
///
/// Edge weights are the sum of the configured [`EdgeEvaluator`]s; with none
/// configured, `DISTANCE` is used.
#[derive(Clone, Debug)]
pub struct DijkstraRouter {
    evaluators: Vec<EdgeEvaluator>,
}

impl DijkstraRouter {
    pub fn new(evaluators: Vec<EdgeEvaluator>) -> Self {
        let evaluators = if evaluators.is_empty() { vec![EdgeEvaluator::Distance] } else { evaluators };
        Self { evaluators }
    }

    /// Build from the configured evaluator keys.
    pub fn from_config(config: &RoutingConfig) -> RoutingResult<Self> {
        Ok(Self::new(EdgeEvaluator::from_keys(&config.edge_evaluators)?))
    }

    pub fn evaluators(&self) -> &[EdgeEvaluator] {
        &self.evaluators
    }
}

impl Default for DijkstraRouter {
    fn default() -> Self {
        Self::new(vec![EdgeEvaluator::Distance])
    }
}

impl Router for DijkstraRouter {
    fn compute_table(&self, plant: &dyn PlantModel, vehicle: &Vehicle) -> RoutingTable {
        RoutingTable::compute(PathGraph::build(plant, vehicle, &self.evaluators))
    }
}
