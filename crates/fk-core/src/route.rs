//! Routes: ordered steps over the path graph.

use crate::{PathId, PointId, Resource, ResourceSet};

/// Cost sentinel marking an unreachable (source, destination) pair.
///
/// Never summed into a real route; [`Route::costs`] is always finite.
pub const INFINITE_COSTS: u64 = u64::MAX;

/// Direction a vehicle faces while travelling a path.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Orientation {
    /// Travelling from the path's source to its destination.
    #[default]
    Forward,
    /// Travelling from the path's destination back to its source.
    Backward,
}

/// One movement from `source` to `destination` over `path`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Step {
    pub path:        PathId,
    pub source:      PointId,
    pub destination: PointId,
    pub orientation: Orientation,
    /// Index of this step within its route.
    pub route_index: usize,
    /// Non-negative cost of this step.
    pub cost:        u64,
}

impl Step {
    /// The resources a vehicle must hold to perform this step: the path and
    /// the point it leads to.
    pub fn resources(&self) -> ResourceSet {
        ResourceSet::from([Resource::Path(self.path), Resource::Point(self.destination)])
    }
}

/// An ordered list of steps and their summed cost.
///
/// An empty route (source equals destination) has zero cost.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Route {
    pub steps: Vec<Step>,
    pub costs: u64,
}

impl Route {
    /// Build a route from steps, summing their costs.
    pub fn new(steps: Vec<Step>) -> Self {
        let costs = steps.iter().map(|s| s.cost).sum();
        Self { steps, costs }
    }

    /// `true` if the route has no steps.
    pub fn is_trivial(&self) -> bool {
        self.steps.is_empty()
    }

    /// Final point of the route, if it has any steps.
    pub fn final_point(&self) -> Option<PointId> {
        self.steps.last().map(|s| s.destination)
    }

    /// Per-step resource sets in travel order; this is what a vehicle claims.
    pub fn resource_sequence(&self) -> Vec<ResourceSet> {
        self.steps.iter().map(Step::resources).collect()
    }

    /// Path IDs in travel order.  Used as a deterministic tie-break key.
    pub fn path_key(&self) -> Vec<PathId> {
        self.steps.iter().map(|s| s.path).collect()
    }
}
