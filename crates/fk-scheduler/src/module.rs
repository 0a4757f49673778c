//! Allocation modules: admissibility predicates over a read-only snapshot.
//!
//! Modules are plain predicates combined by logical AND in configuration
//! order; the first veto wins.  They never mutate anything; the scheduler
//! commits state only after every module approved.
//!
//! | Key                    | Vetoes when                                            |
//! |------------------------|--------------------------------------------------------|
//! | `PAUSED_VEHICLE`       | the requesting client's vehicle is paused              |
//! | `SINGLE_VEHICLE_BLOCK` | another client holds any member of an affected block   |
//! | `SAME_DIRECTION_BLOCK` | another client holds the opposite path in the block    |
//! | `ENVELOPE`             | a requested envelope overlaps another client's one     |

use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashMap;

use fk_core::{BlockType, ClientId, PlantModel, Resource, ResourceSet, VehicleId};

use crate::envelope::{is_allocation_relevant, resource_envelope, EnvelopeIndex};
use crate::{ReservationPool, SchedulerError};

// ── Context ───────────────────────────────────────────────────────────────────

/// Scheduler-side view of a vehicle.
#[derive(Clone, Debug, Default)]
pub struct VehicleInfo {
    pub paused:       bool,
    pub envelope_key: Option<String>,
}

/// Everything a module may inspect to judge one request.
pub struct AllocationContext<'a> {
    pub plant:     &'a dyn PlantModel,
    pub pool:      &'a ReservationPool,
    pub envelopes: &'a EnvelopeIndex,
    pub vehicles:  &'a FxHashMap<VehicleId, VehicleInfo>,
    /// The vehicle of the requesting client.
    pub vehicle:   Option<VehicleId>,
}

impl AllocationContext<'_> {
    fn vehicle_info(&self) -> Option<&VehicleInfo> {
        self.vehicle.and_then(|v| self.vehicles.get(&v))
    }
}

/// A boxed admissibility predicate.
pub type AllocationPredicate =
    Box<dyn Fn(&AllocationContext<'_>, ClientId, &ResourceSet) -> bool + Send + Sync>;

/// A named predicate in the module chain.
pub struct AllocationModule {
    name:      String,
    predicate: AllocationPredicate,
    /// Decisions may change when unrelated resources are freed.
    global:    bool,
}

impl AllocationModule {
    /// Wrap a custom predicate.  `global` marks predicates whose outcome can
    /// change when resources outside the request's blocks are released.
    pub fn custom<F>(name: &str, global: bool, predicate: F) -> Self
    where
        F: Fn(&AllocationContext<'_>, ClientId, &ResourceSet) -> bool + Send + Sync + 'static,
    {
        Self { name: name.to_owned(), predicate: Box::new(predicate), global }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    #[inline]
    pub fn may_allocate(&self, ctx: &AllocationContext<'_>, client: ClientId, resources: &ResourceSet) -> bool {
        (self.predicate)(ctx, client, resources)
    }
}

impl fmt::Debug for AllocationModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocationModule").field("name", &self.name).finish()
    }
}

// ── Built-in modules ──────────────────────────────────────────────────────────

/// Built-in module selected by a configuration key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    PausedVehicle,
    SingleVehicleBlock,
    SameDirectionBlock,
    Envelope,
}

impl ModuleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PausedVehicle      => "PAUSED_VEHICLE",
            Self::SingleVehicleBlock => "SINGLE_VEHICLE_BLOCK",
            Self::SameDirectionBlock => "SAME_DIRECTION_BLOCK",
            Self::Envelope           => "ENVELOPE",
        }
    }

    /// Instantiate the module.
    pub fn build(self) -> AllocationModule {
        let name = self.as_str();
        match self {
            Self::PausedVehicle      => AllocationModule::custom(name, false, paused_vehicle),
            Self::SingleVehicleBlock => AllocationModule::custom(name, false, single_vehicle_block),
            Self::SameDirectionBlock => AllocationModule::custom(name, false, same_direction_block),
            Self::Envelope           => AllocationModule::custom(name, true, envelope_overlap),
        }
    }

    /// Resolve configuration keys into a module chain, preserving order.
    pub fn chain_from_keys<S: AsRef<str>>(keys: &[S]) -> Result<Vec<AllocationModule>, SchedulerError> {
        keys.iter()
            .map(|k| k.as_ref().parse::<ModuleKind>().map(ModuleKind::build))
            .collect()
    }
}

impl FromStr for ModuleKind {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PAUSED_VEHICLE"       => Ok(Self::PausedVehicle),
            "SINGLE_VEHICLE_BLOCK" => Ok(Self::SingleVehicleBlock),
            "SAME_DIRECTION_BLOCK" => Ok(Self::SameDirectionBlock),
            "ENVELOPE"             => Ok(Self::Envelope),
            other                  => Err(SchedulerError::UnknownModule(other.to_owned())),
        }
    }
}

fn paused_vehicle(ctx: &AllocationContext<'_>, _client: ClientId, _resources: &ResourceSet) -> bool {
    !ctx.vehicle_info().is_some_and(|v| v.paused)
}

fn single_vehicle_block(ctx: &AllocationContext<'_>, client: ClientId, resources: &ResourceSet) -> bool {
    ctx.plant
        .expand_resources(resources)
        .iter()
        .all(|&r| !ctx.pool.held_by_other(r, client))
}

fn same_direction_block(ctx: &AllocationContext<'_>, client: ClientId, resources: &ResourceSet) -> bool {
    for &requested in resources {
        let Resource::Path(path_id) = requested else { continue };
        let Ok(path) = ctx.plant.path(path_id) else { continue };

        for block_id in ctx.plant.blocks_containing(requested) {
            let Ok(block) = ctx.plant.block(block_id) else { continue };
            if block.block_type != BlockType::SameDirectionOnly {
                continue;
            }
            for &member in &block.members {
                let Resource::Path(other_id) = member else { continue };
                if !ctx.pool.held_by_other(member, client) {
                    continue;
                }
                let Ok(other) = ctx.plant.path(other_id) else { continue };
                if other.source == path.destination && other.destination == path.source {
                    return false;
                }
            }
        }
    }
    true
}

fn envelope_overlap(ctx: &AllocationContext<'_>, client: ClientId, resources: &ResourceSet) -> bool {
    let Some(key) = ctx.vehicle_info().and_then(|v| v.envelope_key.as_deref()) else {
        return true;
    };
    resources
        .iter()
        .filter(|&&r| is_allocation_relevant(ctx.plant, r))
        .filter_map(|&r| resource_envelope(ctx.plant, r, key))
        .all(|envelope| !ctx.envelopes.overlaps_other(envelope, client))
}
