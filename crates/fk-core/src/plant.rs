//! Plant model: points, paths, locations, and blocks.
//!
//! The kernel never owns the authoritative plant model; it consumes the
//! read-only [`PlantModel`] query interface supplied by the plant-model
//! service.  [`Plant`] is a plain in-memory implementation built with
//! [`PlantBuilder`], used by applications that assemble the model
//! themselves and by every test in the workspace.
//!
//! # Numbering
//!
//! `PlantBuilder` hands out IDs sequentially from 0 per object kind, so
//! `plant.points()[id.index()]` is the point with that ID.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{
    BlockId, CoreError, CoreResult, Couple, Envelope, LocationId, PathId, PointId, Resource,
    ResourceSet,
};

// ── Plant objects ─────────────────────────────────────────────────────────────

/// What a vehicle may do at a point.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PointType {
    /// Vehicles may stop here but not park for extended periods.
    #[default]
    Halt,
    /// Vehicles may park here while idle.
    Park,
}

/// A node of the path graph.
#[derive(Clone, Debug)]
pub struct Point {
    pub id:         PointId,
    pub name:       String,
    pub position:   Couple,
    pub point_type: PointType,
    /// Occupancy envelopes keyed by vehicle envelope key.
    pub envelopes:  BTreeMap<String, Envelope>,
}

/// A directed connection between two points.
///
/// A path with a non-zero `max_reverse_velocity` may also be travelled from
/// `destination` back to `source`, with the vehicle moving backwards.
#[derive(Clone, Debug)]
pub struct Path {
    pub id:                   PathId,
    pub name:                 String,
    pub source:               PointId,
    pub destination:          PointId,
    /// Length in millimetres.
    pub length_mm:            u64,
    /// Maximum forward velocity in mm/s.  Zero forbids forward travel.
    pub max_velocity:         u32,
    /// Maximum reverse velocity in mm/s.  Zero forbids reverse travel.
    pub max_reverse_velocity: u32,
    /// Locked paths are excluded from routing for every vehicle.
    pub locked:               bool,
    /// Explicit routing cost for forward travel (`EXPLICIT` evaluator).
    pub explicit_cost:        Option<u64>,
    /// Explicit routing cost for reverse travel (`EXPLICIT` evaluator).
    pub explicit_reverse_cost: Option<u64>,
    pub envelopes:            BTreeMap<String, Envelope>,
}

impl Path {
    pub fn navigable_forward(&self) -> bool {
        self.max_velocity > 0
    }

    pub fn navigable_reverse(&self) -> bool {
        self.max_reverse_velocity > 0
    }
}

/// A station where vehicles perform operations, reachable via linked points.
#[derive(Clone, Debug)]
pub struct Location {
    pub id:                 LocationId,
    pub name:               String,
    pub position:           Couple,
    /// Operations vehicles may perform here (e.g. `"Load"`, `"Charge"`).
    pub allowed_operations: BTreeSet<String>,
    /// Points from which the location is accessible.
    pub links:              Vec<PointId>,
    /// Locked locations are not used as order destinations.
    pub locked:             bool,
}

/// Allocation policy shared by all members of a block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlockType {
    /// At most one vehicle may hold any member at a time.
    SingleVehicleOnly,
    /// Several vehicles may be inside, but never travelling in opposing
    /// directions.
    SameDirectionOnly,
}

/// A named group of resources sharing an allocation policy.
#[derive(Clone, Debug)]
pub struct Block {
    pub id:         BlockId,
    pub name:       String,
    pub block_type: BlockType,
    pub members:    ResourceSet,
}

// ── PlantModel trait ──────────────────────────────────────────────────────────

/// Read-only plant-model queries the kernel relies on.
///
/// # Thread safety
///
/// Implementations must be `Send + Sync`: the model is shared between the
/// router, the scheduler, and the dispatcher behind an `Arc`.
pub trait PlantModel: Send + Sync {
    fn points(&self) -> &[Point];
    fn paths(&self) -> &[Path];
    fn locations(&self) -> &[Location];
    fn blocks(&self) -> &[Block];

    /// IDs of all blocks that list `resource` as a member, ascending.
    fn blocks_containing(&self, resource: Resource) -> Vec<BlockId>;

    fn point(&self, id: PointId) -> CoreResult<&Point> {
        self.points().get(id.index()).ok_or(CoreError::PointUnknown(id))
    }

    fn path(&self, id: PathId) -> CoreResult<&Path> {
        self.paths().get(id.index()).ok_or(CoreError::PathUnknown(id))
    }

    fn location(&self, id: LocationId) -> CoreResult<&Location> {
        self.locations().get(id.index()).ok_or(CoreError::LocationUnknown(id))
    }

    fn block(&self, id: BlockId) -> CoreResult<&Block> {
        self.blocks().get(id.index()).ok_or(CoreError::BlockUnknown(id))
    }

    /// All points matching `predicate`.
    fn fetch_points(&self, predicate: &dyn Fn(&Point) -> bool) -> Vec<&Point> {
        self.points().iter().filter(|p| predicate(p)).collect()
    }

    /// All locations matching `predicate`.
    fn fetch_locations(&self, predicate: &dyn Fn(&Location) -> bool) -> Vec<&Location> {
        self.locations().iter().filter(|l| predicate(l)).collect()
    }

    /// All blocks matching `predicate`.
    fn fetch_blocks(&self, predicate: &dyn Fn(&Block) -> bool) -> Vec<&Block> {
        self.blocks().iter().filter(|b| predicate(b)).collect()
    }

    /// Look up a point by name.
    fn point_by_name(&self, name: &str) -> Option<&Point> {
        self.points().iter().find(|p| p.name == name)
    }

    /// Look up a location by name.
    fn location_by_name(&self, name: &str) -> Option<&Location> {
        self.locations().iter().find(|l| l.name == name)
    }

    /// Expand `resources` with every member of each single-vehicle block any
    /// of them belongs to.
    ///
    /// The result always contains the input.
    fn expand_resources(&self, resources: &ResourceSet) -> ResourceSet {
        let mut out = resources.clone();
        for &r in resources {
            for block_id in self.blocks_containing(r) {
                match self.block(block_id) {
                    Ok(block) if block.block_type == BlockType::SingleVehicleOnly => {
                        out.extend(block.members.iter().copied());
                    }
                    _ => {}
                }
            }
        }
        out
    }
}

// ── Plant ─────────────────────────────────────────────────────────────────────

/// In-memory [`PlantModel`].  Construct with [`PlantBuilder`].
#[derive(Clone, Debug, Default)]
pub struct Plant {
    points:    Vec<Point>,
    paths:     Vec<Path>,
    locations: Vec<Location>,
    blocks:    Vec<Block>,
    /// Reverse index: resource → blocks containing it, ascending.
    block_index: HashMap<Resource, Vec<BlockId>>,
}

impl Plant {
    /// A plant with no objects.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl PlantModel for Plant {
    fn points(&self) -> &[Point] {
        &self.points
    }

    fn paths(&self) -> &[Path] {
        &self.paths
    }

    fn locations(&self) -> &[Location] {
        &self.locations
    }

    fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    fn blocks_containing(&self, resource: Resource) -> Vec<BlockId> {
        self.block_index.get(&resource).cloned().unwrap_or_default()
    }
}

// ── PlantBuilder ──────────────────────────────────────────────────────────────

/// Construct a [`Plant`] incrementally, then call [`build`](Self::build).
///
/// # Example
///
/// ```
/// use fk_core::{Couple, PlantBuilder, PlantModel};
///
/// let mut b = PlantBuilder::new();
/// let a = b.add_point("A", Couple::new(0, 0));
/// let c = b.add_point("C", Couple::new(5_000, 0));
/// b.add_path("A--C", a, c, 5_000);
/// let plant = b.build().unwrap();
/// assert_eq!(plant.points().len(), 2);
/// assert_eq!(plant.paths().len(), 1);
/// ```
#[derive(Default)]
pub struct PlantBuilder {
    points:    Vec<Point>,
    paths:     Vec<Path>,
    locations: Vec<Location>,
    blocks:    Vec<Block>,
}

/// Default velocity for paths added without an explicit one: 1 m/s.
pub const DEFAULT_PATH_VELOCITY: u32 = 1_000;

impl PlantBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a halt point and return its ID.
    pub fn add_point(&mut self, name: &str, position: Couple) -> PointId {
        self.push_point(name, position, PointType::Halt)
    }

    /// Add a park position and return its ID.
    pub fn add_park_point(&mut self, name: &str, position: Couple) -> PointId {
        self.push_point(name, position, PointType::Park)
    }

    fn push_point(&mut self, name: &str, position: Couple, point_type: PointType) -> PointId {
        let id = PointId(self.points.len() as u32);
        self.points.push(Point {
            id,
            name: name.to_owned(),
            position,
            point_type,
            envelopes: BTreeMap::new(),
        });
        id
    }

    /// Add a one-way path travelled forwards at [`DEFAULT_PATH_VELOCITY`].
    pub fn add_path(&mut self, name: &str, from: PointId, to: PointId, length_mm: u64) -> PathId {
        let id = PathId(self.paths.len() as u32);
        self.paths.push(Path {
            id,
            name: name.to_owned(),
            source: from,
            destination: to,
            length_mm,
            max_velocity: DEFAULT_PATH_VELOCITY,
            max_reverse_velocity: 0,
            locked: false,
            explicit_cost: None,
            explicit_reverse_cost: None,
            envelopes: BTreeMap::new(),
        });
        id
    }

    /// Convenience: add a path that may be travelled in both directions
    /// (reverse travel at the same velocity).
    pub fn add_two_way_path(&mut self, name: &str, a: PointId, b: PointId, length_mm: u64) -> PathId {
        let id = self.add_path(name, a, b, length_mm);
        self.paths[id.index()].max_reverse_velocity = DEFAULT_PATH_VELOCITY;
        id
    }

    /// Add a location linked to `links` and return its ID.
    pub fn add_location(
        &mut self,
        name:       &str,
        position:   Couple,
        operations: &[&str],
        links:      &[PointId],
    ) -> LocationId {
        let id = LocationId(self.locations.len() as u32);
        self.locations.push(Location {
            id,
            name: name.to_owned(),
            position,
            allowed_operations: operations.iter().map(|s| (*s).to_owned()).collect(),
            links: links.to_vec(),
            locked: false,
        });
        id
    }

    /// Add a block over `members` and return its ID.
    pub fn add_block<I>(&mut self, name: &str, block_type: BlockType, members: I) -> BlockId
    where
        I: IntoIterator<Item = Resource>,
    {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block {
            id,
            name: name.to_owned(),
            block_type,
            members: members.into_iter().collect(),
        });
        id
    }

    // ── Attribute setters ─────────────────────────────────────────────────

    /// Set forward/reverse velocity limits (mm/s).  Panics on an unknown ID.
    pub fn set_path_velocity(&mut self, path: PathId, forward: u32, reverse: u32) -> &mut Self {
        let p = &mut self.paths[path.index()];
        p.max_velocity = forward;
        p.max_reverse_velocity = reverse;
        self
    }

    pub fn set_path_locked(&mut self, path: PathId, locked: bool) -> &mut Self {
        self.paths[path.index()].locked = locked;
        self
    }

    pub fn set_path_explicit_cost(
        &mut self,
        path:    PathId,
        forward: Option<u64>,
        reverse: Option<u64>,
    ) -> &mut Self {
        let p = &mut self.paths[path.index()];
        p.explicit_cost = forward;
        p.explicit_reverse_cost = reverse;
        self
    }

    pub fn set_location_locked(&mut self, location: LocationId, locked: bool) -> &mut Self {
        self.locations[location.index()].locked = locked;
        self
    }

    pub fn set_point_envelope(&mut self, point: PointId, key: &str, envelope: Envelope) -> &mut Self {
        self.points[point.index()].envelopes.insert(key.to_owned(), envelope);
        self
    }

    pub fn set_path_envelope(&mut self, path: PathId, key: &str, envelope: Envelope) -> &mut Self {
        self.paths[path.index()].envelopes.insert(key.to_owned(), envelope);
        self
    }

    // ── Build ─────────────────────────────────────────────────────────────

    /// Validate cross references and produce a [`Plant`].
    ///
    /// # Errors
    ///
    /// Returns the first dangling point/path/location reference found.
    pub fn build(self) -> CoreResult<Plant> {
        let point_count = self.points.len();
        let check_point = |p: PointId| {
            if p.index() < point_count { Ok(()) } else { Err(CoreError::PointUnknown(p)) }
        };

        for path in &self.paths {
            check_point(path.source)?;
            check_point(path.destination)?;
        }
        for loc in &self.locations {
            for &p in &loc.links {
                check_point(p)?;
            }
        }

        let mut block_index: HashMap<Resource, Vec<BlockId>> = HashMap::new();
        for block in &self.blocks {
            for &member in &block.members {
                match member {
                    Resource::Point(p) => check_point(p)?,
                    Resource::Path(p) if p.index() >= self.paths.len() => {
                        return Err(CoreError::PathUnknown(p));
                    }
                    Resource::Location(l) if l.index() >= self.locations.len() => {
                        return Err(CoreError::LocationUnknown(l));
                    }
                    _ => {}
                }
                block_index.entry(member).or_default().push(block.id);
            }
        }

        Ok(Plant {
            points: self.points,
            paths: self.paths,
            locations: self.locations,
            blocks: self.blocks,
            block_index,
        })
    }
}
