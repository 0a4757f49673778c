//! Allocatable plant resources.
//!
//! A [`Resource`] is the unit of exclusive occupancy: a point a vehicle
//! stands on, a path it travels along, or a location it operates at.
//! Resource sets are `BTreeSet`s so iteration order (and therefore every
//! log line, veto reason and tie-break) is deterministic.

use std::collections::BTreeSet;
use std::fmt;

use crate::{LocationId, PathId, PointId};

/// A point, path, or location.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Resource {
    Point(PointId),
    Path(PathId),
    Location(LocationId),
}

impl Resource {
    pub fn as_point(self) -> Option<PointId> {
        match self {
            Resource::Point(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_path(self) -> Option<PathId> {
        match self {
            Resource::Path(p) => Some(p),
            _ => None,
        }
    }
}

impl From<PointId> for Resource {
    fn from(id: PointId) -> Self {
        Resource::Point(id)
    }
}

impl From<PathId> for Resource {
    fn from(id: PathId) -> Self {
        Resource::Path(id)
    }
}

impl From<LocationId> for Resource {
    fn from(id: LocationId) -> Self {
        Resource::Location(id)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Point(p)    => write!(f, "{p}"),
            Resource::Path(p)     => write!(f, "{p}"),
            Resource::Location(l) => write!(f, "{l}"),
        }
    }
}

/// An ordered set of resources requested or held together.
pub type ResourceSet = BTreeSet<Resource>;

/// Build a [`ResourceSet`] from anything convertible into resources.
///
/// ```
/// use fk_core::{resource_set, PathId, PointId, Resource};
///
/// let set = resource_set([Resource::from(PathId(0)), Resource::from(PointId(1))]);
/// assert_eq!(set.len(), 2);
/// ```
pub fn resource_set<I, R>(items: I) -> ResourceSet
where
    I: IntoIterator<Item = R>,
    R: Into<Resource>,
{
    items.into_iter().map(Into::into).collect()
}

/// `true` if the two sets share at least one resource.
#[inline]
pub fn intersects(a: &ResourceSet, b: &ResourceSet) -> bool {
    // Walk the smaller set and look each up in the larger one.
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small.iter().any(|r| large.contains(r))
}
