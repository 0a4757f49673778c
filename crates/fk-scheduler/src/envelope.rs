//! Spatial index over the envelopes of allocated resources.
//!
//! Broad phase: an R-tree of envelope bounding boxes (via `rstar`).  Narrow
//! phase: exact polygon overlap ([`Envelope::overlaps`]).  Only resources
//! that belong to at least one block are indexed; those are the
//! allocation-relevant ones for envelope checks.

use rstar::{RTree, RTreeObject, AABB};

use fk_core::{ClientId, Envelope, PlantModel, Resource};

// ── R-tree entry ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
struct EnvelopeEntry {
    min:      [i64; 2],
    max:      [i64; 2],
    resource: Resource,
    client:   ClientId,
    envelope: Envelope,
}

impl RTreeObject for EnvelopeEntry {
    type Envelope = AABB<[i64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

/// The envelope of `resource` under `key`, if it has one.
pub fn resource_envelope<'a>(plant: &'a dyn PlantModel, resource: Resource, key: &str) -> Option<&'a Envelope> {
    let envelope = match resource {
        Resource::Point(p) => plant.point(p).ok()?.envelopes.get(key)?,
        Resource::Path(p) => plant.path(p).ok()?.envelopes.get(key)?,
        Resource::Location(_) => return None,
    };
    (!envelope.is_empty()).then_some(envelope)
}

/// `true` if `resource` is a member of at least one block.
pub fn is_allocation_relevant(plant: &dyn PlantModel, resource: Resource) -> bool {
    !plant.blocks_containing(resource).is_empty()
}

// ── EnvelopeIndex ─────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct EnvelopeIndex {
    tree: RTree<EnvelopeEntry>,
}

impl EnvelopeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Index the envelopes of `resources` now held by `client`.
    pub fn insert<'r, I>(&mut self, plant: &dyn PlantModel, client: ClientId, key: Option<&str>, resources: I)
    where
        I: IntoIterator<Item = &'r Resource>,
    {
        let Some(key) = key else { return };
        for &resource in resources {
            if !is_allocation_relevant(plant, resource) {
                continue;
            }
            let Some(envelope) = resource_envelope(plant, resource, key) else {
                continue;
            };
            let Some((min, max)) = envelope.bounds() else {
                continue;
            };
            self.tree.insert(EnvelopeEntry {
                min: [min.x, min.y],
                max: [max.x, max.y],
                resource,
                client,
                envelope: envelope.clone(),
            });
        }
    }

    /// Drop the entries of `resources` held by `client`.
    pub fn remove<'r, I>(&mut self, client: ClientId, resources: I)
    where
        I: IntoIterator<Item = &'r Resource>,
    {
        for resource in resources {
            let stale: Vec<EnvelopeEntry> = self
                .tree
                .iter()
                .filter(|e| e.client == client && e.resource == *resource)
                .cloned()
                .collect();
            for entry in stale {
                self.tree.remove(&entry);
            }
        }
    }

    /// Drop every entry of `client`.
    pub fn remove_client(&mut self, client: ClientId) {
        let stale: Vec<EnvelopeEntry> = self.tree.iter().filter(|e| e.client == client).cloned().collect();
        for entry in stale {
            self.tree.remove(&entry);
        }
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.tree = RTree::new();
    }

    /// `true` if `envelope` overlaps an indexed envelope of a client other
    /// than `client`.
    pub fn overlaps_other(&self, envelope: &Envelope, client: ClientId) -> bool {
        let Some((min, max)) = envelope.bounds() else {
            return false;
        };
        let query = AABB::from_corners([min.x, min.y], [max.x, max.y]);
        self.tree
            .locate_in_envelope_intersecting(&query)
            .any(|e| e.client != client && e.envelope.overlaps(envelope))
    }
}
