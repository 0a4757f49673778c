//! Reservation pool: who holds which resource right now.
//!
//! Two maps are kept in sync: `holders` answers "who holds `r`?" in O(1),
//! `by_client` answers "what does `c` hold?" without a scan.  Any divergence
//! between them, or a grant of a resource someone else holds, is reported
//! as [`SchedulerError::Inconsistent`].

use rustc_hash::FxHashMap;

use fk_core::{ClientId, Resource, ResourceSet};

use crate::{SchedulerError, SchedulerResult};

#[derive(Default)]
pub struct ReservationPool {
    holders:   FxHashMap<Resource, ClientId>,
    by_client: FxHashMap<ClientId, ResourceSet>,
}

impl ReservationPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// The client currently holding `resource`.
    #[inline]
    pub fn holder(&self, resource: Resource) -> Option<ClientId> {
        self.holders.get(&resource).copied()
    }

    /// `true` if `resource` is held by a client other than `client`.
    #[inline]
    pub fn held_by_other(&self, resource: Resource, client: ClientId) -> bool {
        self.holder(resource).is_some_and(|h| h != client)
    }

    /// `true` iff no resource in `resources` is held by a different client.
    pub fn resources_available_for_user(&self, resources: &ResourceSet, client: ClientId) -> bool {
        resources.iter().all(|&r| !self.held_by_other(r, client))
    }

    /// Everything `client` holds.
    pub fn allocations_of(&self, client: ClientId) -> ResourceSet {
        self.by_client.get(&client).cloned().unwrap_or_default()
    }

    /// Iterate `(client, held resources)` for every client holding something.
    pub fn allocations(&self) -> impl Iterator<Item = (ClientId, &ResourceSet)> {
        self.by_client.iter().map(|(&c, set)| (c, set))
    }

    /// Number of held resources.
    pub fn len(&self) -> usize {
        self.holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    /// Record `resources` as held by `client`.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Inconsistent`] if any resource is held by another
    /// client; nothing is changed in that case.
    pub fn allocate(&mut self, client: ClientId, resources: &ResourceSet) -> SchedulerResult<()> {
        if let Some(&r) = resources.iter().find(|&&r| self.held_by_other(r, client)) {
            return Err(SchedulerError::Inconsistent(format!(
                "{r} requested by {client} is held by {}",
                self.holder(r).unwrap_or(ClientId::INVALID),
            )));
        }
        let held = self.by_client.entry(client).or_default();
        for &r in resources {
            self.holders.insert(r, client);
            held.insert(r);
        }
        Ok(())
    }

    /// Release `resources` held by `client`; returns what was actually freed.
    ///
    /// Resources the client does not hold are skipped, whether they are free
    /// or already held by someone else.  A controller that lags behind a
    /// withdrawal may still report resources its vehicle has passed.
    pub fn free(&mut self, client: ClientId, resources: &ResourceSet) -> ResourceSet {
        let mut freed = ResourceSet::new();
        if let Some(held) = self.by_client.get_mut(&client) {
            for r in resources {
                if held.remove(r) {
                    self.holders.remove(r);
                    freed.insert(*r);
                }
            }
            if held.is_empty() {
                self.by_client.remove(&client);
            }
        }
        freed
    }

    /// Verify that both indices describe the same ownership.
    pub fn check_consistency(&self) -> SchedulerResult<()> {
        let mut counted = 0usize;
        for (&client, set) in &self.by_client {
            for &r in set {
                counted += 1;
                if self.holder(r) != Some(client) {
                    return Err(SchedulerError::Inconsistent(format!(
                        "{r} listed for {client} but pool says {:?}",
                        self.holder(r),
                    )));
                }
            }
        }
        if counted != self.holders.len() {
            return Err(SchedulerError::Inconsistent(format!(
                "{} holder entries for {counted} allocated resources",
                self.holders.len(),
            )));
        }
        Ok(())
    }
}
