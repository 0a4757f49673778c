//! The scheduler façade: claims, allocations, releases, and the pending queue.
//!
//! # Request flow
//!
//! ```text
//! allocate(c, R) ─► pool available? ─► modules (in order) ─► deadlock check
//!                        │ no              │ veto                │ unsafe
//!                        └────────────────►┴────────────────────►┴─► pending (FIFO)
//!                                  all pass
//!                                     ▼
//!                   pool.allocate ─► client.on_allocation(R)
//!                                     │ false
//!                                     └─► freed again at once
//! ```
//!
//! # Fairness
//!
//! Pending requests are re-evaluated in arrival order whenever resources
//! they watch are released (the request plus every member of every block
//! the request touches).  Requests are not reserved for the head of the
//! queue: a later request for unrelated resources is granted even while an
//! earlier one keeps waiting.  When the module chain contains a global
//! module (`ENVELOPE`) or deadlock avoidance is enabled, every release
//! re-evaluates the whole queue.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use fk_core::{
    intersects, BlockType, ClientId, PlantModel, ResourceSet, SchedulerConfig, VehicleId,
};

use crate::{
    AllocationContext, AllocationModule, AllocationOutcome, DeadlockPredictor, EnvelopeIndex,
    Grant, ModuleKind, ReservationPool, Safety, SchedulerClient, SchedulerError,
    SchedulerResult, VehicleInfo,
};

struct PendingRequest {
    client:    ClientId,
    resources: ResourceSet,
    /// Releasing any of these may make the request admissible.
    watch:     ResourceSet,
}

enum Trigger {
    All,
    Freed(ResourceSet),
}

/// Single-writer resource arbiter.
pub struct Scheduler {
    plant:           Arc<dyn PlantModel>,
    pool:            ReservationPool,
    envelopes:       EnvelopeIndex,
    modules:         Vec<AllocationModule>,
    predictor:       Option<DeadlockPredictor>,
    predictor_stale: bool,
    clients:         FxHashMap<ClientId, Box<dyn SchedulerClient>>,
    vehicles:        FxHashMap<VehicleId, VehicleInfo>,
    claims:          FxHashMap<ClientId, VecDeque<ResourceSet>>,
    /// Pending requests keyed by arrival sequence number.
    pending:         BTreeMap<u64, PendingRequest>,
    next_seq:        u64,
    /// Grants since the last [`take_grants`](Self::take_grants).
    grants:          Vec<Grant>,
}

impl Scheduler {
    /// Build from configuration.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::UnknownModule`] for an unrecognised module key.
    pub fn new(plant: Arc<dyn PlantModel>, config: &SchedulerConfig) -> SchedulerResult<Self> {
        let modules = ModuleKind::chain_from_keys(&config.allocation_modules)?;
        let predictor = config
            .deadlock_avoidance
            .then(|| DeadlockPredictor::new(config.deadlock_search_limit));
        Ok(Self::with_modules(plant, modules, predictor))
    }

    /// Build with an explicit module chain.
    pub fn with_modules(
        plant:     Arc<dyn PlantModel>,
        modules:   Vec<AllocationModule>,
        predictor: Option<DeadlockPredictor>,
    ) -> Self {
        Self {
            plant,
            pool: ReservationPool::new(),
            envelopes: EnvelopeIndex::new(),
            modules,
            predictor,
            predictor_stale: true,
            clients: FxHashMap::default(),
            vehicles: FxHashMap::default(),
            claims: FxHashMap::default(),
            pending: BTreeMap::new(),
            next_seq: 0,
            grants: Vec::new(),
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn plant(&self) -> &Arc<dyn PlantModel> {
        &self.plant
    }

    pub fn pool(&self) -> &ReservationPool {
        &self.pool
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(AllocationModule::name)
    }

    pub fn deadlock_avoidance(&self) -> bool {
        self.predictor.is_some()
    }

    pub fn is_registered(&self, client: ClientId) -> bool {
        self.clients.contains_key(&client)
    }

    /// Everything `client` currently holds.
    pub fn allocations_of(&self, client: ClientId) -> ResourceSet {
        self.pool.allocations_of(client)
    }

    /// Remaining claim of `client`, in travel order.
    pub fn claims_of(&self, client: ClientId) -> Vec<ResourceSet> {
        self.claims.get(&client).map(|q| q.iter().cloned().collect()).unwrap_or_default()
    }

    /// Queued requests of `client`, oldest first.
    pub fn pending_requests(&self, client: ClientId) -> Vec<ResourceSet> {
        self.pending
            .values()
            .filter(|r| r.client == client)
            .map(|r| r.resources.clone())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drain the grants made since the last call, in grant order.
    pub fn take_grants(&mut self) -> Vec<Grant> {
        std::mem::take(&mut self.grants)
    }

    // ── Plant & vehicles ──────────────────────────────────────────────────

    /// Swap the plant model; envelopes are re-indexed and pending requests
    /// re-evaluated.
    pub fn set_plant(&mut self, plant: Arc<dyn PlantModel>) -> SchedulerResult<()> {
        self.plant = plant;
        self.envelopes.clear();
        let held: Vec<(ClientId, ResourceSet)> = self.pool.allocations().map(|(c, s)| (c, s.clone())).collect();
        for (client, resources) in held {
            let key = self.envelope_key_of(client);
            self.envelopes.insert(self.plant.as_ref(), client, key.as_deref(), &resources);
        }
        self.predictor_stale = true;
        self.process_pending(Trigger::All)
    }

    /// Pause or resume allocations for `vehicle`.  Resuming re-evaluates
    /// pending requests.
    pub fn set_vehicle_paused(&mut self, vehicle: VehicleId, paused: bool) -> SchedulerResult<()> {
        let info = self.vehicles.entry(vehicle).or_default();
        if info.paused == paused {
            return Ok(());
        }
        info.paused = paused;
        info!(%vehicle, paused, "vehicle pause state changed");
        if paused { Ok(()) } else { self.process_pending(Trigger::All) }
    }

    /// Select which envelope of each resource applies to `vehicle`.
    pub fn set_envelope_key(&mut self, vehicle: VehicleId, key: Option<String>) {
        self.vehicles.entry(vehicle).or_default().envelope_key = key.clone();
        let affected: Vec<ClientId> = self
            .clients
            .values()
            .filter(|c| c.related_vehicle() == Some(vehicle))
            .map(|c| c.id())
            .collect();
        for client in affected {
            self.envelopes.remove_client(client);
            let held = self.pool.allocations_of(client);
            self.envelopes.insert(self.plant.as_ref(), client, key.as_deref(), &held);
        }
    }

    // ── Clients ───────────────────────────────────────────────────────────

    pub fn register_client(&mut self, client: Box<dyn SchedulerClient>) -> SchedulerResult<()> {
        let id = client.id();
        if self.clients.contains_key(&id) {
            return Err(SchedulerError::ClientExists(id));
        }
        if let Some(vehicle) = client.related_vehicle() {
            self.vehicles.entry(vehicle).or_default();
        }
        debug!(client = %id, "scheduler client registered");
        self.clients.insert(id, client);
        Ok(())
    }

    /// Release everything `client` holds, drop its claim and pending
    /// requests, and forget it.
    pub fn unregister_client(&mut self, client: ClientId) -> SchedulerResult<()> {
        self.require_client(client)?;
        self.clear_pending(client);
        self.claims.remove(&client);
        self.free_all(client)?;
        self.clients.remove(&client);
        debug!(%client, "scheduler client unregistered");
        Ok(())
    }

    fn require_client(&self, client: ClientId) -> SchedulerResult<()> {
        if self.clients.contains_key(&client) { Ok(()) } else { Err(SchedulerError::ClientUnknown(client)) }
    }

    fn envelope_key_of(&self, client: ClientId) -> Option<String> {
        let vehicle = self.clients.get(&client)?.related_vehicle()?;
        self.vehicles.get(&vehicle)?.envelope_key.clone()
    }

    // ── Claims ────────────────────────────────────────────────────────────

    /// Declare the full sequence of resource sets `client` will request.
    /// Replaces any previous claim; allocates nothing.
    pub fn claim(&mut self, client: ClientId, sequence: Vec<ResourceSet>) -> SchedulerResult<()> {
        self.require_client(client)?;
        debug!(%client, steps = sequence.len(), "claim");
        self.claims.insert(client, sequence.into());
        self.predictor_stale = true;
        if self.predictor.is_some() { self.process_pending(Trigger::All) } else { Ok(()) }
    }

    /// Drop the remaining claim of `client`.
    pub fn unclaim(&mut self, client: ClientId) -> SchedulerResult<()> {
        self.require_client(client)?;
        if self.claims.remove(&client).is_some() {
            debug!(%client, "unclaim");
            self.predictor_stale = true;
            if self.predictor.is_some() {
                return self.process_pending(Trigger::All);
            }
        }
        Ok(())
    }

    // ── Allocation ────────────────────────────────────────────────────────

    /// Request immediate exclusive use of `resources`.
    ///
    /// If admissible now, the resources are committed and the client's
    /// [`on_allocation`](SchedulerClient::on_allocation) runs before this
    /// returns.  Otherwise the request is queued and granted later, when a
    /// release makes it admissible.
    pub fn allocate(&mut self, client: ClientId, resources: ResourceSet) -> SchedulerResult<AllocationOutcome> {
        self.require_client(client)?;

        if self.admissible(client, &resources) {
            let accepted = self.grant(client, resources.clone())?;
            let trigger = match (accepted, self.has_global_gates()) {
                (_, true) => Some(Trigger::All),
                (false, false) => Some(Trigger::Freed(resources)),
                (true, false) => None,
            };
            if let Some(trigger) = trigger {
                self.process_pending(trigger)?;
            }
            return Ok(if accepted { AllocationOutcome::Granted } else { AllocationOutcome::Declined });
        }

        let watch = self.watch_set(&resources);
        let seq = self.next_seq;
        self.next_seq += 1;
        debug!(%client, request = seq, "allocation deferred");
        self.pending.insert(seq, PendingRequest { client, resources, watch });
        Ok(AllocationOutcome::Deferred)
    }

    /// Release `resources` held by `client` and re-evaluate pending requests
    /// that watch them.  Resources the client no longer holds (e.g. after a
    /// withdrawal re-granted them to another client) are skipped with a
    /// warning.
    pub fn free(&mut self, client: ClientId, resources: &ResourceSet) -> SchedulerResult<()> {
        self.require_client(client)?;
        let freed = self.release(client, resources);
        if freed.len() < resources.len() {
            warn!(%client, requested = resources.len(), freed = freed.len(), "freeing resources not held by client");
        }
        if freed.is_empty() {
            return Ok(());
        }
        let trigger = self.trigger_for(freed);
        self.process_pending(trigger)
    }

    /// Release everything `client` holds.
    pub fn free_all(&mut self, client: ClientId) -> SchedulerResult<()> {
        self.require_client(client)?;
        let held = self.pool.allocations_of(client);
        self.free(client, &held)
    }

    /// Release everything `client` holds except `keep`.
    pub fn free_all_except(&mut self, client: ClientId, keep: &ResourceSet) -> SchedulerResult<()> {
        self.require_client(client)?;
        let to_free: ResourceSet = self.pool.allocations_of(client).difference(keep).copied().collect();
        self.free(client, &to_free)
    }

    /// Drop all pending requests of `client`; returns how many were dropped.
    pub fn clear_pending(&mut self, client: ClientId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, r| r.client != client);
        let dropped = before - self.pending.len();
        if dropped > 0 {
            debug!(%client, dropped, "pending requests cleared");
        }
        dropped
    }

    // ── Invariants ────────────────────────────────────────────────────────

    /// Verify pool consistency and single-vehicle block exclusivity.
    pub fn check_invariants(&self) -> SchedulerResult<()> {
        self.pool.check_consistency()?;
        for block in self.plant.blocks() {
            if block.block_type != BlockType::SingleVehicleOnly {
                continue;
            }
            let mut holder = None;
            for &member in &block.members {
                let Some(h) = self.pool.holder(member) else { continue };
                match holder {
                    None => holder = Some(h),
                    Some(prev) if prev != h => {
                        return Err(SchedulerError::Inconsistent(format!(
                            "block {} held by {prev} and {h}",
                            block.name,
                        )));
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn has_global_gates(&self) -> bool {
        self.predictor.is_some() || self.modules.iter().any(AllocationModule::is_global)
    }

    fn trigger_for(&self, freed: ResourceSet) -> Trigger {
        if self.has_global_gates() { Trigger::All } else { Trigger::Freed(freed) }
    }

    /// The request plus every member of every block it touches.
    fn watch_set(&self, resources: &ResourceSet) -> ResourceSet {
        let mut watch = resources.clone();
        for &r in resources {
            for block_id in self.plant.blocks_containing(r) {
                if let Ok(block) = self.plant.block(block_id) {
                    watch.extend(block.members.iter().copied());
                }
            }
        }
        watch
    }

    fn sync_predictor(&mut self) {
        if !self.predictor_stale {
            return;
        }
        if let Some(predictor) = self.predictor.as_mut() {
            let pool = &self.pool;
            let entries = self
                .claims
                .iter()
                .map(|(&c, claim)| (c, pool.allocations_of(c), claim.iter().cloned().collect()));
            predictor.configure_system_data(self.plant.as_ref(), entries);
        }
        self.predictor_stale = false;
    }

    fn admissible(&mut self, client: ClientId, resources: &ResourceSet) -> bool {
        if !self.pool.resources_available_for_user(resources, client) {
            return false;
        }

        let ctx = AllocationContext {
            plant:     self.plant.as_ref(),
            pool:      &self.pool,
            envelopes: &self.envelopes,
            vehicles:  &self.vehicles,
            vehicle:   self.clients.get(&client).and_then(|c| c.related_vehicle()),
        };
        if let Some(module) = self.modules.iter().find(|m| !m.may_allocate(&ctx, client, resources)) {
            debug!(%client, module = module.name(), "allocation vetoed");
            return false;
        }

        if self.predictor.is_some() {
            self.sync_predictor();
            if let Some(predictor) = &self.predictor {
                let safety = predictor.check_grant(client, resources);
                if !safety.is_safe() {
                    match safety {
                        Safety::Inconclusive => {
                            warn!(%client, "deadlock search limit reached; treating request as unsafe");
                        }
                        _ => debug!(%client, "allocation rejected by deadlock predictor"),
                    }
                    return false;
                }
            }
        }
        true
    }

    /// Commit `resources` to `client` and run its callback.  Returns whether
    /// the client accepted them.
    fn grant(&mut self, client: ClientId, resources: ResourceSet) -> SchedulerResult<bool> {
        self.pool.allocate(client, &resources)?;
        let key = self.envelope_key_of(client);
        self.envelopes.insert(self.plant.as_ref(), client, key.as_deref(), &resources);
        if let Some(claim) = self.claims.get_mut(&client) {
            while claim.front().is_some_and(|step| step.is_subset(&resources)) {
                claim.pop_front();
            }
        }
        self.predictor_stale = true;

        let accepted = self.clients.get(&client).is_some_and(|c| c.on_allocation(&resources));
        if accepted {
            debug!(%client, resources = resources.len(), "allocation granted");
        } else {
            debug!(%client, "allocation declined by client; releasing");
            self.release(client, &resources);
        }
        self.grants.push(Grant { client, resources, accepted });
        Ok(accepted)
    }

    fn release(&mut self, client: ClientId, resources: &ResourceSet) -> ResourceSet {
        let freed = self.pool.free(client, resources);
        self.envelopes.remove(client, &freed);
        if !freed.is_empty() {
            self.predictor_stale = true;
        }
        freed
    }

    fn process_pending(&mut self, mut trigger: Trigger) -> SchedulerResult<()> {
        loop {
            let mut granted_any = false;
            let mut declined = ResourceSet::new();

            let order: Vec<u64> = self.pending.keys().copied().collect();
            for seq in order {
                let Some(request) = self.pending.get(&seq) else { continue };
                let relevant = match &trigger {
                    Trigger::All => true,
                    Trigger::Freed(freed) => intersects(&request.watch, freed),
                };
                if !relevant {
                    continue;
                }
                let (client, resources) = (request.client, request.resources.clone());
                if !self.admissible(client, &resources) {
                    continue;
                }
                self.pending.remove(&seq);
                debug!(%client, request = seq, "pending request admissible");
                granted_any = true;
                if !self.grant(client, resources.clone())? {
                    declined.extend(resources);
                }
            }

            if !granted_any {
                return Ok(());
            }
            trigger = if self.has_global_gates() {
                Trigger::All
            } else if declined.is_empty() {
                return Ok(());
            } else {
                Trigger::Freed(declined)
            };
        }
    }
}
