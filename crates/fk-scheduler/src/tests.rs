//! Unit tests for fk-scheduler.

#[cfg(test)]
mod helpers {
    use std::sync::{Arc, Mutex};

    use fk_core::{
        ClientId, Couple, PlantModel, PlantBuilder, PointId, Resource, ResourceSet, VehicleId,
    };

    use crate::{DeadlockPredictor, ModuleKind, Scheduler, SchedulerClient};

    pub type GrantLog = Arc<Mutex<Vec<ResourceSet>>>;

    /// Records every grant; accepts or declines according to `accept`.
    pub struct TestClient {
        pub id:      ClientId,
        pub vehicle: Option<VehicleId>,
        pub accept:  bool,
        pub log:     GrantLog,
    }

    impl SchedulerClient for TestClient {
        fn id(&self) -> ClientId {
            self.id
        }

        fn related_vehicle(&self) -> Option<VehicleId> {
            self.vehicle
        }

        fn on_allocation(&self, resources: &ResourceSet) -> bool {
            self.log.lock().unwrap().push(resources.clone());
            self.accept
        }
    }

    /// `n` unconnected points named P0..Pn.
    pub fn points(n: usize) -> (Arc<dyn PlantModel>, Vec<PointId>) {
        let mut b = PlantBuilder::new();
        let ids = (0..n).map(|i| b.add_point(&format!("P{i}"), Couple::new(i as i64 * 1_000, 0))).collect();
        (Arc::new(b.build().unwrap()), ids)
    }

    pub fn set(points: &[PointId]) -> ResourceSet {
        points.iter().map(|&p| Resource::Point(p)).collect()
    }

    pub fn scheduler(plant: Arc<dyn PlantModel>, modules: &[&str]) -> Scheduler {
        Scheduler::with_modules(plant, ModuleKind::chain_from_keys(modules).unwrap(), None)
    }

    pub fn deadlock_scheduler(plant: Arc<dyn PlantModel>) -> Scheduler {
        Scheduler::with_modules(plant, Vec::new(), Some(DeadlockPredictor::new(10_000)))
    }

    /// Register client `id` acting for vehicle `id`.
    pub fn register(s: &mut Scheduler, id: u32) -> GrantLog {
        register_with(s, id, true)
    }

    pub fn register_with(s: &mut Scheduler, id: u32, accept: bool) -> GrantLog {
        let log = GrantLog::default();
        s.register_client(Box::new(TestClient {
            id: ClientId(id),
            vehicle: Some(VehicleId(id)),
            accept,
            log: Arc::clone(&log),
        }))
        .unwrap();
        log
    }
}

// ── Reservation pool ──────────────────────────────────────────────────────────

#[cfg(test)]
mod pool {
    use fk_core::{ClientId, PointId};

    use super::helpers::set;
    use crate::{ReservationPool, SchedulerError};

    #[test]
    fn available_for_same_client_only() {
        let mut pool = ReservationPool::new();
        let r = set(&[PointId(0)]);
        pool.allocate(ClientId(1), &r).unwrap();

        assert!(pool.resources_available_for_user(&r, ClientId(1)));
        assert!(!pool.resources_available_for_user(&r, ClientId(2)));
        assert!(pool.resources_available_for_user(&set(&[PointId(1)]), ClientId(2)));
    }

    #[test]
    fn double_hold_is_inconsistent() {
        let mut pool = ReservationPool::new();
        pool.allocate(ClientId(1), &set(&[PointId(0)])).unwrap();
        let err = pool.allocate(ClientId(2), &set(&[PointId(0), PointId(1)])).unwrap_err();
        assert!(matches!(err, SchedulerError::Inconsistent(_)));
        assert!(err.is_fatal());
        // Nothing of the failed request was committed.
        assert_eq!(pool.holder(fk_core::Resource::Point(PointId(1))), None);
        pool.check_consistency().unwrap();
    }

    #[test]
    fn freeing_foreign_resource_leaves_holder_alone() {
        let mut pool = ReservationPool::new();
        pool.allocate(ClientId(1), &set(&[PointId(0)])).unwrap();
        assert!(pool.free(ClientId(2), &set(&[PointId(0)])).is_empty());
        assert_eq!(pool.holder(fk_core::Resource::Point(PointId(0))), Some(ClientId(1)));
        pool.check_consistency().unwrap();
    }

    #[test]
    fn free_returns_only_held_resources() {
        let mut pool = ReservationPool::new();
        pool.allocate(ClientId(1), &set(&[PointId(0), PointId(1)])).unwrap();
        let freed = pool.free(ClientId(1), &set(&[PointId(1), PointId(2)]));
        assert_eq!(freed, set(&[PointId(1)]));
        assert_eq!(pool.allocations_of(ClientId(1)), set(&[PointId(0)]));
        assert_eq!(pool.free(ClientId(1), &set(&[PointId(0)])), set(&[PointId(0)]));
        assert!(pool.is_empty());
        pool.check_consistency().unwrap();
    }
}

// ── Module keys ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod module {
    use crate::{ModuleKind, SchedulerError};

    #[test]
    fn keys_resolve_in_order() {
        let chain = ModuleKind::chain_from_keys(&["paused_vehicle", "ENVELOPE"]).unwrap();
        let names: Vec<_> = chain.iter().map(|m| m.name()).collect();
        assert_eq!(names, ["PAUSED_VEHICLE", "ENVELOPE"]);
        assert!(!chain[0].is_global());
        assert!(chain[1].is_global());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = ModuleKind::chain_from_keys(&["NOPE"]).unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownModule(k) if k == "NOPE"));
    }
}

// ── Scheduler: basic protocol ─────────────────────────────────────────────────

#[cfg(test)]
mod allocation {
    use fk_core::{ClientId, ResourceSet};

    use super::helpers::{points, register, register_with, scheduler, set};
    use crate::{AllocationOutcome, SchedulerError};

    #[test]
    fn free_resources_are_granted_immediately() {
        let (plant, p) = points(2);
        let mut s = scheduler(plant, &[]);
        let log = register(&mut s, 1);

        let outcome = s.allocate(ClientId(1), set(&[p[0]])).unwrap();
        assert_eq!(outcome, AllocationOutcome::Granted);
        assert_eq!(log.lock().unwrap().as_slice(), [set(&[p[0]])]);
        assert_eq!(s.allocations_of(ClientId(1)), set(&[p[0]]));

        let grants = s.take_grants();
        assert_eq!(grants.len(), 1);
        assert!(grants[0].accepted);
        assert!(s.take_grants().is_empty());
    }

    #[test]
    fn contended_request_waits_for_release() {
        let (plant, p) = points(1);
        let mut s = scheduler(plant, &[]);
        register(&mut s, 1);
        let log2 = register(&mut s, 2);

        s.allocate(ClientId(1), set(&[p[0]])).unwrap();
        assert_eq!(s.allocate(ClientId(2), set(&[p[0]])).unwrap(), AllocationOutcome::Deferred);
        assert!(log2.lock().unwrap().is_empty());
        assert_eq!(s.pending_requests(ClientId(2)), vec![set(&[p[0]])]);

        s.free(ClientId(1), &set(&[p[0]])).unwrap();
        assert_eq!(log2.lock().unwrap().as_slice(), [set(&[p[0]])]);
        assert_eq!(s.allocations_of(ClientId(2)), set(&[p[0]]));
        assert_eq!(s.pending_count(), 0);
        s.check_invariants().unwrap();
    }

    #[test]
    fn waiting_clients_are_served_in_arrival_order() {
        let (plant, p) = points(1);
        let mut s = scheduler(plant, &[]);
        register(&mut s, 1);
        let log3 = register(&mut s, 3);
        let log2 = register(&mut s, 2);

        s.allocate(ClientId(1), set(&[p[0]])).unwrap();
        s.allocate(ClientId(3), set(&[p[0]])).unwrap();
        s.allocate(ClientId(2), set(&[p[0]])).unwrap();

        s.free(ClientId(1), &set(&[p[0]])).unwrap();
        assert_eq!(log3.lock().unwrap().len(), 1);
        assert!(log2.lock().unwrap().is_empty());

        s.free(ClientId(3), &set(&[p[0]])).unwrap();
        assert_eq!(log2.lock().unwrap().len(), 1);
    }

    #[test]
    fn declined_allocation_is_released_at_once() {
        let (plant, p) = points(1);
        let mut s = scheduler(plant, &[]);
        register(&mut s, 3);
        let log1 = register_with(&mut s, 1, false);
        let log2 = register(&mut s, 2);

        assert_eq!(s.allocate(ClientId(1), set(&[p[0]])).unwrap(), AllocationOutcome::Declined);
        assert!(s.allocations_of(ClientId(1)).is_empty());

        // 1 and 2 queue behind 3; 1 is served first, refuses, and 2 follows.
        s.allocate(ClientId(3), set(&[p[0]])).unwrap();
        s.allocate(ClientId(1), set(&[p[0]])).unwrap();
        s.allocate(ClientId(2), set(&[p[0]])).unwrap();
        s.free(ClientId(3), &set(&[p[0]])).unwrap();

        assert_eq!(log1.lock().unwrap().len(), 2);
        assert_eq!(log2.lock().unwrap().len(), 1);
        assert_eq!(s.allocations_of(ClientId(2)), set(&[p[0]]));
        let accepted: Vec<bool> = s.take_grants().iter().map(|g| g.accepted).collect();
        assert_eq!(accepted, [false, true, false, true]);
    }

    #[test]
    fn unknown_client_is_rejected() {
        let (plant, p) = points(1);
        let mut s = scheduler(plant, &[]);
        let err = s.allocate(ClientId(9), set(&[p[0]])).unwrap_err();
        assert!(matches!(err, SchedulerError::ClientUnknown(ClientId(9))));
        assert!(!err.is_fatal());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let (plant, _) = points(1);
        let mut s = scheduler(plant, &[]);
        register(&mut s, 1);
        let again = s.register_client(Box::new(super::helpers::TestClient {
            id: ClientId(1),
            vehicle: None,
            accept: true,
            log: Default::default(),
        }));
        assert!(matches!(again, Err(SchedulerError::ClientExists(ClientId(1)))));
    }

    #[test]
    fn free_all_except_keeps_current_position() {
        let (plant, p) = points(3);
        let mut s = scheduler(plant, &[]);
        register(&mut s, 1);
        s.allocate(ClientId(1), set(&[p[0], p[1], p[2]])).unwrap();

        s.free_all_except(ClientId(1), &set(&[p[1]])).unwrap();
        assert_eq!(s.allocations_of(ClientId(1)), set(&[p[1]]));

        s.free_all(ClientId(1)).unwrap();
        assert!(s.allocations_of(ClientId(1)).is_empty());
    }

    #[test]
    fn late_free_after_regrant_is_ignored() {
        let (plant, p) = points(2);
        let mut s = scheduler(plant, &[]);
        register(&mut s, 1);
        register(&mut s, 2);

        s.allocate(ClientId(1), set(&[p[0], p[1]])).unwrap();
        // Withdrawal keeps only the current position.
        s.free_all_except(ClientId(1), &set(&[p[0]])).unwrap();
        assert_eq!(s.allocate(ClientId(2), set(&[p[1]])).unwrap(), AllocationOutcome::Granted);

        // Client 1 still reports the passed resource.
        s.free(ClientId(1), &set(&[p[0], p[1]])).unwrap();
        assert_eq!(s.allocations_of(ClientId(1)), ResourceSet::new());
        assert_eq!(s.allocations_of(ClientId(2)), set(&[p[1]]));
        s.check_invariants().unwrap();
    }

    #[test]
    fn cleared_pending_request_is_never_granted() {
        let (plant, p) = points(1);
        let mut s = scheduler(plant, &[]);
        register(&mut s, 1);
        let log2 = register(&mut s, 2);

        s.allocate(ClientId(1), set(&[p[0]])).unwrap();
        s.allocate(ClientId(2), set(&[p[0]])).unwrap();
        assert_eq!(s.clear_pending(ClientId(2)), 1);

        s.free(ClientId(1), &set(&[p[0]])).unwrap();
        assert!(log2.lock().unwrap().is_empty());
        assert!(s.pool().is_empty());
    }

    #[test]
    fn unregister_releases_everything() {
        let (plant, p) = points(2);
        let mut s = scheduler(plant, &[]);
        register(&mut s, 1);
        let log2 = register(&mut s, 2);

        s.allocate(ClientId(1), set(&[p[0]])).unwrap();
        s.claim(ClientId(1), vec![set(&[p[1]])]).unwrap();
        s.allocate(ClientId(2), set(&[p[0]])).unwrap();

        s.unregister_client(ClientId(1)).unwrap();
        assert!(!s.is_registered(ClientId(1)));
        assert_eq!(log2.lock().unwrap().len(), 1);
    }

    #[test]
    fn granted_steps_are_removed_from_the_claim() {
        let (plant, p) = points(3);
        let mut s = scheduler(plant, &[]);
        register(&mut s, 1);
        s.claim(ClientId(1), vec![set(&[p[1]]), set(&[p[2]])]).unwrap();

        s.allocate(ClientId(1), set(&[p[1]])).unwrap();
        assert_eq!(s.claims_of(ClientId(1)), vec![set(&[p[2]])]);

        s.unclaim(ClientId(1)).unwrap();
        assert!(s.claims_of(ClientId(1)).is_empty());
    }
}

// ── Scheduler: allocation modules ─────────────────────────────────────────────

#[cfg(test)]
mod modules {
    use std::sync::Arc;

    use fk_core::{
        BlockType, ClientId, Couple, Envelope, PlantBuilder, PlantModel, Resource, ResourceSet,
        VehicleId,
    };

    use super::helpers::{points, register, scheduler, set};
    use crate::AllocationOutcome;

    #[test]
    fn paused_vehicle_waits_until_resumed() {
        let (plant, p) = points(1);
        let mut s = scheduler(plant, &["PAUSED_VEHICLE"]);
        let log = register(&mut s, 1);

        s.set_vehicle_paused(VehicleId(1), true).unwrap();
        assert_eq!(s.allocate(ClientId(1), set(&[p[0]])).unwrap(), AllocationOutcome::Deferred);

        s.set_vehicle_paused(VehicleId(1), false).unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn single_vehicle_block_excludes_whole_block() {
        let mut b = PlantBuilder::new();
        let a = b.add_point("A", Couple::new(0, 0));
        let c = b.add_point("C", Couple::new(1_000, 0));
        let outside = b.add_point("X", Couple::new(5_000, 0));
        b.add_block("crossing", BlockType::SingleVehicleOnly, [Resource::Point(a), Resource::Point(c)]);
        let plant: Arc<dyn PlantModel> = Arc::new(b.build().unwrap());

        let mut s = scheduler(plant, &["SINGLE_VEHICLE_BLOCK"]);
        register(&mut s, 1);
        let log2 = register(&mut s, 2);

        s.allocate(ClientId(1), set(&[a])).unwrap();
        assert_eq!(s.allocate(ClientId(2), set(&[c])).unwrap(), AllocationOutcome::Deferred);
        assert_eq!(s.allocate(ClientId(2), set(&[outside])).unwrap(), AllocationOutcome::Granted);
        s.check_invariants().unwrap();

        // Releasing A is a change inside the block, so the request wakes up.
        s.free(ClientId(1), &set(&[a])).unwrap();
        assert_eq!(log2.lock().unwrap().last(), Some(&set(&[c])));
        s.check_invariants().unwrap();
    }

    #[test]
    fn same_direction_block_rejects_opposing_traffic() {
        let mut b = PlantBuilder::new();
        let a = b.add_point("A", Couple::new(0, 0));
        let c = b.add_point("C", Couple::new(1_000, 0));
        let ac = b.add_path("A->C", a, c, 1_000);
        let ca = b.add_path("C->A", c, a, 1_000);
        let ac2 = b.add_path("A->C (2)", a, c, 1_000);
        b.add_block(
            "corridor",
            BlockType::SameDirectionOnly,
            [Resource::Path(ac), Resource::Path(ca), Resource::Path(ac2)],
        );
        let plant: Arc<dyn PlantModel> = Arc::new(b.build().unwrap());

        let mut s = scheduler(plant, &["SAME_DIRECTION_BLOCK"]);
        register(&mut s, 1);
        register(&mut s, 2);
        register(&mut s, 3);

        let path = |p| ResourceSet::from([Resource::Path(p)]);
        s.allocate(ClientId(1), path(ac)).unwrap();
        assert_eq!(s.allocate(ClientId(2), path(ca)).unwrap(), AllocationOutcome::Deferred);
        assert_eq!(s.allocate(ClientId(3), path(ac2)).unwrap(), AllocationOutcome::Granted);

        s.free(ClientId(1), &path(ac)).unwrap();
        assert_eq!(s.pending_count(), 1, "client 3 still travels A->C");
        s.free(ClientId(3), &path(ac2)).unwrap();
        assert_eq!(s.allocations_of(ClientId(2)), path(ca));
    }

    #[test]
    fn overlapping_envelopes_are_vetoed() {
        let mut b = PlantBuilder::new();
        let a = b.add_point("A", Couple::new(0, 0));
        let c = b.add_point("C", Couple::new(800, 0));
        let far = b.add_point("F", Couple::new(10_000, 0));
        b.set_point_envelope(a, "agv", Envelope::rect(Couple::new(-500, -500), Couple::new(500, 500)));
        b.set_point_envelope(c, "agv", Envelope::rect(Couple::new(300, -500), Couple::new(1_300, 500)));
        b.set_point_envelope(far, "agv", Envelope::rect(Couple::new(9_500, -500), Couple::new(10_500, 500)));
        b.add_block(
            "hall",
            BlockType::SameDirectionOnly,
            [Resource::Point(a), Resource::Point(c), Resource::Point(far)],
        );
        let plant: Arc<dyn PlantModel> = Arc::new(b.build().unwrap());

        let mut s = scheduler(plant, &["ENVELOPE"]);
        register(&mut s, 1);
        let log2 = register(&mut s, 2);
        s.set_envelope_key(VehicleId(1), Some("agv".into()));
        s.set_envelope_key(VehicleId(2), Some("agv".into()));

        s.allocate(ClientId(1), set(&[a])).unwrap();
        assert_eq!(s.allocate(ClientId(2), set(&[far])).unwrap(), AllocationOutcome::Granted);
        assert_eq!(s.allocate(ClientId(2), set(&[c])).unwrap(), AllocationOutcome::Deferred);

        s.free(ClientId(1), &set(&[a])).unwrap();
        assert_eq!(log2.lock().unwrap().last(), Some(&set(&[c])));
    }

    #[test]
    fn vehicles_without_envelope_key_are_not_checked() {
        let mut b = PlantBuilder::new();
        let a = b.add_point("A", Couple::new(0, 0));
        let c = b.add_point("C", Couple::new(100, 0));
        b.set_point_envelope(a, "agv", Envelope::rect(Couple::new(-500, -500), Couple::new(500, 500)));
        b.set_point_envelope(c, "agv", Envelope::rect(Couple::new(-400, -500), Couple::new(600, 500)));
        b.add_block("hall", BlockType::SameDirectionOnly, [Resource::Point(a), Resource::Point(c)]);
        let plant: Arc<dyn PlantModel> = Arc::new(b.build().unwrap());

        let mut s = scheduler(plant, &["ENVELOPE"]);
        register(&mut s, 1);
        register(&mut s, 2);
        s.allocate(ClientId(1), set(&[a])).unwrap();
        assert_eq!(s.allocate(ClientId(2), set(&[c])).unwrap(), AllocationOutcome::Granted);
    }
}

// ── Deadlock avoidance ────────────────────────────────────────────────────────

#[cfg(test)]
mod deadlock {
    use fk_core::ClientId;

    use super::helpers::{deadlock_scheduler, points, register, set};
    use crate::{AllocationOutcome, DeadlockPredictor, Safety};

    #[test]
    fn mutual_wait_is_unsafe() {
        let (plant, p) = points(2);
        let mut predictor = DeadlockPredictor::new(100);
        predictor.configure_system_data(
            plant.as_ref(),
            [
                (ClientId(1), set(&[p[0]]), vec![set(&[p[1]])]),
                (ClientId(2), set(&[p[1]]), vec![set(&[p[0]])]),
            ],
        );
        assert_eq!(predictor.client_count(), 2);
        assert_eq!(predictor.check_current(), Safety::Unsafe);
    }

    #[test]
    fn chain_of_followers_is_safe() {
        // 1 at P0 → P1 → P2, 2 at P3 → P0: 2 can go once 1 has left P0.
        let (plant, p) = points(4);
        let mut predictor = DeadlockPredictor::new(100);
        predictor.configure_system_data(
            plant.as_ref(),
            [
                (ClientId(2), set(&[p[3]]), vec![set(&[p[0]])]),
                (ClientId(1), set(&[p[0]]), vec![set(&[p[1]]), set(&[p[2]])]),
                (ClientId(3), set(&[p[2]]), vec![]),
            ],
        );
        // Client 3 has no claim and is not modelled.
        assert_eq!(predictor.client_count(), 2);
        assert_eq!(predictor.check_current(), Safety::Safe);
    }

    #[test]
    fn scheduler_grants_only_the_safe_request() {
        // A stands on r1 and will drive r2 → r3.
        // B stands on r4 and will drive r2 → r1.
        // Letting B into r2 first leaves both waiting for each other.
        let (plant, r) = points(4);
        let (r1, r2, r3, r4) = (r[0], r[1], r[2], r[3]);
        let mut s = deadlock_scheduler(plant);
        let log_a = register(&mut s, 1);
        let log_b = register(&mut s, 2);
        let (a, b) = (ClientId(1), ClientId(2));

        s.allocate(a, set(&[r1])).unwrap();
        s.allocate(b, set(&[r4])).unwrap();
        s.claim(a, vec![set(&[r2]), set(&[r3])]).unwrap();
        s.claim(b, vec![set(&[r2]), set(&[r1])]).unwrap();

        assert_eq!(s.allocate(b, set(&[r2])).unwrap(), AllocationOutcome::Deferred);
        assert_eq!(s.allocate(a, set(&[r2])).unwrap(), AllocationOutcome::Granted);
        assert_eq!(log_b.lock().unwrap().len(), 1, "only the initial r4 grant");

        assert_eq!(s.allocate(a, set(&[r3])).unwrap(), AllocationOutcome::Granted);
        s.free(a, &set(&[r1, r2])).unwrap();

        assert_eq!(log_a.lock().unwrap().len(), 3);
        assert_eq!(log_b.lock().unwrap().last(), Some(&set(&[r2])));
        s.check_invariants().unwrap();
    }

    #[test]
    fn cyclic_claims_never_grant_both() {
        let (plant, r) = points(2);
        let mut s = deadlock_scheduler(plant);
        register(&mut s, 1);
        register(&mut s, 2);
        let (a, b) = (ClientId(1), ClientId(2));

        s.allocate(a, set(&[r[0]])).unwrap();
        s.allocate(b, set(&[r[1]])).unwrap();
        s.claim(a, vec![set(&[r[1]])]).unwrap();
        s.claim(b, vec![set(&[r[0]])]).unwrap();

        // Each wants what the other holds; the pool alone already refuses.
        assert_eq!(s.allocate(a, set(&[r[1]])).unwrap(), AllocationOutcome::Deferred);
        assert_eq!(s.allocate(b, set(&[r[0]])).unwrap(), AllocationOutcome::Deferred);
        assert_eq!(s.allocations_of(a), set(&[r[0]]));
        assert_eq!(s.allocations_of(b), set(&[r[1]]));
    }

    #[test]
    fn interleaving_beyond_greedy_completion_is_found() {
        // 1 at P0 → P3 → P1, 2 at P1 → P0.  Neither can finish alone, but
        // after 1 steps to P3 (freeing P0) both can.
        let (plant, p) = points(4);
        let mut predictor = DeadlockPredictor::new(100);
        predictor.configure_system_data(
            plant.as_ref(),
            [
                (ClientId(1), set(&[p[0]]), vec![set(&[p[3]]), set(&[p[1]])]),
                (ClientId(2), set(&[p[1]]), vec![set(&[p[0]])]),
            ],
        );
        assert_eq!(predictor.check_current(), Safety::Safe);
    }

    #[test]
    fn search_limit_makes_verdict_inconclusive() {
        // Both may move onto P2, after which each waits for the other.
        let (plant, p) = points(3);
        let entries = || {
            [
                (ClientId(1), set(&[p[0]]), vec![set(&[p[2]]), set(&[p[1]])]),
                (ClientId(2), set(&[p[1]]), vec![set(&[p[2]]), set(&[p[0]])]),
            ]
        };

        let mut tight = DeadlockPredictor::new(1);
        tight.configure_system_data(plant.as_ref(), entries());
        assert_eq!(tight.check_current(), Safety::Inconclusive);
        assert!(!Safety::Inconclusive.is_safe());

        let mut roomy = DeadlockPredictor::new(100);
        roomy.configure_system_data(plant.as_ref(), entries());
        assert_eq!(roomy.check_current(), Safety::Unsafe);
    }
}
