//! Unit tests for fk-dispatch.

#[cfg(test)]
mod helpers {
    use std::sync::{Arc, Mutex};

    use fk_core::{
        Couple, Destination, DispatcherConfig, IntegrationLevel, LocationId, ManualClock, OrderId,
        PathId, PeripheralJob, PeripheralJobId, PlantBuilder, PlantModel, PointId, ResourceSet,
        RoutingConfig, SchedulerConfig, Timestamp, TransportOrder, TransportOrderSpec,
        TransportOrderState, Vehicle, VehicleId, VehicleState,
    };
    use fk_scheduler::Scheduler;

    use crate::{Dispatcher, PeripheralController, VehicleController};

    /// ```text
    /// Charger        Station
    ///    |              |
    ///   P0 ── P1 ── P2 ── P3 ── Park        Island
    /// ```
    /// Every path is two-way and 1 000 mm long.
    pub struct Layout {
        pub plant:   Arc<dyn PlantModel>,
        pub p:       [PointId; 4],
        pub park:    PointId,
        pub island:  PointId,
        pub paths:   [PathId; 4],
        pub charger: LocationId,
        pub station: LocationId,
    }

    pub fn layout() -> Layout {
        let mut b = PlantBuilder::new();
        let p = [0, 1, 2, 3].map(|i| b.add_point(&format!("P{i}"), Couple::new(i * 1_000, 0)));
        let park = b.add_park_point("Park", Couple::new(4_000, 0));
        let island = b.add_point("Island", Couple::new(0, 9_000));
        let paths = [
            b.add_two_way_path("P0--P1", p[0], p[1], 1_000),
            b.add_two_way_path("P1--P2", p[1], p[2], 1_000),
            b.add_two_way_path("P2--P3", p[2], p[3], 1_000),
            b.add_two_way_path("P3--Park", p[3], park, 1_000),
        ];
        let charger = b.add_location("Charger", Couple::new(0, -1_000), &["Charge"], &[p[0]]);
        let station = b.add_location("Station", Couple::new(2_000, -1_000), &["Load"], &[p[2]]);
        Layout { plant: Arc::new(b.build().unwrap()), p, park, island, paths, charger, station }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Call {
        Assigned(OrderId),
        Aborted,
    }

    pub type CallLog = Arc<Mutex<Vec<(VehicleId, Call)>>>;

    pub struct TestController {
        pub vehicle: VehicleId,
        pub log:     CallLog,
    }

    impl VehicleController for TestController {
        fn assign_order(&self, order: &TransportOrder) {
            self.log.lock().unwrap().push((self.vehicle, Call::Assigned(order.id)));
        }

        fn abort_order(&self, _immediate: bool) {
            self.log.lock().unwrap().push((self.vehicle, Call::Aborted));
        }

        fn on_allocation(&self, _resources: &ResourceSet) -> bool {
            true
        }
    }

    pub struct Harness {
        pub clock:      ManualClock,
        pub layout:     Layout,
        pub dispatcher: Dispatcher,
        pub scheduler:  Scheduler,
        pub log:        CallLog,
    }

    pub fn harness() -> Harness {
        harness_with(DispatcherConfig::default())
    }

    pub fn harness_with(config: DispatcherConfig) -> Harness {
        let clock = ManualClock::new(Timestamp(1_000_000));
        let layout = layout();
        let dispatcher = Dispatcher::new(
            Arc::clone(&layout.plant),
            &config,
            &RoutingConfig::default(),
            Arc::new(clock.clone()),
        )
        .unwrap();
        let scheduler = Scheduler::new(Arc::clone(&layout.plant), &SchedulerConfig::default()).unwrap();
        Harness { clock, layout, dispatcher, scheduler, log: CallLog::default() }
    }

    impl Harness {
        pub fn add_vehicle(&mut self, id: u32, at: PointId) -> VehicleId {
            self.add_vehicle_with(id, at, |_| {})
        }

        pub fn add_vehicle_with(&mut self, id: u32, at: PointId, tweak: impl FnOnce(&mut Vehicle)) -> VehicleId {
            let vid = VehicleId(id);
            let mut v = Vehicle::new(vid, &format!("V{id}"));
            v.integration_level = IntegrationLevel::ToBeUtilized;
            v.state = VehicleState::Idle;
            v.current_position = Some(at);
            tweak(&mut v);
            let controller = Arc::new(TestController { vehicle: vid, log: Arc::clone(&self.log) });
            self.dispatcher.add_vehicle(v, controller, &mut self.scheduler).unwrap();
            vid
        }

        pub fn order(&mut self, name: &str, to: PointId) -> OrderId {
            self.create(TransportOrderSpec::new(name, vec![Destination::point(to)]))
        }

        pub fn create(&mut self, spec: TransportOrderSpec) -> OrderId {
            self.dispatcher.create_order(spec).unwrap()
        }

        pub fn dispatch(&mut self) {
            self.dispatcher.dispatch(&mut self.scheduler).unwrap();
        }

        pub fn finish_drive_order(&mut self, vehicle: VehicleId) -> bool {
            self.dispatcher.vehicle_finished_drive_order(vehicle, &mut self.scheduler).unwrap()
        }

        pub fn state(&self, order: OrderId) -> TransportOrderState {
            self.dispatcher.fleet().order(order).unwrap().state
        }

        pub fn vehicle(&self, id: VehicleId) -> &Vehicle {
            self.dispatcher.fleet().vehicle(id).unwrap()
        }

        pub fn current_order(&self, id: VehicleId) -> Option<OrderId> {
            self.vehicle(id).transport_order
        }

        pub fn assignments(&self, id: VehicleId) -> Vec<OrderId> {
            self.log
                .lock()
                .unwrap()
                .iter()
                .filter_map(|(v, c)| match c {
                    Call::Assigned(o) if *v == id => Some(*o),
                    _ => None,
                })
                .collect()
        }
    }

    pub type JobLog = Arc<Mutex<Vec<PeripheralJobId>>>;

    pub struct TestPeripheral {
        pub log: JobLog,
    }

    impl PeripheralController for TestPeripheral {
        fn process_job(&self, job: &PeripheralJob) {
            self.log.lock().unwrap().push(job.id);
        }
    }
}

// ── Comparators ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod comparator {
    use std::cmp::Ordering;

    use fk_core::{OrderId, Timestamp, VehicleId};

    use crate::{AssignmentCandidate, CandidateComparator, ComparatorChain, DispatchError};

    fn candidate(order: u32, vehicle: u32, name: &str) -> AssignmentCandidate {
        AssignmentCandidate {
            order:                  OrderId(order),
            vehicle:                VehicleId(vehicle),
            routes:                 Vec::new(),
            initial_routing_costs:  0,
            complete_routing_costs: 0,
            order_name:             name.to_owned(),
            vehicle_name:           format!("V{vehicle}"),
            deadline:               Timestamp::MAX,
            creation_time:          Timestamp(0),
            deadline_at_risk:       false,
            energy_level:           100,
            vehicle_idle:           true,
        }
    }

    #[test]
    fn by_name_is_appended() {
        let chain = ComparatorChain::from_keys(&["BY_AGE", "idle_first"]).unwrap();
        assert_eq!(chain.links(), &[
            CandidateComparator::ByAge,
            CandidateComparator::IdleFirst,
            CandidateComparator::ByName,
        ]);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = ComparatorChain::from_keys(&["BY_MOOD"]).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownComparator(k) if k == "BY_MOOD"));
    }

    #[test]
    fn first_distinguishing_comparator_decides() {
        let chain = ComparatorChain::from_keys(&["DEADLINE_AT_RISK_FIRST", "BY_INITIAL_ROUTING_COSTS"]).unwrap();
        let mut at_risk = candidate(0, 0, "b");
        at_risk.deadline_at_risk = true;
        at_risk.initial_routing_costs = 9_000;
        let mut cheap = candidate(1, 0, "a");
        cheap.initial_routing_costs = 1_000;

        assert_eq!(chain.compare(&at_risk, &cheap), Ordering::Less);

        let mut list = vec![cheap, at_risk];
        chain.sort(&mut list);
        assert_eq!(list[0].order, OrderId(0));
    }

    #[test]
    fn energy_and_idle_preferences() {
        let mut full = candidate(0, 0, "x");
        full.energy_level = 90;
        let mut low = candidate(0, 1, "x");
        low.energy_level = 40;
        low.vehicle_idle = false;

        assert_eq!(CandidateComparator::ByEnergyLevel.compare(&full, &low), Ordering::Less);
        assert_eq!(CandidateComparator::IdleFirst.compare(&full, &low), Ordering::Less);
    }

    #[test]
    fn by_name_makes_ranking_total() {
        let a = candidate(3, 0, "same");
        let b = candidate(4, 0, "same");
        assert_eq!(CandidateComparator::ByName.compare(&a, &b), Ordering::Less);
        assert_eq!(CandidateComparator::ByName.compare(&a, &a), Ordering::Equal);
    }
}

// ── Fleet & filters ───────────────────────────────────────────────────────────

#[cfg(test)]
mod fleet {
    use fk_core::{
        Destination, IntegrationLevel, PointId, Timestamp, TransportOrderSpec, TransportOrderState,
        Vehicle, VehicleId, VehicleState,
    };

    use crate::filter::vehicle_available;
    use crate::{DispatchError, Fleet};

    #[test]
    fn illegal_transition_is_fatal() {
        let mut fleet = Fleet::new();
        let id = fleet.insert_order(TransportOrderSpec::new("o", vec![Destination::point(PointId(0))]), Timestamp(0));
        let err = fleet.set_order_state(id, TransportOrderState::Finished).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidTransition { .. }));
        assert!(err.is_fatal());
        assert_eq!(fleet.order(id).unwrap().state, TransportOrderState::Raw);
    }

    #[test]
    fn vehicle_availability() {
        let mut fleet = Fleet::new();
        let mut v = Vehicle::new(VehicleId(0), "V0");
        v.integration_level = IntegrationLevel::ToBeUtilized;
        v.state = VehicleState::Idle;
        v.current_position = Some(PointId(0));
        fleet.add_vehicle(v.clone()).unwrap();
        assert!(vehicle_available(&fleet, &v).is_ok());

        let mut paused = v.clone();
        paused.paused = true;
        assert_eq!(vehicle_available(&fleet, &paused), Err("paused"));

        let mut charging = v.clone();
        charging.state = VehicleState::Charging;
        charging.energy_level = 50;
        assert!(vehicle_available(&fleet, &charging).is_ok());
        charging.energy_level = 10;
        assert_eq!(vehicle_available(&fleet, &charging), Err("charging"));

        let mut respected = v;
        respected.integration_level = IntegrationLevel::ToBeRespected;
        assert!(vehicle_available(&fleet, &respected).is_err());
    }

    #[test]
    fn duplicate_vehicle_is_rejected() {
        let mut fleet = Fleet::new();
        fleet.add_vehicle(Vehicle::new(VehicleId(1), "V1")).unwrap();
        assert!(matches!(
            fleet.add_vehicle(Vehicle::new(VehicleId(1), "again")),
            Err(DispatchError::VehicleExists(VehicleId(1)))
        ));
    }
}

// ── Order creation ────────────────────────────────────────────────────────────

#[cfg(test)]
mod creation {
    use fk_core::{Destination, TransportOrderSpec, TransportOrderState, VehicleId};

    use super::helpers::harness;
    use crate::DispatchError;

    #[test]
    fn empty_order_is_rejected() {
        let mut h = harness();
        let err = h.dispatcher.create_order(TransportOrderSpec::new("empty", Vec::new())).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidOrder(_)));
        assert_eq!(h.dispatcher.fleet().orders().count(), 0);
    }

    #[test]
    fn unknown_intended_vehicle_is_rejected() {
        let mut h = harness();
        let spec = TransportOrderSpec::new("o", vec![Destination::point(h.layout.p[1])])
            .with_intended_vehicle(VehicleId(42));
        assert!(matches!(h.dispatcher.create_order(spec), Err(DispatchError::VehicleUnknown(_))));
    }

    #[test]
    fn unreachable_leg_makes_order_unroutable() {
        let mut h = harness();
        let (p1, island) = (h.layout.p[1], h.layout.island);
        let id = h.create(TransportOrderSpec::new(
            "island",
            vec![Destination::point(p1), Destination::point(island)],
        ));
        assert_eq!(h.state(id), TransportOrderState::Unroutable);
    }

    #[test]
    fn disallowed_operation_makes_order_unroutable() {
        let mut h = harness();
        let station = h.layout.station;
        let id = h.create(TransportOrderSpec::new("unload", vec![Destination::location(station, "Unload")]));
        assert_eq!(h.state(id), TransportOrderState::Unroutable);

        let ok = h.create(TransportOrderSpec::new("load", vec![Destination::location(station, "Load")]));
        assert_eq!(h.state(ok), TransportOrderState::Raw);
    }
}

// ── Assignment ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod assignment {
    use fk_core::{
        Destination, Resource, Timestamp, TransportOrderSpec, TransportOrderState,
    };

    use super::helpers::harness;
    use crate::DispatchEvent;

    #[test]
    fn deadline_at_risk_beats_age_and_cost() {
        let mut h = harness();
        let (p0, p1, p3) = (h.layout.p[0], h.layout.p[1], h.layout.p[3]);
        let v = h.add_vehicle(1, p0);

        let cheap = h.order("cheap", p1);
        h.clock.advance(10);
        let deadline = Timestamp(h.clock_now() + 1_000);
        let urgent = h.create(TransportOrderSpec::new("urgent", vec![Destination::point(p3)]).with_deadline(deadline));

        h.dispatch();
        assert_eq!(h.current_order(v), Some(urgent));
        assert_eq!(h.state(urgent), TransportOrderState::BeingProcessed);
        assert_eq!(h.state(cheap), TransportOrderState::Dispatchable);
    }

    #[test]
    fn cheapest_vehicle_wins_without_other_differences() {
        let mut h = harness();
        let (p0, p2, p3) = (h.layout.p[0], h.layout.p[2], h.layout.p[3]);
        let far = h.add_vehicle(1, p0);
        let near = h.add_vehicle(2, p3);
        let o = h.order("o", p2);

        h.dispatch();
        assert_eq!(h.current_order(near), Some(o));
        assert_eq!(h.current_order(far), None);
    }

    #[test]
    fn dispatch_is_idempotent() {
        let mut h = harness();
        let (p0, p2) = (h.layout.p[0], h.layout.p[2]);
        let v = h.add_vehicle(1, p0);
        let o = h.order("o", p2);

        h.dispatch();
        assert!(!h.dispatcher.take_events().is_empty());
        let claims = h.scheduler.claims_of(fk_scheduler::vehicle_client(v));

        h.dispatch();
        assert!(h.dispatcher.take_events().is_empty());
        assert_eq!(h.assignments(v), vec![o]);
        assert_eq!(h.scheduler.claims_of(fk_scheduler::vehicle_client(v)), claims);
    }

    #[test]
    fn assignment_claims_route_resources() {
        let mut h = harness();
        let (p0, p2, station) = (h.layout.p[0], h.layout.p[2], h.layout.station);
        let paths = h.layout.paths;
        let v = h.add_vehicle(1, p0);
        let o = h.create(TransportOrderSpec::new("load", vec![Destination::location(station, "Load")]));

        h.dispatch();
        assert_eq!(h.current_order(v), Some(o));
        let claims = h.scheduler.claims_of(fk_scheduler::vehicle_client(v));
        assert_eq!(claims.len(), 2);
        assert!(claims[0].contains(&Resource::Path(paths[0])));
        assert!(claims[1].contains(&Resource::Point(p2)));
        assert!(claims[1].contains(&Resource::Location(station)));
        assert_eq!(h.vehicle(v).claimed_resources, claims);

        let order = h.dispatcher.fleet().order(o).unwrap();
        assert_eq!(order.processing_vehicle, Some(v));
        assert_eq!(order.total_route_costs(), 2_000);
        assert!(h
            .dispatcher
            .take_events()
            .contains(&DispatchEvent::OrderAssigned { order: o, vehicle: v }));
    }

    #[test]
    fn unroutable_candidate_is_skipped() {
        let mut h = harness();
        let (p0, p1, p3) = (h.layout.p[0], h.layout.p[1], h.layout.p[3]);
        let out = h.layout.paths[0];
        let stuck = h.add_vehicle_with(1, p0, |v| {
            v.forbidden_paths.insert(out);
        });
        let free = h.add_vehicle(2, p3);
        let o = h.order("o", p1);

        h.dispatch();
        assert_eq!(h.current_order(stuck), None);
        assert_eq!(h.current_order(free), Some(o));
    }

    #[test]
    fn order_without_vehicle_stays_dispatchable() {
        let mut h = harness();
        let o = h.order("lonely", h.layout.p[1]);
        h.dispatch();
        h.dispatch();
        assert_eq!(h.state(o), TransportOrderState::Dispatchable);
    }

    #[test]
    fn energy_critical_vehicle_takes_no_transport_order() {
        let mut h = harness();
        let (p0, p1) = (h.layout.p[0], h.layout.p[1]);
        let v = h.add_vehicle_with(1, p0, |v| v.energy_level = 10);
        let o = h.order("o", p1);
        h.dispatch();
        assert_eq!(h.current_order(v), None);
        assert_eq!(h.state(o), TransportOrderState::Dispatchable);
    }

    #[test]
    fn paused_vehicle_is_skipped() {
        let mut h = harness();
        let (p0, p1) = (h.layout.p[0], h.layout.p[1]);
        let v = h.add_vehicle(1, p0);
        h.dispatcher.set_vehicle_paused(v, true, &mut h.scheduler).unwrap();
        let o = h.order("o", p1);
        h.dispatch();
        assert_eq!(h.state(o), TransportOrderState::Dispatchable);

        h.dispatcher.set_vehicle_paused(v, false, &mut h.scheduler).unwrap();
        h.dispatcher.dispatch_vehicle(v, &mut h.scheduler).unwrap();
        assert_eq!(h.current_order(v), Some(o));
    }

    #[test]
    fn multi_leg_order_progresses_to_finished() {
        let mut h = harness();
        let (p0, p1, p3) = (h.layout.p[0], h.layout.p[1], h.layout.p[3]);
        let v = h.add_vehicle(1, p0);
        let o = h.create(TransportOrderSpec::new(
            "two legs",
            vec![Destination::point(p1), Destination::point(p3)],
        ));
        h.dispatch();
        assert_eq!(h.scheduler.claims_of(fk_scheduler::vehicle_client(v)).len(), 3);

        assert!(!h.finish_drive_order(v));
        assert_eq!(h.dispatcher.fleet().order(o).unwrap().current_drive_order, 1);
        assert!(h.finish_drive_order(v));
        assert_eq!(h.state(o), TransportOrderState::Finished);
        assert!(h.vehicle(v).has_no_order());
        assert!(h.dispatcher.fleet().order(o).unwrap().finished_time.is_some());
    }

    impl super::helpers::Harness {
        fn clock_now(&self) -> u64 {
            use fk_core::Clock;
            self.clock.now().0
        }
    }
}

// ── Withdrawal ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod withdrawal {
    use fk_core::{
        resource_set, Destination, IntegrationLevel, Resource, TransportOrderSpec,
        TransportOrderState,
    };
    use fk_scheduler::{vehicle_client, AllocationOutcome};

    use super::helpers::{harness, Call};

    #[test]
    fn withdrawal_frees_unconsumed_resources_and_pending_requests() {
        let mut h = harness();
        let [p0, p1, p2, p3] = h.layout.p;
        let paths = h.layout.paths;
        let v1 = h.add_vehicle(1, p0);
        let v2 = h.add_vehicle(2, p2);
        let (c1, c2) = (vehicle_client(v1), vehicle_client(v2));

        assert_eq!(h.scheduler.allocate(c1, resource_set([p0])).unwrap(), AllocationOutcome::Granted);
        assert_eq!(h.scheduler.allocate(c2, resource_set([p2])).unwrap(), AllocationOutcome::Granted);

        let o = h.create(TransportOrderSpec::new("o", vec![Destination::point(p3)]).with_intended_vehicle(v1));
        h.dispatch();
        assert_eq!(h.current_order(v1), Some(o));
        assert_eq!(h.scheduler.claims_of(c1).len(), 3);

        let step1 = [Resource::Path(paths[0]), Resource::Point(p1)].into_iter().collect();
        let step2 = [Resource::Path(paths[1]), Resource::Point(p2)].into_iter().collect();
        assert_eq!(h.scheduler.allocate(c1, step1).unwrap(), AllocationOutcome::Granted);
        assert_eq!(h.scheduler.allocate(c1, step2).unwrap(), AllocationOutcome::Deferred);
        assert_eq!(h.scheduler.pending_count(), 1);

        h.dispatcher.withdraw_order_by_vehicle(v1, false, &mut h.scheduler).unwrap();

        assert_eq!(h.state(o), TransportOrderState::Withdrawn);
        assert_eq!(h.scheduler.pending_count(), 0);
        assert!(h.scheduler.claims_of(c1).is_empty());
        assert_eq!(h.scheduler.allocations_of(c1), resource_set([p0]));
        assert!(h.vehicle(v1).has_no_order());
        assert!(h.log.lock().unwrap().contains(&(v1, Call::Aborted)));

        // The dropped request is never granted later.
        h.scheduler.take_grants();
        h.scheduler.free_all(c2).unwrap();
        assert!(h.scheduler.take_grants().is_empty());

        // Eligible again on the very next trigger.
        let next = h.create(TransportOrderSpec::new("next", vec![Destination::point(p1)]).with_intended_vehicle(v1));
        h.dispatch();
        assert_eq!(h.current_order(v1), Some(next));
        h.scheduler.check_invariants().unwrap();
    }

    #[test]
    fn disabling_withdrawal_takes_vehicle_out_of_service() {
        let mut h = harness();
        let (p0, p1, p3) = (h.layout.p[0], h.layout.p[1], h.layout.p[3]);
        let v = h.add_vehicle(1, p0);
        let o = h.order("o", p3);
        h.dispatch();

        h.dispatcher.withdraw_order(o, true, &mut h.scheduler).unwrap();
        assert_eq!(h.state(o), TransportOrderState::Withdrawn);
        assert_eq!(h.vehicle(v).integration_level, IntegrationLevel::ToBeRespected);

        let next = h.order("next", p1);
        h.dispatch();
        assert_eq!(h.state(next), TransportOrderState::Dispatchable);
    }

    #[test]
    fn withdrawing_terminal_order_is_noop() {
        let mut h = harness();
        let (p0, p1) = (h.layout.p[0], h.layout.p[1]);
        let v = h.add_vehicle(1, p0);
        let o = h.order("o", p1);
        h.dispatch();
        assert!(h.finish_drive_order(v));
        h.dispatcher.take_events();

        h.dispatcher.withdraw_order(o, false, &mut h.scheduler).unwrap();
        assert_eq!(h.state(o), TransportOrderState::Finished);
        assert!(h.dispatcher.take_events().is_empty());
    }

    #[test]
    fn failed_order_releases_vehicle() {
        let mut h = harness();
        let (p0, p3) = (h.layout.p[0], h.layout.p[3]);
        let v = h.add_vehicle(1, p0);
        let o = h.order("o", p3);
        h.dispatch();

        h.dispatcher.vehicle_failed_order(v, &mut h.scheduler).unwrap();
        assert_eq!(h.state(o), TransportOrderState::Failed);
        assert!(h.vehicle(v).has_no_order());
        assert!(h.scheduler.claims_of(vehicle_client(v)).is_empty());
    }
}

// ── Dependencies, sequences, reservations ─────────────────────────────────────

#[cfg(test)]
mod ordering {
    use fk_core::{Destination, TransportOrderSpec, TransportOrderState};

    use super::helpers::harness;
    use crate::DispatchEvent;

    #[test]
    fn dependent_waits_for_dependency() {
        let mut h = harness();
        let (p0, p1, p2) = (h.layout.p[0], h.layout.p[1], h.layout.p[2]);
        let v = h.add_vehicle(1, p0);
        let a = h.order("a", p1);
        let b = h.create(TransportOrderSpec::new("b", vec![Destination::point(p2)]).with_dependency(a));

        h.dispatch();
        assert_eq!(h.current_order(v), Some(a));
        assert_eq!(h.state(b), TransportOrderState::Active);

        assert!(h.finish_drive_order(v));
        h.dispatch();
        assert_eq!(h.current_order(v), Some(b));
    }

    #[test]
    fn failed_dependency_fails_dependents() {
        let mut h = harness();
        let (p1, p2) = (h.layout.p[1], h.layout.p[2]);
        let c = h.order("c", p1);
        let d = h.create(TransportOrderSpec::new("d", vec![Destination::point(p2)]).with_dependency(c));
        h.dispatch();
        assert_eq!(h.state(c), TransportOrderState::Dispatchable);
        assert_eq!(h.state(d), TransportOrderState::Active);

        h.dispatcher.withdraw_order(c, false, &mut h.scheduler).unwrap();
        assert_eq!(h.state(c), TransportOrderState::Withdrawn);
        assert_eq!(h.state(d), TransportOrderState::Failed);

        // Created after the dependency already failed: failed on activation.
        let e = h.create(TransportOrderSpec::new("e", vec![Destination::point(p2)]).with_dependency(c));
        h.dispatch();
        assert_eq!(h.state(e), TransportOrderState::Failed);
    }

    #[test]
    fn sequence_stays_with_its_vehicle() {
        let mut h = harness();
        let (p0, p1, p3) = (h.layout.p[0], h.layout.p[1], h.layout.p[3]);
        let v1 = h.add_vehicle(1, p0);
        let v2 = h.add_vehicle(2, p3);
        let seq = h.dispatcher.create_sequence("S", None, false).unwrap();
        let o1 = h.create(TransportOrderSpec::new("o1", vec![Destination::point(p1)]).with_sequence(seq));
        let o2 = h.create(TransportOrderSpec::new("o2", vec![Destination::point(p3)]).with_sequence(seq));

        h.dispatch();
        assert_eq!(h.current_order(v1), Some(o1));
        assert_eq!(h.current_order(v2), None);
        assert_eq!(h.vehicle(v1).order_sequence, Some(seq));

        assert!(h.finish_drive_order(v1));
        h.dispatch();
        // v2 is closer to o2's destination, but the sequence is bound to v1.
        assert_eq!(h.current_order(v1), Some(o2));
        assert_eq!(h.current_order(v2), None);

        h.dispatcher.mark_sequence_complete(seq).unwrap();
        assert!(!h.dispatcher.fleet().sequence(seq).unwrap().finished);
        assert!(h.finish_drive_order(v1));
        let sequence = h.dispatcher.fleet().sequence(seq).unwrap();
        assert!(sequence.finished);
        assert_eq!(sequence.finished_index, Some(1));
        assert_eq!(h.vehicle(v1).order_sequence, None);
    }

    #[test]
    fn fatal_sequence_failure_fails_the_rest() {
        let mut h = harness();
        let (p0, p1, p2) = (h.layout.p[0], h.layout.p[1], h.layout.p[2]);
        let v = h.add_vehicle(1, p0);
        let seq = h.dispatcher.create_sequence("F", None, true).unwrap();
        let o1 = h.create(TransportOrderSpec::new("o1", vec![Destination::point(p1)]).with_sequence(seq));
        let o2 = h.create(TransportOrderSpec::new("o2", vec![Destination::point(p2)]).with_sequence(seq));
        h.dispatch();
        assert_eq!(h.current_order(v), Some(o1));

        h.dispatcher.vehicle_failed_order(v, &mut h.scheduler).unwrap();
        assert_eq!(h.state(o1), TransportOrderState::Failed);
        assert_eq!(h.state(o2), TransportOrderState::Failed);
        assert_eq!(h.dispatcher.fleet().sequence(seq).unwrap().finished_index, Some(1));
    }

    #[test]
    fn order_for_busy_vehicle_is_reserved() {
        let mut h = harness();
        let (p0, p1, p3) = (h.layout.p[0], h.layout.p[1], h.layout.p[3]);
        let v1 = h.add_vehicle(1, p0);
        let v2 = h.add_vehicle(2, p1);
        let first = h.create(TransportOrderSpec::new("first", vec![Destination::point(p3)]).with_intended_vehicle(v1));
        h.dispatch();
        assert_eq!(h.current_order(v1), Some(first));
        h.dispatcher.take_events();

        let second = h.create(TransportOrderSpec::new("second", vec![Destination::point(p1)]).with_intended_vehicle(v1));
        h.dispatch();
        assert_eq!(h.dispatcher.reservations().reserved_for(second), Some(v1));
        assert_eq!(h.current_order(v2), None);
        assert!(h
            .dispatcher
            .take_events()
            .contains(&DispatchEvent::OrderReserved { order: second, vehicle: v1 }));

        assert!(h.finish_drive_order(v1));
        h.dispatch();
        assert_eq!(h.current_order(v1), Some(second));
        assert!(h.dispatcher.reservations().is_empty());
    }
}

// ── Park & recharge ───────────────────────────────────────────────────────────

#[cfg(test)]
mod idle_vehicles {
    use fk_core::{
        DestinationTarget, DispatcherConfig, Resource, TransportOrderState, ORDER_TYPE_CHARGE,
        ORDER_TYPE_PARK,
    };

    use super::helpers::harness_with;

    fn park_config() -> DispatcherConfig {
        DispatcherConfig {
            park_idle_vehicles: true,
            park_idle_vehicles_delay_ms: 1_000,
            ..DispatcherConfig::default()
        }
    }

    #[test]
    fn idle_vehicle_parks_after_delay() {
        let mut h = harness_with(park_config());
        let (p0, park) = (h.layout.p[0], h.layout.park);
        let v = h.add_vehicle(1, p0);

        h.dispatch();
        assert_eq!(h.current_order(v), None);

        h.clock.advance(1_000);
        h.dispatch();
        let id = h.current_order(v).expect("park order");
        let order = h.dispatcher.fleet().order(id).unwrap();
        assert_eq!(order.order_type, ORDER_TYPE_PARK);
        assert!(order.dispensable);
        assert_eq!(order.drive_orders[0].destination.target, DestinationTarget::Point(park));
    }

    #[test]
    fn occupied_park_position_is_not_chosen() {
        let mut h = harness_with(park_config());
        let (p0, park) = (h.layout.p[0], h.layout.park);
        let v1 = h.add_vehicle(1, p0);
        let v2 = h.add_vehicle(2, park);
        h.clock.advance(1_000);
        h.dispatch();
        assert_eq!(h.current_order(v1), None);
        assert_eq!(h.current_order(v2), None);
    }

    #[test]
    fn transport_order_preempts_parking() {
        let mut h = harness_with(park_config());
        let (p0, p1) = (h.layout.p[0], h.layout.p[1]);
        let v = h.add_vehicle(1, p0);
        h.clock.advance(1_000);
        h.dispatch();
        let park_order = h.current_order(v).unwrap();

        let o = h.order("real work", p1);
        h.dispatch();
        assert_eq!(h.current_order(v), Some(o));
        assert_eq!(h.state(park_order), TransportOrderState::Withdrawn);
    }

    #[test]
    fn degraded_vehicle_recharges_after_delay() {
        let mut h = harness_with(DispatcherConfig {
            recharge_idle_vehicles: true,
            recharge_idle_vehicles_delay_ms: 5_000,
            ..DispatcherConfig::default()
        });
        let (p2, charger) = (h.layout.p[2], h.layout.charger);
        let v = h.add_vehicle_with(1, p2, |v| v.energy_level = 50);

        h.dispatch();
        assert_eq!(h.current_order(v), None);

        h.clock.advance(5_000);
        h.dispatch();
        let id = h.current_order(v).expect("recharge order");
        let order = h.dispatcher.fleet().order(id).unwrap();
        assert_eq!(order.order_type, ORDER_TYPE_CHARGE);
        assert_eq!(order.drive_orders[0].destination.target, DestinationTarget::Location(charger));
        let claims = h.scheduler.claims_of(fk_scheduler::vehicle_client(v));
        assert!(claims.last().unwrap().contains(&Resource::Location(charger)));
    }

    #[test]
    fn critical_vehicle_recharges_immediately() {
        let mut h = harness_with(DispatcherConfig {
            recharge_idle_vehicles: true,
            recharge_idle_vehicles_delay_ms: 60_000,
            ..DispatcherConfig::default()
        });
        let p2 = h.layout.p[2];
        let v = h.add_vehicle_with(1, p2, |v| v.energy_level = 20);
        h.dispatch();
        let id = h.current_order(v).expect("recharge order");
        assert_eq!(h.dispatcher.fleet().order(id).unwrap().order_type, ORDER_TYPE_CHARGE);
    }

    #[test]
    fn vehicle_at_charger_is_not_sent_again() {
        let mut h = harness_with(DispatcherConfig {
            recharge_idle_vehicles: true,
            recharge_idle_vehicles_delay_ms: 0,
            ..DispatcherConfig::default()
        });
        let p0 = h.layout.p[0];
        let v = h.add_vehicle_with(1, p0, |v| v.energy_level = 50);
        h.dispatch();
        assert_eq!(h.current_order(v), None);
    }
}

// ── Peripheral jobs ───────────────────────────────────────────────────────────

#[cfg(test)]
mod peripheral {
    use std::sync::Arc;

    use fk_core::{
        LocationId, ManualClock, OrderId, PeripheralDevice, PeripheralDeviceState,
        PeripheralJobState, Timestamp,
    };

    use super::helpers::{JobLog, TestPeripheral};
    use crate::{DispatchError, PeripheralJobDispatcher, PeripheralJobSpec};

    const DOOR: LocationId = LocationId(0);

    fn setup() -> (PeripheralJobDispatcher, ManualClock, JobLog) {
        let clock = ManualClock::new(Timestamp(0));
        let mut d = PeripheralJobDispatcher::new(Arc::new(clock.clone()));
        let mut door = PeripheralDevice::new(DOOR, "Door");
        door.state = PeripheralDeviceState::Idle;
        let log = JobLog::default();
        d.add_device(door, Arc::new(TestPeripheral { log: Arc::clone(&log) })).unwrap();
        (d, clock, log)
    }

    fn job(d: &mut PeripheralJobDispatcher, clock: &ManualClock, token: &str) -> fk_core::PeripheralJobId {
        clock.advance(10);
        d.create_job(PeripheralJobSpec::new(&format!("open for {token}"), token, DOOR, "Open")).unwrap()
    }

    #[test]
    fn oldest_job_is_assigned_and_device_reserved() {
        let (mut d, clock, log) = setup();
        let a = job(&mut d, &clock, "A");
        let b = job(&mut d, &clock, "B");
        assert!(d.has_idle_work());

        d.dispatch().unwrap();
        assert_eq!(*log.lock().unwrap(), vec![a]);
        assert_eq!(d.job(a).unwrap().state, PeripheralJobState::BeingProcessed);
        assert_eq!(d.device(DOOR).unwrap().reserved_by.as_deref(), Some("A"));
        assert!(!d.has_idle_work());

        // Token A has no more jobs, so the reservation is released and B runs.
        d.job_finished(a).unwrap();
        assert!(d.has_idle_work());
        d.dispatch().unwrap();
        assert_eq!(*log.lock().unwrap(), vec![a, b]);
        assert_eq!(d.device(DOOR).unwrap().reserved_by.as_deref(), Some("B"));
    }

    #[test]
    fn reserved_device_prefers_its_token() {
        let (mut d, clock, log) = setup();
        let a1 = job(&mut d, &clock, "A");
        d.dispatch().unwrap();
        let b = job(&mut d, &clock, "B");
        let a2 = job(&mut d, &clock, "A");

        d.job_finished(a1).unwrap();
        d.dispatch().unwrap();
        assert_eq!(*log.lock().unwrap(), vec![a1, a2]);
        assert_eq!(d.job(b).unwrap().state, PeripheralJobState::ToBeProcessed);
    }

    #[test]
    fn busy_or_unavailable_device_gets_nothing() {
        let (mut d, clock, log) = setup();
        d.update_device_state(DOOR, PeripheralDeviceState::Unavailable).unwrap();
        job(&mut d, &clock, "A");
        assert!(!d.has_idle_work());
        d.dispatch().unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn no_pending_job_means_no_idle_work() {
        let (d, _, _) = setup();
        assert!(!d.has_idle_work());
    }

    #[test]
    fn unknown_device_is_rejected() {
        let (mut d, _, _) = setup();
        let err = d.create_job(PeripheralJobSpec::new("x", "A", LocationId(9), "Open")).unwrap_err();
        assert!(matches!(err, DispatchError::DeviceUnknown(LocationId(9))));
    }

    #[test]
    fn jobs_of_failed_order_fail() {
        let (mut d, _, _) = setup();
        let spec = PeripheralJobSpec::new("open", "A", DOOR, "Open").with_related_order(OrderId(7));
        let running = d.create_job(spec.clone()).unwrap();
        d.dispatch().unwrap();
        let waiting = d.create_job(spec).unwrap();

        d.fail_jobs_of_order(OrderId(7)).unwrap();
        assert_eq!(d.job(running).unwrap().state, PeripheralJobState::Failed);
        assert_eq!(d.job(waiting).unwrap().state, PeripheralJobState::Failed);
        assert!(d.device(DOOR).unwrap().is_idle());
    }
}
