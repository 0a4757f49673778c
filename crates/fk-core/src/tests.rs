//! Unit tests for fk-core primitives.

#[cfg(test)]
mod ids {
    use crate::{OrderId, PointId, VehicleId};

    #[test]
    fn index_roundtrip() {
        let id = PointId(42);
        assert_eq!(id.index(), 42);
        assert_eq!(PointId::try_from(42usize).unwrap(), id);
    }

    #[test]
    fn invalid_is_default() {
        assert_eq!(VehicleId::default(), VehicleId::INVALID);
        assert_eq!(OrderId::INVALID.0, u32::MAX);
    }

    #[test]
    fn display() {
        assert_eq!(VehicleId(7).to_string(), "VehicleId(7)");
    }
}

#[cfg(test)]
mod geo {
    use crate::{Couple, Envelope};

    fn square(x: i64, y: i64, size: i64) -> Envelope {
        Envelope::rect(Couple::new(x, y), Couple::new(x + size, y + size))
    }

    #[test]
    fn disjoint_squares_do_not_overlap() {
        assert!(!square(0, 0, 10).overlaps(&square(20, 0, 10)));
    }

    #[test]
    fn crossing_squares_overlap() {
        assert!(square(0, 0, 10).overlaps(&square(5, 5, 10)));
    }

    #[test]
    fn touching_edges_overlap() {
        assert!(square(0, 0, 10).overlaps(&square(10, 0, 10)));
    }

    #[test]
    fn contained_polygon_overlaps() {
        // No edge crossings: the small square lies strictly inside the big one.
        assert!(square(0, 0, 100).overlaps(&square(40, 40, 5)));
        assert!(square(40, 40, 5).overlaps(&square(0, 0, 100)));
    }

    #[test]
    fn bounding_boxes_overlap_but_polygons_do_not() {
        let tri_a = Envelope::new(vec![Couple::new(0, 0), Couple::new(10, 0), Couple::new(0, 10)]);
        let tri_b = Envelope::new(vec![Couple::new(10, 10), Couple::new(10, 4), Couple::new(4, 10)]);
        assert!(!tri_a.overlaps(&tri_b));
    }

    #[test]
    fn empty_envelope_never_overlaps() {
        assert!(!Envelope::default().overlaps(&square(0, 0, 10)));
    }
}

#[cfg(test)]
mod time {
    use crate::{Clock, ManualClock, Timestamp};

    #[test]
    fn since_saturates() {
        assert_eq!(Timestamp(10).since(Timestamp(20)), 0);
        assert_eq!(Timestamp(20) - Timestamp(5), 15);
    }

    #[test]
    fn manual_clock_shared_between_clones() {
        let clock = ManualClock::new(Timestamp(1_000));
        let other = clock.clone();
        clock.advance(500);
        assert_eq!(other.now(), Timestamp(1_500));
    }
}

#[cfg(test)]
mod order {
    use crate::{
        Destination, OrderId, PointId, Timestamp, TransportOrder, TransportOrderSpec,
        TransportOrderState as S,
    };

    #[test]
    fn terminal_states_are_absorbing() {
        for terminal in [S::Finished, S::Failed, S::Withdrawn, S::Unroutable] {
            assert!(terminal.is_terminal());
            for to in [S::Raw, S::Active, S::Dispatchable, S::BeingProcessed, S::Finished] {
                assert!(!terminal.can_transition_to(to), "{terminal} -> {to}");
            }
        }
    }

    #[test]
    fn forward_path_is_allowed() {
        assert!(S::Raw.can_transition_to(S::Active));
        assert!(S::Active.can_transition_to(S::Dispatchable));
        assert!(S::Dispatchable.can_transition_to(S::BeingProcessed));
        assert!(S::BeingProcessed.can_transition_to(S::Finished));
        assert!(!S::BeingProcessed.can_transition_to(S::Dispatchable));
        assert!(!S::Dispatchable.can_transition_to(S::Active));
    }

    #[test]
    fn deadline_at_risk_window() {
        let spec = TransportOrderSpec::new("o", vec![Destination::point(PointId(0))])
            .with_deadline(Timestamp(10_000));
        let order = TransportOrder::from_spec(OrderId(0), spec, Timestamp(0));
        assert!(!order.deadline_at_risk(Timestamp(0), 5_000));
        assert!(order.deadline_at_risk(Timestamp(6_000), 5_000));
        assert!(order.deadline_at_risk(Timestamp(20_000), 0));
    }

    #[test]
    fn no_deadline_is_never_at_risk() {
        let spec = TransportOrderSpec::new("o", vec![Destination::point(PointId(0))]);
        let order = TransportOrder::from_spec(OrderId(0), spec, Timestamp(0));
        assert!(!order.deadline_at_risk(Timestamp(u64::MAX - 1), u64::MAX));
    }
}

#[cfg(test)]
mod plant {
    use crate::{BlockType, CoreError, Couple, PlantBuilder, PlantModel, PointId, Resource};

    #[test]
    fn dangling_path_reference_fails_build() {
        let mut b = PlantBuilder::new();
        let a = b.add_point("A", Couple::new(0, 0));
        b.add_path("bad", a, PointId(9), 1_000);
        assert!(matches!(b.build(), Err(CoreError::PointUnknown(PointId(9)))));
    }

    #[test]
    fn expand_resources_pulls_in_single_vehicle_blocks_only() {
        let mut b = PlantBuilder::new();
        let p0 = b.add_point("P0", Couple::new(0, 0));
        let p1 = b.add_point("P1", Couple::new(1, 0));
        let p2 = b.add_point("P2", Couple::new(2, 0));
        let p3 = b.add_point("P3", Couple::new(3, 0));
        b.add_block("S", BlockType::SingleVehicleOnly, [Resource::Point(p0), Resource::Point(p1)]);
        b.add_block("D", BlockType::SameDirectionOnly, [Resource::Point(p2), Resource::Point(p3)]);
        let plant = b.build().unwrap();

        let expanded = plant.expand_resources(&crate::resource_set([p0]));
        assert_eq!(expanded, crate::resource_set([p0, p1]));

        let expanded = plant.expand_resources(&crate::resource_set([p2]));
        assert_eq!(expanded, crate::resource_set([p2]));
    }

    #[test]
    fn fetch_points_by_predicate() {
        let mut b = PlantBuilder::new();
        b.add_point("A", Couple::new(0, 0));
        b.add_park_point("Park", Couple::new(1, 0));
        let plant = b.build().unwrap();
        let parks = plant.fetch_points(&|p| p.point_type == crate::PointType::Park);
        assert_eq!(parks.len(), 1);
        assert_eq!(parks[0].name, "Park");
    }
}

#[cfg(test)]
mod vehicle {
    use crate::{Vehicle, VehicleId};

    #[test]
    fn wildcard_accepts_everything() {
        let v = Vehicle::new(VehicleId(0), "V");
        assert!(v.accepts_order_type("Transport"));
        assert!(v.accepts_order_type("Park"));
    }

    #[test]
    fn restricted_order_types() {
        let mut v = Vehicle::new(VehicleId(0), "V");
        v.acceptable_order_types = ["Transport".to_owned()].into();
        assert!(v.accepts_order_type("Transport"));
        assert!(!v.accepts_order_type("Park"));
    }
}
