//! Segment traversal, spacing and blockage

use road_director::simulation::{
    MotionKind, Position, Promise, RoadCurve, RoadNetwork, RoadSegment, RoadSegmentConfig,
    SegmentId, SimError, SimId, VehicleId, MIN_BLOCKED_TICKS_TO_STOP,
};

const DELTA: f32 = 0.1;

fn vehicle(n: usize) -> VehicleId {
    VehicleId(SimId(n))
}

/// A straight segment of the given length with the given vehicle spacing
fn segment(length: f32, min_vehicle_distance: f32) -> RoadSegment {
    RoadSegment::new(
        SegmentId(SimId(0)),
        RoadCurve::straight(Position::default(), Position::new(length, 0.0, 0.0)),
        RoadSegmentConfig {
            min_vehicle_distance,
            parking_spot: None,
        },
    )
}

fn tick(segment: &mut RoadSegment) {
    for (promise, outcome) in segment.step(DELTA) {
        promise.settle(outcome);
    }
}

/// Ticks until `promise` settles, returning the number of ticks taken
fn run_until_settled(segment: &mut RoadSegment, promise: &Promise<bool>, max_ticks: u32) -> u32 {
    for n in 1..=max_ticks {
        tick(segment);
        if !promise.is_pending() {
            return n;
        }
    }
    panic!("promise still pending after {max_ticks} ticks");
}

#[test]
fn test_travel_crosses_segment_and_leaves() {
    let mut road = segment(10.0, 2.0);
    let v = vehicle(1);

    let travel = road.travel(v, 1.0, true);
    assert_eq!(road.vehicle_t(v), Some(0.0));
    assert_eq!(road.vehicle_motion(v), Some(MotionKind::Travel));

    // 1 unit/s over 10 units at 0.1s per tick
    let ticks = run_until_settled(&mut road, &travel, 200);
    assert!((99..=101).contains(&ticks), "took {ticks} ticks");
    assert_eq!(travel.value(), Some(true));
    assert!(!road.has_vehicle(v));
}

#[test]
fn test_travel_from_end_moves_backwards() {
    let mut road = segment(10.0, 2.0);
    let v = vehicle(1);

    let travel = road.travel(v, 5.0, false);
    assert_eq!(road.vehicle_t(v), Some(1.0));
    tick(&mut road);
    let t = road.vehicle_t(v).unwrap();
    assert!((t - 0.95).abs() < 1e-5, "t = {t}");

    run_until_settled(&mut road, &travel, 100);
    assert!(!road.has_vehicle(v));
}

#[test]
fn test_travel_rejects_vehicle_already_on_road() {
    let mut road = segment(10.0, 2.0);
    let v = vehicle(1);
    road.place_parked(v, 0.5).unwrap();

    let travel = road.travel(v, 1.0, true);
    assert!(matches!(
        travel.settlement(),
        Some(Err(SimError::Precondition(_)))
    ));
    assert_eq!(road.vehicle_t(v), Some(0.5));
    assert_eq!(road.is_vehicle_moving(v), Some(false));
}

#[test]
fn test_park_out_of_range_rejects_without_touching_occupancy() {
    let mut road = segment(10.0, 2.0);
    let parked = vehicle(1);
    road.place_parked(parked, 0.4).unwrap();

    let park = road.park(vehicle(2), 1.0, true, 1.5);
    assert!(matches!(
        park.settlement(),
        Some(Err(SimError::InvalidArgument(_)))
    ));
    assert!(!road.has_vehicle(vehicle(2)));
    assert_eq!(road.vehicle_count(), 1);
    assert_eq!(road.vehicle_t(parked), Some(0.4));
}

#[test]
fn test_park_stops_at_target_and_stays() {
    let mut road = segment(10.0, 2.0);
    let v = vehicle(1);

    let park = road.park(v, 2.0, true, 0.75);
    run_until_settled(&mut road, &park, 100);

    assert_eq!(park.value(), Some(true));
    assert_eq!(road.vehicle_t(v), Some(0.75));
    assert_eq!(road.is_vehicle_moving(v), Some(false));
}

#[test]
fn test_park_at_default_uses_midpoint_without_parking_spot() {
    let mut road = segment(10.0, 2.0);
    let v = vehicle(1);

    let park = road.park_at_default(v, 2.0, false);
    run_until_settled(&mut road, &park, 100);
    assert_eq!(road.vehicle_t(v), Some(0.5));
}

#[test]
fn test_park_rejects_while_driving() {
    let mut road = segment(10.0, 2.0);
    let v = vehicle(1);
    let _travel = road.travel(v, 1.0, true);

    let park = road.park(v, 1.0, true, 0.5);
    assert!(matches!(
        park.settlement(),
        Some(Err(SimError::Precondition(_)))
    ));
    assert_eq!(road.vehicle_motion(v), Some(MotionKind::Travel));
}

#[test]
fn test_parked_vehicle_can_park_again_from_where_it_is() {
    let mut road = segment(10.0, 2.0);
    let v = vehicle(1);
    road.place_parked(v, 0.8).unwrap();

    // enter_from_start is ignored for a vehicle already on the road
    let park = road.park(v, 2.0, true, 0.2);
    tick(&mut road);
    assert!(road.vehicle_t(v).unwrap() < 0.8);

    run_until_settled(&mut road, &park, 100);
    assert_eq!(road.vehicle_t(v), Some(0.2));
}

#[test]
fn test_exit_leaves_through_requested_end() {
    let mut road = segment(10.0, 2.0);
    let v = vehicle(1);
    road.place_parked(v, 0.5).unwrap();

    let exit = road.exit(v, 2.0, false);
    assert_eq!(road.vehicle_motion(v), Some(MotionKind::Exit));
    tick(&mut road);
    assert!(road.vehicle_t(v).unwrap() < 0.5);

    run_until_settled(&mut road, &exit, 100);
    assert_eq!(exit.value(), Some(true));
    assert!(!road.has_vehicle(v));
}

#[test]
fn test_exit_rejects_unknown_or_moving_vehicle() {
    let mut road = segment(10.0, 2.0);
    let missing = road.exit(vehicle(1), 1.0, true);
    assert!(matches!(
        missing.settlement(),
        Some(Err(SimError::Precondition(_)))
    ));

    let _travel = road.travel(vehicle(2), 1.0, true);
    let moving = road.exit(vehicle(2), 1.0, true);
    assert!(matches!(
        moving.settlement(),
        Some(Err(SimError::Precondition(_)))
    ));
}

#[test]
fn test_non_positive_velocity_is_invalid() {
    let mut road = segment(10.0, 2.0);
    let travel = road.travel(vehicle(1), 0.0, true);
    let park = road.park(vehicle(2), -3.0, true, 0.5);

    for promise in [travel, park] {
        assert!(matches!(
            promise.settlement(),
            Some(Err(SimError::InvalidArgument(_)))
        ));
    }
    assert_eq!(road.vehicle_count(), 0);
}

#[test]
fn test_approaching_vehicles_stop_exactly_at_min_spacing() {
    // length 10 with 2 units of spacing is 0.2 in path parameter
    let mut road = segment(10.0, 2.0);
    let west = vehicle(1);
    let east = vehicle(2);
    let west_travel = road.travel(west, 1.0, true);
    let east_travel = road.travel(east, 1.0, false);

    for _ in 0..60 {
        tick(&mut road);
        let west_t = road.vehicle_t(west).unwrap();
        let east_t = road.vehicle_t(east).unwrap();
        assert!(
            east_t - west_t >= 0.2 - 1e-5,
            "vehicles too close: {west_t} and {east_t}"
        );
    }

    let west_t = road.vehicle_t(west).unwrap();
    let east_t = road.vehicle_t(east).unwrap();
    assert!(
        (east_t - west_t - 0.2).abs() < 1e-5,
        "gap {} should converge to 0.2",
        east_t - west_t
    );
    assert!(west_travel.is_pending() && east_travel.is_pending());

    // stuck facing each other: both give up and stay where they are
    for _ in 0..MIN_BLOCKED_TICKS_TO_STOP {
        tick(&mut road);
    }
    for (promise, v) in [(&west_travel, west), (&east_travel, east)] {
        match promise.settlement() {
            Some(Err(err)) => assert!(err.is_blockage(), "unexpected error {err}"),
            other => panic!("expected blockage, got {other:?}"),
        }
        assert_eq!(road.is_vehicle_moving(v), Some(false));
    }
    assert_eq!(road.vehicle_count(), 2);
}

#[test]
fn test_follower_keeps_spacing_behind_parked_vehicle() {
    let mut road = segment(10.0, 2.0);
    let parked = vehicle(1);
    let follower = vehicle(2);
    road.place_parked(parked, 0.6).unwrap();

    let _travel = road.travel(follower, 2.0, true);
    for _ in 0..40 {
        tick(&mut road);
    }
    let t = road.vehicle_t(follower).unwrap();
    assert!((t - 0.4).abs() < 1e-5, "follower at {t}");
}

#[test]
fn test_blocked_vehicle_rejects_and_stays_parked() {
    let mut road = segment(10.0, 2.0);
    let blocker = vehicle(1);
    let mover = vehicle(2);
    road.place_parked(blocker, 0.1).unwrap();

    let travel = road.travel(mover, 1.0, true);
    let ticks = run_until_settled(&mut road, &travel, 100);

    assert_eq!(ticks, MIN_BLOCKED_TICKS_TO_STOP);
    match travel.settlement() {
        Some(Err(err)) => assert!(err.is_blockage(), "unexpected error {err}"),
        other => panic!("expected blockage, got {other:?}"),
    }
    assert_eq!(road.vehicle_t(mover), Some(0.0));
    assert_eq!(road.is_vehicle_moving(mover), Some(false));
}

#[test]
fn test_blocked_counter_resets_when_vehicle_moves_again() {
    let mut road = segment(10.0, 2.0);
    let blocker = vehicle(1);
    let mover = vehicle(2);
    road.place_parked(blocker, 0.1).unwrap();

    let travel = road.travel(mover, 1.0, true);
    for _ in 0..20 {
        tick(&mut road);
    }
    assert!(travel.is_pending());
    let exit = road.exit(blocker, 10.0, true);
    run_until_settled(&mut road, &exit, 50);

    // the mover had room again before reaching the threshold
    run_until_settled(&mut road, &travel, 500);
    assert_eq!(travel.value(), Some(true));
}

#[test]
fn test_connections_are_recorded_per_end() {
    let mut road = segment(10.0, 2.0);
    let before = SegmentId(SimId(1));
    let after = SegmentId(SimId(2));

    road.add_connected_road(before, true, false);
    road.add_connected_road(after, false, true);

    assert_eq!(road.connected_roads(true), vec![(before, false)]);
    assert_eq!(road.connected_roads(false), vec![(after, true)]);
    assert_eq!(road.is_road_connected_by_start(before), Some(false));
    assert_eq!(road.is_road_connected_by_start(after), Some(true));
    assert_eq!(road.is_road_connected_by_start(SegmentId(SimId(9))), None);
}

#[test]
fn test_zero_length_segment_cannot_be_driven() {
    let point = Position::new(5.0, 0.0, 5.0);
    let mut road = RoadSegment::new(
        SegmentId(SimId(0)),
        RoadCurve::straight(point, point),
        RoadSegmentConfig::default(),
    );
    assert_eq!(road.length(), 0.0);

    let travel = road.travel(vehicle(1), 1.0, true);
    let park = road.park(vehicle(2), 1.0, true, 0.5);
    for promise in [travel, park] {
        assert!(matches!(
            promise.settlement(),
            Some(Err(SimError::InvalidArgument(_)))
        ));
    }
    assert_eq!(road.vehicle_count(), 0);

    // placing is still allowed, but the vehicle can't drive off
    road.place_parked(vehicle(3), 0.0).unwrap();
    let exit = road.exit(vehicle(3), 1.0, true);
    assert!(matches!(
        exit.settlement(),
        Some(Err(SimError::InvalidArgument(_)))
    ));
    assert_eq!(road.is_vehicle_moving(vehicle(3)), Some(false));
}

#[test]
fn test_vehicle_cannot_be_on_two_segments() {
    let mut network = RoadNetwork::new();
    let a = network.add_segment(
        RoadCurve::straight(Position::default(), Position::new(10.0, 0.0, 0.0)),
        RoadSegmentConfig::default(),
    );
    let b = network.add_segment(
        RoadCurve::straight(Position::new(10.0, 0.0, 0.0), Position::new(20.0, 0.0, 0.0)),
        RoadSegmentConfig::default(),
    );
    let v = vehicle(1);
    network.place_parked(a, v, 0.5).unwrap();

    let travel = network.travel(b, v, 1.0, true);
    let park = network.park(b, v, 1.0, true, 0.5);
    let park_default = network.park_at_default(b, v, 1.0, true);
    for promise in [travel, park, park_default] {
        assert!(matches!(
            promise.settlement(),
            Some(Err(SimError::Precondition(_)))
        ));
    }
    assert!(matches!(
        network.place_parked(b, v, 0.2),
        Err(SimError::Precondition(_))
    ));

    assert!(!network.segment(b).unwrap().has_vehicle(v));
    assert_eq!(network.find_vehicle(v), Some(a));

    // parking again on the segment it already occupies is fine
    let repark = network.park(a, v, 1.0, true, 0.7);
    assert!(repark.is_pending());
}
