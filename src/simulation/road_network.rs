//! Road network: the set of segments and the shared handle that ticks them
//!
//! `RoadNetwork` owns every segment by id. `RoadNetworkHandle` wraps it in
//! `Rc<RefCell<..>>` so promise continuations (which start the next leg of a
//! journey) can reach the network from inside a tick. Every handle method
//! releases its borrow before returning, and `tick` settles promises only
//! after the network borrow is dropped.

use log::{debug, trace, warn};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::rc::Rc;

use super::curve::RoadCurve;
use super::error::SimError;
use super::pathfinding::RoadGraph;
use super::promise::Promise;
use super::road_segment::{PendingSettlement, RoadSegment, RoadSegmentConfig};
use super::types::{SegmentEnd, SegmentId, SimId, VehicleId};

#[derive(Debug, Default)]
pub struct RoadNetwork {
    segments: BTreeMap<SegmentId, RoadSegment>,
    next_id: usize,
}

impl RoadNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a segment built from `curve` and returns its id
    pub fn add_segment(&mut self, curve: RoadCurve, config: RoadSegmentConfig) -> SegmentId {
        let id = SegmentId(SimId(self.next_id));
        self.next_id += 1;
        debug!("adding {id} with length {:.2}", curve.length());
        self.segments.insert(id, RoadSegment::new(id, curve, config));
        id
    }

    pub fn segment(&self, id: SegmentId) -> Option<&RoadSegment> {
        self.segments.get(&id)
    }

    pub fn segment_mut(&mut self, id: SegmentId) -> Option<&mut RoadSegment> {
        self.segments.get_mut(&id)
    }

    pub fn segments(&self) -> impl Iterator<Item = &RoadSegment> {
        self.segments.values()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// One-directional connection: `road` becomes reachable from `from` at the given end.
    pub fn add_connected_road(
        &mut self,
        from: SegmentId,
        connected_to_start: bool,
        road: SegmentId,
        connected_by_start: bool,
    ) -> Result<(), SimError> {
        if !self.segments.contains_key(&road) {
            return Err(SimError::UnknownSegment(road));
        }
        self.segments
            .get_mut(&from)
            .ok_or(SimError::UnknownSegment(from))?
            .add_connected_road(road, connected_to_start, connected_by_start);
        Ok(())
    }

    /// Join `a_end` of `a` to `b_end` of `b`, drivable both ways.
    pub fn link(
        &mut self,
        a: SegmentId,
        a_end: SegmentEnd,
        b: SegmentId,
        b_end: SegmentEnd,
    ) -> Result<(), SimError> {
        self.add_connected_road(a, a_end.is_start(), b, b_end.is_start())?;
        self.add_connected_road(b, b_end.is_start(), a, a_end.is_start())
    }

    /// The segment currently holding `vehicle`, if any
    pub fn find_vehicle(&self, vehicle: VehicleId) -> Option<SegmentId> {
        self.segments
            .values()
            .find(|segment| segment.has_vehicle(vehicle))
            .map(RoadSegment::id)
    }

    /// Fails if `vehicle` is registered on any segment other than `segment`
    fn check_not_elsewhere(&self, segment: SegmentId, vehicle: VehicleId) -> Result<(), SimError> {
        match self.find_vehicle(vehicle) {
            Some(other) if other != segment => {
                warn!("{vehicle} is already on {other}, refusing to put it on {segment}");
                Err(SimError::precondition(format!("{vehicle} already on {other}")))
            }
            _ => Ok(()),
        }
    }

    /// Register a stationary vehicle at `t`, for scene setup
    pub fn place_parked(
        &mut self,
        segment: SegmentId,
        vehicle: VehicleId,
        t: f32,
    ) -> Result<(), SimError> {
        self.check_not_elsewhere(segment, vehicle)?;
        self.segments
            .get_mut(&segment)
            .ok_or(SimError::UnknownSegment(segment))?
            .place_parked(vehicle, t)
    }

    pub fn travel(
        &mut self,
        segment: SegmentId,
        vehicle: VehicleId,
        velocity: f32,
        enter_from_start: bool,
    ) -> Promise<bool> {
        if let Err(err) = self.check_not_elsewhere(segment, vehicle) {
            return Promise::rejected(err);
        }
        match self.segments.get_mut(&segment) {
            Some(road) => road.travel(vehicle, velocity, enter_from_start),
            None => Promise::rejected(SimError::UnknownSegment(segment)),
        }
    }

    pub fn park(
        &mut self,
        segment: SegmentId,
        vehicle: VehicleId,
        velocity: f32,
        enter_from_start: bool,
        target_t: f32,
    ) -> Promise<bool> {
        if let Err(err) = self.check_not_elsewhere(segment, vehicle) {
            return Promise::rejected(err);
        }
        match self.segments.get_mut(&segment) {
            Some(road) => road.park(vehicle, velocity, enter_from_start, target_t),
            None => Promise::rejected(SimError::UnknownSegment(segment)),
        }
    }

    pub fn park_at_default(
        &mut self,
        segment: SegmentId,
        vehicle: VehicleId,
        velocity: f32,
        enter_from_start: bool,
    ) -> Promise<bool> {
        if let Err(err) = self.check_not_elsewhere(segment, vehicle) {
            return Promise::rejected(err);
        }
        match self.segments.get_mut(&segment) {
            Some(road) => road.park_at_default(vehicle, velocity, enter_from_start),
            None => Promise::rejected(SimError::UnknownSegment(segment)),
        }
    }

    pub fn exit(
        &mut self,
        segment: SegmentId,
        vehicle: VehicleId,
        velocity: f32,
        exit_toward_end: bool,
    ) -> Promise<bool> {
        match self.segments.get_mut(&segment) {
            Some(road) => road.exit(vehicle, velocity, exit_toward_end),
            None => Promise::rejected(SimError::UnknownSegment(segment)),
        }
    }

    /// Advance all segments by one tick. Returned promises still need settling.
    pub fn step(&mut self, delta_secs: f32) -> Vec<PendingSettlement> {
        self.segments
            .values_mut()
            .flat_map(|segment| segment.step(delta_secs))
            .collect()
    }
}

impl RoadGraph for RoadNetwork {
    fn connected_roads(&self, segment: SegmentId, at_start: bool) -> Vec<(SegmentId, bool)> {
        self.segments
            .get(&segment)
            .map(|road| road.connected_roads(at_start))
            .unwrap_or_default()
    }

    fn segment_length(&self, segment: SegmentId) -> Option<f32> {
        self.segments.get(&segment).map(RoadSegment::length)
    }
}

/// Shared, single-threaded handle to a `RoadNetwork`
#[derive(Debug, Clone, Default)]
pub struct RoadNetworkHandle {
    network: Rc<RefCell<RoadNetwork>>,
}

impl RoadNetworkHandle {
    pub fn new(network: RoadNetwork) -> Self {
        Self {
            network: Rc::new(RefCell::new(network)),
        }
    }

    /// Read access. Do not hold the guard across `tick`.
    pub fn borrow(&self) -> Ref<'_, RoadNetwork> {
        self.network.borrow()
    }

    /// Write access for setup. Do not hold the guard across `tick`.
    pub fn borrow_mut(&self) -> RefMut<'_, RoadNetwork> {
        self.network.borrow_mut()
    }

    pub fn travel(
        &self,
        segment: SegmentId,
        vehicle: VehicleId,
        velocity: f32,
        enter_from_start: bool,
    ) -> Promise<bool> {
        self.network
            .borrow_mut()
            .travel(segment, vehicle, velocity, enter_from_start)
    }

    pub fn park(
        &self,
        segment: SegmentId,
        vehicle: VehicleId,
        velocity: f32,
        enter_from_start: bool,
        target_t: f32,
    ) -> Promise<bool> {
        self.network
            .borrow_mut()
            .park(segment, vehicle, velocity, enter_from_start, target_t)
    }

    pub fn park_at_default(
        &self,
        segment: SegmentId,
        vehicle: VehicleId,
        velocity: f32,
        enter_from_start: bool,
    ) -> Promise<bool> {
        self.network
            .borrow_mut()
            .park_at_default(segment, vehicle, velocity, enter_from_start)
    }

    pub fn exit(
        &self,
        segment: SegmentId,
        vehicle: VehicleId,
        velocity: f32,
        exit_toward_end: bool,
    ) -> Promise<bool> {
        self.network
            .borrow_mut()
            .exit(segment, vehicle, velocity, exit_toward_end)
    }

    /// Advance the network one tick, then settle finished motions.
    /// Continuations may start new operations on the network.
    pub fn tick(&self, delta_secs: f32) -> usize {
        let settled = self.network.borrow_mut().step(delta_secs);
        let count = settled.len();
        if count > 0 {
            trace!("settling {count} road operations");
        }
        for (promise, outcome) in settled {
            promise.settle(outcome);
        }
        count
    }
}
