//! A single directed road segment and the vehicles on it
//!
//! Each segment owns its occupancy: which vehicles are on it, at what path
//! parameter, and whether they are currently moving. Moving vehicles carry
//! an explicit `Motion` that `step` advances once per tick. Operations hand
//! back a `Promise<bool>` that settles when the motion ends; the settlement
//! itself is returned from `step` so the caller can run continuations after
//! releasing its borrow of the segment.

use log::{debug, warn};
use ordered_float::OrderedFloat;
use std::collections::BTreeMap;

use super::curve::RoadCurve;
use super::error::SimError;
use super::promise::{Promise, Settlement};
use super::types::{
    SegmentId, VehicleId, BLOCKED_DISTANCE_EPSILON, DEFAULT_MIN_VEHICLE_DISTANCE,
    DEFAULT_PARKING_T, MIN_BLOCKED_TICKS_TO_STOP,
};

/// Tunable segment parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoadSegmentConfig {
    /// Physical gap kept between vehicles on this segment
    pub min_vehicle_distance: f32,
    /// Dedicated parking coordinate, if the segment has one
    pub parking_spot: Option<f32>,
}

impl Default for RoadSegmentConfig {
    fn default() -> Self {
        Self {
            min_vehicle_distance: DEFAULT_MIN_VEHICLE_DISTANCE,
            parking_spot: None,
        }
    }
}

/// What a motion does when it reaches its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionKind {
    /// Cross the whole segment, then leave it
    Travel,
    /// Stop and stay at the target coordinate
    Park,
    /// Drive from a parked coordinate to an end, then leave
    Exit,
}

/// An in-flight movement of one vehicle along the segment
#[derive(Debug)]
struct Motion {
    kind: MotionKind,
    velocity: f32,
    target_t: f32,
    blocked_ticks: u32,
    promise: Promise<bool>,
}

#[derive(Debug)]
struct Occupant {
    t: f32,
    motion: Option<Motion>,
}

/// A promise to settle once the segment is no longer borrowed
pub type PendingSettlement = (Promise<bool>, Settlement<bool>);

#[derive(Debug)]
pub struct RoadSegment {
    id: SegmentId,
    curve: RoadCurve,
    length: f32,
    min_vehicle_distance: f32,
    /// `min_vehicle_distance` expressed in path parameter units
    min_t_distance: f32,
    parking_spot: Option<f32>,
    /// Roads connected to our start, mapped to "entered by their start"
    in_roads: BTreeMap<SegmentId, bool>,
    /// Roads connected to our end, mapped to "entered by their start"
    out_roads: BTreeMap<SegmentId, bool>,
    vehicles: BTreeMap<VehicleId, Occupant>,
}

impl RoadSegment {
    pub fn new(id: SegmentId, curve: RoadCurve, config: RoadSegmentConfig) -> Self {
        let length = curve.length();
        if length <= 0.0 {
            warn!("{id}: curve has zero length, vehicles can only be placed on it");
        }
        let min_t_distance = if length > 0.0 {
            config.min_vehicle_distance / length
        } else {
            0.0
        };
        let parking_spot = config.parking_spot.filter(|t| (0.0..=1.0).contains(t));
        if parking_spot != config.parking_spot {
            warn!("{id}: parking spot {:?} outside [0, 1], ignoring", config.parking_spot);
        }

        Self {
            id,
            curve,
            length,
            min_vehicle_distance: config.min_vehicle_distance,
            min_t_distance,
            parking_spot,
            in_roads: BTreeMap::new(),
            out_roads: BTreeMap::new(),
            vehicles: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn curve(&self) -> &RoadCurve {
        &self.curve
    }

    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn min_vehicle_distance(&self) -> f32 {
        self.min_vehicle_distance
    }

    pub fn min_t_distance(&self) -> f32 {
        self.min_t_distance
    }

    pub fn parking_spot(&self) -> Option<f32> {
        self.parking_spot
    }

    /// Where `park_at_default` stops a vehicle
    pub fn default_parking_t(&self) -> f32 {
        self.parking_spot.unwrap_or(DEFAULT_PARKING_T)
    }

    /// Record that `road` is connected to this segment.
    ///
    /// `connected_to_start` picks which end of this segment the connection is
    /// at; `connected_by_start` says whether `road` is entered through its own start.
    pub fn add_connected_road(
        &mut self,
        road: SegmentId,
        connected_to_start: bool,
        connected_by_start: bool,
    ) {
        let connections = if connected_to_start {
            &mut self.in_roads
        } else {
            &mut self.out_roads
        };
        if connections.insert(road, connected_by_start).is_some() {
            debug!("{}: replaced existing connection to {road}", self.id);
        }
    }

    /// Roads connected at our start (`at_start`) or end, each with its "entered by start" flag
    pub fn connected_roads(&self, at_start: bool) -> Vec<(SegmentId, bool)> {
        let connections = if at_start {
            &self.in_roads
        } else {
            &self.out_roads
        };
        connections.iter().map(|(id, by_start)| (*id, *by_start)).collect()
    }

    /// Whether `road` is entered through its start, or `None` if not connected.
    /// Connections at our start are checked first.
    pub fn is_road_connected_by_start(&self, road: SegmentId) -> Option<bool> {
        self.in_roads
            .get(&road)
            .or_else(|| self.out_roads.get(&road))
            .copied()
    }

    /// Path parameter of `vehicle`, if it is on this segment
    pub fn vehicle_t(&self, vehicle: VehicleId) -> Option<f32> {
        self.vehicles.get(&vehicle).map(|o| o.t)
    }

    pub fn is_vehicle_moving(&self, vehicle: VehicleId) -> Option<bool> {
        self.vehicles.get(&vehicle).map(|o| o.motion.is_some())
    }

    /// The kind of motion `vehicle` is performing, `None` if parked or absent
    pub fn vehicle_motion(&self, vehicle: VehicleId) -> Option<MotionKind> {
        self.vehicles
            .get(&vehicle)
            .and_then(|o| o.motion.as_ref())
            .map(|m| m.kind)
    }

    pub fn has_vehicle(&self, vehicle: VehicleId) -> bool {
        self.vehicles.contains_key(&vehicle)
    }

    /// All vehicles as `(id, t, is_moving)`, ordered by id
    pub fn vehicles(&self) -> impl Iterator<Item = (VehicleId, f32, bool)> + '_ {
        self.vehicles
            .iter()
            .map(|(id, o)| (*id, o.t, o.motion.is_some()))
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// Register a vehicle as already parked at `t`, for scene setup.
    pub fn place_parked(&mut self, vehicle: VehicleId, t: f32) -> Result<(), SimError> {
        check_coordinate(t)?;
        if self.vehicles.contains_key(&vehicle) {
            return Err(SimError::precondition(format!(
                "{vehicle} already on {}",
                self.id
            )));
        }
        self.vehicles.insert(vehicle, Occupant { t, motion: None });
        Ok(())
    }

    /// Drive a vehicle across the whole segment, entering at the start or
    /// end. The vehicle is removed from the segment when it arrives.
    pub fn travel(&mut self, vehicle: VehicleId, velocity: f32, enter_from_start: bool) -> Promise<bool> {
        if let Err(err) = check_velocity(velocity).and_then(|_| self.check_drivable()) {
            warn!("{}: travel: {err}", self.id);
            return Promise::rejected(err);
        }
        if self.vehicles.contains_key(&vehicle) {
            warn!("{}: travel: {vehicle} is already on the road", self.id);
            return Promise::rejected(SimError::precondition("vehicle already on road"));
        }

        let start_t = if enter_from_start { 0.0 } else { 1.0 };
        let promise = Promise::new();
        self.vehicles.insert(
            vehicle,
            Occupant {
                t: start_t,
                motion: Some(Motion::new(MotionKind::Travel, velocity, 1.0 - start_t, &promise)),
            },
        );
        debug!("{}: {vehicle} travelling from t={start_t}", self.id);
        promise
    }

    /// Move a vehicle to `target_t` and leave it parked there. A vehicle
    /// already parked on the segment moves from where it is and
    /// `enter_from_start` is ignored.
    pub fn park(
        &mut self,
        vehicle: VehicleId,
        velocity: f32,
        enter_from_start: bool,
        target_t: f32,
    ) -> Promise<bool> {
        if let Err(err) = check_coordinate(target_t)
            .and_then(|_| check_velocity(velocity))
            .and_then(|_| self.check_drivable())
        {
            warn!("{}: park: {err}", self.id);
            return Promise::rejected(err);
        }

        let promise = Promise::new();
        match self.vehicles.get_mut(&vehicle) {
            Some(occupant) if occupant.motion.is_some() => {
                warn!("{}: park: {vehicle} is already driving on the road", self.id);
                return Promise::rejected(SimError::precondition("vehicle already driving"));
            }
            Some(occupant) => {
                occupant.motion = Some(Motion::new(MotionKind::Park, velocity, target_t, &promise));
            }
            None => {
                let start_t = if enter_from_start { 0.0 } else { 1.0 };
                self.vehicles.insert(
                    vehicle,
                    Occupant {
                        t: start_t,
                        motion: Some(Motion::new(MotionKind::Park, velocity, target_t, &promise)),
                    },
                );
            }
        }
        debug!("{}: {vehicle} parking at t={target_t}", self.id);
        promise
    }

    /// Park at the segment's parking spot, or its midpoint if it has none
    pub fn park_at_default(
        &mut self,
        vehicle: VehicleId,
        velocity: f32,
        enter_from_start: bool,
    ) -> Promise<bool> {
        let target_t = self.default_parking_t();
        self.park(vehicle, velocity, enter_from_start, target_t)
    }

    /// Drive a parked vehicle off the segment through its end
    /// (`exit_toward_end`) or its start.
    pub fn exit(&mut self, vehicle: VehicleId, velocity: f32, exit_toward_end: bool) -> Promise<bool> {
        if let Err(err) = check_velocity(velocity).and_then(|_| self.check_drivable()) {
            warn!("{}: exit: {err}", self.id);
            return Promise::rejected(err);
        }

        let promise = Promise::new();
        match self.vehicles.get_mut(&vehicle) {
            None => {
                warn!("{}: exit: {vehicle} is not currently on the road", self.id);
                return Promise::rejected(SimError::precondition("vehicle not on road"));
            }
            Some(occupant) if occupant.motion.is_some() => {
                warn!("{}: exit: {vehicle} is already driving on the road", self.id);
                return Promise::rejected(SimError::precondition("vehicle already driving"));
            }
            Some(occupant) => {
                let target_t = if exit_toward_end { 1.0 } else { 0.0 };
                occupant.motion = Some(Motion::new(MotionKind::Exit, velocity, target_t, &promise));
            }
        }
        promise
    }

    /// Advance every moving vehicle by one tick of `delta_secs`.
    ///
    /// Vehicles are stepped in ascending id order; each sees the positions
    /// already updated this tick by the vehicles before it. Returns the
    /// promises whose motions ended, with their outcomes, for the caller to
    /// settle.
    pub fn step(&mut self, delta_secs: f32) -> Vec<PendingSettlement> {
        if delta_secs <= 0.0 || self.length <= 0.0 {
            return Vec::new();
        }

        let moving: Vec<VehicleId> = self
            .vehicles
            .iter()
            .filter(|(_, o)| o.motion.is_some())
            .map(|(id, _)| *id)
            .collect();

        moving
            .into_iter()
            .filter_map(|vehicle| self.step_vehicle(vehicle, delta_secs))
            .collect()
    }

    /// Motion is measured against the length, so a degenerate curve can't be driven
    fn check_drivable(&self) -> Result<(), SimError> {
        if self.length > 0.0 {
            Ok(())
        } else {
            Err(SimError::invalid_argument(format!(
                "{} has zero length",
                self.id
            )))
        }
    }

    fn step_vehicle(&mut self, vehicle: VehicleId, delta_secs: f32) -> Option<PendingSettlement> {
        let (t, velocity, target_t) = {
            let occupant = self.vehicles.get(&vehicle)?;
            let motion = occupant.motion.as_ref()?;
            (occupant.t, motion.velocity, motion.target_t)
        };

        let direction = if target_t >= t { 1.0 } else { -1.0 };
        let step = velocity * delta_secs / self.length;
        let remaining = (target_t - t) * direction;
        // within one tick of the target counts as arrival; snap to avoid drift
        let naive_next = if remaining <= step {
            target_t
        } else {
            t + direction * step
        };

        let next = self.clamp_to_spacing(vehicle, t, naive_next, direction);
        let arrived = next == target_t;
        let moved = (next - t).abs() * self.length;

        let occupant = self.vehicles.get_mut(&vehicle)?;
        occupant.t = next;

        if arrived {
            let motion = occupant.motion.take()?;
            match motion.kind {
                MotionKind::Park => {
                    debug!("{}: {vehicle} parked at t={next}", self.id);
                }
                MotionKind::Travel | MotionKind::Exit => {
                    self.vehicles.remove(&vehicle);
                    debug!("{}: {vehicle} left the road", self.id);
                }
            }
            return Some((motion.promise, Ok(true)));
        }

        let motion = occupant.motion.as_mut()?;
        if moved < BLOCKED_DISTANCE_EPSILON {
            motion.blocked_ticks += 1;
            if motion.blocked_ticks >= MIN_BLOCKED_TICKS_TO_STOP {
                let ticks = motion.blocked_ticks;
                let motion = occupant.motion.take()?;
                warn!("{}: {vehicle} blocked at t={next:.3}, parking", self.id);
                return Some((
                    motion.promise,
                    Err(SimError::Blockage {
                        vehicle,
                        segment: self.id,
                        ticks,
                    }),
                ));
            }
        } else {
            motion.blocked_ticks = 0;
        }
        None
    }

    /// Pull `next` back so the mover stays `min_t_distance` behind every
    /// vehicle at or ahead of it. The mover never moves backwards.
    fn clamp_to_spacing(&self, vehicle: VehicleId, t: f32, next: f32, direction: f32) -> f32 {
        let limit = self
            .vehicles
            .iter()
            .filter(|(other, _)| **other != vehicle)
            .map(|(_, o)| o.t)
            .filter(|other_t| (other_t - t) * direction >= 0.0)
            .filter(|other_t| (other_t - next) * direction < self.min_t_distance)
            .map(|other_t| other_t - direction * self.min_t_distance)
            .min_by_key(|limit| OrderedFloat((limit - t) * direction));

        match limit {
            Some(limit) if (limit - t) * direction <= 0.0 => t,
            Some(limit) => limit,
            None => next,
        }
    }
}

impl Motion {
    fn new(kind: MotionKind, velocity: f32, target_t: f32, promise: &Promise<bool>) -> Self {
        Self {
            kind,
            velocity,
            target_t,
            blocked_ticks: 0,
            promise: promise.clone(),
        }
    }
}

fn check_coordinate(t: f32) -> Result<(), SimError> {
    if (0.0..=1.0).contains(&t) {
        Ok(())
    } else {
        Err(SimError::invalid_argument(format!(
            "coordinate {t} out of range [0, 1]"
        )))
    }
}

fn check_velocity(velocity: f32) -> Result<(), SimError> {
    if velocity.is_finite() && velocity > 0.0 {
        Ok(())
    } else {
        Err(SimError::invalid_argument(format!(
            "velocity {velocity} must be positive"
        )))
    }
}
