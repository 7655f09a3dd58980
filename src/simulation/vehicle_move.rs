//! Command that drives a road vehicle to a destination segment
//!
//! The journey is one promise chain: exit the current segment, travel each
//! intermediate segment, then park on the last one. The vehicle's current
//! segment is only updated once the previous leg's promise resolves, so it
//! is never registered on two segments at once.

use log::{info, warn};

use super::command::{Command, CommandCompletion};
use super::error::SimError;
use super::pathfinding::find_path;
use super::promise::Promise;
use super::road_network::RoadNetworkHandle;
use super::road_vehicle::SharedRoadVehicle;
use super::types::{SegmentId, VehicleId};

pub struct RoadVehicleMoveCommand {
    network: RoadNetworkHandle,
    vehicle: SharedRoadVehicle,
    destination: SegmentId,
    velocity: f32,
    /// Explicit parking coordinate; the destination's default spot otherwise
    target_t: Option<f32>,
}

impl RoadVehicleMoveCommand {
    pub fn new(
        network: RoadNetworkHandle,
        vehicle: SharedRoadVehicle,
        destination: SegmentId,
        velocity: f32,
    ) -> Self {
        Self {
            network,
            vehicle,
            destination,
            velocity,
            target_t: None,
        }
    }

    /// Park at `target_t` on the destination instead of its default spot
    pub fn with_target_t(mut self, target_t: f32) -> Self {
        self.target_t = Some(target_t);
        self
    }
}

impl Command for RoadVehicleMoveCommand {
    fn name(&self) -> &'static str {
        "road vehicle move"
    }

    fn execute(self: Box<Self>, done: CommandCompletion) {
        let (vehicle_id, start, facing_forwards) = {
            let vehicle = self.vehicle.borrow();
            (
                vehicle.id(),
                vehicle.current_road_segment(),
                vehicle.is_currently_facing_forwards(),
            )
        };

        let Some(start) = start else {
            warn!("{vehicle_id} is not on any road segment, ignoring move");
            done.signal();
            return;
        };

        let lookup = {
            let network = self.network.borrow();
            let current_t = network.segment(start).and_then(|s| s.vehicle_t(vehicle_id));
            let default_t = network
                .segment(self.destination)
                .map(|s| s.default_parking_t());
            current_t.zip(self.target_t.or(default_t))
        };
        let Some((current_t, target_t)) = lookup else {
            warn!(
                "{vehicle_id} cannot move from {start} to {}: unknown position or destination",
                self.destination
            );
            done.signal();
            return;
        };

        let target_ahead = if facing_forwards {
            target_t >= current_t
        } else {
            target_t <= current_t
        };

        if start == self.destination && target_ahead {
            let parked = self
                .network
                .park(start, vehicle_id, self.velocity, facing_forwards, target_t);
            complete_when_settled(&parked, done, vehicle_id);
            return;
        }

        let path = {
            let network = self.network.borrow();
            find_path(&*network, start, self.destination, facing_forwards, true)
        };
        let Some(path) = path.filter(|p| p.len() >= 2) else {
            let err = SimError::NoPathFound {
                from: start,
                to: self.destination,
            };
            info!("{vehicle_id}: {err}");
            done.signal();
            return;
        };

        let velocity = self.velocity;
        let mut journey = self
            .network
            .exit(start, vehicle_id, velocity, facing_forwards);

        let last = path.legs[path.len() - 1];
        for &leg in &path.legs[1..path.len() - 1] {
            let network = self.network.clone();
            let vehicle = self.vehicle.clone();
            journey = journey.and_then(move |_| {
                vehicle
                    .borrow_mut()
                    .set_current_road_segment(leg.segment, leg.facing_forwards);
                network.travel(leg.segment, vehicle_id, velocity, leg.facing_forwards)
            });
        }

        let network = self.network.clone();
        let vehicle = self.vehicle.clone();
        let explicit_t = self.target_t;
        let journey = journey.and_then(move |_| {
            vehicle
                .borrow_mut()
                .set_current_road_segment(last.segment, last.facing_forwards);
            match explicit_t {
                Some(t) => network.park(last.segment, vehicle_id, velocity, last.facing_forwards, t),
                None => network.park_at_default(last.segment, vehicle_id, velocity, last.facing_forwards),
            }
        });

        complete_when_settled(&journey, done, vehicle_id);
    }
}

/// Signal completion whatever the outcome; failures are only logged.
fn complete_when_settled(
    operation: &Promise<bool>,
    done: CommandCompletion,
    vehicle_id: VehicleId,
) {
    operation.when_settled(move |outcome| {
        if let Err(err) = outcome {
            warn!("{vehicle_id}: move ended early: {err}");
        }
        done.signal();
    });
}
