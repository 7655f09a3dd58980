//! Main simulation world that ties everything together
//!
//! Owns the road network, the road vehicles and one command queue per
//! vehicle. The host loop calls `tick` with the frame's delta time.

use anyhow::{Context, Result};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

use super::agent::ControllableAgent;
use super::command::{Command, CommandCompletion};
use super::curve::RoadCurve;
use super::error::SimError;
use super::road_network::{RoadNetwork, RoadNetworkHandle};
use super::road_segment::RoadSegmentConfig;
use super::road_vehicle::{RoadVehicle, SharedRoadVehicle};
use super::types::{AgentId, Position, SegmentEnd, SegmentId, SimId, VehicleId};
use super::vehicle_move::RoadVehicleMoveCommand;

/// A road vehicle together with the queue that directs it
#[derive(Clone)]
pub struct VehicleEntry {
    pub vehicle: SharedRoadVehicle,
    pub agent: ControllableAgent,
}

/// The main simulation world
pub struct SimWorld {
    /// Segments and their occupancy
    pub network: RoadNetworkHandle,

    /// All vehicles, by id
    vehicles: BTreeMap<VehicleId, VehicleEntry>,

    /// Next ID to assign to vehicles and agents
    next_id: usize,

    /// Simulation time
    pub time: f32,

    /// Ticks run so far
    pub ticks: u64,

    /// Optional seeded RNG for reproducible simulations
    rng: Option<StdRng>,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    fn new_internal(rng: Option<StdRng>) -> Self {
        Self {
            network: RoadNetworkHandle::new(RoadNetwork::new()),
            vehicles: BTreeMap::new(),
            next_id: 0,
            time: 0.0,
            ticks: 0,
            rng,
        }
    }

    pub fn new() -> Self {
        Self::new_internal(None)
    }

    /// Create a new SimWorld with a seeded RNG for reproducible simulations
    pub fn new_with_seed(seed: u64) -> Self {
        Self::new_internal(Some(StdRng::seed_from_u64(seed)))
    }

    fn next_sim_id(&mut self) -> SimId {
        let id = SimId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Add a segment following the given control points
    pub fn add_segment(&mut self, points: Vec<Position>, config: RoadSegmentConfig) -> SegmentId {
        self.network
            .borrow_mut()
            .add_segment(RoadCurve::new(points), config)
    }

    /// Join two segment ends so vehicles can drive across in both directions
    pub fn link(
        &mut self,
        a: SegmentId,
        a_end: SegmentEnd,
        b: SegmentId,
        b_end: SegmentEnd,
    ) -> Result<()> {
        self.network
            .borrow_mut()
            .link(a, a_end, b, b_end)
            .with_context(|| format!("Failed to link {a} and {b}"))
    }

    /// One-way connection: `to` becomes reachable from the start
    /// (`at_start`) or end of `from`, entered through its start if `by_start`
    pub fn connect(
        &mut self,
        from: SegmentId,
        at_start: bool,
        to: SegmentId,
        by_start: bool,
    ) -> Result<()> {
        self.network
            .borrow_mut()
            .add_connected_road(from, at_start, to, by_start)
            .with_context(|| format!("Failed to connect {from} to {to}"))
    }

    /// Place a new vehicle parked on `segment` at `t`
    pub fn spawn_vehicle(
        &mut self,
        segment: SegmentId,
        t: f32,
        facing_forwards: bool,
    ) -> Result<VehicleId> {
        let id = VehicleId(self.next_sim_id());
        self.network
            .borrow_mut()
            .place_parked(segment, id, t)
            .with_context(|| format!("Failed to place {id} on {segment}"))?;

        let mut vehicle = RoadVehicle::new(id);
        vehicle.set_current_road_segment(segment, facing_forwards);
        vehicle.on_moved_to_new_road(move |segment, entered_by_start| {
            info!("{id} entered {segment} (from start: {entered_by_start})");
        });

        let agent = ControllableAgent::new(AgentId(self.next_sim_id()));
        self.vehicles.insert(
            id,
            VehicleEntry {
                vehicle: vehicle.shared(),
                agent,
            },
        );
        Ok(id)
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&VehicleEntry> {
        self.vehicles.get(&id)
    }

    pub fn vehicle_ids(&self) -> Vec<VehicleId> {
        self.vehicles.keys().copied().collect()
    }

    /// Queue an arbitrary command on a vehicle's agent
    pub fn enqueue(&self, id: VehicleId, command: Box<dyn Command>) -> Result<CommandCompletion> {
        let entry = self
            .vehicles
            .get(&id)
            .ok_or(SimError::UnknownVehicle(id))?;
        Ok(entry.agent.add_boxed_command(command))
    }

    /// Queue a drive to `destination`, parking at `target_t` or the default spot
    pub fn command_vehicle(
        &self,
        id: VehicleId,
        destination: SegmentId,
        target_t: Option<f32>,
        velocity: f32,
    ) -> Result<CommandCompletion> {
        let entry = self
            .vehicles
            .get(&id)
            .ok_or(SimError::UnknownVehicle(id))?;

        let command = RoadVehicleMoveCommand::new(
            self.network.clone(),
            entry.vehicle.clone(),
            destination,
            velocity,
        );
        let command = match target_t {
            Some(t) => command.with_target_t(t),
            None => command,
        };
        Ok(entry.agent.add_command(command))
    }

    /// Pick a random segment, using seeded RNG if available
    pub fn random_destination(&mut self) -> Option<SegmentId> {
        let ids: Vec<SegmentId> = self.network.borrow().segments().map(|s| s.id()).collect();
        match &mut self.rng {
            Some(rng) => ids.choose(rng).copied(),
            None => ids.choose(&mut rand::rng()).copied(),
        }
    }

    /// Advance the simulation by one tick
    pub fn tick(&mut self, delta_secs: f32) {
        self.network.tick(delta_secs);
        self.time += delta_secs;
        self.ticks += 1;
    }

    /// True when no vehicle is moving and no command is active or queued
    pub fn is_idle(&self) -> bool {
        let network = self.network.borrow();
        let moving = network
            .segments()
            .flat_map(|s| s.vehicles())
            .any(|(_, _, is_moving)| is_moving);
        !moving
            && self
                .vehicles
                .values()
                .all(|entry| !entry.agent.is_executing() && entry.agent.pending_count() == 0)
    }

    /// World position of a vehicle, if it is on a segment
    pub fn vehicle_position(&self, id: VehicleId) -> Option<Position> {
        let network = self.network.borrow();
        let segment = network.segment(network.find_vehicle(id)?)?;
        let t = segment.vehicle_t(id)?;
        Some(segment.curve().position_at(t))
    }

    /// Create a small test world: a straight road between two loops
    pub fn create_test_world() -> Self {
        Self::build_test_world(Self::new())
    }

    /// Create a test world with a seeded RNG
    pub fn create_test_world_with_seed(seed: u64) -> Self {
        Self::build_test_world(Self::new_with_seed(seed))
    }

    /// Lays out `loop_west -- road -- loop_east`. Driving off either end of
    /// the road takes a vehicle around a loop and back onto the road.
    pub fn build_test_world(mut world: SimWorld) -> Self {
        let parking = RoadSegmentConfig {
            parking_spot: Some(0.5),
            ..RoadSegmentConfig::default()
        };

        let road = world.add_segment(
            vec![Position::new(0.0, 0.0, 0.0), Position::new(100.0, 0.0, 0.0)],
            RoadSegmentConfig::default(),
        );
        let loop_west = world.add_segment(
            vec![
                Position::new(0.0, 0.0, 0.0),
                Position::new(-30.0, 0.0, 20.0),
                Position::new(-60.0, 0.0, 0.0),
                Position::new(-30.0, 0.0, -20.0),
                Position::new(0.0, 0.0, 0.0),
            ],
            parking,
        );
        let loop_east = world.add_segment(
            vec![
                Position::new(100.0, 0.0, 0.0),
                Position::new(130.0, 0.0, 20.0),
                Position::new(160.0, 0.0, 0.0),
                Position::new(130.0, 0.0, -20.0),
                Position::new(100.0, 0.0, 0.0),
            ],
            parking,
        );

        // road -> loop entry is one-way; both loop ends lead back onto the road
        let connections = [
            (road, true, loop_west, true),
            (loop_west, true, road, true),
            (loop_west, false, road, true),
            (road, false, loop_east, true),
            (loop_east, true, road, false),
            (loop_east, false, road, false),
        ];
        for (from, at_start, to, by_start) in connections {
            if let Err(err) = world.connect(from, at_start, to, by_start) {
                warn!("test world: {err:#}");
            }
        }

        for segment in [loop_west, loop_east] {
            if let Err(err) = world.spawn_vehicle(segment, 0.5, true) {
                warn!("test world: {err:#}");
            }
        }

        world
    }

    /// Print a summary of the world state
    pub fn print_summary(&self) {
        let network = self.network.borrow();
        println!("=== Road Simulation Summary ===");
        println!("Time: {:.2}s ({} ticks)", self.time, self.ticks);
        println!(
            "Segments: {}, Vehicles: {}",
            network.segment_count(),
            self.vehicles.len()
        );

        println!("--- Segments ---");
        for segment in network.segments() {
            println!(
                "  {}: length={:.1}, vehicles={}",
                segment.id(),
                segment.length(),
                segment.vehicle_count()
            );
            for (vehicle, t, is_moving) in segment.vehicles() {
                let position = segment.curve().position_at(t);
                println!(
                    "    {vehicle}: t={t:.3}, position=({:.1}, {:.1}), {}",
                    position.x,
                    position.z,
                    if is_moving { "moving" } else { "parked" }
                );
            }
        }

        println!("--- Agents ---");
        for (id, entry) in &self.vehicles {
            println!(
                "  {id}: executing={}, queued={}, completed={}",
                entry.agent.is_executing(),
                entry.agent.pending_count(),
                entry.agent.completed_count()
            );
        }
    }
}
