//! Road simulation control core
//!
//! Promises, per-agent command queues and the road network traffic model.
//! Everything here is single-threaded and advanced by explicit ticks, so it
//! can be driven headless from tests or the console.

mod agent;
mod command;
mod curve;
mod error;
mod pathfinding;
mod promise;
mod road_network;
mod road_segment;
mod road_vehicle;
mod types;
mod vehicle_move;
mod world;

pub use agent::ControllableAgent;
pub use command::{Command, CommandCompletion, SharedPosition, TalkCommand, TeleportCommand};
pub use curve::RoadCurve;
pub use error::SimError;
pub use pathfinding::{find_path, find_path_no_turnaround, PathLeg, RoadGraph, RoadPath};
pub use promise::{Promise, Settlement};
pub use road_network::{RoadNetwork, RoadNetworkHandle};
pub use road_segment::{MotionKind, PendingSettlement, RoadSegment, RoadSegmentConfig};
pub use road_vehicle::{MovedToNewRoadListener, RoadVehicle, SharedRoadVehicle};
pub use types::{
    AgentId, Position, SegmentEnd, SegmentId, SimId, VehicleId, BLOCKED_DISTANCE_EPSILON,
    DEFAULT_MIN_VEHICLE_DISTANCE, DEFAULT_PARKING_T, DEFAULT_VEHICLE_VELOCITY,
    MIN_BLOCKED_TICKS_TO_STOP,
};
pub use vehicle_move::RoadVehicleMoveCommand;
pub use world::{SimWorld, VehicleEntry};
