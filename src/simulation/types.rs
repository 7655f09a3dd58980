//! Core types for the road simulation
//!
//! Identifiers, positions and the tuning constants shared by segments,
//! vehicles and commands.

use std::fmt;

/// A unique identifier for simulation entities
/// This is a simple wrapper around a usize for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimId(pub usize);

/// A wrapper type for road segment IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(pub SimId);

/// A wrapper type for road vehicle IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VehicleId(pub SimId);

/// A wrapper type for controllable agent IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AgentId(pub SimId);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "segment#{}", self.0 .0)
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vehicle#{}", self.0 .0)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0 .0)
    }
}

/// Which end of a segment a connection is made at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentEnd {
    /// Path parameter 0
    Start,
    /// Path parameter 1
    End,
}

impl SegmentEnd {
    pub fn is_start(self) -> bool {
        self == SegmentEnd::Start
    }
}

/// A 3D position in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn lerp(&self, other: &Position, t: f32) -> Position {
        Position {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }
}

/// How many ticks a vehicle must be blocked before it gives up and parks
pub const MIN_BLOCKED_TICKS_TO_STOP: u32 = 30;

/// Physical movement below this (world units per tick) counts as blocked
pub const BLOCKED_DISTANCE_EPSILON: f32 = 0.0001;

/// Default physical spacing kept between vehicles on one segment
pub const DEFAULT_MIN_VEHICLE_DISTANCE: f32 = 10.0;

/// Parking coordinate used when a segment has no dedicated parking spot
pub const DEFAULT_PARKING_T: f32 = 0.5;

/// Default vehicle speed in world units per second
pub const DEFAULT_VEHICLE_VELOCITY: f32 = 10.0;
