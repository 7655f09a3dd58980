//! Rejection reasons carried by promises.

use thiserror::Error;

use super::types::{SegmentId, VehicleId};

/// Why a road operation (or a chain built on one) did not succeed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// The resource is already in a conflicting state
    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error("no path from {from} to {to}")]
    NoPathFound { from: SegmentId, to: SegmentId },

    /// Spacing contention persisted past the blocked-tick threshold
    #[error("{vehicle} blocked on {segment} for {ticks} ticks, parking")]
    Blockage {
        vehicle: VehicleId,
        segment: SegmentId,
        ticks: u32,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0} not found")]
    UnknownSegment(SegmentId),

    #[error("{0} not found")]
    UnknownVehicle(VehicleId),
}

impl SimError {
    pub fn precondition(message: impl Into<String>) -> Self {
        SimError::Precondition(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        SimError::InvalidArgument(message.into())
    }

    pub fn is_blockage(&self) -> bool {
        matches!(self, SimError::Blockage { .. })
    }
}
