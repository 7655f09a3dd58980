//! Road vehicle state: which segment it is on and which way it faces

use log::debug;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::types::{SegmentId, VehicleId};

/// Listener for "moved to new segment": receives the new segment and whether
/// it was entered at its start
pub type MovedToNewRoadListener = Box<dyn FnMut(SegmentId, bool)>;

pub struct RoadVehicle {
    id: VehicleId,
    current_segment: Option<SegmentId>,
    /// True when oriented start -> end on the current segment
    facing_forwards: bool,
    listeners: Vec<MovedToNewRoadListener>,
}

/// A vehicle shared between the world and the commands that drive it
pub type SharedRoadVehicle = Rc<RefCell<RoadVehicle>>;

impl fmt::Debug for RoadVehicle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoadVehicle")
            .field("id", &self.id)
            .field("current_segment", &self.current_segment)
            .field("facing_forwards", &self.facing_forwards)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl RoadVehicle {
    pub fn new(id: VehicleId) -> Self {
        Self {
            id,
            current_segment: None,
            facing_forwards: true,
            listeners: Vec::new(),
        }
    }

    pub fn shared(self) -> SharedRoadVehicle {
        Rc::new(RefCell::new(self))
    }

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn current_road_segment(&self) -> Option<SegmentId> {
        self.current_segment
    }

    pub fn is_currently_facing_forwards(&self) -> bool {
        self.facing_forwards
    }

    /// Set segment and orientation together so listeners always see a
    /// consistent pair. Listeners fire only when the segment changes.
    ///
    /// Listeners run while the vehicle is mutably borrowed and must not
    /// borrow it again.
    pub fn set_current_road_segment(&mut self, segment: SegmentId, facing_forwards: bool) {
        self.facing_forwards = facing_forwards;
        let previous = self.current_segment.replace(segment);

        if previous != Some(segment) {
            debug!("{} moved to {segment} (forwards: {facing_forwards})", self.id);
            for listener in &mut self.listeners {
                listener(segment, facing_forwards);
            }
        }
    }

    pub fn on_moved_to_new_road(&mut self, listener: impl FnMut(SegmentId, bool) + 'static) {
        self.listeners.push(Box::new(listener));
    }
}
