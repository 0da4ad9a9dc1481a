use crate::my_types::*;

/// One tracked point as reported by a point tracker
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlowPoint {
    pub point: Vector2d,
    /// false when the point could not be tracked
    pub status: bool,
}

/// A grid point followed from frame A to frame B and back again
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointTrack {
    pub source: Vector2d,
    pub forward: Vector2d,
    pub backward: Vector2d,
    pub forward_status: bool,
    pub backward_status: bool,
}

impl PointTrack {
    pub fn new(source: Vector2d) -> Self {
        PointTrack {
            source,
            forward: source,
            backward: source,
            forward_status: false,
            backward_status: false,
        }
    }

    pub fn is_tracked(&self) -> bool {
        self.forward_status && self.backward_status
    }

    /// Squared distance between the source and its round trip
    pub fn forward_backward_error(&self) -> f64 {
        (self.backward - self.source).norm_squared()
    }

    pub fn displacement(&self) -> Vector2d {
        self.forward - self.source
    }
}
