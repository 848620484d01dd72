// core/pose.rs

// Sensor poses and their conversion into the grid's pixel frame. The map frame
// pose comes from an external source (a transform tree, a fixed replay pose);
// this module only subtracts the map's declared origin and rescales to cells.

use nalgebra::{Isometry2, Vector2};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Pose in the grid pixel frame: cell units, yaw in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose2D {
    /// Column coordinate (continuous, cell (c, _) spans `c..c+1`)
    pub x: f64,
    /// Row coordinate
    pub y: f64,
    /// Heading, counter-clockwise from the +X axis
    pub yaw: f64,
}

impl Pose2D {
    /// Create a pixel-frame pose
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Pose2D { x, y, yaw }
    }
}

/// Sensor pose in the map frame plus the time it is valid for
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampedPose {
    /// Sensor pose relative to the map frame (meters, radians)
    pub pose: Isometry2<f64>,
    /// Time since the Unix epoch the pose refers to
    pub stamp: Duration,
}

impl StampedPose {
    /// Build from planar components
    pub fn new(x: f64, y: f64, yaw: f64, stamp: Duration) -> Self {
        StampedPose {
            pose: Isometry2::new(Vector2::new(x, y), yaw),
            stamp,
        }
    }
}

/// Map-frame placement of a grid: where the corner of cell (0, 0) sits
///
/// Grid rows and columns are taken to run along the map frame's Y and X axes.
/// `yaw` is carried for reference but does not rotate the image frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GridOrigin {
    /// X of the cell (0, 0) corner, meters
    pub x: f64,
    /// Y of the cell (0, 0) corner, meters
    pub y: f64,
    /// Declared yaw of the map origin, radians (ignored for conversion)
    pub yaw: f64,
}

impl GridOrigin {
    /// Create an origin
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        GridOrigin { x, y, yaw }
    }

    /// All components finite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.yaw.is_finite()
    }

    /// Transform from the map frame to the image frame (pure translation)
    pub fn image_transform(&self) -> Isometry2<f64> {
        Isometry2::translation(self.x, self.y)
    }

    /// Express a map-frame sensor pose in pixel units of a grid at `resolution`
    pub fn to_pixel_pose(&self, pose: &StampedPose, resolution: f64) -> Pose2D {
        let in_image = self.image_transform().inverse() * pose.pose;
        let t = in_image.translation.vector;
        Pose2D {
            x: t.x / resolution,
            y: t.y / resolution,
            yaw: in_image.rotation.angle(),
        }
    }
}

/// Lookup of the sensor pose failed; the tick should be skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoseUnavailable {
    /// Why the pose could not be resolved
    pub reason: String,
}

impl PoseUnavailable {
    /// Create with a reason
    pub fn new(reason: impl Into<String>) -> Self {
        PoseUnavailable {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for PoseUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Pose unavailable: {}", self.reason)
    }
}

impl std::error::Error for PoseUnavailable {}

/// Supplier of the sensor pose relative to the map frame
///
/// Implementations must answer promptly; a pose that is not known yet is
/// reported as [`PoseUnavailable`], never as a zero pose.
pub trait PoseSource {
    /// Latest pose of `sensor_frame` expressed in `map_frame`
    fn lookup(&mut self, map_frame: &str, sensor_frame: &str)
    -> Result<StampedPose, PoseUnavailable>;
}

/// Fixed sensor pose, stamped with wall-clock time on every lookup
#[derive(Debug, Clone)]
pub struct StaticPoseSource {
    pose: Isometry2<f64>,
}

impl StaticPoseSource {
    /// Sensor fixed at `(x, y, yaw)` in the map frame
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        StaticPoseSource {
            pose: Isometry2::new(Vector2::new(x, y), yaw),
        }
    }
}

impl PoseSource for StaticPoseSource {
    fn lookup(&mut self, _map_frame: &str, _sensor_frame: &str) -> Result<StampedPose, PoseUnavailable> {
        Ok(StampedPose {
            pose: self.pose,
            stamp: now(),
        })
    }
}

/// Wall-clock time since the Unix epoch
pub fn now() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}
