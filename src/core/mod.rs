// core/mod.rs

// Declares and exposes the scan simulation core: grid snapshots and their store,
// the ray caster, pose conversion and transform lookup, the per-tick driver
// and its scheduler.

/// Per-tick scan orchestration and scan sinks
pub mod driver;
/// Occupancy grid snapshots and map messages
pub mod grid;
/// Latest-map holder
pub mod grid_store;
/// Sensor poses and pixel-frame conversion
pub mod pose;
pub mod raycast;
/// Fixed-rate tick loop
pub mod schedule;
/// Planar transform tree
pub mod transforms;

// Re-export key types for a unified API
pub use driver::{
    CollectingSink, DriverState, LaserScan, LogSink, ScanDriver, ScanSink, SkipReason, TickOutcome,
    TickStats,
};
pub use grid::{CellState, MapMessage, OccupancyGrid};
pub use grid_store::GridStore;
pub use pose::{GridOrigin, Pose2D, PoseSource, PoseUnavailable, StampedPose, StaticPoseSource};
pub use raycast::{
    GridTraversal, MinRangePolicy, NO_RETURN, RayCaster, ScanConfig, ScanResult, cast_scan,
};
pub use schedule::TickScheduler;
pub use transforms::{SharedTransforms, TransformBuffer};
