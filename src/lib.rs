//! grid_scan_sim - simulated laser scans from occupancy grids
//!
//! This library ray-casts a 2D occupancy grid from a sensor pose and returns
//! the range readings a planar laser scanner would report at that pose. It is
//! meant for simulation, testing and offline replay where no real sensor is
//! attached.
//!
//! The pieces, leaf first:
//! - [`core::grid::OccupancyGrid`]: immutable obstacle grid snapshot
//! - [`core::grid_store::GridStore`]: holds the latest grid, swapped atomically
//! - [`core::raycast`]: the pure scan generator
//! - [`core::driver::ScanDriver`]: per-tick orchestration (map gate, pose, emit)
//! - [`core::schedule::TickScheduler`]: fixed-rate tick loop
//! - [`core::transforms::TransformBuffer`]: planar transform tree for pose lookup
//! - [`io::map_file`]: map_server YAML + image loading

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// Grid, ray casting, pose handling and the scan driver
pub mod core;
/// Map file loading
pub mod io;
#[cfg(feature = "ros")]
pub mod ros_interface;

use serde::{Deserialize, Serialize};
use std::path::Path;

// Re-export commonly used items for easier access
pub use crate::core::{
    CellState, CollectingSink, DriverState, GridOrigin, GridStore, LaserScan, LogSink, MapMessage,
    MinRangePolicy, NO_RETURN, OccupancyGrid, Pose2D, PoseSource, PoseUnavailable, RayCaster,
    ScanConfig, ScanDriver, ScanResult, ScanSink, SharedTransforms, SkipReason, StampedPose,
    StaticPoseSource, TickOutcome, TickScheduler, TickStats, TransformBuffer, cast_scan,
};

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level configuration, usually loaded from a YAML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Angular and range parameters of the simulated scanner
    pub scan: ScanConfig,
    /// Frame identifiers
    pub frames: FrameConfig,
    /// Driver loop settings
    pub driver: DriverConfig,
    /// ROS 2 node settings (only read by the `ros` feature)
    pub ros: RosConfig,
    /// Offline replay settings used by the standalone binary
    pub replay: Option<ReplayConfig>,
}

/// Frame identifiers used for pose lookup and scan stamping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Frame the map is published in
    pub map_frame: String,
    /// Frame attached to the map image, cell (0, 0) corner at its origin
    pub image_frame: String,
    /// Frame of the simulated laser; stamped onto every scan
    pub laser_frame: String,
}

/// Driver loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Scan generation rate in Hz
    pub rate_hz: f64,
    /// Occupancy value at or above which a cell blocks rays
    pub occupied_threshold: i8,
}

/// ROS 2 specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RosConfig {
    /// Node name
    pub node_name: String,
    /// Topic the occupancy grid arrives on
    pub map_topic: String,
    /// Topic the simulated scan is published on
    pub laser_topic: String,
    /// QoS history depth
    pub qos_depth: usize,
}

/// Offline replay: a map file and a fixed sensor pose
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Path to a map_server YAML file, relative paths resolve against the config file
    pub map_yaml: String,
    /// Sensor pose in the map frame as `[x, y, yaw]`
    pub sensor_pose: [f64; 3],
    /// Stop after this many ticks; runs until interrupted when absent
    #[serde(default)]
    pub ticks: Option<u64>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        FrameConfig {
            map_frame: "map".to_string(),
            image_frame: "map_image".to_string(),
            laser_frame: "laser".to_string(),
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            rate_hz: 10.0,
            occupied_threshold: 65,
        }
    }
}

impl Default for RosConfig {
    fn default() -> Self {
        RosConfig {
            node_name: "grid_scan_sim".to_string(),
            map_topic: "/map".to_string(),
            laser_topic: "/scan".to_string(),
            qos_depth: 1,
        }
    }
}

impl SimConfig {
    /// Load and validate a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&content)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a configuration from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: SimConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section for values the driver cannot run with
    pub fn validate(&self) -> Result<()> {
        self.scan.validate()?;

        if !self.driver.rate_hz.is_finite() || self.driver.rate_hz <= 0.0 {
            return Err(SimError::Config(format!(
                "driver.rate_hz must be positive, got {}",
                self.driver.rate_hz
            )));
        }
        if !(1..=100).contains(&self.driver.occupied_threshold) {
            return Err(SimError::Config(format!(
                "driver.occupied_threshold must be in 1..=100, got {}",
                self.driver.occupied_threshold
            )));
        }
        for (name, value) in [
            ("frames.map_frame", &self.frames.map_frame),
            ("frames.image_frame", &self.frames.image_frame),
            ("frames.laser_frame", &self.frames.laser_frame),
        ] {
            if value.is_empty() {
                return Err(SimError::Config(format!("{} must not be empty", name)));
            }
        }
        if let Some(replay) = &self.replay {
            if replay.sensor_pose.iter().any(|v| !v.is_finite()) {
                return Err(SimError::Config(
                    "replay.sensor_pose must be finite".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// grid_scan_sim error types
#[derive(Debug)]
pub enum SimError {
    /// Malformed scan configuration or grid; fatal to the call that hit it
    Config(String),
    /// Map message or map file could not be turned into a grid
    Map(String),
    /// Filesystem error
    Io(std::io::Error),
    /// YAML parse error
    Yaml(serde_yaml::Error),
    /// ROS 2 transport error
    #[cfg(feature = "ros")]
    Ros(String),
}

impl std::fmt::Display for SimError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SimError::Config(msg) => write!(f, "Configuration error: {}", msg),
            SimError::Map(msg) => write!(f, "Map error: {}", msg),
            SimError::Io(err) => write!(f, "I/O error: {}", err),
            SimError::Yaml(err) => write!(f, "YAML error: {}", err),
            #[cfg(feature = "ros")]
            SimError::Ros(msg) => write!(f, "ROS error: {}", msg),
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::Io(err) => Some(err),
            SimError::Yaml(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SimError {
    fn from(err: std::io::Error) -> Self {
        SimError::Io(err)
    }
}

impl From<serde_yaml::Error> for SimError {
    fn from(err: serde_yaml::Error) -> Self {
        SimError::Yaml(err)
    }
}

#[cfg(feature = "ros")]
impl From<r2r::Error> for SimError {
    fn from(err: r2r::Error) -> Self {
        SimError::Ros(err.to_string())
    }
}

#[cfg(feature = "ros")]
impl From<futures::task::SpawnError> for SimError {
    fn from(err: futures::task::SpawnError) -> Self {
        SimError::Ros(err.to_string())
    }
}
