//! ROS 2 interface for the scan simulator
//!
//! This module handles all communication with ROS 2, including:
//! - Receiving occupancy grids and feeding them to the grid store
//! - Tracking `/tf` and `/tf_static` for the sensor pose
//! - Publishing simulated scans and the map image frame

mod publisher;
mod subscriber;

use futures::executor::LocalPool;
use log::info;
use r2r::{Context, Node, QosProfile};
use std::sync::Arc;
use std::time::Duration;

use crate::core::transforms::{SharedTransforms, planar_isometry};
use crate::{FrameConfig, GridStore, LaserScan, MapMessage, Result, SimConfig};

pub use publisher::*;
pub use subscriber::*;

/// Owns the ROS node and the futures driving its subscriptions
pub struct RosInterface {
    node: Node,
    pool: LocalPool,
    store: Arc<GridStore>,
    transforms: SharedTransforms,
    frames: FrameConfig,
    tf_publisher: TransformPublisher,
    laser_topic: String,
    qos_depth: usize,
}

impl RosInterface {
    /// Create the node and start listening for maps and transforms
    pub fn new(config: &SimConfig, store: Arc<GridStore>) -> Result<Self> {
        let context = Context::create()?;
        let mut node = Node::create(context, &config.ros.node_name, "")?;
        let qos_depth = config.ros.qos_depth.max(1);

        // map_server and /tf_static latch their messages
        let latched = QosProfile::default().keep_last(qos_depth).transient_local();
        let volatile = QosProfile::default().keep_last(qos_depth.max(10));

        let pool = LocalPool::new();
        let spawner = pool.spawner();
        let transforms = SharedTransforms::new();

        let maps = node.subscribe::<r2r::nav_msgs::msg::OccupancyGrid>(&config.ros.map_topic, latched.clone())?;
        spawn_map_listener(&spawner, maps, store.clone(), config.driver.occupied_threshold)?;

        let tf = node.subscribe::<r2r::tf2_msgs::msg::TFMessage>("/tf", volatile)?;
        spawn_tf_listener(&spawner, tf, transforms.clone(), false)?;
        let tf_static = node.subscribe::<r2r::tf2_msgs::msg::TFMessage>("/tf_static", latched)?;
        spawn_tf_listener(&spawner, tf_static, transforms.clone(), true)?;

        let tf_publisher = TransformPublisher::new(&mut node, "/tf", qos_depth)?;
        info!(
            "ROS node '{}' listening on {}, publishing on {}",
            config.ros.node_name, config.ros.map_topic, config.ros.laser_topic
        );

        Ok(RosInterface {
            node,
            pool,
            store,
            transforms,
            frames: config.frames.clone(),
            tf_publisher,
            laser_topic: config.ros.laser_topic.clone(),
            qos_depth,
        })
    }

    /// Pose source backed by the transform listeners
    pub fn pose_source(&self) -> SharedTransforms {
        self.transforms.clone()
    }

    /// Sink publishing scans on the configured laser topic
    pub fn scan_publisher(&mut self) -> Result<ScanPublisher> {
        ScanPublisher::new(&mut self.node, &self.laser_topic, self.qos_depth)
    }

    /// Process pending messages without blocking longer than `timeout`
    pub fn spin_once(&mut self, timeout: Duration) {
        self.node.spin_once(timeout);
        self.pool.run_until_stalled();
    }

    /// Broadcast the map to map-image transform for the current map, if any
    pub fn broadcast_image_frame(&self, stamp: Duration) -> Result<()> {
        let Some(grid) = self.store.current() else {
            return Ok(());
        };
        let origin = grid.origin();
        // Register the image frame in the local buffer too, so lookups against it resolve
        self.transforms.insert(
            &self.frames.map_frame,
            &self.frames.image_frame,
            origin.image_transform(),
            stamp,
            false,
        );
        self.tf_publisher.publish(
            &self.frames.map_frame,
            &self.frames.image_frame,
            origin.x,
            origin.y,
            stamp,
        )
    }
}

/// Convert a ROS occupancy grid into a map message
pub fn map_message_from_ros(msg: &r2r::nav_msgs::msg::OccupancyGrid) -> MapMessage {
    let pose = &msg.info.origin;
    let origin = planar_isometry(
        pose.position.x,
        pose.position.y,
        pose.orientation.x,
        pose.orientation.y,
        pose.orientation.z,
        pose.orientation.w,
    );
    MapMessage {
        width: msg.info.width,
        height: msg.info.height,
        resolution: f64::from(msg.info.resolution),
        origin: [pose.position.x, pose.position.y, origin.rotation.angle()],
        data: msg.data.clone(),
    }
}

/// Convert a simulated scan into a ROS LaserScan message
pub fn laser_scan_to_ros(scan: &LaserScan) -> r2r::sensor_msgs::msg::LaserScan {
    r2r::sensor_msgs::msg::LaserScan {
        header: r2r::std_msgs::msg::Header {
            stamp: time_to_ros(scan.stamp),
            frame_id: scan.frame_id.clone(),
        },
        angle_min: scan.angle_min,
        angle_max: scan.angle_max,
        angle_increment: scan.angle_increment,
        time_increment: 0.0,
        scan_time: 0.0,
        range_min: scan.range_min,
        range_max: scan.range_max,
        ranges: scan.ranges.clone(),
        intensities: Vec::new(),
    }
}

/// Time since the Unix epoch as a ROS time message
pub fn time_to_ros(stamp: Duration) -> r2r::builtin_interfaces::msg::Time {
    r2r::builtin_interfaces::msg::Time {
        sec: i32::try_from(stamp.as_secs()).unwrap_or(i32::MAX),
        nanosec: stamp.subsec_nanos(),
    }
}

/// ROS time message as time since the Unix epoch; negative times clamp to zero
pub fn time_from_ros(time: &r2r::builtin_interfaces::msg::Time) -> Duration {
    if time.sec < 0 {
        return Duration::ZERO;
    }
    Duration::new(time.sec as u64, time.nanosec)
}
