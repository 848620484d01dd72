// src/ros_interface/publisher.rs
// Outgoing topics: simulated scans and the map image frame transform.

use log::error;
use r2r::QosProfile;
use std::time::Duration;

use super::{laser_scan_to_ros, time_to_ros};
use crate::{LaserScan, Result, ScanSink};

/// Scan sink publishing `sensor_msgs/LaserScan`
pub struct ScanPublisher {
    inner: r2r::Publisher<r2r::sensor_msgs::msg::LaserScan>,
}

impl ScanPublisher {
    /// Create a publisher on `topic`
    pub fn new(node: &mut r2r::Node, topic: &str, depth: usize) -> Result<Self> {
        let inner = node.create_publisher(topic, QosProfile::default().keep_last(depth))?;
        Ok(ScanPublisher { inner })
    }
}

impl ScanSink for ScanPublisher {
    fn emit(&mut self, scan: LaserScan) {
        if let Err(e) = self.inner.publish(&laser_scan_to_ros(&scan)) {
            error!("Failed to publish scan: {}", e);
        }
    }
}

/// Publisher of planar transforms on `/tf`
pub struct TransformPublisher {
    inner: r2r::Publisher<r2r::tf2_msgs::msg::TFMessage>,
}

impl TransformPublisher {
    /// Create a publisher on `topic`
    pub fn new(node: &mut r2r::Node, topic: &str, depth: usize) -> Result<Self> {
        let inner = node.create_publisher(topic, QosProfile::default().keep_last(depth))?;
        Ok(TransformPublisher { inner })
    }

    /// Publish a pure translation of `child` in `parent`
    pub fn publish(&self, parent: &str, child: &str, x: f64, y: f64, stamp: Duration) -> Result<()> {
        let transform = r2r::geometry_msgs::msg::TransformStamped {
            header: r2r::std_msgs::msg::Header {
                stamp: time_to_ros(stamp),
                frame_id: parent.to_string(),
            },
            child_frame_id: child.to_string(),
            transform: r2r::geometry_msgs::msg::Transform {
                translation: r2r::geometry_msgs::msg::Vector3 { x, y, z: 0.0 },
                rotation: r2r::geometry_msgs::msg::Quaternion {
                    x: 0.0,
                    y: 0.0,
                    z: 0.0,
                    w: 1.0,
                },
            },
        };
        self.inner.publish(&r2r::tf2_msgs::msg::TFMessage {
            transforms: vec![transform],
        })?;
        Ok(())
    }
}
