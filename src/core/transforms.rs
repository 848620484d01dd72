// core/transforms.rs

// Planar transform tree. Each entry holds the pose of a child frame in its
// parent; lookups compose the chains of both frames up to a shared ancestor.
// Fed from /tf and /tf_static by the ROS node, or directly by tests.

use log::debug;
use nalgebra::{Isometry2, Vector2};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::pose::{PoseSource, PoseUnavailable, StampedPose, now};

// Longest parent chain followed before assuming a cycle
const MAX_CHAIN: usize = 64;

#[derive(Debug, Clone)]
struct Edge {
    parent: String,
    transform: Isometry2<f64>,
    stamp: Duration,
    is_static: bool,
}

/// Latest known transform per child frame
#[derive(Debug, Default)]
pub struct TransformBuffer {
    edges: HashMap<String, Edge>,
}

impl TransformBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the pose of `child` in `parent`, replacing any earlier edge of `child`
    pub fn insert(
        &mut self,
        parent: &str,
        child: &str,
        transform: Isometry2<f64>,
        stamp: Duration,
        is_static: bool,
    ) {
        if parent.is_empty() || child.is_empty() || parent == child {
            debug!("Ignoring degenerate transform '{}' -> '{}'", parent, child);
            return;
        }
        self.edges.insert(
            child.to_string(),
            Edge {
                parent: parent.to_string(),
                transform,
                stamp,
                is_static,
            },
        );
    }

    /// Number of child frames known
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether no transform has been recorded
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Pose of `source` expressed in `target`
    pub fn lookup(&self, target: &str, source: &str) -> Result<StampedPose, PoseUnavailable> {
        let source_chain = self.chain(source)?;
        let target_chain = self.chain(target)?;

        for (frame, in_frame_source, source_stamp) in &source_chain {
            if let Some((_, in_frame_target, target_stamp)) =
                target_chain.iter().find(|(f, _, _)| f == frame)
            {
                let pose = in_frame_target.inverse() * in_frame_source;
                let stamp = match (source_stamp, target_stamp) {
                    (Some(a), Some(b)) => (*a).min(*b),
                    (Some(a), None) | (None, Some(a)) => *a,
                    (None, None) => now(),
                };
                return Ok(StampedPose { pose, stamp });
            }
        }

        Err(PoseUnavailable::new(format!(
            "no transform connects '{}' to '{}'",
            source, target
        )))
    }

    // Every ancestor of `frame` with the pose of `frame` in it and the oldest
    // dynamic stamp along the way
    fn chain(&self, frame: &str) -> Result<Vec<(String, Isometry2<f64>, Option<Duration>)>, PoseUnavailable> {
        let mut chain = vec![(frame.to_string(), Isometry2::identity(), None)];
        let mut current = frame;
        let mut accumulated = Isometry2::identity();
        let mut stamp: Option<Duration> = None;

        while let Some(edge) = self.edges.get(current) {
            if chain.len() > MAX_CHAIN {
                return Err(PoseUnavailable::new(format!(
                    "transform chain from '{}' does not terminate",
                    frame
                )));
            }
            accumulated = edge.transform * accumulated;
            if !edge.is_static {
                stamp = Some(stamp.map_or(edge.stamp, |s| s.min(edge.stamp)));
            }
            chain.push((edge.parent.clone(), accumulated, stamp));
            current = &edge.parent;
        }
        Ok(chain)
    }
}

/// Transform buffer shared between the subscription side and the driver
#[derive(Debug, Clone, Default)]
pub struct SharedTransforms {
    inner: Arc<Mutex<TransformBuffer>>,
}

impl SharedTransforms {
    /// Create an empty shared buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transform, see [`TransformBuffer::insert`]
    pub fn insert(
        &self,
        parent: &str,
        child: &str,
        transform: Isometry2<f64>,
        stamp: Duration,
        is_static: bool,
    ) {
        self.inner
            .lock()
            .insert(parent, child, transform, stamp, is_static);
    }
}

impl PoseSource for SharedTransforms {
    fn lookup(&mut self, map_frame: &str, sensor_frame: &str) -> Result<StampedPose, PoseUnavailable> {
        self.inner.lock().lookup(map_frame, sensor_frame)
    }
}

/// Planar isometry from a 3D translation and unit quaternion, dropping roll and pitch
pub fn planar_isometry(tx: f64, ty: f64, qx: f64, qy: f64, qz: f64, qw: f64) -> Isometry2<f64> {
    Isometry2::new(Vector2::new(tx, ty), yaw_from_quaternion(qx, qy, qz, qw))
}

/// Rotation about Z of a unit quaternion
pub fn yaw_from_quaternion(x: f64, y: f64, z: f64, w: f64) -> f64 {
    (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z))
}
