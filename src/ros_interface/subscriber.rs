// src/ros_interface/subscriber.rs
// Incoming topics: occupancy grids go into the grid store, transforms into the
// shared transform buffer. Both run as local futures polled by the node loop.

use futures::executor::LocalSpawner;
use futures::task::LocalSpawnExt;
use futures::{Stream, StreamExt, future};
use log::{debug, error};
use std::sync::Arc;

use super::{map_message_from_ros, time_from_ros};
use crate::core::transforms::{SharedTransforms, planar_isometry};
use crate::{GridStore, Result};

/// Install every received occupancy grid into `store`
pub fn spawn_map_listener<S>(
    spawner: &LocalSpawner,
    maps: S,
    store: Arc<GridStore>,
    occupied_threshold: i8,
) -> Result<()>
where
    S: Stream<Item = r2r::nav_msgs::msg::OccupancyGrid> + Unpin + 'static,
{
    spawner.spawn_local(maps.for_each(move |msg| {
        let message = map_message_from_ros(&msg);
        // A rejected map leaves the previous one in place
        if let Err(e) = store.ingest(&message, occupied_threshold) {
            error!("Dropping map from {}: {}", msg.header.frame_id, e);
        }
        future::ready(())
    }))?;
    Ok(())
}

/// Feed every received transform into `transforms`
pub fn spawn_tf_listener<S>(
    spawner: &LocalSpawner,
    messages: S,
    transforms: SharedTransforms,
    is_static: bool,
) -> Result<()>
where
    S: Stream<Item = r2r::tf2_msgs::msg::TFMessage> + Unpin + 'static,
{
    spawner.spawn_local(messages.for_each(move |msg| {
        for t in &msg.transforms {
            let (tr, q) = (&t.transform.translation, &t.transform.rotation);
            debug!("tf {} -> {}", t.header.frame_id, t.child_frame_id);
            transforms.insert(
                &t.header.frame_id,
                &t.child_frame_id,
                planar_isometry(tr.x, tr.y, q.x, q.y, q.z, q.w),
                time_from_ros(&t.header.stamp),
                is_static,
            );
        }
        future::ready(())
    }))?;
    Ok(())
}
