// src/bin/ros_node.rs
// ROS 2 node: occupancy grid in, simulated LaserScan out at a fixed rate.

use grid_scan_sim::core::pose::now;
use grid_scan_sim::ros_interface::RosInterface;
use grid_scan_sim::{GridStore, ScanDriver, SimConfig, SimError, TickScheduler};
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;

fn main() {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => SimConfig::load(&path),
        None => Ok(SimConfig::default()),
    };

    if let Err(e) = config.and_then(|config| run(&config)) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(config: &SimConfig) -> Result<(), SimError> {
    info!("Starting grid scan simulator node...");
    let store = Arc::new(GridStore::new());
    let mut ros = RosInterface::new(config, store.clone())?;

    let sink = ros.scan_publisher()?;
    let mut driver = ScanDriver::new(config, store, ros.pose_source(), sink)?;
    let scheduler = TickScheduler::new(config.driver.rate_hz)?;

    scheduler.run(|| {
        ros.spin_once(Duration::ZERO);
        ros.broadcast_image_frame(now())?;
        driver.tick().map(|_| ())
    })?;
    Ok(())
}
