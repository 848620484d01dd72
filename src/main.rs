// src/main.rs
// Offline replay: loads a map file, holds the sensor at a fixed pose and logs a
// simulated scan every tick.

use grid_scan_sim::{
    GridStore, LogSink, ScanDriver, SimConfig, SimError, StaticPoseSource, TickScheduler,
    io::load_map,
};
use log::{error, info};
use std::path::Path;
use std::sync::Arc;

const DEFAULT_CONFIG: &str = "config/sim.yaml";

fn main() {
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());

    if let Err(e) = run(Path::new(&config_path)) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(config_path: &Path) -> Result<(), SimError> {
    info!("Starting grid scan simulator replay...");
    let config = SimConfig::load(config_path)?;
    let replay = config.replay.clone().ok_or_else(|| {
        SimError::Config(format!(
            "{} has no replay section",
            config_path.display()
        ))
    })?;

    let base = config_path.parent().unwrap_or(Path::new("."));
    let map = load_map(base.join(&replay.map_yaml))?;

    let [x, y, yaw] = replay.sensor_pose;
    let poses = StaticPoseSource::new(x, y, yaw);
    let mut driver = ScanDriver::new(&config, Arc::new(GridStore::new()), poses, LogSink::new())?;
    driver.on_map(&map)?;

    let mut scheduler = TickScheduler::new(config.driver.rate_hz)?;
    if let Some(ticks) = replay.ticks {
        scheduler = scheduler.with_max_ticks(ticks);
    }

    let ticks = scheduler.run(|| driver.tick().map(|_| ()))?;

    let stats = driver.stats();
    info!(
        "Replay finished: {} ticks, {} scans, {} skipped",
        ticks,
        stats.emitted,
        stats.skipped_no_map + stats.skipped_no_pose
    );
    Ok(())
}
