// core/driver.rs

// Per-tick orchestration. The driver waits for a first map, then on every tick
// resolves the sensor pose, casts a scan against the latest grid snapshot and
// hands the stamped result to a sink. Missing map or pose skips the tick.

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

use super::grid::MapMessage;
use super::grid_store::GridStore;
use super::pose::PoseSource;
use super::raycast::{RayCaster, ScanConfig, ScanResult};
use crate::{FrameConfig, Result, SimConfig, SimError};

/// Driver lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    /// No map seen yet; ticks are skipped
    WaitingForMap,
    /// A map is available; ticks produce scans
    Ready,
}

/// Why a tick produced no scan
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// No map has been received
    NoMap,
    /// The sensor pose could not be resolved
    PoseUnavailable,
}

/// Result of one tick
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing emitted this tick
    Skipped(SkipReason),
    /// A scan was handed to the sink
    Emitted {
        /// Generation of the map the scan was cast against
        generation: u64,
        /// Rays that hit something in range
        hits: usize,
    },
}

/// Running tick counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Ticks executed
    pub ticks: u64,
    /// Scans emitted
    pub emitted: u64,
    /// Ticks skipped for lack of a map
    pub skipped_no_map: u64,
    /// Ticks skipped for lack of a pose
    pub skipped_no_pose: u64,
}

/// Stamped, frame-tagged scan ready for delivery
#[derive(Clone, Debug, PartialEq)]
pub struct LaserScan {
    /// Time the sensor pose was resolved for
    pub stamp: Duration,
    /// Sensor frame identifier
    pub frame_id: String,
    /// Angle of the first ray (rad)
    pub angle_min: f32,
    /// Angle of the last ray (rad)
    pub angle_max: f32,
    /// Angular distance between rays (rad)
    pub angle_increment: f32,
    /// Minimum range value (m)
    pub range_min: f32,
    /// Maximum range value (m)
    pub range_max: f32,
    /// Ranges in meters; `NO_RETURN` where nothing was hit
    pub ranges: Vec<f32>,
}

impl LaserScan {
    /// Wrap a scan result with its config, stamp and frame
    pub fn from_result(result: ScanResult, config: &ScanConfig, stamp: Duration, frame_id: &str) -> Self {
        let last = result.len().saturating_sub(1);
        LaserScan {
            stamp,
            frame_id: frame_id.to_string(),
            angle_min: config.angle_min as f32,
            angle_max: config.angle_at(last) as f32,
            angle_increment: config.angle_increment as f32,
            range_min: config.range_min as f32,
            range_max: config.range_max as f32,
            ranges: result.ranges,
        }
    }

    /// Rays that hit something in range
    pub fn hit_count(&self) -> usize {
        self.ranges.iter().filter(|r| r.is_finite()).count()
    }
}

/// Delivery end of the driver; no acknowledgement flows back
pub trait ScanSink {
    /// Take ownership of a finished scan
    fn emit(&mut self, scan: LaserScan);
}

/// Sink that writes a one-line summary per scan to the log
#[derive(Debug, Default)]
pub struct LogSink {
    count: u64,
}

impl LogSink {
    /// Create a log sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans logged so far
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl ScanSink for LogSink {
    fn emit(&mut self, scan: LaserScan) {
        self.count += 1;
        let nearest = scan
            .ranges
            .iter()
            .copied()
            .filter(|r| r.is_finite())
            .reduce(f32::min);
        match nearest {
            Some(range) => info!(
                "Scan #{} [{}] t={:.3}s: {} rays, {} hits, nearest {:.3} m",
                self.count,
                scan.frame_id,
                scan.stamp.as_secs_f64(),
                scan.ranges.len(),
                scan.hit_count(),
                range
            ),
            None => info!(
                "Scan #{} [{}] t={:.3}s: {} rays, no returns",
                self.count,
                scan.frame_id,
                scan.stamp.as_secs_f64(),
                scan.ranges.len()
            ),
        }
    }
}

/// Sink that keeps every scan in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    scans: Vec<LaserScan>,
}

impl CollectingSink {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans received so far
    pub fn scans(&self) -> &[LaserScan] {
        &self.scans
    }

    /// Drain the collected scans
    pub fn take(&mut self) -> Vec<LaserScan> {
        std::mem::take(&mut self.scans)
    }
}

impl ScanSink for CollectingSink {
    fn emit(&mut self, scan: LaserScan) {
        self.scans.push(scan);
    }
}

/// Scan driver: map gate, pose lookup, ray casting, emission
pub struct ScanDriver<P, S> {
    store: Arc<GridStore>,
    caster: RayCaster,
    frames: FrameConfig,
    occupied_threshold: i8,
    poses: P,
    sink: S,
    state: DriverState,
    stats: TickStats,
}

impl<P: PoseSource, S: ScanSink> ScanDriver<P, S> {
    /// Build a driver; `config` is validated here
    pub fn new(config: &SimConfig, store: Arc<GridStore>, poses: P, sink: S) -> Result<Self> {
        config.validate()?;
        let caster = RayCaster::new(config.scan.clone())?;

        let state = if store.has_map() {
            DriverState::Ready
        } else {
            DriverState::WaitingForMap
        };
        info!(
            "Scan driver: {} rays over [{:.3}, {:.3}] rad, range [{:.2}, {:.2}] m, frame '{}'",
            caster.sample_count(),
            config.scan.angle_min,
            config.scan.angle_max,
            config.scan.range_min,
            config.scan.range_max,
            config.frames.laser_frame
        );

        Ok(ScanDriver {
            store,
            caster,
            frames: config.frames.clone(),
            occupied_threshold: config.driver.occupied_threshold,
            poses,
            sink,
            state,
            stats: TickStats::default(),
        })
    }

    /// Shared handle to the grid store, for map callbacks on other threads
    pub fn grid_store(&self) -> Arc<GridStore> {
        self.store.clone()
    }

    /// Current lifecycle state
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Tick counters
    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// The sink scans are delivered to
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutable access to the sink
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Mutable access to the pose source
    pub fn pose_source_mut(&mut self) -> &mut P {
        &mut self.poses
    }

    /// Map callback: install a new map and leave `WaitingForMap`
    pub fn on_map(&mut self, message: &MapMessage) -> Result<u64> {
        let generation = self.store.ingest(message, self.occupied_threshold)?;
        self.mark_ready();
        Ok(generation)
    }

    /// Run one tick
    pub fn tick(&mut self) -> Result<TickOutcome> {
        self.stats.ticks += 1;

        let snapshot = self.store.current_with_generation();
        let (grid, generation) = match (self.state, snapshot) {
            (DriverState::WaitingForMap, None) => {
                warn!("Scan tick skipped: no map received yet");
                self.stats.skipped_no_map += 1;
                return Ok(TickOutcome::Skipped(SkipReason::NoMap));
            }
            (DriverState::WaitingForMap, Some(snapshot)) => {
                self.mark_ready();
                snapshot
            }
            (DriverState::Ready, Some(snapshot)) => snapshot,
            (DriverState::Ready, None) => {
                return Err(SimError::Map("grid store lost its map".to_string()));
            }
        };

        let pose = match self
            .poses
            .lookup(&self.frames.map_frame, &self.frames.laser_frame)
        {
            Ok(pose) => pose,
            Err(err) => {
                warn!("Scan tick skipped: {}", err);
                self.stats.skipped_no_pose += 1;
                return Ok(TickOutcome::Skipped(SkipReason::PoseUnavailable));
            }
        };

        let origin = grid.pixel_pose(&pose);
        if !(origin.x.is_finite() && origin.y.is_finite() && origin.yaw.is_finite()) {
            warn!(
                "Scan tick skipped: non-finite sensor pose ({}, {}, {})",
                origin.x, origin.y, origin.yaw
            );
            self.stats.skipped_no_pose += 1;
            return Ok(TickOutcome::Skipped(SkipReason::PoseUnavailable));
        }
        let result = self.caster.scan(&grid, origin)?;
        let hits = result.hit_count();
        debug!(
            "Cast {} rays from pixel ({:.2}, {:.2}) yaw {:.3} on map #{}: {} hits",
            result.len(),
            origin.x,
            origin.y,
            origin.yaw,
            generation,
            hits
        );

        let scan = LaserScan::from_result(
            result,
            self.caster.config(),
            pose.stamp,
            &self.frames.laser_frame,
        );
        self.sink.emit(scan);
        self.stats.emitted += 1;

        Ok(TickOutcome::Emitted { generation, hits })
    }

    fn mark_ready(&mut self) {
        if self.state == DriverState::WaitingForMap {
            info!("First map received, scan driver ready");
            self.state = DriverState::Ready;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pose::{PoseUnavailable, StampedPose, StaticPoseSource};

    struct NeverResolves;

    impl PoseSource for NeverResolves {
        fn lookup(&mut self, _: &str, _: &str) -> std::result::Result<StampedPose, PoseUnavailable> {
            Err(PoseUnavailable::new("transform not yet published"))
        }
    }

    fn map_message() -> MapMessage {
        // 10x10 at 0.1 m, wall along column 8
        let mut data = vec![0i8; 100];
        for row in 0..10 {
            data[row * 10 + 8] = 100;
        }
        MapMessage {
            width: 10,
            height: 10,
            resolution: 0.1,
            origin: [-0.5, -0.5, 0.0],
            data,
        }
    }

    fn config() -> SimConfig {
        let mut config = SimConfig::default();
        config.scan = ScanConfig {
            angle_min: 0.0,
            angle_max: 0.0,
            angle_increment: 0.1,
            range_min: 0.0,
            range_max: 5.0,
            ..ScanConfig::default()
        };
        config
    }

    #[test]
    fn test_waits_for_map() {
        let store = Arc::new(GridStore::new());
        let mut driver =
            ScanDriver::new(&config(), store, StaticPoseSource::new(0.0, 0.0, 0.0), CollectingSink::new()).unwrap();

        for _ in 0..3 {
            assert_eq!(driver.tick().unwrap(), TickOutcome::Skipped(SkipReason::NoMap));
        }
        assert_eq!(driver.state(), DriverState::WaitingForMap);
        assert!(driver.sink().scans().is_empty());
        assert_eq!(driver.stats().skipped_no_map, 3);
    }

    #[test]
    fn test_scan_against_map() {
        let store = Arc::new(GridStore::new());
        // Sensor at map (0.05, 0.05) = pixel (5.5, 5.5), facing +X
        let mut driver =
            ScanDriver::new(&config(), store, StaticPoseSource::new(0.05, 0.05, 0.0), CollectingSink::new()).unwrap();
        assert_eq!(driver.on_map(&map_message()).unwrap(), 1);
        assert_eq!(driver.state(), DriverState::Ready);

        let outcome = driver.tick().unwrap();
        assert_eq!(outcome, TickOutcome::Emitted { generation: 1, hits: 1 });

        let scan = &driver.sink().scans()[0];
        assert_eq!(scan.frame_id, "laser");
        assert_eq!(scan.ranges.len(), 1);
        // Wall cell 8 is entered 2.5 cells from the sensor
        assert!((scan.ranges[0] - 0.25).abs() < 1e-5);
        assert!(scan.stamp > Duration::ZERO);
    }

    #[test]
    fn test_pose_unavailable_skips() {
        let store = Arc::new(GridStore::new());
        let mut driver = ScanDriver::new(&config(), store, NeverResolves, CollectingSink::new()).unwrap();
        driver.on_map(&map_message()).unwrap();

        assert_eq!(
            driver.tick().unwrap(),
            TickOutcome::Skipped(SkipReason::PoseUnavailable)
        );
        assert!(driver.sink().scans().is_empty());
        assert_eq!(driver.state(), DriverState::Ready);
        assert_eq!(driver.stats().skipped_no_pose, 1);
    }

    #[test]
    fn test_map_installed_through_shared_store() {
        let store = Arc::new(GridStore::new());
        let mut driver =
            ScanDriver::new(&config(), store.clone(), StaticPoseSource::new(0.05, 0.05, 0.0), LogSink::new()).unwrap();
        assert_eq!(driver.tick().unwrap(), TickOutcome::Skipped(SkipReason::NoMap));

        store.ingest(&map_message(), 65).unwrap();
        assert!(matches!(driver.tick().unwrap(), TickOutcome::Emitted { .. }));
        assert_eq!(driver.state(), DriverState::Ready);
        assert_eq!(driver.sink().count(), 1);
    }

    #[test]
    fn test_invalid_scan_config_fails_fast() {
        let mut config = config();
        config.scan.range_max = 0.0;
        let result = ScanDriver::new(
            &config,
            Arc::new(GridStore::new()),
            NeverResolves,
            CollectingSink::new(),
        );
        assert!(matches!(result, Err(SimError::Config(_))));
    }

    #[test]
    fn test_config_built_in_code_is_validated() {
        for threshold in [-1, 0, 101] {
            let mut config = config();
            config.driver.occupied_threshold = threshold;
            let result = ScanDriver::new(
                &config,
                Arc::new(GridStore::new()),
                StaticPoseSource::new(0.05, 0.05, 0.0),
                CollectingSink::new(),
            );
            assert!(matches!(result, Err(SimError::Config(_))), "threshold {}", threshold);
        }
    }

    #[test]
    fn test_non_finite_pose_skips_tick() {
        let store = Arc::new(GridStore::new());
        let mut driver = ScanDriver::new(
            &config(),
            store,
            StaticPoseSource::new(0.05, f64::NAN, 0.0),
            CollectingSink::new(),
        )
        .unwrap();
        driver.on_map(&map_message()).unwrap();

        assert_eq!(
            driver.tick().unwrap(),
            TickOutcome::Skipped(SkipReason::PoseUnavailable)
        );
        assert!(driver.sink().scans().is_empty());
        assert_eq!(driver.stats().skipped_no_pose, 1);
    }

    #[test]
    fn test_laser_scan_angle_max_is_last_ray() {
        let config = ScanConfig {
            angle_min: 0.0,
            angle_max: 1.0,
            angle_increment: 0.3,
            ..ScanConfig::default()
        };
        let result = ScanResult { ranges: vec![1.0; 4] };
        let scan = LaserScan::from_result(result, &config, Duration::from_secs(1), "laser");
        assert!((scan.angle_max - 0.9).abs() < 1e-6);
        assert_eq!(scan.hit_count(), 4);
    }
}
