use grid_scan_sim::{
    CollectingSink, DriverState, GridStore, LaserScan, MapMessage, PoseSource, PoseUnavailable, ScanConfig,
    ScanDriver, ScanSink, SimConfig, SkipReason, StampedPose, TickOutcome, TickScheduler,
};
use mockall::mock;
use rstest::{fixture, rstest};
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Poses {}
    impl PoseSource for Poses {
        fn lookup(&mut self, map_frame: &str, sensor_frame: &str) -> Result<StampedPose, PoseUnavailable>;
    }
}

mock! {
    pub Sink {}
    impl ScanSink for Sink {
        fn emit(&mut self, scan: LaserScan);
    }
}

// 10x10 cells of 1 m, origin at the map origin, one blocked column
fn wall_map(column: usize) -> MapMessage {
    let mut data = vec![0i8; 100];
    for row in 0..10 {
        data[row * 10 + column] = 100;
    }
    MapMessage {
        width: 10,
        height: 10,
        resolution: 1.0,
        origin: [0.0, 0.0, 0.0],
        data,
    }
}

#[fixture]
fn config() -> SimConfig {
    let mut config = SimConfig::default();
    config.scan = ScanConfig {
        angle_min: 0.0,
        angle_max: 0.0,
        angle_increment: 0.1,
        range_min: 0.0,
        range_max: 50.0,
        ..ScanConfig::default()
    };
    config
}

fn pose_at(x: f64, y: f64, yaw: f64, secs: u64) -> StampedPose {
    StampedPose::new(x, y, yaw, Duration::from_secs(secs))
}

#[rstest]
fn test_no_emission_before_first_map(config: SimConfig) {
    let mut poses = MockPoses::new();
    poses.expect_lookup().never();
    let mut sink = MockSink::new();
    sink.expect_emit().never();

    let mut driver = ScanDriver::new(&config, Arc::new(GridStore::new()), poses, sink).unwrap();
    for _ in 0..5 {
        assert_eq!(driver.tick().unwrap(), TickOutcome::Skipped(SkipReason::NoMap));
    }
    assert_eq!(driver.state(), DriverState::WaitingForMap);
    assert_eq!(driver.stats().ticks, 5);
}

#[rstest]
fn test_pose_unavailable_emits_nothing(config: SimConfig) {
    let mut poses = MockPoses::new();
    poses
        .expect_lookup()
        .times(2)
        .returning(|_, _| Err(PoseUnavailable::new("laser not in tree")));
    let mut sink = MockSink::new();
    sink.expect_emit().never();

    let mut driver = ScanDriver::new(&config, Arc::new(GridStore::new()), poses, sink).unwrap();
    driver.on_map(&wall_map(8)).unwrap();

    for _ in 0..2 {
        assert_eq!(
            driver.tick().unwrap(),
            TickOutcome::Skipped(SkipReason::PoseUnavailable)
        );
    }
    assert_eq!(driver.stats().skipped_no_pose, 2);
    assert_eq!(driver.stats().emitted, 0);
}

#[rstest]
fn test_scan_stamped_with_pose_time(config: SimConfig) {
    let mut poses = MockPoses::new();
    poses.expect_lookup().times(1).returning(|map, sensor| {
        assert_eq!(map, "map");
        assert_eq!(sensor, "laser");
        Ok(pose_at(2.5, 5.5, 0.0, 42))
    });
    let mut sink = MockSink::new();
    sink.expect_emit()
        .times(1)
        .withf(|scan: &LaserScan| {
            scan.stamp == Duration::from_secs(42)
                && scan.frame_id == "laser"
                && scan.ranges.len() == 1
                && (scan.ranges[0] - 5.5).abs() < 1e-5
        })
        .return_const(());

    let mut driver = ScanDriver::new(&config, Arc::new(GridStore::new()), poses, sink).unwrap();
    driver.on_map(&wall_map(8)).unwrap();

    assert_eq!(
        driver.tick().unwrap(),
        TickOutcome::Emitted { generation: 1, hits: 1 }
    );
}

#[rstest]
fn test_map_replacement_seen_on_next_tick(config: SimConfig) {
    let mut poses = MockPoses::new();
    poses
        .expect_lookup()
        .returning(|_, _| Ok(pose_at(0.5, 0.5, 0.0, 1)));

    let store = Arc::new(GridStore::new());
    let mut driver = ScanDriver::new(&config, store.clone(), poses, CollectingSink::new()).unwrap();

    driver.on_map(&wall_map(8)).unwrap();
    let first = driver.tick().unwrap();

    // A second map lands between ticks, the wall moves closer
    store.ingest(&wall_map(3), 65).unwrap();
    let second = driver.tick().unwrap();

    assert_eq!(first, TickOutcome::Emitted { generation: 1, hits: 1 });
    assert_eq!(second, TickOutcome::Emitted { generation: 2, hits: 1 });

    let ranges: Vec<f32> = driver.sink().scans().iter().map(|s| s.ranges[0]).collect();
    assert_eq!(ranges.len(), 2);
    assert!((ranges[0] - 7.5).abs() < 1e-5);
    assert!((ranges[1] - 2.5).abs() < 1e-5);
}

#[rstest]
fn test_bad_map_keeps_driver_running(config: SimConfig) {
    let mut poses = MockPoses::new();
    poses
        .expect_lookup()
        .returning(|_, _| Ok(pose_at(0.5, 0.5, 0.0, 1)));
    let mut sink = MockSink::new();
    sink.expect_emit().times(1).return_const(());

    let mut driver = ScanDriver::new(&config, Arc::new(GridStore::new()), poses, sink).unwrap();
    driver.on_map(&wall_map(8)).unwrap();

    let truncated = MapMessage {
        data: vec![0; 10],
        ..wall_map(8)
    };
    assert!(driver.on_map(&truncated).is_err());
    assert_eq!(
        driver.tick().unwrap(),
        TickOutcome::Emitted { generation: 1, hits: 1 }
    );
}

#[rstest]
fn test_sensor_off_map_reports_no_returns(config: SimConfig) {
    let mut poses = MockPoses::new();
    poses
        .expect_lookup()
        .returning(|_, _| Ok(pose_at(-3.0, 5.0, 0.0, 1)));
    let mut sink = MockSink::new();
    sink.expect_emit()
        .times(1)
        .withf(|scan: &LaserScan| scan.ranges.iter().all(|r| r.is_infinite()))
        .return_const(());

    let mut driver = ScanDriver::new(&config, Arc::new(GridStore::new()), poses, sink).unwrap();
    driver.on_map(&wall_map(8)).unwrap();
    assert_eq!(
        driver.tick().unwrap(),
        TickOutcome::Emitted { generation: 1, hits: 0 }
    );
}

#[rstest]
fn test_nan_heading_skips_ticks_and_loop_keeps_running(config: SimConfig) {
    let mut poses = MockPoses::new();
    poses
        .expect_lookup()
        .times(5)
        .returning(|_, _| Ok(pose_at(2.5, 5.5, f64::NAN, 1)));
    let mut sink = MockSink::new();
    sink.expect_emit().never();

    let mut driver = ScanDriver::new(&config, Arc::new(GridStore::new()), poses, sink).unwrap();
    driver.on_map(&wall_map(8)).unwrap();

    let scheduler = TickScheduler::new(1000.0).unwrap().with_max_ticks(5);
    let ticks = scheduler
        .run(|| {
            assert_eq!(
                driver.tick()?,
                TickOutcome::Skipped(SkipReason::PoseUnavailable)
            );
            Ok(())
        })
        .unwrap();

    assert_eq!(ticks, 5);
    assert_eq!(driver.stats().skipped_no_pose, 5);
}

#[rstest]
#[case(-1)]
#[case(0)]
#[case(101)]
fn test_out_of_range_threshold_rejected(mut config: SimConfig, #[case] threshold: i8) {
    config.driver.occupied_threshold = threshold;
    let result = ScanDriver::new(
        &config,
        Arc::new(GridStore::new()),
        MockPoses::new(),
        MockSink::new(),
    );
    assert!(result.is_err());
}
