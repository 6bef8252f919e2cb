//! Integration tests for startup resolution and the monitoring loop.

use std::time::Duration;

use camwd::cache::IdentityCache;
use camwd::config::read_camera_devices;
use camwd::device::mock::{MockHost, Operation};
use camwd::device::{BusId, FsProbe, SysfsDriver};
use camwd::error::WatchdogError;
use camwd::recovery::{RebindTiming, Rebinder};
use camwd::resolver::{Resolver, Source};
use camwd::watchdog::{Watchdog, WatchdogState};

use crate::common::fixtures::{DRIVER, TestHost};
use crate::common::init_test_logging;

type MockWatchdog = Watchdog<MockHost, MockHost, MockHost, MockHost>;

fn mock_watchdog(host: &MockHost) -> MockWatchdog {
    Watchdog::new(
        Resolver::new(host.clone(), host.clone()),
        Rebinder::new(host.clone(), host.clone(), RebindTiming::default()),
        Duration::from_secs(5),
    )
}

fn devices(paths: &[&str]) -> Vec<String> {
    paths.iter().map(ToString::to_string).collect()
}

fn op_unbind(bus_id: &str) -> Operation {
    Operation::Unbind {
        bus_id: bus_id.to_string(),
    }
}

fn op_bind(bus_id: &str) -> Operation {
    Operation::Bind {
        bus_id: bus_id.to_string(),
    }
}

#[test]
fn test_live_and_cached_cameras_only_missing_one_rebinds() {
    init_test_logging();
    let fixture = TestHost::new();
    fixture.write_cache(&[("/dev/video1", "1-3:1.0")]);
    let host = MockHost::new()
        .with_device("/dev/video0", "1-2:1.0")
        .with_missing("/dev/video1");

    let mut cache = IdentityCache::load(fixture.cache_path());
    let mut wd = mock_watchdog(&host);
    let map = wd
        .init(&devices(&["/dev/video0", "/dev/video1"]), &mut cache)
        .unwrap();

    assert_eq!(map.len(), 2);
    assert_eq!(map.entries()[0].source, Source::Live);
    assert_eq!(map.entries()[1].source, Source::Cache);
    assert_eq!(wd.state(), WatchdogState::Monitoring);
    assert_eq!(fixture.read_cache()["/dev/video0"], "1-2:1.0");

    host.clear_operations();
    let report = wd.poll_once();

    assert_eq!(report.missing, vec!["/dev/video1".to_string()]);
    host.assert_operations(&[op_unbind("1-3:1.0"), op_bind("1-3:1.0")]);
    assert_eq!(
        host.operations(),
        vec![
            op_unbind("1-3:1.0"),
            Operation::Sleep { millis: 2000 },
            op_bind("1-3:1.0"),
            Operation::Sleep { millis: 3000 },
        ]
    );
}

#[test]
fn test_unresolvable_cameras_are_dropped_not_fatal() {
    let fixture = TestHost::new();
    let host = MockHost::new()
        .with_device("/dev/video0", "1-2:1.0")
        .with_non_usb_device("/dev/video4")
        .with_failing_query("/dev/video5")
        .with_missing("/dev/video6");

    let mut cache = IdentityCache::load(fixture.cache_path());
    let mut wd = mock_watchdog(&host);
    let map = wd
        .init(
            &devices(&["/dev/video0", "/dev/video4", "/dev/video5", "/dev/video6"]),
            &mut cache,
        )
        .unwrap();

    assert_eq!(map.devices(), vec!["/dev/video0"]);
}

#[test]
fn test_duplicate_config_entries_map_once() {
    let fixture = TestHost::new();
    let host = MockHost::new().with_missing("/dev/video1");
    fixture.write_cache(&[("/dev/video1", "1-3:1.0")]);

    let mut cache = IdentityCache::load(fixture.cache_path());
    let mut wd = mock_watchdog(&host);
    wd.init(&devices(&["/dev/video1", "/dev/video1"]), &mut cache)
        .unwrap();

    assert_eq!(wd.camera_map().len(), 1);
    wd.poll_once();
    assert_eq!(host.bound(), vec!["1-3:1.0".to_string()]);
}

#[test]
fn test_failed_unbind_still_binds() {
    let fixture = TestHost::new();
    fixture.write_cache(&[("/dev/video1", "1-3:1.0")]);
    let host = MockHost::new()
        .with_missing("/dev/video1")
        .with_failing_unbind("1-3:1.0");

    let mut cache = IdentityCache::load(fixture.cache_path());
    let mut wd = mock_watchdog(&host);
    wd.init(&devices(&["/dev/video1"]), &mut cache).unwrap();

    let report = wd.poll_once();
    assert_eq!(report.rebinds_failed, 0);
    host.assert_operations(&[op_unbind("1-3:1.0"), op_bind("1-3:1.0")]);
}

#[test]
fn test_failed_bind_retried_next_cycle() {
    let fixture = TestHost::new();
    fixture.write_cache(&[("/dev/video1", "1-3:1.0")]);
    let host = MockHost::new()
        .with_missing("/dev/video1")
        .with_failing_bind("1-3:1.0");

    let mut cache = IdentityCache::load(fixture.cache_path());
    let mut wd = mock_watchdog(&host);
    wd.init(&devices(&["/dev/video1"]), &mut cache).unwrap();

    assert_eq!(wd.run(Some(3)), 3);
    assert_eq!(host.bound().len(), 3);
}

#[test]
fn test_nothing_mapped_never_polls() {
    let fixture = TestHost::new();
    let host = MockHost::new().with_missing("/dev/video1");

    let mut cache = IdentityCache::load(fixture.cache_path());
    let mut wd = mock_watchdog(&host);
    let err = wd
        .init(&devices(&["/dev/video1"]), &mut cache)
        .unwrap_err();

    assert!(matches!(err, WatchdogError::NoCamerasResolved));
    assert_eq!(wd.run(Some(5)), 0);
    assert!(host.operations().is_empty());
}

/// Real device nodes and sysfs files, with only udev and the clock mocked.
#[test]
fn test_filesystem_nodes_and_sysfs_driver() {
    init_test_logging();
    let fixture = TestHost::new();
    let video0 = fixture.create_device("video0");
    let video1 = fixture.create_device("video1");
    let teleop = fixture.write_teleop(&[video0.as_str(), video1.as_str()]);

    let query = MockHost::new()
        .with_device(&video0, "1-2:1.0")
        .with_device(&video1, "1-3:1.0");
    let driver = SysfsDriver::new(fixture.sysfs_root(), DRIVER);

    let configured = read_camera_devices(&teleop, "plugin", "camera").unwrap();
    let mut cache = IdentityCache::load(fixture.cache_path());
    let mut wd = Watchdog::new(
        Resolver::new(FsProbe, query.clone()),
        Rebinder::new(driver, query.clone(), RebindTiming::default()),
        Duration::ZERO,
    );
    wd.init(&configured, &mut cache).unwrap();
    assert_eq!(
        wd.camera_map().get(&video1),
        Some(&BusId::parse("1-3:1.0").unwrap())
    );

    let report = wd.poll_once();
    assert!(report.missing.is_empty());
    assert_eq!(fixture.driver_file("bind"), "");

    fixture.remove_device("video1");
    let report = wd.poll_once();
    assert_eq!(report.missing, vec![video1]);
    assert_eq!(report.rebinds_failed, 0);
    assert_eq!(fixture.driver_file("unbind"), "1-3:1.0");
    assert_eq!(fixture.driver_file("bind"), "1-3:1.0");
}

#[test]
fn test_sysfs_write_failure_counts_as_failed_rebind() {
    let fixture = TestHost::new();
    fixture.write_cache(&[("/dev/video1", "1-3:1.0")]);
    let host = MockHost::new().with_missing("/dev/video1");
    // No driver directory under this root.
    let driver = SysfsDriver::new(fixture.path().join("nosys"), DRIVER);

    let mut cache = IdentityCache::load(fixture.cache_path());
    let mut wd = Watchdog::new(
        Resolver::new(host.clone(), host.clone()),
        Rebinder::new(driver, host, RebindTiming::default()),
        Duration::ZERO,
    );
    wd.init(&devices(&["/dev/video1"]), &mut cache).unwrap();

    let report = wd.poll_once();
    assert_eq!(report.rebinds_failed, 1);
    assert_eq!(wd.state(), WatchdogState::Monitoring);
}
