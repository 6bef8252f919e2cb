//! Integration tests for the on-disk identity cache.

use camwd::cache::IdentityCache;
use camwd::device::BusId;
use camwd::device::mock::MockHost;
use camwd::resolver::{Resolver, Source};

use crate::common::fixtures::TestHost;

fn devices(paths: &[&str]) -> Vec<String> {
    paths.iter().map(ToString::to_string).collect()
}

#[test]
fn test_first_run_writes_cache() {
    let fixture = TestHost::new();
    let host = MockHost::new()
        .with_device("/dev/video0", "1-2:1.0")
        .with_device("/dev/video2", "1-4.1:1.0");
    let mut cache = IdentityCache::load(fixture.cache_path());

    Resolver::new(host.clone(), host).build_camera_map(&devices(&["/dev/video0", "/dev/video2"]), &mut cache);

    let json = fixture.read_cache();
    assert_eq!(json["/dev/video0"], "1-2:1.0");
    assert_eq!(json["/dev/video2"], "1-4.1:1.0");
}

#[test]
fn test_cache_survives_restart_while_camera_is_gone() {
    let fixture = TestHost::new();

    // Run 1: camera present, id learned.
    let present = MockHost::new().with_device("/dev/video1", "1-3:1.0");
    let mut cache = IdentityCache::load(fixture.cache_path());
    Resolver::new(present.clone(), present).build_camera_map(&devices(&["/dev/video1"]), &mut cache);

    // Run 2: camera gone before startup.
    let gone = MockHost::new().with_missing("/dev/video1");
    let mut cache = IdentityCache::load(fixture.cache_path());
    let map = Resolver::new(gone.clone(), gone.clone())
        .build_camera_map(&devices(&["/dev/video1"]), &mut cache);

    assert_eq!(map.get("/dev/video1").map(BusId::as_str), Some("1-3:1.0"));
    assert_eq!(map.entries()[0].source, Source::Cache);
    assert!(gone.driver_and_query_operations().is_empty());
}

#[test]
fn test_stale_entries_are_kept() {
    let fixture = TestHost::new();
    fixture.write_cache(&[("/dev/video7", "2-1:1.0"), ("/dev/video0", "1-1:1.0")]);
    let host = MockHost::new().with_device("/dev/video0", "1-2:1.0");

    let mut cache = IdentityCache::load(fixture.cache_path());
    Resolver::new(host.clone(), host).build_camera_map(&devices(&["/dev/video0"]), &mut cache);

    let json = fixture.read_cache();
    assert_eq!(json["/dev/video0"], "1-2:1.0");
    assert_eq!(json["/dev/video7"], "2-1:1.0");
}

#[test]
fn test_malformed_entry_does_not_erase_missing_camera() {
    let fixture = TestHost::new();
    let path = fixture.cache_path();
    std::fs::write(&path, r#"{"/dev/video1":"1-3:1.0","/dev/video2":null}"#).unwrap();
    let host = MockHost::new()
        .with_missing("/dev/video1")
        .with_device("/dev/video0", "1-2:1.0");

    let mut cache = IdentityCache::load(&path);
    let map = Resolver::new(host.clone(), host)
        .build_camera_map(&devices(&["/dev/video0", "/dev/video1"]), &mut cache);

    assert_eq!(map.get("/dev/video1").map(BusId::as_str), Some("1-3:1.0"));
    let json = fixture.read_cache();
    assert_eq!(json["/dev/video0"], "1-2:1.0");
    assert_eq!(json["/dev/video1"], "1-3:1.0");
    assert!(json.get("/dev/video2").is_none());
}

#[test]
fn test_unchanged_ids_do_not_rewrite_cache() {
    let fixture = TestHost::new();
    let path = fixture.write_cache(&[("/dev/video0", "1-2:1.0")]);
    // Sentinel formatting that a rewrite would replace.
    std::fs::write(&path, "{\"/dev/video0\":\"1-2:1.0\"}").unwrap();
    let host = MockHost::new().with_device("/dev/video0", "1-2:1.0");

    let mut cache = IdentityCache::load(&path);
    Resolver::new(host.clone(), host).build_camera_map(&devices(&["/dev/video0"]), &mut cache);

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "{\"/dev/video0\":\"1-2:1.0\"}"
    );
}

#[test]
fn test_corrupt_cache_starts_empty_and_is_replaced() {
    let fixture = TestHost::new();
    fixture.write_file("cache.json", "{ not json");
    let host = MockHost::new().with_device("/dev/video0", "1-2:1.0");

    let mut cache = IdentityCache::load(fixture.cache_path());
    assert!(cache.is_empty());
    Resolver::new(host.clone(), host).build_camera_map(&devices(&["/dev/video0"]), &mut cache);

    assert_eq!(fixture.read_cache()["/dev/video0"], "1-2:1.0");
}

#[test]
fn test_unwritable_cache_is_not_fatal() {
    let fixture = TestHost::new();
    // A directory where the cache file should be makes every save fail.
    std::fs::create_dir_all(fixture.cache_path()).unwrap();
    let host = MockHost::new().with_device("/dev/video0", "1-2:1.0");

    let mut cache = IdentityCache::new(fixture.cache_path());
    let map = Resolver::new(host.clone(), host).build_camera_map(&devices(&["/dev/video0"]), &mut cache);

    assert_eq!(map.len(), 1);
    assert!(cache.is_dirty());
}
