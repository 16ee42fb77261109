use serial_test::serial;
use shmheap::{Segment, SegmentConfig, paths};
use std::env;

fn clear_env() {
    // SAFETY: every test touching the environment runs under #[serial].
    unsafe {
        env::remove_var("SHMHEAP_PREFIX");
        env::remove_var("SHMHEAP_LOCK_NAME");
        env::remove_var("SHMHEAP_CLUSTER_SIZE");
    }
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();
    let config = SegmentConfig::from_env();
    assert_eq!(config, SegmentConfig::default());
    assert_eq!(config.cluster_size, paths::DEFAULT_CLUSTER_SIZE);
    assert_eq!(config.lock_name, paths::DEFAULT_LOCK_NAME);
}

#[test]
#[serial]
fn test_from_env_overrides() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("envheap");
    let lock = format!("/shmheap_env_{}", std::process::id());
    // SAFETY: serialised with the other environment tests.
    unsafe {
        env::set_var("SHMHEAP_PREFIX", &prefix);
        env::set_var("SHMHEAP_LOCK_NAME", &lock);
        env::set_var("SHMHEAP_CLUSTER_SIZE", "65536");
    }

    let config = SegmentConfig::from_env();
    clear_env();
    assert_eq!(config.lock_name, lock);
    assert_eq!(config.cluster_size, 65536);
    assert!(config.ctl_path.starts_with(dir.path()));

    let segment = Segment::initialise(&config, config.cluster_size).unwrap();
    let peer = Segment::attach(&config).unwrap();
    assert_eq!(peer.clusters(), segment.clusters());
    drop(peer);
    segment.destroy(true).unwrap();
}

#[test]
#[serial]
fn test_unparseable_cluster_size_falls_back() {
    clear_env();
    // SAFETY: serialised with the other environment tests.
    unsafe { env::set_var("SHMHEAP_CLUSTER_SIZE", "lots") };
    let config = SegmentConfig::from_env();
    clear_env();
    assert_eq!(config.cluster_size, paths::DEFAULT_CLUSTER_SIZE);
}
