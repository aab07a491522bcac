//! Volume discovery and live free-space readings.

use spandupe::volume::{
    free_space_or_zero, DiskSpaceOracle, SpaceError, SpaceOracle, Volume, VolumeError,
    VolumeTable,
};
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_disk_oracle_reads_real_free_space() {
    let dir = tempdir().unwrap();
    let volume = Volume::new("tmp", dir.path());

    match DiskSpaceOracle::new().free_space(&volume) {
        Ok(free) => assert!(free > 0),
        // Some sandboxes hide the mount backing the temp directory.
        Err(SpaceError::NoDisk(_)) => {}
        Err(e) => panic!("unexpected error: {e}"),
    }
}

#[test]
fn test_disk_oracle_missing_root_is_an_error() {
    let volume = Volume::new("gone", "/definitely/not/a/mount/point");
    let oracle = DiskSpaceOracle::new();
    assert!(matches!(
        oracle.free_space(&volume),
        Err(SpaceError::Resolve { .. })
    ));
    assert_eq!(free_space_or_zero(&oracle, &volume), 0);
}

#[test]
fn test_discover_union_layout() {
    let mount = tempdir().unwrap();
    for name in ["disk1", "disk2", "disk10", "cache", "user"] {
        fs::create_dir(mount.path().join(name)).unwrap();
    }

    let table = VolumeTable::discover(mount.path(), Some("disk"), None).unwrap();
    let ids: Vec<&str> = table.iter().map(|v| v.id()).collect();

    assert_eq!(ids, vec!["disk1", "disk10", "disk2"]);
    assert_eq!(table.reference().id(), "disk1");
}

#[test]
fn test_discover_prefix_matching_one_volume_is_fatal() {
    let mount = tempdir().unwrap();
    for name in ["disk1", "cache"] {
        fs::create_dir(mount.path().join(name)).unwrap();
    }

    let err = VolumeTable::discover(mount.path(), Some("disk"), None).unwrap_err();
    assert!(matches!(err, VolumeError::TooFewVolumes(1)));
}

#[test]
fn test_explicit_roots_with_reference_id() {
    let mount = tempdir().unwrap();
    let roots: Vec<PathBuf> = ["a", "b", "c"]
        .iter()
        .map(|name| {
            let root = mount.path().join(name);
            fs::create_dir(&root).unwrap();
            root
        })
        .collect();

    let table = VolumeTable::from_roots(roots, Some("c")).unwrap();

    assert_eq!(table.reference().id(), "c");
    let others: Vec<&str> = table.others().iter().map(|v| v.id()).collect();
    assert_eq!(others, vec!["a", "b"]);
}

#[test]
fn test_reference_root_must_be_directory() {
    let mount = tempdir().unwrap();
    let file = mount.path().join("a");
    fs::write(&file, b"not a dir").unwrap();
    fs::create_dir(mount.path().join("b")).unwrap();

    let err = VolumeTable::from_roots(vec![file, mount.path().join("b")], None).unwrap_err();
    assert!(matches!(err, VolumeError::NotADirectory(_)));
}

#[test]
fn test_missing_secondary_volume_is_tolerated() {
    let mount = tempdir().unwrap();
    fs::create_dir(mount.path().join("a")).unwrap();

    let table =
        VolumeTable::from_roots(vec![mount.path().join("a"), mount.path().join("b")], None)
            .unwrap();
    assert_eq!(table.len(), 2);
}
