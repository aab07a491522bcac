//! End-to-end runs of the cleanup driver over temporary volumes.

use spandupe::cleanup::{CleanupConfig, CleanupDriver, CleanupSummary, NullSink, RunMode};
use spandupe::output::TextReporter;
use spandupe::volume::{SpaceError, SpaceOracle, Volume, VolumeTable};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

const GB: u64 = 1_000_000_000;

struct FixedOracle(HashMap<String, u64>);

impl SpaceOracle for FixedOracle {
    fn free_space(&self, volume: &Volume) -> Result<u64, SpaceError> {
        Ok(self.0.get(volume.id()).copied().unwrap_or(0))
    }
}

fn fixed(readings: &[(&str, u64)]) -> Arc<dyn SpaceOracle> {
    Arc::new(FixedOracle(
        readings
            .iter()
            .map(|(id, free)| ((*id).to_string(), *free))
            .collect(),
    ))
}

fn put(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn volumes(dir: &TempDir, ids: &[&str]) -> VolumeTable {
    let roots = ids
        .iter()
        .map(|id| {
            let root = dir.path().join(id);
            fs::create_dir_all(&root).unwrap();
            root
        })
        .collect();
    VolumeTable::from_roots(roots, None).unwrap()
}

fn run_text(
    table: &VolumeTable,
    config: CleanupConfig,
    oracle: Arc<dyn SpaceOracle>,
) -> (CleanupSummary, String) {
    let reporter = TextReporter::new(Vec::new());
    let summary = CleanupDriver::new(config, oracle)
        .run(table, &reporter)
        .unwrap();
    let text = String::from_utf8(reporter.into_inner()).unwrap();
    (summary, text)
}

fn comparable(mut summary: CleanupSummary) -> CleanupSummary {
    summary.duration = Duration::ZERO;
    summary
}

#[test]
fn test_five_megabyte_movie_on_two_volumes() {
    let dir = tempdir().unwrap();
    let table = volumes(&dir, &["A", "B"]);
    let movie = vec![0x5a_u8; 5 * 1024 * 1024];
    put(&dir.path().join("A"), "movies/X.mkv", &movie);
    put(&dir.path().join("B"), "movies/X.mkv", &movie);
    let oracle = fixed(&[("A", 300 * GB), ("B", 100 * GB)]);

    let (preview, text) = run_text(
        &table,
        CleanupConfig::default().with_dry_run(true),
        Arc::clone(&oracle),
    );
    assert_eq!(
        text.trim_end(),
        "Duplicate found: /movies/X.mkv (size=5242880) exists on A and B"
    );
    assert_eq!(preview.mode, RunMode::DryRun);
    assert_eq!(preview.duplicate_groups, 1);
    assert!(dir.path().join("B/movies/X.mkv").exists());

    let (summary, text) = run_text(&table, CleanupConfig::default(), oracle);
    assert_eq!(
        text.trim_end(),
        "Duplicate found: /movies/X.mkv (size=5242880) exists on A and B"
    );
    assert_eq!(summary.mode, RunMode::Delete);
    assert_eq!(summary.files_deleted, 1);
    assert_eq!(summary.bytes_reclaimed, 5_242_880);
    assert!(dir.path().join("A/movies/X.mkv").exists());
    assert!(!dir.path().join("B/movies/X.mkv").exists());
}

#[test]
fn test_three_volumes_keep_emptiest() {
    let dir = tempdir().unwrap();
    let table = volumes(&dir, &["A", "B", "C"]);
    for id in ["A", "B", "C"] {
        put(&dir.path().join(id), "tv/show/e01.mkv", b"episode one");
    }

    let (summary, text) = run_text(
        &table,
        CleanupConfig::default(),
        fixed(&[("A", 10), ("B", 20), ("C", 30)]),
    );

    assert_eq!(
        text.trim_end(),
        "Duplicate found: /tv/show/e01.mkv (size=11) exists on A, B and C"
    );
    assert_eq!(summary.files_deleted, 2);
    assert!(!dir.path().join("A/tv/show/e01.mkv").exists());
    assert!(!dir.path().join("B/tv/show/e01.mkv").exists());
    assert!(dir.path().join("C/tv/show/e01.mkv").exists());
}

#[test]
fn test_partial_match_groups_only_matching_volumes() {
    let dir = tempdir().unwrap();
    let table = volumes(&dir, &["A", "B", "C"]);
    put(&dir.path().join("A"), "doc.txt", b"same");
    put(&dir.path().join("B"), "doc.txt", b"diff");
    put(&dir.path().join("C"), "doc.txt", b"same");

    let (summary, text) = run_text(
        &table,
        CleanupConfig::default().with_dry_run(true),
        fixed(&[("A", 1), ("B", 2), ("C", 3)]),
    );

    assert_eq!(summary.duplicate_groups, 1);
    assert!(text.contains("exists on A and C"));
}

#[test]
fn test_each_processed_group_leaves_exactly_one_copy() {
    let dir = tempdir().unwrap();
    let table = volumes(&dir, &["A", "B", "C"]);
    let layout: &[(&str, &[&str])] = &[
        ("music/a.flac", &["A", "B"]),
        ("music/b.flac", &["A", "C"]),
        ("music/c.flac", &["A", "B", "C"]),
        ("music/solo.flac", &["A"]),
    ];
    for (rel, ids) in layout {
        for id in *ids {
            put(&dir.path().join(id), rel, rel.as_bytes());
        }
    }

    let summary = CleanupDriver::new(
        CleanupConfig::default(),
        fixed(&[("A", 5), ("B", 50), ("C", 500)]),
    )
    .run(&table, &NullSink)
    .unwrap();

    assert_eq!(summary.duplicate_groups, 3);
    for (rel, ids) in layout {
        let remaining: Vec<&str> = ids
            .iter()
            .copied()
            .filter(|id| dir.path().join(id).join(rel).exists())
            .collect();
        assert_eq!(remaining.len(), 1, "{rel} should survive exactly once");
        let expected = if ids.contains(&"C") {
            "C"
        } else if ids.contains(&"B") {
            "B"
        } else {
            "A"
        };
        assert_eq!(remaining[0], expected, "{rel} kept on wrong volume");
    }
}

/// Free space = capacity minus the bytes currently stored under the root.
struct LiveOracle {
    capacity: u64,
}

fn used_bytes(path: &Path) -> u64 {
    fs::read_dir(path)
        .map(|entries| {
            entries
                .flatten()
                .map(|entry| {
                    let path = entry.path();
                    if path.is_dir() {
                        used_bytes(&path)
                    } else {
                        entry.metadata().map(|m| m.len()).unwrap_or(0)
                    }
                })
                .sum()
        })
        .unwrap_or(0)
}

impl SpaceOracle for LiveOracle {
    fn free_space(&self, volume: &Volume) -> Result<u64, SpaceError> {
        Ok(self.capacity.saturating_sub(used_bytes(volume.root())))
    }
}

#[test]
fn test_decisions_see_earlier_deletions() {
    let dir = tempdir().unwrap();
    let table = volumes(&dir, &["A", "B"]);
    let a = dir.path().join("A");
    let b = dir.path().join("B");
    put(&a, "a.bin", &[1; 400]);
    put(&b, "a.bin", &[1; 400]);
    put(&a, "b.bin", &[2; 300]);
    put(&b, "b.bin", &[2; 300]);
    put(&a, "filler.bin", &[3; 250]);

    // A starts with 50 free, B with 300. Removing A's a.bin frees 400 on A,
    // which must flip the second decision.
    let summary = CleanupDriver::new(
        CleanupConfig::default().with_io_threads(1),
        Arc::new(LiveOracle { capacity: 1000 }),
    )
    .run(&table, &NullSink)
    .unwrap();

    assert_eq!(summary.files_deleted, 2);
    assert!(!a.join("a.bin").exists());
    assert!(b.join("a.bin").exists());
    assert!(a.join("b.bin").exists());
    assert!(!b.join("b.bin").exists());
    assert!(a.join("filler.bin").exists());
}

#[test]
fn test_dry_runs_are_idempotent() {
    let dir = tempdir().unwrap();
    let table = volumes(&dir, &["A", "B", "C"]);
    for i in 0..12 {
        let rel = format!("set{}/file{i}.dat", i % 3);
        let content = format!("payload {i}");
        put(&dir.path().join("A"), &rel, content.as_bytes());
        if i % 2 == 0 {
            put(&dir.path().join("B"), &rel, content.as_bytes());
        }
        if i % 3 == 0 {
            put(&dir.path().join("C"), &rel, content.as_bytes());
        }
    }
    let oracle = fixed(&[("A", 1), ("B", 2), ("C", 3)]);
    let config = CleanupConfig::default().with_dry_run(true);

    let (first, first_text) = run_text(&table, config.clone(), Arc::clone(&oracle));
    let (second, second_text) = run_text(&table, config, oracle);

    let mut first_lines: Vec<&str> = first_text.lines().collect();
    let mut second_lines: Vec<&str> = second_text.lines().collect();
    first_lines.sort_unstable();
    second_lines.sort_unstable();

    assert_eq!(comparable(first), comparable(second));
    assert_eq!(first_lines, second_lines);
    assert_eq!(first_lines.len(), 8);
}

#[test]
fn test_cleanup_converges() {
    let dir = tempdir().unwrap();
    let table = volumes(&dir, &["A", "B", "C"]);
    for i in 0..6 {
        let rel = format!("dir/{i}.bin");
        for id in ["A", "B", "C"] {
            put(&dir.path().join(id), &rel, format!("{i}").as_bytes());
        }
    }
    let oracle = fixed(&[("A", 100), ("B", 300), ("C", 200)]);

    let first = CleanupDriver::new(CleanupConfig::default(), Arc::clone(&oracle))
        .run(&table, &NullSink)
        .unwrap();
    assert_eq!(first.duplicate_groups, 6);
    assert_eq!(first.files_deleted, 12);

    let after = CleanupDriver::new(CleanupConfig::default().with_dry_run(true), oracle)
        .run(&table, &NullSink)
        .unwrap();
    assert_eq!(after.duplicate_groups, 0);
}

#[test]
fn test_unique_files_read_no_content() {
    let dir = tempdir().unwrap();
    let table = volumes(&dir, &["A", "B"]);
    put(&dir.path().join("A"), "only-on-a.bin", &[7; 4096]);
    put(&dir.path().join("B"), "only-on-b.bin", &[7; 4096]);

    let summary = CleanupDriver::new(
        CleanupConfig::default().with_dry_run(true),
        fixed(&[("A", 1), ("B", 2)]),
    )
    .run(&table, &NullSink)
    .unwrap();

    assert_eq!(summary.files_checked, 1);
    assert_eq!(summary.matched_paths, 0);
    assert_eq!(summary.files_fingerprinted, 0);
    assert_eq!(summary.bytes_fingerprinted, 0);
}

#[test]
fn test_excluded_reference_files_are_ignored() {
    let dir = tempdir().unwrap();
    let table = volumes(&dir, &["A", "B"]);
    for id in ["A", "B"] {
        put(&dir.path().join(id), "keep.mkv", b"movie");
        put(&dir.path().join(id), "partial.mkv.part", b"partial");
    }

    let walker = spandupe::scanner::WalkerConfig::default().with_exclude(vec!["*.part".into()]);
    let (summary, text) = run_text(
        &table,
        CleanupConfig::default()
            .with_dry_run(true)
            .with_walker_config(walker),
        fixed(&[("A", 1), ("B", 2)]),
    );

    assert_eq!(summary.files_checked, 1);
    assert!(text.contains("/keep.mkv"));
    assert!(!text.contains("partial"));
}

#[test]
fn test_volume_list_order_follows_table_order() {
    let dir = tempdir().unwrap();
    let roots = ["disk2", "disk1", "disk3"]
        .iter()
        .map(|id| {
            let root = dir.path().join(id);
            fs::create_dir_all(&root).unwrap();
            put(&root, "x.iso", b"image");
            root
        })
        .collect();
    let table = VolumeTable::from_roots(roots, None).unwrap();

    let (_, text) = run_text(
        &table,
        CleanupConfig::default().with_dry_run(true),
        fixed(&[]),
    );

    assert!(text.contains("exists on disk2, disk1 and disk3"));
}

#[cfg(unix)]
#[test]
fn test_aliased_volume_root_is_rejected() {
    let dir = tempdir().unwrap();
    put(&dir.path().join("disk1"), "movies/X.mkv", b"only copy");
    std::os::unix::fs::symlink(dir.path().join("disk1"), dir.path().join("alias")).unwrap();

    let err = VolumeTable::from_roots(
        vec![dir.path().join("disk1"), dir.path().join("alias")],
        None,
    )
    .unwrap_err();

    assert!(err.to_string().contains("listed twice"));
    assert!(dir.path().join("disk1/movies/X.mkv").exists());
}

#[cfg(unix)]
#[test]
fn test_symlinked_copy_never_costs_the_real_file() {
    let dir = tempdir().unwrap();
    let table = volumes(&dir, &["A", "B"]);
    put(&dir.path().join("A"), "m/x.bin", b"payload");
    fs::create_dir_all(dir.path().join("B/m")).unwrap();
    std::os::unix::fs::symlink(dir.path().join("A/m/x.bin"), dir.path().join("B/m/x.bin")).unwrap();

    for follow in [false, true] {
        let config = CleanupConfig::default().with_walker_config(
            spandupe::scanner::WalkerConfig::default().with_follow_symlinks(follow),
        );
        let (summary, text) = run_text(&table, config, fixed(&[("A", 1), ("B", 100 * GB)]));

        assert!(text.is_empty());
        assert_eq!(summary.duplicate_groups, 0);
        assert_eq!(summary.files_deleted, 0);
        assert_eq!(fs::read(dir.path().join("B/m/x.bin")).unwrap(), b"payload");
    }
}

#[cfg(unix)]
#[test]
fn test_symlinked_directory_on_another_volume_is_not_a_copy() {
    let dir = tempdir().unwrap();
    let table = volumes(&dir, &["disk1", "disk2"]);
    put(&dir.path().join("disk1"), "movies/X.mkv", b"only copy");
    std::os::unix::fs::symlink(dir.path().join("disk1/movies"), dir.path().join("disk2/movies")).unwrap();

    let (summary, text) = run_text(
        &table,
        CleanupConfig::default(),
        fixed(&[("disk1", 1), ("disk2", 100 * GB)]),
    );

    assert!(text.is_empty());
    assert_eq!(summary.files_deleted, 0);
    assert!(dir.path().join("disk1/movies/X.mkv").is_file());
}
