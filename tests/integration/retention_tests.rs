//! Retention and removal over real files, driven step by step.

use spandupe::actions::delete_redundant;
use spandupe::duplicates::{group_candidates, PathMatcher, RetentionSelector};
use spandupe::scanner::{FileRecord, Fingerprinter, RelativePath};
use spandupe::volume::{SpaceError, SpaceOracle, Volume, VolumeTable};
use std::collections::HashMap;
use std::fs;
use std::sync::Mutex;
use tempfile::tempdir;

/// Oracle whose readings can change between calls.
#[derive(Default)]
struct ScriptedOracle {
    readings: Mutex<HashMap<String, u64>>,
    failing: Vec<String>,
}

impl ScriptedOracle {
    fn set(&self, id: &str, free: u64) {
        self.readings.lock().unwrap().insert(id.to_string(), free);
    }
}

impl SpaceOracle for ScriptedOracle {
    fn free_space(&self, volume: &Volume) -> Result<u64, SpaceError> {
        if self.failing.iter().any(|id| id == volume.id()) {
            return Err(SpaceError::NoDisk(volume.root().to_path_buf()));
        }
        Ok(self
            .readings
            .lock()
            .unwrap()
            .get(volume.id())
            .copied()
            .unwrap_or(0))
    }
}

fn setup(ids: &[&str], rel: &str, content: &[u8]) -> (tempfile::TempDir, VolumeTable) {
    let dir = tempdir().unwrap();
    let roots = ids
        .iter()
        .map(|id| {
            let root = dir.path().join(id);
            fs::create_dir_all(&root).unwrap();
            fs::write(root.join(rel), content).unwrap();
            root
        })
        .collect();
    let table = VolumeTable::from_roots(roots, None).unwrap();
    (dir, table)
}

fn decide_and_delete(table: &VolumeTable, rel: &str, oracle: &dyn SpaceOracle) -> String {
    let reference = FileRecord::stat(table.reference().clone(), RelativePath::new(rel));
    let set = PathMatcher::from_table(table).match_candidates(reference);
    let mut outcome = group_candidates(set, &Fingerprinter::new());
    assert_eq!(outcome.groups.len(), 1);

    let group = outcome.groups.remove(0);
    let decision = RetentionSelector::new(oracle).select(group).unwrap();
    let result = delete_redundant(&decision);
    assert!(result.all_succeeded(), "{}", result.summary());
    decision.keep.volume_id().to_string()
}

#[test]
fn test_latest_reading_wins() {
    let (dir, table) = setup(&["A", "B"], "f.bin", b"same");
    let oracle = ScriptedOracle::default();
    oracle.set("A", 10);
    oracle.set("B", 20);
    oracle.set("A", 50);

    let kept = decide_and_delete(&table, "f.bin", &oracle);

    assert_eq!(kept, "A");
    assert!(dir.path().join("A/f.bin").exists());
    assert!(!dir.path().join("B/f.bin").exists());
}

#[test]
fn test_unmeasurable_volume_loses() {
    let (dir, table) = setup(&["A", "B"], "f.bin", b"same");
    let oracle = ScriptedOracle {
        failing: vec!["A".to_string()],
        ..ScriptedOracle::default()
    };
    oracle.set("B", 1);

    let kept = decide_and_delete(&table, "f.bin", &oracle);

    assert_eq!(kept, "B");
    assert!(!dir.path().join("A/f.bin").exists());
}

#[test]
fn test_ties_keep_reference_copy() {
    let (dir, table) = setup(&["A", "B", "C"], "f.bin", b"same");
    let oracle = ScriptedOracle::default();
    for id in ["A", "B", "C"] {
        oracle.set(id, 42);
    }

    let kept = decide_and_delete(&table, "f.bin", &oracle);

    assert_eq!(kept, "A");
    assert!(!dir.path().join("B/f.bin").exists());
    assert!(!dir.path().join("C/f.bin").exists());
}

#[test]
fn test_tie_between_others_keeps_first_in_table_order() {
    let (dir, table) = setup(&["A", "B", "C"], "f.bin", b"same");
    let oracle = ScriptedOracle::default();
    oracle.set("A", 1);
    oracle.set("B", 9);
    oracle.set("C", 9);

    let kept = decide_and_delete(&table, "f.bin", &oracle);

    assert_eq!(kept, "B");
    assert!(dir.path().join("B/f.bin").exists());
    assert!(!dir.path().join("C/f.bin").exists());
}
