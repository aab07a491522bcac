//! Survivor selection by live free space.
//!
//! # Overview
//!
//! For each [`DuplicateGroup`] the [`RetentionSelector`] reads the current
//! free space of every member's volume and keeps the copy on the volume with
//! the most free space. The others are marked for removal.
//!
//! Readings are taken at decision time and never reused, so space released
//! by earlier deletions shifts later decisions. Ties keep candidate order:
//! the reference volume first, then the other volumes in table order.
//!
//! # Example
//!
//! ```no_run
//! use spandupe::duplicates::{DuplicateGroup, RetentionSelector};
//! use spandupe::volume::DiskSpaceOracle;
//!
//! fn decide(group: DuplicateGroup) {
//!     let oracle = DiskSpaceOracle::new();
//!     if let Some(decision) = RetentionSelector::new(&oracle).select(group) {
//!         println!("keep {} on {}", decision.relative, decision.keep.volume_id());
//!     }
//! }
//! ```

use serde::Serialize;

use super::DuplicateGroup;
use crate::scanner::{FileRecord, RelativePath};
use crate::volume::{free_space_or_zero, SpaceOracle};

/// Free space of one volume at decision time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpaceReading {
    /// Volume identifier
    pub volume: String,
    /// Free bytes (0 when the query failed)
    pub free_space: u64,
}

/// Which copy of a group survives and which are removed.
#[derive(Debug, Clone)]
pub struct RetentionDecision {
    /// Shared relative path
    pub relative: RelativePath,
    /// File size in bytes
    pub size: u64,
    /// Copy on the volume with the most free space
    pub keep: FileRecord,
    /// Every other copy
    pub remove: Vec<FileRecord>,
    /// Readings in member order, as observed for this decision
    pub readings: Vec<SpaceReading>,
}

impl RetentionDecision {
    /// Bytes that deleting every removal target would free.
    #[must_use]
    pub fn reclaimable(&self) -> u64 {
        self.remove.iter().map(|r| r.size).sum()
    }
}

/// Picks the survivor of each duplicate group.
pub struct RetentionSelector<'a> {
    oracle: &'a dyn SpaceOracle,
}

impl<'a> RetentionSelector<'a> {
    /// Create a selector reading free space from `oracle`.
    #[must_use]
    pub fn new(oracle: &'a dyn SpaceOracle) -> Self {
        Self { oracle }
    }

    /// Decide which member of `group` to keep.
    ///
    /// Consumes the group so each group is decided at most once. Returns
    /// `None` only for a group without members.
    #[must_use]
    pub fn select(&self, group: DuplicateGroup) -> Option<RetentionDecision> {
        let relative = group.relative_path().clone();
        let size = group.size();

        let mut ranked: Vec<(u64, FileRecord)> = group
            .into_members()
            .into_iter()
            .map(|member| (free_space_or_zero(self.oracle, &member.volume), member))
            .collect();

        let readings = ranked
            .iter()
            .map(|(free, member)| SpaceReading {
                volume: member.volume_id().to_string(),
                free_space: *free,
            })
            .collect();

        // sort_by is stable; equal readings keep candidate order
        ranked.sort_by(|a, b| b.0.cmp(&a.0));

        let mut members = ranked.into_iter().map(|(_, member)| member);
        let keep = members.next()?;
        let remove: Vec<FileRecord> = members.collect();

        log::debug!(
            "Keeping {} on {} ({} removal(s))",
            relative,
            keep.volume_id(),
            remove.len()
        );

        Some(RetentionDecision {
            relative,
            size,
            keep,
            remove,
            readings,
        })
    }
}
