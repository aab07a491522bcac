//! Candidate sets and fingerprint grouping.
//!
//! # Overview
//!
//! A [`CandidateSet`] holds the copies of one relative path found across
//! volumes, reference copy first. [`group_candidates`] fingerprints the
//! members of a set and partitions them into [`DuplicateGroup`]s.
//!
//! Sets with a single member are never fingerprinted. Buckets with fewer than
//! two members, or whose members all sit on the same volume, are dropped
//! without being reported.
//!
//! # Example
//!
//! ```no_run
//! use spandupe::duplicates::{group_candidates, CandidateSet};
//! use spandupe::scanner::{FileRecord, Fingerprinter, RelativePath};
//! use spandupe::volume::Volume;
//! use std::sync::Arc;
//!
//! let rel = RelativePath::new("movies/x.mkv");
//! let a = Arc::new(Volume::new("disk1", "/mnt/disk1"));
//! let b = Arc::new(Volume::new("disk2", "/mnt/disk2"));
//!
//! let mut set = CandidateSet::new(FileRecord::stat(a, rel.clone()));
//! set.push(FileRecord::stat(b, rel));
//!
//! let outcome = group_candidates(set, &Fingerprinter::new());
//! for group in &outcome.groups {
//!     println!("{} on {:?}", group.relative_path(), group.volume_ids());
//! }
//! ```

use std::collections::HashMap;

use crate::scanner::{FileRecord, Fingerprint, Fingerprinter, RelativePath};

/// The copies of one relative path across volumes.
///
/// Holds at most one record per volume. The reference record is always first,
/// followed by the other volumes in table order.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    relative: RelativePath,
    records: Vec<FileRecord>,
}

impl CandidateSet {
    /// Start a set from the reference volume's record.
    #[must_use]
    pub fn new(reference: FileRecord) -> Self {
        Self {
            relative: reference.relative.clone(),
            records: vec![reference],
        }
    }

    /// Add a copy found on another volume.
    ///
    /// Returns `false` and drops the record if its volume is already
    /// represented or its relative path differs.
    pub fn push(&mut self, record: FileRecord) -> bool {
        if record.relative != self.relative {
            log::debug!(
                "Rejecting {} from candidate set for {}",
                record.relative,
                self.relative
            );
            return false;
        }
        if self
            .records
            .iter()
            .any(|r| r.volume_id() == record.volume_id())
        {
            log::debug!(
                "Volume {} already present in candidate set for {}",
                record.volume_id(),
                self.relative
            );
            return false;
        }
        self.records.push(record);
        true
    }

    /// Shared relative path.
    #[must_use]
    pub fn relative_path(&self) -> &RelativePath {
        &self.relative
    }

    /// The reference volume's record.
    #[must_use]
    pub fn reference(&self) -> &FileRecord {
        &self.records[0]
    }

    /// All records, reference first.
    #[must_use]
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    /// Consume the set, returning its records.
    #[must_use]
    pub fn into_records(self) -> Vec<FileRecord> {
        self.records
    }

    /// Number of volumes holding this path.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always `false`; a set holds at least its reference record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the path exists on at least two volumes.
    #[must_use]
    pub fn is_matched(&self) -> bool {
        self.records.len() >= 2
    }
}

/// Confirmed duplicate group: same relative path, same fingerprint, at least
/// two distinct volumes.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    relative: RelativePath,
    size: u64,
    fingerprint: Fingerprint,
    members: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Build a group from fingerprint-equal members.
    ///
    /// The group size is taken from the first member.
    #[must_use]
    pub fn new(relative: RelativePath, fingerprint: Fingerprint, members: Vec<FileRecord>) -> Self {
        let size = members.first().map_or(0, |m| m.size);
        Self {
            relative,
            size,
            fingerprint,
            members,
        }
    }

    /// Shared relative path.
    #[must_use]
    pub fn relative_path(&self) -> &RelativePath {
        &self.relative
    }

    /// File size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Shared fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Members in candidate order.
    #[must_use]
    pub fn members(&self) -> &[FileRecord] {
        &self.members
    }

    /// Consume the group, returning its members.
    #[must_use]
    pub fn into_members(self) -> Vec<FileRecord> {
        self.members
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Distinct volume identifiers in member order.
    #[must_use]
    pub fn volume_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::with_capacity(self.members.len());
        for member in &self.members {
            if !ids.contains(&member.volume_id()) {
                ids.push(member.volume_id());
            }
        }
        ids
    }

    /// Bytes freed by keeping one copy.
    #[must_use]
    pub fn potential_savings(&self) -> u64 {
        self.members
            .iter()
            .skip(1)
            .map(|m| m.size)
            .sum()
    }
}

/// Result of grouping one candidate set.
#[derive(Debug, Default)]
pub struct GroupingOutcome {
    /// Confirmed groups, ordered by their first member
    pub groups: Vec<DuplicateGroup>,
    /// Members excluded because they could not be read
    pub unreadable: usize,
}

/// Fingerprint the members of `set` and group equal fingerprints.
///
/// Sets with fewer than two members return an empty outcome without any I/O.
#[must_use]
pub fn group_candidates(set: CandidateSet, fingerprinter: &Fingerprinter) -> GroupingOutcome {
    let mut outcome = GroupingOutcome::default();
    if !set.is_matched() {
        return outcome;
    }

    let relative = set.relative_path().clone();
    let mut index: HashMap<Fingerprint, usize> = HashMap::new();
    let mut buckets: Vec<(Fingerprint, Vec<FileRecord>)> = Vec::new();

    for record in set.into_records() {
        let Some(fingerprint) = record.fingerprint_with(fingerprinter).cloned() else {
            outcome.unreadable += 1;
            continue;
        };

        match index.get(&fingerprint) {
            Some(&slot) => buckets[slot].1.push(record),
            None => {
                index.insert(fingerprint.clone(), buckets.len());
                buckets.push((fingerprint, vec![record]));
            }
        }
    }

    for (fingerprint, members) in buckets {
        if members.len() < 2 {
            log::trace!("Singleton fingerprint for {}", relative);
            continue;
        }
        let group = DuplicateGroup::new(relative.clone(), fingerprint, members);
        if group.volume_ids().len() < 2 {
            log::debug!("Discarding single-volume bucket for {}", relative);
            continue;
        }
        outcome.groups.push(group);
    }

    outcome
}
