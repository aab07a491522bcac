//! Cross-volume path matching.
//!
//! For a file on the reference volume, [`PathMatcher`] probes every other
//! volume for a regular file at the same relative path. Only metadata is
//! touched here; no file content is read.
//!
//! A path that reaches data already in the set (a symlink to it, or a volume
//! root aliasing another volume) is not a copy and is left out.

use std::fs;
use std::sync::Arc;

use super::CandidateSet;
use crate::scanner::{FileIdentity, FileRecord};
use crate::volume::{Volume, VolumeTable};

/// Builds [`CandidateSet`]s by probing the non-reference volumes.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    others: Vec<Arc<Volume>>,
    follow_symlinks: bool,
}

impl PathMatcher {
    /// Create a matcher probing `others` in the given order.
    #[must_use]
    pub fn new(others: Vec<Arc<Volume>>) -> Self {
        Self {
            others,
            follow_symlinks: false,
        }
    }

    /// Accept copies that are symlinks to regular files.
    #[must_use]
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Create a matcher over every non-reference volume of `table`.
    #[must_use]
    pub fn from_table(table: &VolumeTable) -> Self {
        Self::new(table.others().to_vec())
    }

    /// Collect the copies of `reference` on every other volume.
    ///
    /// A path counts as present only if it is a regular file; symlinks count
    /// only when following them is enabled.
    #[must_use]
    pub fn match_candidates(&self, reference: FileRecord) -> CandidateSet {
        let relative = reference.relative.clone();
        let mut seen: Vec<FileIdentity> = FileIdentity::of_path(&reference.path).into_iter().collect();
        let mut set = CandidateSet::new(reference);

        for volume in &self.others {
            let candidate = relative.resolve(volume.root());
            let metadata = if self.follow_symlinks {
                fs::metadata(&candidate)
            } else {
                fs::symlink_metadata(&candidate)
            };
            let Ok(metadata) = metadata else { continue };
            if !metadata.is_file() {
                continue;
            }

            if let Some(identity) = FileIdentity::of_path(&candidate) {
                if seen.contains(&identity) {
                    log::debug!(
                        "{} on {} is the same file as an earlier copy, skipping",
                        relative,
                        volume.id()
                    );
                    continue;
                }
                seen.push(identity);
            }
            set.push(FileRecord::from_metadata(Arc::clone(volume), relative.clone(), &metadata));
        }

        if set.is_matched() {
            log::trace!("{} present on {} volumes", relative, set.len());
        }
        set
    }
}
