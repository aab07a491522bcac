//! Verified removal of redundant copies.
//!
//! # Overview
//!
//! This module carries out a [`RetentionDecision`]:
//! - The survivor must still exist before each removal
//! - Each target is re-checked against its scanned size and mtime (TOCTOU protection)
//! - A target that is the survivor's own data (symlink, hardlink, aliased
//!   volume root) is never removed
//! - Removal is permanent, so the space comes back to the volume
//! - Failures are recorded per file and never abort the batch
//!
//! # Safety
//!
//! The survivor is never a removal target, and nothing is removed once the
//! survivor has vanished.
//!
//! # Example
//!
//! ```no_run
//! use spandupe::actions::delete::delete_redundant;
//! use spandupe::duplicates::RetentionDecision;
//!
//! fn apply(decision: &RetentionDecision) {
//!     let result = delete_redundant(decision);
//!     println!("{}", result.summary());
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;

use crate::duplicates::RetentionDecision;
use crate::scanner::{same_file, FileRecord};

/// Error type for deletion operations.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when attempting to delete.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// File was modified since it was fingerprinted.
    #[error("file modified since scan: {0}")]
    Modified(PathBuf),

    /// The copy chosen to survive is gone, so no other copy may be removed.
    #[error("surviving copy vanished: {0}")]
    SurvivorMissing(PathBuf),

    /// The target and the survivor are the same physical file.
    #[error("{target} is the same file as the surviving copy {survivor}")]
    SameFile {
        /// Path that was to be removed
        target: PathBuf,
        /// Path of the surviving copy
        survivor: PathBuf,
    },

    /// Removing the file failed.
    #[error("delete failed for {path}: {message}")]
    Failed {
        /// File that could not be removed
        path: PathBuf,
        /// Description of the failure
        message: String,
    },

    /// Attempted to delete all copies (at least one must be preserved).
    #[error("cannot delete all copies - at least one file must be preserved")]
    AllCopiesWouldBeDeleted,

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl DeleteError {
    /// Get the path associated with this error (if any).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::Modified(p)
            | Self::SurvivorMissing(p)
            | Self::SameFile { target: p, .. }
            | Self::Failed { path: p, .. }
            | Self::Io { path: p, .. } => Some(p),
            Self::AllCopiesWouldBeDeleted => None,
        }
    }

    fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Result of a successful deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteResult {
    /// Path that was deleted.
    pub path: PathBuf,
    /// Size of the deleted file in bytes.
    pub size: u64,
}

impl DeleteResult {
    /// Create a new delete result.
    #[must_use]
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self { path, size }
    }
}

/// Results of removing every redundant copy of one group.
#[derive(Debug, Clone, Default)]
pub struct BatchDeleteResult {
    /// Successfully deleted files.
    pub successes: Vec<DeleteResult>,
    /// Failed deletions with their errors.
    pub failures: Vec<(PathBuf, String)>,
    /// Total bytes freed.
    pub bytes_freed: u64,
}

impl BatchDeleteResult {
    /// Number of successful deletions.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    /// Number of failed deletions.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Total number of attempted deletions.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// Check if all deletions succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.all_succeeded() {
            format!(
                "Deleted {} file(s), freed {} bytes",
                self.success_count(),
                self.bytes_freed
            )
        } else {
            format!(
                "Deleted {} file(s), {} failed, freed {} bytes",
                self.success_count(),
                self.failure_count(),
                self.bytes_freed
            )
        }
    }

    fn record_failure(&mut self, error: &DeleteError, fallback: &Path) {
        let path = error.path().unwrap_or(fallback).to_path_buf();
        log::debug!("Failed to delete {}: {}", fallback.display(), error);
        self.failures.push((path, error.to_string()));
    }
}

/// File metadata snapshot for TOCTOU verification.
///
/// Taken when the file is scanned and compared against the live file right
/// before removal.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    /// Path to the file.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Last modification time.
    pub mtime: Option<SystemTime>,
}

impl FileSnapshot {
    /// Snapshot of a record as it was when scanned.
    #[must_use]
    pub fn from_record(record: &FileRecord) -> Self {
        Self {
            path: record.path.clone(),
            size: record.size,
            mtime: record.mtime,
        }
    }

    /// Create a snapshot of a file's current state.
    ///
    /// # Errors
    ///
    /// Returns error if file doesn't exist or can't be accessed.
    pub fn capture(path: &Path) -> Result<Self, DeleteError> {
        let metadata = fs::metadata(path).map_err(|e| DeleteError::from_io(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            mtime: metadata.modified().ok(),
        })
    }

    /// Verify that the file still matches this snapshot.
    ///
    /// The mtime is compared only when both sides know it.
    ///
    /// # Errors
    ///
    /// Returns error if file was modified, deleted, or can't be accessed.
    pub fn verify(&self) -> Result<(), DeleteError> {
        let current = Self::capture(&self.path)?;

        if current.size != self.size {
            log::debug!(
                "File modified since scan: {} (size changed from {} to {})",
                self.path.display(),
                self.size,
                current.size
            );
            return Err(DeleteError::Modified(self.path.clone()));
        }

        if let (Some(orig), Some(curr)) = (self.mtime, current.mtime) {
            if orig != curr {
                log::debug!(
                    "File modified since scan: {} (mtime changed)",
                    self.path.display()
                );
                return Err(DeleteError::Modified(self.path.clone()));
            }
        }

        Ok(())
    }
}

/// Permanently delete a single file.
///
/// **WARNING**: This operation cannot be undone.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if the file can't be stat'ed
/// - `Failed` if the remove operation fails
pub fn permanent_delete(path: &Path) -> Result<DeleteResult, DeleteError> {
    let metadata = fs::metadata(path).map_err(|e| DeleteError::from_io(path, e))?;
    let size = metadata.len();

    fs::remove_file(path).map_err(|e| DeleteError::Failed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    log::debug!("Deleted: {} ({} bytes)", path.display(), size);

    Ok(DeleteResult::new(path.to_path_buf(), size))
}

/// Validate that a selection doesn't delete all copies.
///
/// # Errors
///
/// Returns `AllCopiesWouldBeDeleted` if all copies would be deleted.
///
/// # Example
///
/// ```
/// use spandupe::actions::delete::validate_preserves_copy;
/// use std::path::PathBuf;
///
/// let group = vec![
///     PathBuf::from("/mnt/disk1/a.mkv"),
///     PathBuf::from("/mnt/disk2/a.mkv"),
/// ];
///
/// assert!(validate_preserves_copy(&group[1..], &group).is_ok());
/// assert!(validate_preserves_copy(&group, &group).is_err());
/// ```
pub fn validate_preserves_copy(
    selected_paths: &[PathBuf],
    group_paths: &[PathBuf],
) -> Result<(), DeleteError> {
    let selected_set: HashSet<&PathBuf> = selected_paths.iter().collect();
    let preserved_count = group_paths
        .iter()
        .filter(|p| !selected_set.contains(p))
        .count();

    if preserved_count == 0 {
        log::error!(
            "Attempted to delete all {} copies of a duplicate group",
            group_paths.len()
        );
        Err(DeleteError::AllCopiesWouldBeDeleted)
    } else {
        Ok(())
    }
}

/// Remove every redundant copy named by `decision`.
///
/// Each removal is attempted independently. Before each one the target is
/// checked to still have its scanned size and mtime, the survivor to still be
/// a regular file, and the two to be different physical files. Failures are
/// recorded in the result, never raised.
#[must_use]
pub fn delete_redundant(decision: &RetentionDecision) -> BatchDeleteResult {
    let mut result = BatchDeleteResult::default();

    let targets: Vec<PathBuf> = decision.remove.iter().map(|r| r.path.clone()).collect();
    let mut group = targets.clone();
    group.push(decision.keep.path.clone());
    if let Err(e) = validate_preserves_copy(&targets, &group) {
        for target in &targets {
            result.record_failure(&e, target);
        }
        return result;
    }

    for target in &decision.remove {
        match delete_one(&decision.keep, target) {
            Ok(deleted) => {
                result.bytes_freed += deleted.size;
                result.successes.push(deleted);
            }
            Err(e) => result.record_failure(&e, &target.path),
        }
    }

    log::debug!("{}: {}", decision.relative, result.summary());
    result
}

fn delete_one(keep: &FileRecord, target: &FileRecord) -> Result<DeleteResult, DeleteError> {
    FileSnapshot::from_record(target).verify()?;

    if !keep.path.is_file() {
        return Err(DeleteError::SurvivorMissing(keep.path.clone()));
    }
    if same_file(&keep.path, &target.path) {
        return Err(DeleteError::SameFile {
            target: target.path.clone(),
            survivor: keep.path.clone(),
        });
    }

    permanent_delete(&target.path)
}
