//! JSON output for cleanup runs.
//!
//! Provides machine-readable JSON output for scripting and automation.
//! The document is written once, after the run.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "duplicates": [
//!     {
//!       "path": "/movies/X.mkv",
//!       "size": 5242880,
//!       "fingerprint": "full:ab12...",
//!       "volumes": ["A", "B"],
//!       "files": ["/mnt/A/movies/X.mkv", "/mnt/B/movies/X.mkv"],
//!       "kept": "/mnt/A/movies/X.mkv",
//!       "removed": ["/mnt/B/movies/X.mkv"],
//!       "failed": []
//!     }
//!   ],
//!   "summary": {
//!     "mode": "deletion",
//!     "files_checked": 1,
//!     "duplicate_groups": 1,
//!     "files_deleted": 1,
//!     "...": "..."
//!   }
//! }
//! ```
//!
//! `kept`, `removed` and `failed` are only present in deletion mode.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::actions::BatchDeleteResult;
use crate::cleanup::{CleanupSummary, ReportSink, RunMode};
use crate::duplicates::{DuplicateGroup, RetentionDecision};
use crate::error::ExitCode;
use crate::scanner::FileRecord;

/// A single duplicate group in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicateGroup {
    /// Relative path shared by every copy
    pub path: String,
    /// File size in bytes
    pub size: u64,
    /// Fingerprint tier and leading digest
    pub fingerprint: String,
    /// Volume identifiers, in group order
    pub volumes: Vec<String>,
    /// Absolute paths of every copy
    pub files: Vec<String>,
    /// Copy that was kept (deletion mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kept: Option<String>,
    /// Copies that were removed (deletion mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<Vec<String>>,
    /// Copies whose removal failed (deletion mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<Vec<String>>,
}

impl JsonDuplicateGroup {
    /// Create a JSON group from a confirmed duplicate group.
    #[must_use]
    pub fn from_duplicate_group(group: &DuplicateGroup) -> Self {
        Self {
            path: group.relative_path().to_string(),
            size: group.size(),
            fingerprint: group.fingerprint().to_string(),
            volumes: group.volume_ids().iter().map(|s| (*s).to_string()).collect(),
            files: group.members().iter().map(display_path).collect(),
            kept: None,
            removed: None,
            failed: None,
        }
    }

    /// Create a JSON group from a carried-out retention decision.
    #[must_use]
    pub fn from_decision(
        group: &JsonDuplicateGroup,
        decision: &RetentionDecision,
        result: &BatchDeleteResult,
    ) -> Self {
        Self {
            kept: Some(display_path(&decision.keep)),
            removed: Some(
                result
                    .successes
                    .iter()
                    .map(|s| s.path.to_string_lossy().into_owned())
                    .collect(),
            ),
            failed: Some(
                result
                    .failures
                    .iter()
                    .map(|(p, _)| p.to_string_lossy().into_owned())
                    .collect(),
            ),
            ..group.clone()
        }
    }
}

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Run mode ("dry-run" or "deletion")
    pub mode: String,
    /// Reference files processed
    pub files_checked: usize,
    /// Reference files present on another volume
    pub matched_paths: usize,
    /// Confirmed duplicate groups
    pub duplicate_groups: usize,
    /// Redundant copies removed
    pub files_deleted: usize,
    /// Removals that failed
    pub deletion_failures: usize,
    /// Candidates that could not be read
    pub unreadable_files: usize,
    /// Errors while walking the reference volume
    pub scan_errors: usize,
    /// Bytes freed
    pub bytes_reclaimed: u64,
    /// Bytes the confirmed groups could free
    pub bytes_reclaimable: u64,
    /// Files fingerprinted
    pub files_fingerprinted: usize,
    /// Content bytes read for fingerprints
    pub bytes_fingerprinted: u64,
    /// Duration of the run in milliseconds
    pub duration_ms: u64,
    /// Whether the run was interrupted
    pub interrupted: bool,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "SD000")
    pub exit_code_name: String,
}

impl JsonSummary {
    /// Create a JSON summary from a cleanup summary and an exit code.
    #[must_use]
    pub fn from_cleanup_summary(summary: &CleanupSummary, exit_code: ExitCode) -> Self {
        Self {
            mode: summary.mode.to_string(),
            files_checked: summary.files_checked,
            matched_paths: summary.matched_paths,
            duplicate_groups: summary.duplicate_groups,
            files_deleted: summary.files_deleted,
            deletion_failures: summary.deletion_failures,
            unreadable_files: summary.unreadable_files,
            scan_errors: summary.scan_errors,
            bytes_reclaimed: summary.bytes_reclaimed,
            bytes_reclaimable: summary.bytes_reclaimable,
            files_fingerprinted: summary.files_fingerprinted,
            bytes_fingerprinted: summary.bytes_fingerprinted,
            duration_ms: u64::try_from(summary.duration.as_millis()).unwrap_or(u64::MAX),
            interrupted: summary.interrupted,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// Duplicate groups in the order they were confirmed
    pub duplicates: Vec<JsonDuplicateGroup>,
    /// Run summary statistics
    pub summary: JsonSummary,
}

impl JsonOutput {
    /// Create a new JSON output from groups, summary and exit code.
    #[must_use]
    pub fn new(
        duplicates: Vec<JsonDuplicateGroup>,
        summary: &CleanupSummary,
        exit_code: ExitCode,
    ) -> Self {
        Self {
            duplicates,
            summary: JsonSummary::from_cleanup_summary(summary, exit_code),
        }
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON to a writer, followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// [`ReportSink`] that collects groups for a single JSON document.
///
/// In dry-run mode a group is recorded when it is confirmed; in deletion mode
/// it is recorded once its removals have been attempted, together with the
/// outcome.
#[derive(Debug)]
pub struct JsonReporter {
    mode: RunMode,
    groups: Mutex<Vec<JsonDuplicateGroup>>,
}

impl JsonReporter {
    /// Create a reporter for a run in `mode`.
    #[must_use]
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            groups: Mutex::new(Vec::new()),
        }
    }

    /// Build the final document.
    #[must_use]
    pub fn finish(self, summary: &CleanupSummary, exit_code: ExitCode) -> JsonOutput {
        let groups = self
            .groups
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        JsonOutput::new(groups, summary, exit_code)
    }

    fn push(&self, group: JsonDuplicateGroup) {
        self.groups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(group);
    }
}

impl ReportSink for JsonReporter {
    fn on_duplicate(&self, group: &DuplicateGroup) {
        if self.mode == RunMode::DryRun {
            self.push(JsonDuplicateGroup::from_duplicate_group(group));
        }
    }

    fn on_resolved(&self, decision: &RetentionDecision, result: &BatchDeleteResult) {
        if self.mode != RunMode::Delete {
            return;
        }
        let mut members = vec![decision.keep.clone()];
        members.extend(decision.remove.iter().cloned());
        // Readings are in group order; restore it for the report.
        members.sort_by_key(|m| {
            decision
                .readings
                .iter()
                .position(|r| r.volume == m.volume_id())
                .unwrap_or(usize::MAX)
        });

        let base = JsonDuplicateGroup {
            path: decision.relative.to_string(),
            size: decision.size,
            fingerprint: decision
                .keep
                .fingerprint_cached()
                .map(ToString::to_string)
                .unwrap_or_default(),
            volumes: members.iter().map(|m| m.volume_id().to_string()).collect(),
            files: members.iter().map(display_path).collect(),
            kept: None,
            removed: None,
            failed: None,
        };
        self.push(JsonDuplicateGroup::from_decision(&base, decision, result));
    }
}

fn display_path(record: &FileRecord) -> String {
    record.path.to_string_lossy().into_owned()
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
