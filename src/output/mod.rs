//! Output formatters for cleanup runs.
//!
//! This module provides two output formats:
//! - Text: one line per confirmed group as it is found, then a summary
//! - JSON: a single document after the run (see [`json`])
//!
//! # Example
//!
//! ```
//! use spandupe::output::join_volume_list;
//!
//! assert_eq!(join_volume_list(&["A", "B", "C"]), "A, B and C");
//! ```

pub mod json;

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use bytesize::ByteSize;
use yansi::Paint;

use crate::cleanup::{CleanupSummary, ReportSink, RunMode};
use crate::duplicates::DuplicateGroup;

pub use json::{JsonOutput, JsonReporter};

/// Join volume identifiers for display: `A`, `A and B`, `A, B and C`.
#[must_use]
pub fn join_volume_list<S: AsRef<str>>(ids: &[S]) -> String {
    match ids {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [head @ .., last] => {
            let head: Vec<&str> = head.iter().map(AsRef::as_ref).collect();
            format!("{} and {}", head.join(", "), last.as_ref())
        }
    }
}

/// The report line for one confirmed group.
///
/// `Duplicate found: /<path> (size=<bytes>) exists on <volumes>`
#[must_use]
pub fn format_duplicate_line(group: &DuplicateGroup) -> String {
    format!(
        "Duplicate found: {} (size={}) exists on {}",
        group.relative_path(),
        group.size(),
        join_volume_list(&group.volume_ids())
    )
}

/// Render the end-of-run summary block.
#[must_use]
pub fn render_summary(summary: &CleanupSummary) -> String {
    let mut lines = vec![
        format!("{}", "Summary".bold()),
        format!("  Files checked:          {}", summary.files_checked),
        format!("  Duplicate groups found: {}", summary.duplicate_groups),
        format!("  Mode:                   {}", summary.mode),
    ];

    match summary.mode {
        RunMode::Delete => {
            lines.push(format!(
                "  Files deleted:          {}",
                summary.files_deleted.green()
            ));
            lines.push(format!(
                "  Space reclaimed:        {}",
                ByteSize::b(summary.bytes_reclaimed)
            ));
            if summary.deletion_failures > 0 {
                lines.push(format!(
                    "  Deletion failures:      {}",
                    summary.deletion_failures.red()
                ));
            }
        }
        RunMode::DryRun => {
            lines.push(format!(
                "  Reclaimable:            {}",
                ByteSize::b(summary.bytes_reclaimable)
            ));
        }
    }

    if summary.unreadable_files > 0 {
        lines.push(format!(
            "  Unreadable files:       {}",
            summary.unreadable_files.yellow()
        ));
    }
    if summary.interrupted {
        lines.push(format!("  {}", "Interrupted before completion".yellow()));
    }

    lines.join("\n")
}

/// [`ReportSink`] writing one text line per confirmed group.
///
/// Lines are written as groups are found, so they appear while the run is
/// still in progress.
pub struct TextReporter<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> TextReporter<W> {
    /// Create a reporter writing to `writer`.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Write the summary block.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_summary(&self, summary: &CleanupSummary) -> std::io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer)?;
        writeln!(writer, "{}", render_summary(summary))?;
        writer.flush()
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> ReportSink for TextReporter<W> {
    fn on_duplicate(&self, group: &DuplicateGroup) {
        let line = format_duplicate_line(group);
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(writer, "{line}") {
            log::warn!("Failed to write report line: {}", e);
        }
    }
}
