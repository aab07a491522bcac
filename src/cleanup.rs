//! Cleanup pipeline orchestration.
//!
//! # Overview
//!
//! [`CleanupDriver::run`] walks the reference volume and, for each file:
//! 1. **Match** - probe the other volumes for the same relative path
//! 2. **Group** - fingerprint the matched copies and group equal fingerprints
//! 3. **Report** - hand every confirmed group to the [`ReportSink`]
//! 4. **Decide** - keep the copy on the volume with the most free space
//! 5. **Act** - remove the other copies (skipped in dry-run mode)
//!
//! Reference files are processed on a bounded rayon pool. Decisions and
//! deletions run one group at a time under a lock, so every free-space
//! reading reflects all deletions completed before it.
//!
//! # Example
//!
//! ```no_run
//! use spandupe::cleanup::{CleanupConfig, CleanupDriver, NullSink};
//! use spandupe::volume::{DiskSpaceOracle, VolumeTable};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let table = VolumeTable::from_roots(
//!     vec![PathBuf::from("/mnt/disk1"), PathBuf::from("/mnt/disk2")],
//!     None,
//! ).unwrap();
//!
//! let driver = CleanupDriver::new(
//!     CleanupConfig::default().with_dry_run(true),
//!     Arc::new(DiskSpaceOracle::new()),
//! );
//! let summary = driver.run(&table, &NullSink).unwrap();
//! println!("{} duplicate groups", summary.duplicate_groups);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;

use crate::actions::{delete_redundant, BatchDeleteResult};
use crate::duplicates::{
    group_candidates, DuplicateGroup, PathMatcher, RetentionDecision, RetentionSelector,
};
use crate::progress::ProgressCallback;
use crate::scanner::{FileRecord, Fingerprinter, Walker, WalkerConfig};
use crate::volume::{validate_reference_root, SpaceOracle, VolumeError, VolumeTable};

/// Reference files buffered from the walker before each parallel batch.
const BATCH_SIZE: usize = 256;

/// Receives confirmed groups and deletion outcomes as the run progresses.
///
/// Called from worker threads; implementations must be thread-safe.
pub trait ReportSink: Send + Sync {
    /// A duplicate group was confirmed. Called in both modes.
    fn on_duplicate(&self, group: &DuplicateGroup);

    /// A group was decided and its redundant copies were processed.
    /// Only called in deletion mode.
    fn on_resolved(&self, _decision: &RetentionDecision, _result: &BatchDeleteResult) {}
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn on_duplicate(&self, _group: &DuplicateGroup) {}
}

/// Whether redundant copies are removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Report duplicates only
    #[default]
    DryRun,
    /// Report and remove redundant copies
    Delete,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DryRun => write!(f, "dry-run"),
            Self::Delete => write!(f, "deletion"),
        }
    }
}

/// Configuration for a cleanup run.
#[derive(Clone)]
pub struct CleanupConfig {
    /// Report without deleting.
    pub dry_run: bool,
    /// Stop after this many reference files.
    pub sample_limit: Option<usize>,
    /// Worker threads for matching and fingerprinting.
    /// Default is 4 to prevent disk thrashing; 1 processes files in walk order.
    pub io_threads: usize,
    /// Reference volume enumeration options.
    pub walker_config: WalkerConfig,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl fmt::Debug for CleanupConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupConfig")
            .field("dry_run", &self.dry_run)
            .field("sample_limit", &self.sample_limit)
            .field("io_threads", &self.io_threads)
            .field("walker_config", &self.walker_config)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            sample_limit: None,
            io_threads: 4,
            walker_config: WalkerConfig::default(),
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl CleanupConfig {
    /// Set dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Cap the number of reference files processed.
    #[must_use]
    pub fn with_sample_limit(mut self, limit: Option<usize>) -> Self {
        self.sample_limit = limit;
        self
    }

    /// Set the worker thread count (at least 1).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Mode implied by `dry_run`.
    #[must_use]
    pub fn mode(&self) -> RunMode {
        if self.dry_run {
            RunMode::DryRun
        } else {
            RunMode::Delete
        }
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Statistics from a cleanup run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    /// Dry-run or deletion
    pub mode: RunMode,
    /// Reference files processed
    pub files_checked: usize,
    /// Reference files whose path exists on at least one other volume
    pub matched_paths: usize,
    /// Confirmed duplicate groups
    pub duplicate_groups: usize,
    /// Redundant copies removed
    pub files_deleted: usize,
    /// Removals that failed
    pub deletion_failures: usize,
    /// Candidates excluded because they could not be read
    pub unreadable_files: usize,
    /// Errors while walking the reference volume
    pub scan_errors: usize,
    /// Bytes freed by removals
    pub bytes_reclaimed: u64,
    /// Bytes all confirmed groups could free
    pub bytes_reclaimable: u64,
    /// Files fingerprinted
    pub files_fingerprinted: usize,
    /// Content bytes read for fingerprints
    pub bytes_fingerprinted: u64,
    /// Whether the run stopped on a shutdown request
    pub interrupted: bool,
    /// Wall-clock duration of the run
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,
}

fn serialize_duration<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Errors that abort a run before any file is processed.
#[derive(thiserror::Error, Debug)]
pub enum CleanupError {
    /// The volume table is unusable.
    #[error(transparent)]
    Volume(#[from] VolumeError),

    /// The worker pool could not be created.
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Run-local counters shared by the workers.
#[derive(Debug, Default)]
struct RunStats {
    files_checked: AtomicUsize,
    matched_paths: AtomicUsize,
    duplicate_groups: AtomicUsize,
    files_deleted: AtomicUsize,
    deletion_failures: AtomicUsize,
    unreadable_files: AtomicUsize,
    scan_errors: AtomicUsize,
    bytes_reclaimed: AtomicU64,
    bytes_reclaimable: AtomicU64,
}

/// Borrowed state for one run.
struct RunContext<'a> {
    matcher: &'a PathMatcher,
    fingerprinter: &'a Fingerprinter,
    stats: &'a RunStats,
    sink: &'a dyn ReportSink,
}

/// Drives the match → fingerprint → group → decide → act pipeline.
pub struct CleanupDriver {
    config: CleanupConfig,
    oracle: Arc<dyn SpaceOracle>,
    decision_lock: Mutex<()>,
}

impl CleanupDriver {
    /// Create a driver reading free space from `oracle`.
    #[must_use]
    pub fn new(config: CleanupConfig, oracle: Arc<dyn SpaceOracle>) -> Self {
        Self {
            config,
            oracle,
            decision_lock: Mutex::new(()),
        }
    }

    /// The driver's configuration.
    #[must_use]
    pub fn config(&self) -> &CleanupConfig {
        &self.config
    }

    /// Process every file on the reference volume of `volumes`.
    ///
    /// Per-file failures are counted in the summary and never returned.
    ///
    /// # Errors
    ///
    /// Returns [`CleanupError`] if the reference root is missing, fewer than
    /// two volumes are configured, or the worker pool cannot be built.
    pub fn run(
        &self,
        volumes: &VolumeTable,
        sink: &dyn ReportSink,
    ) -> Result<CleanupSummary, CleanupError> {
        let start = Instant::now();

        if volumes.len() < 2 {
            return Err(VolumeError::TooFewVolumes(volumes.len()).into());
        }
        validate_reference_root(volumes.reference().root())?;

        let pool = if self.config.io_threads > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(self.config.io_threads)
                    .build()?,
            )
        } else {
            None
        };

        log::info!(
            "Checking {} against {} other volume(s) ({} mode)",
            volumes.reference(),
            volumes.others().len(),
            self.config.mode()
        );

        let matcher = PathMatcher::from_table(volumes)
            .with_follow_symlinks(self.config.walker_config.follow_symlinks);
        let fingerprinter = Fingerprinter::new();
        let stats = RunStats::default();
        let ctx = RunContext {
            matcher: &matcher,
            fingerprinter: &fingerprinter,
            stats: &stats,
            sink,
        };

        let mut walker = Walker::new(
            Arc::clone(volumes.reference()),
            self.config.walker_config.clone(),
        );
        if let Some(flag) = &self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }

        if let Some(cb) = &self.config.progress_callback {
            cb.on_phase_start("checking", self.config.sample_limit.unwrap_or(0));
        }

        let mut batch: Vec<FileRecord> = Vec::with_capacity(BATCH_SIZE);
        let mut taken = 0usize;
        for entry in walker.walk() {
            if self.config.is_shutdown_requested() {
                if let Some(cb) = &self.config.progress_callback {
                    cb.on_message("Interrupted, finishing current groups");
                }
                break;
            }
            if self.config.sample_limit.is_some_and(|limit| taken >= limit) {
                log::info!("Sample limit of {} files reached", taken);
                break;
            }

            match entry {
                Ok(record) => {
                    taken += 1;
                    batch.push(record);
                    if batch.len() >= BATCH_SIZE {
                        self.process_batch(pool.as_ref(), std::mem::take(&mut batch), &ctx);
                    }
                }
                Err(e) => {
                    stats.scan_errors.fetch_add(1, Ordering::Relaxed);
                    log::debug!("Skipping unreadable entry: {}", e);
                }
            }
        }
        self.process_batch(pool.as_ref(), batch, &ctx);

        if let Some(cb) = &self.config.progress_callback {
            cb.on_phase_end("checking");
        }

        let counts = fingerprinter.counts();
        let summary = CleanupSummary {
            mode: self.config.mode(),
            files_checked: stats.files_checked.load(Ordering::Relaxed),
            matched_paths: stats.matched_paths.load(Ordering::Relaxed),
            duplicate_groups: stats.duplicate_groups.load(Ordering::Relaxed),
            files_deleted: stats.files_deleted.load(Ordering::Relaxed),
            deletion_failures: stats.deletion_failures.load(Ordering::Relaxed),
            unreadable_files: stats.unreadable_files.load(Ordering::Relaxed),
            scan_errors: stats.scan_errors.load(Ordering::Relaxed),
            bytes_reclaimed: stats.bytes_reclaimed.load(Ordering::Relaxed),
            bytes_reclaimable: stats.bytes_reclaimable.load(Ordering::Relaxed),
            files_fingerprinted: counts.files,
            bytes_fingerprinted: counts.bytes_read,
            interrupted: self.config.is_shutdown_requested(),
            duration: start.elapsed(),
        };

        log::info!(
            "Checked {} files: {} on several volumes, {} duplicate groups, {} deleted ({} failed)",
            summary.files_checked,
            summary.matched_paths,
            summary.duplicate_groups,
            summary.files_deleted,
            summary.deletion_failures
        );

        Ok(summary)
    }

    fn process_batch(
        &self,
        pool: Option<&rayon::ThreadPool>,
        batch: Vec<FileRecord>,
        ctx: &RunContext<'_>,
    ) {
        match pool {
            Some(pool) => pool.install(|| {
                batch
                    .into_par_iter()
                    .for_each(|record| self.process_file(record, ctx));
            }),
            None => batch
                .into_iter()
                .for_each(|record| self.process_file(record, ctx)),
        }
    }

    fn process_file(&self, record: FileRecord, ctx: &RunContext<'_>) {
        if self.config.is_shutdown_requested() {
            return;
        }

        let checked = ctx.stats.files_checked.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(cb) = &self.config.progress_callback {
            cb.on_progress(checked, &record.relative.to_string());
        }

        let set = ctx.matcher.match_candidates(record);
        if !set.is_matched() {
            return;
        }
        ctx.stats.matched_paths.fetch_add(1, Ordering::Relaxed);

        let outcome = group_candidates(set, ctx.fingerprinter);
        ctx.stats
            .unreadable_files
            .fetch_add(outcome.unreadable, Ordering::Relaxed);

        for group in outcome.groups {
            ctx.stats.duplicate_groups.fetch_add(1, Ordering::Relaxed);
            ctx.stats
                .bytes_reclaimable
                .fetch_add(group.potential_savings(), Ordering::Relaxed);
            ctx.sink.on_duplicate(&group);

            if self.config.dry_run {
                continue;
            }
            self.resolve(group, ctx);
        }
    }

    /// Decide and delete one group while holding the decision lock.
    fn resolve(&self, group: DuplicateGroup, ctx: &RunContext<'_>) {
        let (decision, result) = {
            let _guard = self
                .decision_lock
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let Some(decision) = RetentionSelector::new(self.oracle.as_ref()).select(group) else {
                return;
            };
            let result = delete_redundant(&decision);
            (decision, result)
        };

        ctx.stats
            .files_deleted
            .fetch_add(result.success_count(), Ordering::Relaxed);
        ctx.stats
            .deletion_failures
            .fetch_add(result.failure_count(), Ordering::Relaxed);
        ctx.stats
            .bytes_reclaimed
            .fetch_add(result.bytes_freed, Ordering::Relaxed);
        ctx.sink.on_resolved(&decision, &result);
    }
}
