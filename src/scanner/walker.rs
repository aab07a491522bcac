//! Reference volume enumeration using jwalk.
//!
//! # Overview
//!
//! The [`Walker`] yields a [`FileRecord`] for every regular file below the
//! root of one volume. Children are sorted by name so the enumeration order
//! is stable across runs, which keeps single-threaded cleanup deterministic.
//!
//! # Features
//!
//! - Optional symlink following
//! - Gitignore-style exclude patterns via the `ignore` crate
//! - Hidden file filtering
//! - Graceful shutdown via atomic flag
//!
//! Empty files are yielded like any other file; identical empty files on two
//! volumes are duplicates too.
//!
//! # Example
//!
//! ```no_run
//! use spandupe::scanner::{Walker, WalkerConfig};
//! use spandupe::volume::Volume;
//! use std::sync::Arc;
//!
//! let config = WalkerConfig::default()
//!     .with_skip_hidden(true)
//!     .with_exclude(vec!["*.part".to_string()]);
//!
//! let walker = Walker::new(Arc::new(Volume::new("disk1", "/mnt/disk1")), config);
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(record) => println!("{}: {} bytes", record.relative, record.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;

use super::{FileRecord, RelativePath, ScanError};
use crate::volume::Volume;

/// Configuration for reference volume enumeration.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Follow symbolic links to files and directories
    pub follow_symlinks: bool,
    /// Skip files and directories whose name starts with `.`
    pub skip_hidden: bool,
    /// Gitignore-style patterns, matched against volume-relative paths
    pub exclude: Vec<String>,
}

impl WalkerConfig {
    /// Set whether symlinks are followed.
    #[must_use]
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Set whether hidden entries are skipped.
    #[must_use]
    pub fn with_skip_hidden(mut self, skip: bool) -> Self {
        self.skip_hidden = skip;
        self
    }

    /// Set the exclude patterns.
    #[must_use]
    pub fn with_exclude(mut self, patterns: Vec<String>) -> Self {
        self.exclude = patterns;
        self
    }
}

/// Directory walker over one volume.
#[derive(Debug)]
pub struct Walker {
    volume: Arc<Volume>,
    config: WalkerConfig,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a walker for `volume`.
    #[must_use]
    pub fn new(volume: Arc<Volume>, config: WalkerConfig) -> Self {
        Self {
            volume,
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walker stops yielding entries.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Build the exclude matcher, or `None` when there are no patterns.
    fn build_excludes(&self) -> Option<Gitignore> {
        if self.config.exclude.is_empty() {
            return None;
        }

        let mut builder = GitignoreBuilder::new(self.volume.root());
        for pattern in &self.config.exclude {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid exclude pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if !gitignore.is_empty() => Some(gitignore),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Failed to build exclude patterns: {}", e);
                None
            }
        }
    }

    /// Walk the volume, yielding one record per regular file.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileRecord, ScanError>> + '_ {
        let excludes = self.build_excludes();
        let root = self.volume.root();

        let walk_dir = WalkDir::new(root)
            .follow_links(self.config.follow_symlinks)
            .skip_hidden(self.config.skip_hidden)
            .process_read_dir(|_depth, _path, _read_dir_state, children| {
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        walk_dir.into_iter().filter_map(move |entry_result| {
            if self.is_shutdown_requested() {
                log::debug!("Walker: Shutdown requested, stopping iteration");
                return None;
            }

            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| root.to_path_buf(), std::borrow::ToOwned::to_owned);
                    log::debug!("Walker error for {}: {}", path.display(), e);
                    return Some(Err(ScanError::Walk {
                        path,
                        message: e.to_string(),
                    }));
                }
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                return None;
            }

            let path = entry.path();
            let relative = RelativePath::from_absolute(&path, root)?;

            if let Some(gi) = &excludes {
                if gi
                    .matched_path_or_any_parents(relative.as_path(), false)
                    .is_ignore()
                {
                    log::trace!("Excluded: {}", relative);
                    return None;
                }
            }

            if file_type.is_symlink() && !self.config.follow_symlinks {
                log::trace!("Skipping symlink: {}", path.display());
                return None;
            }

            let metadata = if self.config.follow_symlinks {
                std::fs::metadata(&path)
            } else {
                std::fs::symlink_metadata(&path)
            };
            let metadata = match metadata {
                Ok(m) => m,
                Err(e) => return Some(Err(Self::io_error(&path, e))),
            };

            if !metadata.is_file() {
                return None;
            }

            Some(Ok(FileRecord::from_metadata(
                Arc::clone(&self.volume),
                relative,
                &metadata,
            )))
        })
    }

    fn io_error(path: &Path, error: std::io::Error) -> ScanError {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::PermissionDenied => {
                log::debug!("Permission denied: {}", path.display());
                ScanError::PermissionDenied(path.to_path_buf())
            }
            ErrorKind::NotFound => {
                log::debug!("File not found (may have been deleted): {}", path.display());
                ScanError::NotFound(path.to_path_buf())
            }
            _ => {
                log::debug!("I/O error for {}: {}", path.display(), error);
                ScanError::Io {
                    path: path.to_path_buf(),
                    source: error,
                }
            }
        }
    }
}
