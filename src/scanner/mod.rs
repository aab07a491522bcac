//! Scanner module for reference enumeration and content fingerprinting.
//!
//! This module provides:
//! - [`FileRecord`]: one file on one volume, joined to its peers by a [`RelativePath`]
//! - [`Walker`]: enumeration of regular files under the reference volume
//! - [`Fingerprinter`]: size-tiered content fingerprints with bounded I/O
//!
//! # Example
//!
//! ```no_run
//! use spandupe::scanner::{Walker, WalkerConfig};
//! use spandupe::volume::Volume;
//! use std::sync::Arc;
//!
//! let volume = Arc::new(Volume::from_root("/mnt/disk1"));
//! let walker = Walker::new(volume, WalkerConfig::default());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(record) => println!("{} ({} bytes)", record.relative, record.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod fingerprint;
pub mod identity;
pub mod walker;

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use crate::volume::Volume;

pub use fingerprint::{
    Digest, Fingerprint, FingerprintCounts, Fingerprinter, Tier, LARGE_TIER_MB, MEDIUM_TIER_MB,
    SAMPLE_SIZE,
};
pub use identity::{same_file, FileIdentity};
pub use walker::{Walker, WalkerConfig};

/// A path with its volume root stripped.
///
/// This is the join key across volumes: two records are path-matched iff
/// their relative paths are byte-identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelativePath(OsString);

impl RelativePath {
    /// Create a relative path from a path that is already relative.
    ///
    /// A leading root (`/`) is dropped so `"/movies/x.mkv"` and
    /// `"movies/x.mkv"` name the same file.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let stripped = path.strip_prefix("/").unwrap_or(path);
        Self(stripped.as_os_str().to_os_string())
    }

    /// Strip `root` from an absolute `path`.
    ///
    /// Returns `None` if `path` is not inside `root` or is `root` itself.
    #[must_use]
    pub fn from_absolute(path: &Path, root: &Path) -> Option<Self> {
        let relative = path.strip_prefix(root).ok()?;
        if relative.as_os_str().is_empty() {
            return None;
        }
        Some(Self(relative.as_os_str().to_os_string()))
    }

    /// The relative path as a [`Path`].
    #[must_use]
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// Absolute location of this relative path on a volume root.
    #[must_use]
    pub fn resolve(&self, root: &Path) -> PathBuf {
        root.join(self.as_path())
    }

    /// Final component of the path.
    #[must_use]
    pub fn file_name(&self) -> Option<&OsStr> {
        self.as_path().file_name()
    }
}

impl fmt::Display for RelativePath {
    /// Renders as `/dir/file` with forward slashes on every platform.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for component in self.as_path().components() {
            write!(f, "/{}", component.as_os_str().to_string_lossy())?;
        }
        Ok(())
    }
}

/// One file on one volume.
///
/// The owning volume is carried by construction. The fingerprint is computed
/// at most once per record and cached for the rest of the record's life.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Absolute path to the file
    pub path: PathBuf,
    /// Volume holding the file
    pub volume: Arc<Volume>,
    /// Path relative to the volume root
    pub relative: RelativePath,
    /// File size in bytes (0 when the size could not be read)
    pub size: u64,
    /// Modification time when the file was stat'ed, if known
    pub mtime: Option<SystemTime>,
    fingerprint: OnceLock<Option<Fingerprint>>,
}

impl FileRecord {
    /// Create a record with a known size.
    #[must_use]
    pub fn new(volume: Arc<Volume>, relative: RelativePath, size: u64) -> Self {
        Self {
            path: relative.resolve(volume.root()),
            volume,
            relative,
            size,
            mtime: None,
            fingerprint: OnceLock::new(),
        }
    }

    /// Create a record from metadata already read for the file.
    #[must_use]
    pub fn from_metadata(volume: Arc<Volume>, relative: RelativePath, metadata: &Metadata) -> Self {
        let mut record = Self::new(volume, relative, metadata.len());
        record.mtime = metadata.modified().ok();
        record
    }

    /// Create a record, reading its size and mtime from the filesystem.
    ///
    /// A failed size query yields a size of 0 and no mtime.
    #[must_use]
    pub fn stat(volume: Arc<Volume>, relative: RelativePath) -> Self {
        let path = relative.resolve(volume.root());
        match fs::metadata(&path) {
            Ok(meta) => Self::from_metadata(volume, relative, &meta),
            Err(e) => {
                log::debug!("Cannot stat {}: {}", path.display(), e);
                Self::new(volume, relative, 0)
            }
        }
    }

    /// Identifier of the owning volume.
    #[must_use]
    pub fn volume_id(&self) -> &str {
        self.volume.id()
    }

    /// Fingerprint of this record, computing it on first use.
    ///
    /// Returns `None` if the file is unreadable. The outcome is remembered,
    /// so the file is never read twice for the same record.
    pub fn fingerprint_with(&self, fingerprinter: &Fingerprinter) -> Option<&Fingerprint> {
        self.fingerprint
            .get_or_init(|| fingerprinter.fingerprint_sized(&self.path, self.size).ok())
            .as_ref()
    }

    /// Fingerprint computed earlier, if any, without touching the file.
    #[must_use]
    pub fn fingerprint_cached(&self) -> Option<&Fingerprint> {
        self.fingerprint.get().and_then(Option::as_ref)
    }

    /// Whether a fingerprint has already been computed.
    #[must_use]
    pub fn is_fingerprinted(&self) -> bool {
        self.fingerprint.get().is_some()
    }
}

/// Errors that can occur while enumerating the reference volume.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The directory walker reported an error.
    #[error("Walk error for {path}: {message}")]
    Walk {
        /// Path where the error occurred
        path: PathBuf,
        /// Description from the walker
        message: String,
    },
}

/// Errors that make a file unreadable for fingerprinting.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Classify an I/O error raised while reading `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
