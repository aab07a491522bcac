//! Physical file identity.
//!
//! Two paths can name the same data: a symlinked volume root, a symlinked
//! file, or a hardlink. Such paths are not copies of each other, and removing
//! one of them can destroy the only copy.
//!
//! # Platform Support
//!
//! - **Unix**: (device_id, inode) pairs from file metadata
//! - **Other**: no identity is available, every path is treated as distinct

use std::fs::{self, Metadata};
use std::path::Path;

/// Identity of the file behind a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    #[cfg(unix)]
    dev: u64,
    #[cfg(unix)]
    ino: u64,
    #[cfg(not(unix))]
    _phantom: (),
}

impl FileIdentity {
    /// Identity recorded in `metadata`.
    ///
    /// Returns `None` on platforms without inode numbers.
    #[cfg(unix)]
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    #[must_use]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }

    /// Identity of the file `path` resolves to, following symlinks.
    #[must_use]
    pub fn of_path(path: &Path) -> Option<Self> {
        fs::metadata(path).ok().as_ref().and_then(Self::from_metadata)
    }

    /// Whether this platform can tell files apart by identity.
    #[must_use]
    pub const fn is_supported() -> bool {
        cfg!(unix)
    }
}

/// Whether both paths are known to resolve to the same physical file.
///
/// `false` when either identity is unavailable.
#[must_use]
pub fn same_file(a: &Path, b: &Path) -> bool {
    match (FileIdentity::of_path(a), FileIdentity::of_path(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
