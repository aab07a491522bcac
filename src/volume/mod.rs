//! Storage volumes and the volume table.
//!
//! A [`Volume`] is one independent mount (for example `/mnt/disk3`) that
//! mirrors the directory layout of the others. The [`VolumeTable`] is built
//! once at startup and maps every volume identifier to its root; records carry
//! their owning volume from construction onwards, so nothing downstream has to
//! recover a volume from an absolute path.
//!
//! # Example
//!
//! ```no_run
//! use spandupe::volume::VolumeTable;
//! use std::path::Path;
//!
//! // Every subdirectory of /mnt whose name starts with "disk" is a volume,
//! // and disk1 is the reference volume.
//! let table = VolumeTable::discover(Path::new("/mnt"), Some("disk"), Some("disk1")).unwrap();
//! println!("reference: {}", table.reference().id());
//! ```

pub mod space;

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

pub use space::{free_space_or_zero, DiskSpaceOracle, SpaceError, SpaceOracle};

/// One storage volume: an identifier and the root of its directory tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Volume {
    id: String,
    root: PathBuf,
}

impl Volume {
    /// Create a volume with an explicit identifier.
    #[must_use]
    pub fn new(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            root: root.into(),
        }
    }

    /// Create a volume named after the last component of its root.
    ///
    /// `/mnt/disk2` becomes `disk2`. Roots without a final component (such
    /// as `/`) use their full display form.
    #[must_use]
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let id = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());
        Self { id, root }
    }

    /// Human-readable identifier used in reports.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Root directory of the volume.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.root.display())
    }
}

/// Fatal configuration problems detected before any scanning starts.
#[derive(thiserror::Error, Debug)]
pub enum VolumeError {
    /// No volumes could be discovered.
    #[error("No volumes found under {0}")]
    NoVolumes(PathBuf),

    /// Fewer than two volumes were supplied; there is nothing to compare against.
    #[error("At least 2 volumes are required, got {0}")]
    TooFewVolumes(usize),

    /// Two volumes share the same identifier.
    #[error("Duplicate volume identifier: {0}")]
    DuplicateId(String),

    /// Two volumes share the same root directory.
    #[error("Volume root listed twice: {0}")]
    DuplicateRoot(PathBuf),

    /// The requested reference volume is not in the table.
    #[error("Reference volume '{0}' is not among the discovered volumes")]
    UnknownReference(String),

    /// The reference volume's root directory does not exist.
    #[error("Reference directory not found: {0}")]
    ReferenceNotFound(PathBuf),

    /// The reference volume's root is not a directory.
    #[error("Reference root is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The mount root could not be listed.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Identifier → root table for one run.
///
/// Holds the reference volume (whose files drive the scan) and every other
/// volume, in a fixed order. That order is also the tie-break order used when
/// two volumes report the same free space.
#[derive(Debug, Clone)]
pub struct VolumeTable {
    reference: Arc<Volume>,
    others: Vec<Arc<Volume>>,
}

impl VolumeTable {
    /// Build a table from a reference volume and the other volumes.
    ///
    /// # Errors
    ///
    /// Fails when fewer than two volumes are given in total, when identifiers
    /// repeat, when two roots resolve to the same directory, or when the
    /// reference root is missing.
    pub fn new(reference: Volume, others: Vec<Volume>) -> Result<Self, VolumeError> {
        let total = others.len() + 1;
        if total < 2 {
            return Err(VolumeError::TooFewVolumes(total));
        }

        let mut ids = HashSet::new();
        let mut roots = HashSet::new();
        for volume in std::iter::once(&reference).chain(others.iter()) {
            if !ids.insert(volume.id().to_string()) {
                return Err(VolumeError::DuplicateId(volume.id().to_string()));
            }
            let resolved = fs::canonicalize(volume.root()).unwrap_or_else(|_| volume.root().to_path_buf());
            if !roots.insert(resolved) {
                return Err(VolumeError::DuplicateRoot(volume.root().to_path_buf()));
            }
        }

        validate_reference_root(reference.root())?;

        for volume in &others {
            if !volume.root().is_dir() {
                log::warn!(
                    "Volume {} has no readable root; it will never match",
                    volume
                );
            }
        }

        Ok(Self {
            reference: Arc::new(reference),
            others: others.into_iter().map(Arc::new).collect(),
        })
    }

    /// Build a table from volume roots, naming each volume after its root.
    ///
    /// The reference is the volume whose identifier equals `reference_id`,
    /// or the first root when none is given.
    ///
    /// # Errors
    ///
    /// See [`VolumeTable::new`]; additionally fails with
    /// [`VolumeError::UnknownReference`] if `reference_id` matches nothing.
    pub fn from_roots(
        roots: Vec<PathBuf>,
        reference_id: Option<&str>,
    ) -> Result<Self, VolumeError> {
        let mut volumes: Vec<Volume> = roots.into_iter().map(Volume::from_root).collect();
        if volumes.len() < 2 {
            return Err(VolumeError::TooFewVolumes(volumes.len()));
        }

        let reference_index = match reference_id {
            Some(id) => volumes
                .iter()
                .position(|v| v.id() == id)
                .ok_or_else(|| VolumeError::UnknownReference(id.to_string()))?,
            None => 0,
        };

        let reference = volumes.remove(reference_index);
        Self::new(reference, volumes)
    }

    /// Discover volumes as the immediate subdirectories of `mount_root`.
    ///
    /// Subdirectories are sorted by name. When `prefix` is given only names
    /// starting with it are considered (`disk` keeps `disk1`, `disk2`, ...).
    ///
    /// # Errors
    ///
    /// Fails if the mount root cannot be read or yields no volumes, plus the
    /// errors of [`VolumeTable::from_roots`].
    pub fn discover(
        mount_root: &Path,
        prefix: Option<&str>,
        reference_id: Option<&str>,
    ) -> Result<Self, VolumeError> {
        let roots = discover_roots(mount_root, prefix)?;
        if roots.is_empty() {
            return Err(VolumeError::NoVolumes(mount_root.to_path_buf()));
        }
        log::info!(
            "Discovered {} volume(s) under {}",
            roots.len(),
            mount_root.display()
        );
        Self::from_roots(roots, reference_id)
    }

    /// The reference volume.
    #[must_use]
    pub fn reference(&self) -> &Arc<Volume> {
        &self.reference
    }

    /// Every volume other than the reference, in table order.
    #[must_use]
    pub fn others(&self) -> &[Arc<Volume>] {
        &self.others
    }

    /// Total number of volumes, reference included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.others.len() + 1
    }

    /// Always false; a table holds at least two volumes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterate over all volumes, reference first.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Volume>> {
        std::iter::once(&self.reference).chain(self.others.iter())
    }
}

/// Check that the reference root exists and is a directory.
pub(crate) fn validate_reference_root(root: &Path) -> Result<(), VolumeError> {
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(VolumeError::NotADirectory(root.to_path_buf())),
        Err(_) => Err(VolumeError::ReferenceNotFound(root.to_path_buf())),
    }
}

/// List the candidate volume roots under a mount root, sorted by name.
fn discover_roots(mount_root: &Path, prefix: Option<&str>) -> Result<Vec<PathBuf>, VolumeError> {
    let entries = fs::read_dir(mount_root).map_err(|source| VolumeError::Io {
        path: mount_root.to_path_buf(),
        source,
    })?;

    let mut roots = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::debug!("Skipping unreadable entry in {}: {}", mount_root.display(), e);
                continue;
            }
        };

        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let name = entry.file_name();
        let name = name.to_string_lossy();
        if prefix.is_some_and(|p| !name.starts_with(p)) {
            log::trace!("Ignoring {} (prefix filter)", path.display());
            continue;
        }

        roots.push(path);
    }

    roots.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(roots)
}
