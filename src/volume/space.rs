//! Live free-space queries.
//!
//! Retention decisions compare the free space of every volume in a group at
//! the moment of the decision. Implementations of [`SpaceOracle`] must read
//! through to the filesystem on every call so that deletions made earlier in
//! the run are visible to later decisions.

use std::path::{Path, PathBuf};

use sysinfo::Disks;

use super::Volume;

/// Errors from a free-space query.
#[derive(thiserror::Error, Debug)]
pub enum SpaceError {
    /// The volume root could not be resolved.
    #[error("Cannot resolve volume root {path}: {source}")]
    Resolve {
        /// Root that failed to resolve
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// No mounted disk contains the volume root.
    #[error("No mounted disk contains {0}")]
    NoDisk(PathBuf),
}

/// Source of live free-space readings.
pub trait SpaceOracle: Send + Sync {
    /// Current free space of `volume` in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError`] when the reading cannot be taken.
    fn free_space(&self, volume: &Volume) -> Result<u64, SpaceError>;
}

/// Query free space, treating a failed query as zero bytes free.
///
/// Zero never promotes a volume to "most free", so a volume that cannot be
/// measured is only kept when every other reading is also zero.
pub fn free_space_or_zero(oracle: &dyn SpaceOracle, volume: &Volume) -> u64 {
    match oracle.free_space(volume) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::debug!("Free space query failed for {}: {}", volume.id(), e);
            0
        }
    }
}

/// Free space of the mounted disk backing each volume, via `sysinfo`.
///
/// The disk list is refreshed on every query. The disk whose mount point is
/// the longest prefix of the canonical volume root wins, so nested mounts
/// resolve to the innermost filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskSpaceOracle;

impl DiskSpaceOracle {
    /// Create a new oracle.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SpaceOracle for DiskSpaceOracle {
    fn free_space(&self, volume: &Volume) -> Result<u64, SpaceError> {
        let root = volume
            .root()
            .canonicalize()
            .map_err(|source| SpaceError::Resolve {
                path: volume.root().to_path_buf(),
                source,
            })?;

        let disks = Disks::new_with_refreshed_list();
        let mounts = disks
            .list()
            .iter()
            .map(|disk| (disk.mount_point(), disk.available_space()));

        let available =
            innermost_mount(&root, mounts).ok_or_else(|| SpaceError::NoDisk(root.clone()))?;
        log::trace!("Free space on {}: {} bytes", volume.id(), available);
        Ok(available)
    }
}

/// Pick the reading of the innermost mount point containing `root`.
fn innermost_mount<'a>(
    root: &Path,
    mounts: impl Iterator<Item = (&'a Path, u64)>,
) -> Option<u64> {
    mounts
        .filter(|(mount, _)| root.starts_with(mount))
        .max_by_key(|(mount, _)| mount.as_os_str().len())
        .map(|(_, available)| available)
}
