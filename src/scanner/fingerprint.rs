//! Size-tiered content fingerprints.
//!
//! # Overview
//!
//! A [`Fingerprint`] is the grouping key for duplicate detection. The tier is
//! picked from the file size in whole mebibytes (`size / 1_048_576`, floored):
//!
//! | Size            | Fingerprint                                                  |
//! |-----------------|--------------------------------------------------------------|
//! | `< 10 MB`       | digest of the whole file                                     |
//! | `10 .. 100 MB`  | `(medium, size_mb, digest of first 1 MiB)`                   |
//! | `>= 100 MB`     | `(large, size_mb, first 1 MiB, last 1 MiB, file name)`       |
//!
//! Files of 100 MB and above therefore cost at most 2 MiB of reads no matter
//! how large they are.
//!
//! # Known false positives
//!
//! The medium and large tiers are heuristics. Two different large files with
//! the same size in MB, the same first and last MiB and the same name get the
//! same fingerprint and are treated as duplicates. This is accepted: media
//! libraries rarely contain such pairs and the speedup is orders of magnitude.
//!
//! # Example
//!
//! ```no_run
//! use spandupe::scanner::Fingerprinter;
//! use std::path::Path;
//!
//! let fingerprinter = Fingerprinter::new();
//! let fp = fingerprinter.fingerprint(Path::new("/mnt/disk1/movies/x.mkv")).unwrap();
//! println!("{fp}");
//! ```

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

use super::HashError;

/// 32-byte BLAKE3 digest.
pub type Digest = [u8; 32];

/// One mebibyte; the unit used for tier selection.
pub const MIB: u64 = 1_048_576;

/// Bytes sampled from the head (and tail) of medium and large files.
pub const SAMPLE_SIZE: u64 = MIB;

/// Files of at least this many MB use the medium tier.
pub const MEDIUM_TIER_MB: u64 = 10;

/// Files of at least this many MB use the large tier.
pub const LARGE_TIER_MB: u64 = 100;

/// Read buffer size for streaming digests.
const BUFFER_SIZE: usize = 64 * 1024;

/// Fingerprint tier, chosen from the file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Whole-file digest
    Full,
    /// Size plus head sample
    Medium,
    /// Size plus head and tail samples plus file name
    Large,
}

impl Tier {
    /// Tier for a file of `size` bytes.
    #[must_use]
    pub fn for_size(size: u64) -> Self {
        match size / MIB {
            mb if mb < MEDIUM_TIER_MB => Self::Full,
            mb if mb < LARGE_TIER_MB => Self::Medium,
            _ => Self::Large,
        }
    }

    /// Most content bytes a fingerprint of this tier reads for a `size`-byte file.
    #[must_use]
    pub fn read_budget(self, size: u64) -> u64 {
        match self {
            Self::Full => size,
            Self::Medium => size.min(SAMPLE_SIZE),
            Self::Large => size.min(2 * SAMPLE_SIZE),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Medium => write!(f, "medium"),
            Self::Large => write!(f, "large"),
        }
    }
}

/// Size-tiered content signature.
///
/// Equality means "probably identical content": exact for the full tier,
/// heuristic for the medium and large tiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    /// Digest of the entire file (under 10 MB).
    Full(Digest),
    /// Size in MB and digest of the first MiB (10 MB to under 100 MB).
    Medium {
        /// File size in whole MB
        size_mb: u64,
        /// Digest of the first MiB
        head: Digest,
    },
    /// Size in MB, head and tail digests and a digest of the file name (100 MB and up).
    Large {
        /// File size in whole MB
        size_mb: u64,
        /// Digest of the first MiB
        head: Digest,
        /// Digest of the last MiB
        tail: Digest,
        /// Digest of the file name
        name: Digest,
    },
}

impl Fingerprint {
    /// Tier that produced this fingerprint.
    #[must_use]
    pub fn tier(&self) -> Tier {
        match self {
            Self::Full(_) => Tier::Full,
            Self::Medium { .. } => Tier::Medium,
            Self::Large { .. } => Tier::Large,
        }
    }

    /// Hex form of the leading digest, for reports.
    #[must_use]
    pub fn to_hex(&self) -> String {
        let digest = match self {
            Self::Full(d) | Self::Medium { head: d, .. } | Self::Large { head: d, .. } => d,
        };
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => write!(f, "full:{}", self.to_hex()),
            Self::Medium { size_mb, .. } => write!(f, "medium:{}MB:{}", size_mb, self.to_hex()),
            Self::Large { size_mb, .. } => write!(f, "large:{}MB:{}", size_mb, self.to_hex()),
        }
    }
}

/// Snapshot of the fingerprinter's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FingerprintCounts {
    /// Files fingerprinted successfully
    pub files: usize,
    /// Content bytes read across all files
    pub bytes_read: u64,
    /// Files that could not be read
    pub failures: usize,
}

/// Computes [`Fingerprint`]s and counts the work done.
///
/// Safe to share across worker threads; the counters are atomic.
#[derive(Debug, Default)]
pub struct Fingerprinter {
    files: AtomicUsize,
    bytes_read: AtomicU64,
    failures: AtomicUsize,
}

impl Fingerprinter {
    /// Create a fingerprinter with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint the file at `path`, reading its size first.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be stat'ed or read.
    pub fn fingerprint(&self, path: &Path) -> Result<Fingerprint, HashError> {
        let size = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                return Err(HashError::from_io(path, e));
            }
        };
        self.fingerprint_sized(path, size)
    }

    /// Fingerprint the file at `path` whose size is already known.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn fingerprint_sized(&self, path: &Path, size: u64) -> Result<Fingerprint, HashError> {
        match self.compute(path, size) {
            Ok(fp) => {
                self.files.fetch_add(1, Ordering::Relaxed);
                log::trace!("Fingerprinted {} as {}", path.display(), fp);
                Ok(fp)
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                let err = HashError::from_io(path, e);
                log::debug!("Unreadable, excluded from grouping: {}", err);
                Err(err)
            }
        }
    }

    /// Current counter values.
    #[must_use]
    pub fn counts(&self) -> FingerprintCounts {
        FingerprintCounts {
            files: self.files.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    fn compute(&self, path: &Path, size: u64) -> io::Result<Fingerprint> {
        let mut file = File::open(path)?;
        let size_mb = size / MIB;

        match Tier::for_size(size) {
            Tier::Full => Ok(Fingerprint::Full(self.digest_reader(&mut file, None)?)),
            Tier::Medium => {
                let head = self.digest_reader(&mut file, Some(SAMPLE_SIZE))?;
                Ok(Fingerprint::Medium { size_mb, head })
            }
            Tier::Large => {
                let head = self.digest_reader(&mut file, Some(SAMPLE_SIZE))?;
                file.seek(SeekFrom::Start(size.saturating_sub(SAMPLE_SIZE)))?;
                let tail = self.digest_reader(&mut file, Some(SAMPLE_SIZE))?;
                let name = path
                    .file_name()
                    .map(|n| *blake3::hash(n.as_encoded_bytes()).as_bytes())
                    .unwrap_or_default();
                Ok(Fingerprint::Large {
                    size_mb,
                    head,
                    tail,
                    name,
                })
            }
        }
    }

    /// Stream up to `limit` bytes (or to EOF) from the current position into a digest.
    fn digest_reader<R: Read>(&self, reader: &mut R, limit: Option<u64>) -> io::Result<Digest> {
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut remaining = limit.unwrap_or(u64::MAX);

        while remaining > 0 {
            let want = buffer.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
            let n = match reader.read(&mut buffer[..want]) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buffer[..n]);
            self.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
            remaining -= n as u64;
        }

        Ok(*hasher.finalize().as_bytes())
    }
}
