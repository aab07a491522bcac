//! Command-line interface definitions.
//!
//! ```bash
//! # Preview: every subdirectory of /mnt starting with "disk" is a volume
//! spandupe --volumes-root /mnt --volume-prefix disk --dry-run
//!
//! # Explicit volumes; the first one is the reference
//! spandupe --volume /mnt/disk1 --volume /mnt/disk2 --volume /mnt/disk3
//!
//! # Reference chosen by identifier, JSON report, first 500 files only
//! spandupe --volumes-root /mnt --reference disk3 --sample-limit 500 --output json
//! ```

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Cross-volume duplicate finder.
///
/// Walks the reference volume, finds files stored at the same relative path
/// on other volumes with the same content, and keeps only the copy on the
/// volume with the most free space.
#[derive(Debug, Parser)]
#[command(name = "spandupe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors and report lines
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print fatal errors as JSON on stderr
    #[arg(long)]
    pub json_errors: bool,

    /// Directory whose immediate subdirectories are the volumes
    #[arg(long, value_name = "DIR", conflicts_with = "volumes")]
    pub volumes_root: Option<PathBuf>,

    /// Volume root (repeatable; the first is the reference unless --reference is given)
    #[arg(long = "volume", value_name = "PATH")]
    pub volumes: Vec<PathBuf>,

    /// Identifier of the reference volume (its directory name)
    #[arg(long, value_name = "ID")]
    pub reference: Option<String>,

    /// Only treat subdirectories starting with PREFIX as volumes
    #[arg(long, value_name = "PREFIX", requires = "volumes_root")]
    pub volume_prefix: Option<String>,

    /// Report duplicates without deleting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Stop after checking N reference files
    #[arg(long, value_name = "N", value_parser = parse_positive)]
    pub sample_limit: Option<usize>,

    /// Worker threads for matching and fingerprinting (default: 4, 1 = sequential)
    ///
    /// Lower values reduce disk thrashing on spinning disks.
    #[arg(long, value_name = "N", value_parser = parse_positive)]
    pub io_threads: Option<usize>,

    /// Gitignore-style pattern excluded from the reference walk (repeatable)
    #[arg(short, long, value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Skip hidden files and directories (starting with .)
    #[arg(long)]
    pub skip_hidden: bool,

    /// Follow symbolic links on the reference volume
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Config file (default: config.toml in the platform config directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per duplicate group, then a summary
    Text,
    /// A single JSON document after the run
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse a count that must be at least 1.
///
/// # Errors
///
/// Returns an error for non-numbers and for zero.
pub fn parse_positive(s: &str) -> Result<usize, String> {
    let n: usize = s
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number: '{s}'"))?;
    if n == 0 {
        return Err("Value must be at least 1".to_string());
    }
    Ok(n)
}
