//! Layered application configuration.
//!
//! Sources, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. TOML file: `--config PATH`, or `config.toml` in the platform config
//!    directory (`~/.config/spandupe` on Linux)
//! 3. Environment variables with the `SPANDUPE_` prefix
//!    (`SPANDUPE_IO_THREADS=2`, `SPANDUPE_DRY_RUN=true`)
//! 4. Command-line flags, applied with [`Config::apply_cli`]
//!
//! ```toml
//! volumes_root = "/mnt"
//! volume_prefix = "disk"
//! io_threads = 2
//! dry_run = true
//! exclude = ["*.partial", ".Trash-*/"]
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cleanup::CleanupConfig;
use crate::cli::Cli;
use crate::scanner::WalkerConfig;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "SPANDUPE_";

/// Errors raised while loading configuration. All of them are fatal.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// A source could not be parsed or has the wrong shape.
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),

    /// A value is out of range.
    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        message: String,
    },

    /// Neither a mount root nor explicit volumes were given.
    #[error("No volumes given: use --volumes-root DIR or --volume PATH (at least twice)")]
    MissingVolumes,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory whose immediate subdirectories are the volumes.
    pub volumes_root: Option<PathBuf>,
    /// Only subdirectories starting with this prefix are volumes.
    pub volume_prefix: Option<String>,
    /// Report without deleting.
    pub dry_run: bool,
    /// Stop after this many reference files.
    pub sample_limit: Option<usize>,
    /// Worker threads for matching and fingerprinting.
    pub io_threads: usize,
    /// Skip hidden files and directories on the reference volume.
    pub skip_hidden: bool,
    /// Follow symbolic links on the reference volume.
    pub follow_symlinks: bool,
    /// Gitignore-style patterns excluded from the reference walk.
    pub exclude: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            volumes_root: None,
            volume_prefix: None,
            dry_run: false,
            sample_limit: None,
            io_threads: 4,
            skip_hidden: false,
            follow_symlinks: false,
            exclude: Vec::new(),
        }
    }
}

impl Config {
    /// Load defaults, the config file and the environment.
    ///
    /// With `path == None` the platform default file is used if present.
    ///
    /// # Errors
    ///
    /// Fails if an explicit `path` is missing, a source cannot be parsed, or
    /// a value is out of range.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::layered(path, Env::prefixed(ENV_PREFIX))
    }

    fn layered(path: Option<&Path>, env: Env) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        match path {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(default) = default_config_path().filter(|p| p.is_file()) {
                    log::debug!("Using config file {}", default.display());
                    figment = figment.merge(Toml::file(default));
                }
            }
        }

        let config: Self = figment.merge(env).extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.io_threads == 0 {
            return Err(ConfigError::InvalidValue {
                field: "io_threads",
                message: "must be at least 1".to_string(),
            });
        }
        if self.sample_limit == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "sample_limit",
                message: "must be at least 1 when set".to_string(),
            });
        }
        Ok(())
    }

    /// Overlay command-line flags. Flags that were not given leave the
    /// loaded value untouched; `--exclude` patterns are appended.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(root) = &cli.volumes_root {
            self.volumes_root = Some(root.clone());
        }
        if let Some(prefix) = &cli.volume_prefix {
            self.volume_prefix = Some(prefix.clone());
        }
        if cli.dry_run {
            self.dry_run = true;
        }
        if cli.sample_limit.is_some() {
            self.sample_limit = cli.sample_limit;
        }
        if let Some(threads) = cli.io_threads {
            self.io_threads = threads;
        }
        if cli.skip_hidden {
            self.skip_hidden = true;
        }
        if cli.follow_symlinks {
            self.follow_symlinks = true;
        }
        self.exclude.extend(cli.exclude.iter().cloned());
    }

    /// Cleanup settings derived from this configuration.
    #[must_use]
    pub fn cleanup_config(&self) -> CleanupConfig {
        CleanupConfig::default()
            .with_dry_run(self.dry_run)
            .with_sample_limit(self.sample_limit)
            .with_io_threads(self.io_threads)
            .with_walker_config(
                WalkerConfig::default()
                    .with_skip_hidden(self.skip_hidden)
                    .with_follow_symlinks(self.follow_symlinks)
                    .with_exclude(self.exclude.clone()),
            )
    }
}

/// `config.toml` in the platform config directory.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "spandupe").map(|dirs| dirs.config_dir().join("config.toml"))
}
