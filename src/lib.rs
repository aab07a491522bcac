//! spandupe - cross-volume duplicate cleaner
//!
//! Finds files stored at the same relative path on several volumes (the
//! disks of a union filesystem, for example) with the same content, keeps the
//! copy on the volume with the most free space and removes the rest.

pub mod actions;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;
pub mod volume;

use std::io;
use std::sync::Arc;

use anyhow::Result;

use crate::cleanup::{CleanupDriver, CleanupSummary};
use crate::cli::{Cli, OutputFormat};
use crate::config::{Config, ConfigError};
use crate::error::ExitCode;
use crate::output::{JsonReporter, TextReporter};
use crate::progress::Progress;
use crate::volume::{DiskSpaceOracle, VolumeTable};

/// Run the application with parsed arguments.
///
/// # Errors
///
/// Returns an error when the configuration or volumes are unusable, or when
/// the report cannot be written. Per-file problems never surface here; they
/// are counted in the summary.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    if cli.no_color {
        yansi::disable();
    }

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_cli(&cli);
    log::debug!("Effective configuration: {:?}", config);

    let volumes = resolve_volumes(&cli, &config)?;
    log::info!(
        "Reference volume {} plus {} other volume(s)",
        volumes.reference(),
        volumes.others().len()
    );

    let handler = signal::install_handler()?;
    let mut cleanup_config = config.cleanup_config().with_shutdown_flag(handler.get_flag());
    let show_progress = !cli.quiet && !cli.no_progress && cli.output == OutputFormat::Text;
    if show_progress {
        cleanup_config = cleanup_config.with_progress_callback(Arc::new(Progress::new(false)));
    }
    let mode = cleanup_config.mode();
    let driver = CleanupDriver::new(cleanup_config, Arc::new(DiskSpaceOracle::new()));

    match cli.output {
        OutputFormat::Text => {
            let reporter = TextReporter::new(io::stdout());
            let summary = driver.run(&volumes, &reporter)?;
            reporter.write_summary(&summary)?;
            Ok(exit_code_for(&summary))
        }
        OutputFormat::Json => {
            let reporter = JsonReporter::new(mode);
            let summary = driver.run(&volumes, &reporter)?;
            let exit_code = exit_code_for(&summary);
            reporter
                .finish(&summary, exit_code)
                .write_to(&mut io::stdout().lock(), true)?;
            Ok(exit_code)
        }
    }
}

/// Explicit `--volume` roots win over a mount root from flags or config.
fn resolve_volumes(cli: &Cli, config: &Config) -> Result<VolumeTable> {
    let reference = cli.reference.as_deref();
    if !cli.volumes.is_empty() {
        return Ok(VolumeTable::from_roots(cli.volumes.clone(), reference)?);
    }
    match &config.volumes_root {
        Some(root) => Ok(VolumeTable::discover(
            root,
            config.volume_prefix.as_deref(),
            reference,
        )?),
        None => Err(ConfigError::MissingVolumes.into()),
    }
}

fn exit_code_for(summary: &CleanupSummary) -> ExitCode {
    if summary.interrupted {
        ExitCode::Interrupted
    } else {
        ExitCode::Success
    }
}
