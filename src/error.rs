//! Structured error handling and exit codes.

use serde::Serialize;

use crate::cleanup::CleanupError;
use crate::config::ConfigError;
use crate::volume::VolumeError;

/// Exit codes for the spandupe application.
///
/// - 0: Success (completed, regardless of per-file errors)
/// - 1: General error (unexpected failure)
/// - 2: Fatal configuration (unusable volumes, bad config), before any work
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the run completed.
    Success = 0,
    /// General error: An unexpected error occurred.
    GeneralError = 1,
    /// Fatal configuration: the run could not start.
    FatalConfiguration = 2,
    /// Interrupted: the run was stopped by user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Exit code for an error that ended the run.
    ///
    /// Volume and configuration problems are fatal configuration errors;
    /// anything else is a general error.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        let fatal = err.downcast_ref::<VolumeError>().is_some()
            || err.downcast_ref::<ConfigError>().is_some()
            || matches!(
                err.downcast_ref::<CleanupError>(),
                Some(CleanupError::Volume(_))
            );
        if fatal {
            Self::FatalConfiguration
        } else {
            Self::GeneralError
        }
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "SD000",
            Self::GeneralError => "SD001",
            Self::FatalConfiguration => "SD002",
            Self::Interrupted => "SD130",
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "SD002")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
