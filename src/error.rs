//! Error types for hpc-helper
//!
//! This module defines all error types used throughout the crate,
//! providing detailed error information for debugging and user feedback.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for hpc-helper operations
#[derive(Error, Debug)]
pub enum HpcError {
    /// I/O error during file operations
    #[error("I/O error at '{path}': {source}")]
    Io {
        /// Path the operation was working on
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Scheduler is not available on the requested cluster
    #[error("{scheduler} is not supported on '{system}'")]
    UnsupportedScheduler {
        /// Scheduler name (e.g. "Slurm")
        scheduler: String,
        /// Target system name (e.g. "woody")
        system: String,
    },

    /// No batch scheduler could be detected in the environment
    #[error("No batch scheduler detected (neither Slurm nor Torque found)")]
    NoSchedulerDetected,

    /// Deployment environment does not match the requested deploy target
    #[error("Deploy target is '{expected}', but running on '{hostname}'")]
    DeployMismatch {
        /// Requested deploy target
        expected: String,
        /// Hostname the process is actually running on
        hostname: String,
    },

    /// Walltime string could not be parsed
    #[error("Invalid walltime '{0}': expected HH:MM:SS, MM:SS or D-HH:MM:SS")]
    InvalidWalltime(String),

    /// Job-name pattern is not a valid regex or lacks a capture group
    #[error("Invalid job pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Why it was rejected
        reason: String,
    },

    /// A scheduler command exited with a failure status
    #[error("Command '{command}' failed: {stderr}")]
    CommandFailed {
        /// The command that was run
        command: String,
        /// Captured stderr output
        stderr: String,
    },

    /// An `hpc_status` file exists but holds something other than an exit code
    #[error("Status file '{path}' holds invalid content: '{content}'")]
    InvalidStatusFile {
        /// Path to the status file
        path: PathBuf,
        /// The content that failed to parse
        content: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl HpcError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an unsupported-scheduler error
    pub fn unsupported(scheduler: impl Into<String>, system: impl Into<String>) -> Self {
        Self::UnsupportedScheduler {
            scheduler: scheduler.into(),
            system: system.into(),
        }
    }

    /// Create a command-failed error
    pub fn command_failed(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. } | Self::InvalidStatusFile { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Result type alias for hpc-helper operations
pub type Result<T> = std::result::Result<T, HpcError>;

impl From<std::io::Error> for HpcError {
    fn from(err: std::io::Error) -> Self {
        HpcError::Io {
            path: std::path::PathBuf::new(),
            source: err,
        }
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| HpcError::io(path, e))
    }
}
