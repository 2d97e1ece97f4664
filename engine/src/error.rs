//! Error types for the backup engine.
//!
//! The primary error type is `EngineError`, which represents run-level errors
//! that prevent a backup or restore from completing. File-level errors during
//! a backup are recorded as `FileFailure` entries in the run summary, not as
//! EngineError.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a backup or restore run.
///
/// Per-file read/copy failures during a backup are recorded in
/// `BackupSummary::failures` instead and do not abort the run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Source or backup directory does not exist
    #[error("Source directory not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    /// Destination is not accessible or cannot be created
    #[error("Destination directory access denied: {}", path.display())]
    DestinationAccessDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to read from a file
    #[error("Failed to read file: {}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write to a file
    #[error("Failed to write file: {}", path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Path is unusable for the requested operation
    #[error("Invalid path: {} ({reason})", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    /// Failed to enumerate a directory
    #[error("Failed to enumerate directory: {}", path.display())]
    EnumerationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to create a directory
    #[error("Failed to create directory: {}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Fingerprint state file could not be read, parsed or written
    #[error("State file error: {} ({message})", path.display())]
    StateFile { path: PathBuf, message: String },

    /// Archive could not be created
    #[error("Failed to build archive: {}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A copy's digest did not match its source after copying
    #[error("Verification failed, copy differs from source: {}", path.display())]
    VerificationFailed { path: PathBuf },

    /// A mode, archive kind or algorithm string was not recognised
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Configuration file could not be loaded
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl EngineError {
    /// Create an invalid-argument error with a custom message
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a configuration error with a custom message
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::DestinationAccessDenied { source, .. }
            | Self::ReadError { source, .. }
            | Self::WriteError { source, .. }
            | Self::EnumerationFailed { source, .. }
            | Self::DirectoryCreationFailed { source, .. }
            | Self::Archive { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }

    /// True for usage-level problems (bad arguments or configuration).
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. } | Self::Config { .. })
    }
}
