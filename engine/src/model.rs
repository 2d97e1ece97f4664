//! Core data model for backup runs.
//!
//! This module defines the main data structures for representing a backup:
//! - BackupRun: one invocation of the backup engine
//! - BackupOptions: the caller-supplied knobs for a run
//! - BackupSummary, FileFailure, FileEvent: what a run reports back
//! - BackupMode, ArchiveKind, RunState, FileOutcome: enums controlling behavior

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::ignore::IgnoreMatcher;
use crate::state::FingerprintStore;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Format of the timestamp token used for run directories and archive names.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Destination layout for a backup run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupMode {
    /// Write straight into the destination, overwriting same-path outputs
    Flat,
    /// Write each run into its own timestamp-named subdirectory
    #[default]
    Incremental,
}

impl fmt::Display for BackupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupMode::Flat => write!(f, "flat"),
            BackupMode::Incremental => write!(f, "incremental"),
        }
    }
}

impl FromStr for BackupMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flat" => Ok(BackupMode::Flat),
            "incremental" => Ok(BackupMode::Incremental),
            other => Err(EngineError::invalid_argument(format!(
                "unknown backup mode '{}', expected 'flat' or 'incremental'",
                other
            ))),
        }
    }
}

/// Optional archive packaging for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArchiveKind {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "zip")]
    Zip,
    #[serde(rename = "tar")]
    Tar,
    #[serde(rename = "tar.gz")]
    TarGz,
}

impl ArchiveKind {
    /// File extension for archives of this kind (`None` has none).
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            ArchiveKind::None => None,
            ArchiveKind::Zip => Some("zip"),
            ArchiveKind::Tar => Some("tar"),
            ArchiveKind::TarGz => Some("tar.gz"),
        }
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension().unwrap_or("none"))
    }
}

impl FromStr for ArchiveKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(ArchiveKind::None),
            "zip" => Ok(ArchiveKind::Zip),
            "tar" => Ok(ArchiveKind::Tar),
            "tar.gz" | "tgz" => Ok(ArchiveKind::TarGz),
            other => Err(EngineError::invalid_argument(format!(
                "unknown archive kind '{}', expected 'none', 'zip', 'tar' or 'tar.gz'",
                other
            ))),
        }
    }
}

/// Caller-supplied options for one backup run.
#[derive(Debug, Clone, Default)]
pub struct BackupOptions {
    pub mode: BackupMode,
    pub archive: ArchiveKind,
    /// Compute and report without writing anything
    pub dry_run: bool,
    /// Checked between files; setting it stops the run early
    pub cancel: Option<Arc<AtomicBool>>,
}

impl BackupOptions {
    pub fn new(mode: BackupMode, archive: ArchiveKind, dry_run: bool) -> Self {
        BackupOptions {
            mode,
            archive,
            dry_run,
            cancel: None,
        }
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

/// The state of a backup run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Prepared, not yet executed
    Pending,
    /// Currently walking sources
    Running,
    /// Finished (possibly with per-file failures or cancelled)
    Completed,
}

/// A single backup invocation.
///
/// Holds the immutable snapshots loaded at preparation time (configuration,
/// ignore rules, fingerprint records) together with the counters and the
/// `written_files` list that scopes archive membership.
#[derive(Debug)]
pub struct BackupRun {
    /// Unique identifier for this run
    pub id: Uuid,

    /// Canonicalized source directories that exist
    pub sources: Vec<PathBuf>,

    /// Requested sources that were missing or not directories
    pub skipped_sources: Vec<PathBuf>,

    /// Destination root as given by the caller
    pub destination: PathBuf,

    /// Directory outputs are written under (destination or destination/timestamp)
    pub base_dir: PathBuf,

    /// Timestamp token naming the run directory and archive
    pub timestamp: String,

    pub options: BackupOptions,

    pub config: EngineConfig,

    pub ignore: IgnoreMatcher,

    pub fingerprints: FingerprintStore,

    pub state: RunState,

    pub total: usize,
    pub copied: usize,
    pub skipped: usize,

    /// Output paths actually written (or that would be, on a dry run)
    pub written_files: Vec<PathBuf>,

    pub failures: Vec<FileFailure>,

    pub cancelled: bool,

    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
}

/// A file that could not be processed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub source_path: PathBuf,
    /// OS error code, when the failure came from the OS
    pub error_code: Option<i32>,
    pub message: String,
}

/// What happened to one discovered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Copied to the output path (or would be, on a dry run)
    Copied,
    /// Fingerprint unchanged and earlier output still present
    Unchanged,
    /// Name matched an ignore pattern
    Ignored,
    /// Read, copy or verification failed
    Failed,
}

/// Per-file progress notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub source_path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub outcome: FileOutcome,
}

/// Result of a backup run, as handed back to front ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSummary {
    pub run_id: Uuid,
    pub mode: BackupMode,
    pub base_dir: PathBuf,
    pub copied: usize,
    pub skipped: usize,
    pub total: usize,
    /// Path of the archive built for this run, if any
    pub archive: Option<PathBuf>,
    pub written_files: Vec<PathBuf>,
    pub failures: Vec<FileFailure>,
    pub skipped_sources: Vec<PathBuf>,
    pub dry_run: bool,
    pub cancelled: bool,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

impl BackupSummary {
    /// True when every discovered file was handled without error.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}
