//! # Pinbak Engine - Content-Aware Backup Library
//!
//! A headless backup engine that copies directory trees into a destination,
//! skipping files whose content has not changed since they were last copied.
//! Designed as the foundation for multiple front ends (CLI, scheduler, UI).
//!
//! ## Overview
//!
//! The engine provides:
//! - Content fingerprints (SHA-256 or BLAKE3) persisted between runs
//! - Flat mode (one mirror) and incremental mode (one directory per run)
//! - Glob ignore rules applied to file and directory names
//! - Optional zip, tar or tar.gz archive of the files written by a run
//! - Per-file error isolation and cooperative cancellation
//! - Progress reporting via callbacks (decoupled from UI technology)
//! - Restore of a backup tree into a target directory
//!
//! ## Basic Usage
//!
//! ```no_run
//! use engine::{run_backup, ArchiveKind, BackupMode, BackupOptions, EngineConfig};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::default();
//! let options = BackupOptions::new(BackupMode::Incremental, ArchiveKind::Zip, false);
//!
//! let summary = run_backup(&["/home/me/docs"], Path::new("/mnt/backup"), options, &config, None)?;
//! println!("copied {} of {} files", summary.copied, summary.total);
//! for failure in &summary.failures {
//!     println!("{}: {}", failure.source_path.display(), failure.message);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (BackupRun, BackupSummary, enums)
//! - **error**: Error types and handling
//! - **config**: INI configuration
//! - **fingerprint**: Content digests
//! - **ignore**: Ignore pattern set
//! - **state**: Persistent fingerprint store
//! - **fs_ops**: Low-level filesystem operations
//! - **backup**: Run orchestration (prepare, execute)
//! - **archive**: Archive packaging
//! - **restore**: Restore a backup tree
//! - **profiles**: Named source/destination sets and Pinokio folder presets
//! - **progress**: Progress callback trait

pub mod model;
pub mod error;
pub mod config;
pub mod fingerprint;
pub mod ignore;
pub mod state;
pub mod fs_ops;
pub mod backup;
pub mod archive;
pub mod restore;
pub mod profiles;
pub mod progress;

// Re-export main types and functions
pub use model::{
    ArchiveKind, BackupMode, BackupOptions, BackupRun, BackupSummary, FileEvent, FileFailure,
    FileOutcome, RunState, TIMESTAMP_FORMAT,
};
pub use error::EngineError;
pub use config::{load_config, EngineConfig};
pub use fingerprint::{compute_fingerprint, FingerprintAlgorithm};
pub use ignore::{load_ignore_patterns, save_ignore_patterns, IgnoreMatcher};
pub use state::FingerprintStore;
pub use backup::{backup, execute_run, prepare_run, run_backup};
pub use archive::build_archive;
pub use restore::restore;
pub use profiles::{preset_path, resolve_presets, Profile, ProfileStore, PINOKIO_PRESETS};
pub use progress::{ChannelProgress, ProgressCallback, ProgressEvent};
