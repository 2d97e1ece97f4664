//! Backup orchestration.
//!
//! This module provides the backup run lifecycle:
//! - Preparing a run (config snapshot, fingerprint state, ignore rules, layout)
//! - Executing a run (walk, fingerprint, copy, archive, persist)
//!
//! A file is copied when its fingerprint differs from the recorded one or
//! when its output for this run does not exist yet. Flat runs overwrite one
//! mirror; every incremental run writes a complete snapshot into its own
//! directory. Per-file failures are recorded in the summary and never abort
//! the run.

use crate::archive;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::fingerprint::compute_fingerprint;
use crate::fs_ops::{self, EntryKind};
use crate::ignore::{load_ignore_patterns, IgnoreMatcher};
use crate::model::{
    ArchiveKind, BackupMode, BackupOptions, BackupRun, BackupSummary, FileEvent, FileFailure,
    FileOutcome, RunState, TIMESTAMP_FORMAT,
};
use crate::progress::ProgressCallback;
use crate::state::FingerprintStore;
use chrono::Local;
use std::error::Error as _;
use std::ffi::OsString;
use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Prepare a backup run.
///
/// Loads the fingerprint state and ignore rules once, resolves the sources
/// (missing or non-directory sources are skipped with a warning) and picks
/// the base directory: `destination` for flat runs, a fresh
/// `destination/<timestamp>` for incremental runs. Nothing is written under
/// `destination` yet.
///
/// # Errors
/// Returns EngineError if the destination is empty or the state file is
/// unreadable.
pub fn prepare_run<P: AsRef<Path>>(
    sources: &[P],
    destination: &Path,
    options: BackupOptions,
    config: &EngineConfig,
) -> Result<BackupRun, EngineError> {
    if destination.as_os_str().is_empty() {
        return Err(EngineError::InvalidPath {
            path: destination.to_path_buf(),
            reason: "Destination path is empty".to_string(),
        });
    }

    let fingerprints = FingerprintStore::load(&config.state_file)?;
    let ignore = IgnoreMatcher::new(&load_ignore_patterns(&config.ignore_file));

    let started_at = Local::now();
    let timestamp = started_at.format(TIMESTAMP_FORMAT).to_string();
    let base_dir = match options.mode {
        BackupMode::Flat => destination.to_path_buf(),
        BackupMode::Incremental => fresh_run_dir(destination, &timestamp),
    };

    let mut resolved = Vec::new();
    let mut skipped_sources = Vec::new();
    for source in sources {
        let source = source.as_ref();
        match fs::canonicalize(source) {
            Ok(path) if path.is_dir() => resolved.push(path),
            Ok(_) => {
                warn!(source = %source.display(), "source is not a directory, skipping");
                skipped_sources.push(source.to_path_buf());
            }
            Err(e) => {
                warn!(source = %source.display(), error = %e, "source not found, skipping");
                skipped_sources.push(source.to_path_buf());
            }
        }
    }

    Ok(BackupRun {
        id: Uuid::new_v4(),
        sources: resolved,
        skipped_sources,
        destination: destination.to_path_buf(),
        base_dir,
        timestamp,
        options,
        config: config.clone(),
        ignore,
        fingerprints,
        state: RunState::Pending,
        total: 0,
        copied: 0,
        skipped: 0,
        written_files: Vec::new(),
        failures: Vec::new(),
        cancelled: false,
        started_at,
        finished_at: None,
    })
}

/// Execute a prepared run.
///
/// Transitions the run from Pending to Running to Completed. Individual file
/// errors are recorded but do NOT stop the run.
///
/// # Errors
/// Returns EngineError only for run-level problems: the run was already
/// executed, the base directory cannot be created, the archive cannot be
/// written, or the fingerprint state cannot be saved. Files copied before
/// such an error stay on disk.
pub fn execute_run(
    run: &mut BackupRun,
    progress: Option<&dyn ProgressCallback>,
) -> Result<BackupSummary, EngineError> {
    if run.state != RunState::Pending {
        return Err(EngineError::invalid_argument(format!(
            "run must be in Pending state to execute; current state: {:?}",
            run.state
        )));
    }
    run.state = RunState::Running;

    if !run.options.dry_run {
        fs_ops::ensure_dir_exists(&run.base_dir).map_err(|e| match e {
            EngineError::DirectoryCreationFailed { path, source } => {
                EngineError::DestinationAccessDenied { path, source }
            }
            other => other,
        })?;
    }

    info!(
        run_id = %run.id,
        mode = %run.options.mode,
        base_dir = %run.base_dir.display(),
        sources = run.sources.len(),
        dry_run = run.options.dry_run,
        "backup started"
    );
    if let Some(callback) = progress {
        callback.on_run_started(run);
    }

    // Never descend into our own output when it lives inside a source
    let destination = fs::canonicalize(&run.destination).ok();

    for source in run.sources.clone() {
        let source_name = source
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| OsString::from("root"));
        let walker = Walker {
            source_root: &source,
            source_name: &source_name,
            destination: destination.as_deref(),
            progress,
        };
        if walker.walk(run, &source).is_break() {
            break;
        }
    }

    if run.cancelled {
        warn!(run_id = %run.id, "backup cancelled, skipping archive");
    }

    let archive_path = match archive::archive_file_name(&run.timestamp, run.options.archive) {
        Some(name) if !run.options.dry_run && !run.cancelled => {
            let path = run.base_dir.join(name);
            archive::build_archive(
                &run.written_files,
                &run.base_dir,
                run.options.archive,
                &path,
            )?;
            Some(path)
        }
        _ => None,
    };

    if run.options.dry_run {
        debug!("dry run, fingerprint state left untouched");
    } else if run.fingerprints.is_dirty() {
        run.fingerprints.save(&run.config.state_file)?;
    }

    run.state = RunState::Completed;
    run.finished_at = Some(Local::now());

    let summary = summarize(run, archive_path);
    info!(
        run_id = %summary.run_id,
        copied = summary.copied,
        skipped = summary.skipped,
        total = summary.total,
        failed = summary.failures.len(),
        "backup finished"
    );
    if let Some(callback) = progress {
        callback.on_run_completed(&summary);
    }

    Ok(summary)
}

/// Prepare and execute a backup in one call.
pub fn run_backup<P: AsRef<Path>>(
    sources: &[P],
    destination: &Path,
    options: BackupOptions,
    config: &EngineConfig,
    progress: Option<&dyn ProgressCallback>,
) -> Result<BackupSummary, EngineError> {
    let mut run = prepare_run(sources, destination, options, config)?;
    execute_run(&mut run, progress)
}

/// String-typed entry point for front ends, using the default configuration.
///
/// `mode` is `flat` or `incremental`; `archive_kind` is `none`, `zip`, `tar`
/// or `tar.gz`.
pub fn backup(
    sources: &[String],
    destination: &str,
    mode: &str,
    archive_kind: &str,
    dry_run: bool,
) -> Result<BackupSummary, EngineError> {
    let mode: BackupMode = mode.parse()?;
    let archive: ArchiveKind = archive_kind.parse()?;
    run_backup(
        sources,
        Path::new(destination),
        BackupOptions::new(mode, archive, dry_run),
        &EngineConfig::default(),
        None,
    )
}

/// Traversal context for one source tree.
struct Walker<'a> {
    source_root: &'a Path,
    source_name: &'a OsString,
    destination: Option<&'a Path>,
    progress: Option<&'a dyn ProgressCallback>,
}

impl Walker<'_> {
    /// Depth-first walk: files of this level first, then the surviving
    /// subdirectories. Breaks when the run is cancelled.
    fn walk(&self, run: &mut BackupRun, dir: &Path) -> ControlFlow<()> {
        let entries = match fs_ops::read_dir_entries(dir) {
            Ok(entries) => entries,
            Err(e) => {
                record_failure(run, dir, &e);
                return ControlFlow::Continue(());
            }
        };

        for entry in entries.iter().filter(|e| e.kind == EntryKind::File) {
            if run.options.is_cancelled() {
                run.cancelled = true;
                return ControlFlow::Break(());
            }

            run.total += 1;
            if run.ignore.matches(&entry.name) {
                debug!(file = %entry.path.display(), "ignored");
                self.notify(run, &entry.path, None, FileOutcome::Ignored);
                continue;
            }

            self.process_file(run, &entry.path);
        }

        for entry in entries.iter().filter(|e| e.kind == EntryKind::Dir) {
            if run.ignore.matches(&entry.name) {
                debug!(dir = %entry.path.display(), "ignored directory pruned");
                continue;
            }
            if self.destination == Some(entry.path.as_path()) {
                debug!(dir = %entry.path.display(), "destination inside source pruned");
                continue;
            }
            if self.walk(run, &entry.path).is_break() {
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    fn process_file(&self, run: &mut BackupRun, source: &Path) {
        let relative = match source.strip_prefix(self.source_root) {
            Ok(relative) => Path::new(self.source_name).join(relative),
            Err(_) => Path::new(self.source_name).join(source.file_name().unwrap_or_default()),
        };
        let output = run.base_dir.join(&relative);

        let key = match fs::canonicalize(source) {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(e) => {
                let err = EngineError::ReadError {
                    path: source.to_path_buf(),
                    source: e,
                };
                record_failure(run, source, &err);
                self.notify(run, source, Some(&output), FileOutcome::Failed);
                return;
            }
        };

        let fingerprint =
            match compute_fingerprint(source, run.config.algorithm, run.config.chunk_size) {
                Ok(fingerprint) => fingerprint,
                Err(e) => {
                    record_failure(run, source, &e);
                    self.notify(run, source, Some(&output), FileOutcome::Failed);
                    return;
                }
            };

        if run.fingerprints.is_current(&key, &fingerprint) && output.exists() {
            run.skipped += 1;
            debug!(file = %source.display(), "unchanged");
            self.notify(run, source, Some(&output), FileOutcome::Unchanged);
            return;
        }

        if !run.options.dry_run {
            if let Err(e) = copy_and_verify(run, source, &output, &fingerprint) {
                record_failure(run, source, &e);
                self.notify(run, source, Some(&output), FileOutcome::Failed);
                return;
            }
            run.fingerprints.insert(key, fingerprint);
        }

        run.written_files.push(output.clone());
        run.copied += 1;
        debug!(file = %source.display(), output = %output.display(), "copied");
        self.notify(run, source, Some(&output), FileOutcome::Copied);

        if let Some(callback) = self.progress {
            callback.on_progress(run.copied as f64 / run.total.max(1) as f64);
        }
    }

    fn notify(&self, run: &BackupRun, source: &Path, output: Option<&Path>, outcome: FileOutcome) {
        if let Some(callback) = self.progress {
            callback.on_file_completed(
                run,
                &FileEvent {
                    source_path: source.to_path_buf(),
                    output_path: output.map(Path::to_path_buf),
                    outcome,
                },
            );
        }
    }
}

fn copy_and_verify(
    run: &BackupRun,
    source: &Path,
    output: &Path,
    fingerprint: &str,
) -> Result<(), EngineError> {
    fs_ops::copy_file_with_metadata(source, output)?;

    if run.config.verify_after_copy {
        let copied = compute_fingerprint(output, run.config.algorithm, run.config.chunk_size)?;
        if copied != fingerprint {
            return Err(EngineError::VerificationFailed {
                path: output.to_path_buf(),
            });
        }
    }

    Ok(())
}

/// `destination/<timestamp>`, or `<timestamp>_N` when a run from the same
/// second already claimed it.
fn fresh_run_dir(destination: &Path, timestamp: &str) -> PathBuf {
    let candidate = destination.join(timestamp);
    if !candidate.exists() {
        return candidate;
    }
    (2u32..)
        .map(|n| destination.join(format!("{}_{}", timestamp, n)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

fn record_failure(run: &mut BackupRun, path: &Path, err: &EngineError) {
    let message = match err.source() {
        Some(cause) => format!("{}: {}", err, cause),
        None => err.to_string(),
    };
    warn!(path = %path.display(), error = %message, "file failed");
    run.failures.push(FileFailure {
        source_path: path.to_path_buf(),
        error_code: err.raw_os_error(),
        message,
    });
}

fn summarize(run: &BackupRun, archive: Option<PathBuf>) -> BackupSummary {
    BackupSummary {
        run_id: run.id,
        mode: run.options.mode,
        base_dir: run.base_dir.clone(),
        copied: run.copied,
        skipped: run.skipped,
        total: run.total,
        archive,
        written_files: run.written_files.clone(),
        failures: run.failures.clone(),
        skipped_sources: run.skipped_sources.clone(),
        dry_run: run.options.dry_run,
        cancelled: run.cancelled,
        started_at: run.started_at,
        finished_at: run.finished_at.unwrap_or_else(Local::now),
    }
}
