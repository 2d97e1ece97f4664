//! Progress reporting.
//!
//! This module defines the ProgressCallback trait, which decouples the backup
//! engine from any specific front end (CLI, GUI, scheduler). `ChannelProgress`
//! turns callbacks into `ProgressEvent`s on a crossbeam channel so a consumer
//! on another thread can subscribe without the engine knowing its type.

use crate::model::{BackupMode, BackupRun, BackupSummary, FileEvent, FileOutcome};
use crossbeam_channel::Sender;
use std::path::PathBuf;
use uuid::Uuid;

/// Trait for receiving progress updates from a backup run.
///
/// All methods are called synchronously on the thread executing the run,
/// at most once per discovered file.
pub trait ProgressCallback: Send {
    /// Called once the run is prepared and about to walk its sources.
    fn on_run_started(&self, run: &BackupRun);

    /// Called after each discovered file has been handled.
    fn on_file_completed(&self, run: &BackupRun, event: &FileEvent);

    /// Called after each copied file with `copied / max(total, 1)`.
    fn on_progress(&self, fraction: f64);

    /// Called when the run is finished, archive and state included.
    fn on_run_completed(&self, summary: &BackupSummary);
}

/// Owned form of the callbacks, suitable for sending across threads.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    RunStarted {
        run_id: Uuid,
        mode: BackupMode,
        base_dir: PathBuf,
        dry_run: bool,
    },
    FileCompleted {
        source_path: PathBuf,
        outcome: FileOutcome,
    },
    Progress {
        fraction: f64,
    },
    RunCompleted {
        copied: usize,
        skipped: usize,
        total: usize,
        failed: usize,
    },
}

/// A ProgressCallback implementation that forwards events over a channel.
///
/// A disconnected receiver is not an error: events are simply dropped.
pub struct ChannelProgress {
    sender: Sender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new(sender: Sender<ProgressEvent>) -> Self {
        ChannelProgress { sender }
    }
}

impl ProgressCallback for ChannelProgress {
    fn on_run_started(&self, run: &BackupRun) {
        let _ = self.sender.send(ProgressEvent::RunStarted {
            run_id: run.id,
            mode: run.options.mode,
            base_dir: run.base_dir.clone(),
            dry_run: run.options.dry_run,
        });
    }

    fn on_file_completed(&self, _run: &BackupRun, event: &FileEvent) {
        let _ = self.sender.send(ProgressEvent::FileCompleted {
            source_path: event.source_path.clone(),
            outcome: event.outcome,
        });
    }

    fn on_progress(&self, fraction: f64) {
        let _ = self.sender.send(ProgressEvent::Progress { fraction });
    }

    fn on_run_completed(&self, summary: &BackupSummary) {
        let _ = self.sender.send(ProgressEvent::RunCompleted {
            copied: summary.copied,
            skipped: summary.skipped,
            total: summary.total,
            failed: summary.failures.len(),
        });
    }
}
