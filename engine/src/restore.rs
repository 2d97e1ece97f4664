//! Restore a backup tree.
//!
//! Copies every file under a backup folder (a flat destination or one
//! incremental run directory) into a target directory, preserving relative
//! paths. Existing target files with the same relative path are overwritten;
//! anything else already in the target is left alone.

use crate::error::EngineError;
use crate::fs_ops::{self, EntryKind};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Restore `backup_folder` into `target_dir`.
///
/// # Returns
/// Number of files restored
///
/// # Errors
/// - `EngineError::SourceNotFound` if `backup_folder` does not exist
/// - `EngineError::InvalidPath` if `backup_folder` is not a directory
/// - The first enumeration or copy error; files restored before it stay
pub fn restore(backup_folder: &Path, target_dir: &Path) -> Result<usize, EngineError> {
    let metadata = fs::metadata(backup_folder).map_err(|_| EngineError::SourceNotFound {
        path: backup_folder.to_path_buf(),
    })?;
    if !metadata.is_dir() {
        return Err(EngineError::InvalidPath {
            path: backup_folder.to_path_buf(),
            reason: "Backup folder is not a directory".to_string(),
        });
    }

    fs_ops::ensure_dir_exists(target_dir)?;

    // A target nested in the backup must not be restored into itself
    let target = fs::canonicalize(target_dir).ok();

    info!(
        from = %backup_folder.display(),
        to = %target_dir.display(),
        "restore started"
    );
    let count = restore_dir(backup_folder, backup_folder, target_dir, target.as_deref())?;
    info!(restored = count, "restore finished");

    Ok(count)
}

fn restore_dir(
    root: &Path,
    dir: &Path,
    target_dir: &Path,
    prune: Option<&Path>,
) -> Result<usize, EngineError> {
    let mut count = 0;

    for entry in fs_ops::read_dir_entries(dir)? {
        match entry.kind {
            EntryKind::File => {
                let relative = entry.path.strip_prefix(root).unwrap_or(&entry.path);
                let dst = target_dir.join(relative);
                fs_ops::copy_file_with_metadata(&entry.path, &dst)?;
                debug!(file = %relative.display(), "restored");
                count += 1;
            }
            EntryKind::Dir => {
                if let (Some(prune), Ok(canonical)) = (prune, fs::canonicalize(&entry.path)) {
                    if canonical == prune {
                        debug!(dir = %entry.path.display(), "target inside backup pruned");
                        continue;
                    }
                }
                count += restore_dir(root, &entry.path, target_dir, prune)?;
            }
            EntryKind::Other => {}
        }
    }

    Ok(count)
}
