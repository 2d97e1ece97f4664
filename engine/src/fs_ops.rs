//! Filesystem operations module.
//!
//! This module provides low-level operations for:
//! - Listing a directory level with entries classified for traversal
//! - Copying files with metadata preservation
//! - Creating directories recursively

use crate::error::EngineError;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// How traversal should treat a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file, symlink to a file, or dangling symlink
    File,
    /// Real directory (symlinked directories are not followed)
    Dir,
    /// Anything else: symlinked directories, sockets, fifos, devices
    Other,
}

/// One entry of a directory listing.
#[derive(Debug, Clone)]
pub struct DirEntryInfo {
    pub path: PathBuf,
    pub name: OsString,
    pub kind: EntryKind,
}

/// List one directory level, sorted by name.
///
/// # Errors
/// Returns `EngineError::EnumerationFailed` if the directory cannot be read.
pub fn read_dir_entries(dir: &Path) -> Result<Vec<DirEntryInfo>, EngineError> {
    let enumeration_failed = |e: io::Error| EngineError::EnumerationFailed {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(enumeration_failed)? {
        let entry = entry.map_err(enumeration_failed)?;
        let file_type = entry.file_type().map_err(enumeration_failed)?;
        let path = entry.path();

        let kind = if file_type.is_dir() {
            EntryKind::Dir
        } else if file_type.is_file() {
            EntryKind::File
        } else if file_type.is_symlink() {
            match fs::metadata(&path) {
                Ok(target) if target.is_dir() => EntryKind::Other,
                Ok(target) if target.is_file() => EntryKind::File,
                Ok(_) => EntryKind::Other,
                // Dangling link: surfaces as a per-file failure when read
                Err(_) => EntryKind::File,
            }
        } else {
            EntryKind::Other
        };

        entries.push(DirEntryInfo {
            path,
            name: entry.file_name(),
            kind,
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Copy a file from source to destination with metadata preservation.
///
/// Parent directories of `dst` are created as needed and an existing `dst`
/// is overwritten. The source modification time is carried over.
///
/// # Returns
/// Number of bytes copied
///
/// # Errors
/// Returns EngineError if the copy fails
pub fn copy_file_with_metadata(src: &Path, dst: &Path) -> Result<u64, EngineError> {
    ensure_parent_dir_exists(dst)?;

    let mut src_file = fs::File::open(src).map_err(|e| EngineError::ReadError {
        path: src.to_path_buf(),
        source: e,
    })?;

    let src_metadata = src_file.metadata().map_err(|e| EngineError::ReadError {
        path: src.to_path_buf(),
        source: e,
    })?;
    let src_mtime = src_metadata.modified().ok();

    let mut dst_file = fs::File::create(dst).map_err(|e| EngineError::WriteError {
        path: dst.to_path_buf(),
        source: e,
    })?;

    let bytes_copied = io::copy(&mut src_file, &mut dst_file).map_err(|e| {
        if e.kind() == io::ErrorKind::PermissionDenied {
            EngineError::WriteError {
                path: dst.to_path_buf(),
                source: e,
            }
        } else {
            EngineError::ReadError {
                path: src.to_path_buf(),
                source: e,
            }
        }
    })?;
    drop(dst_file);

    if let Some(mtime) = src_mtime {
        filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(mtime)).map_err(
            |e| EngineError::WriteError {
                path: dst.to_path_buf(),
                source: e,
            },
        )?;
    }

    Ok(bytes_copied)
}

/// Ensure the parent directory of a path exists, creating it if necessary.
///
/// # Errors
/// Returns EngineError if directory creation fails or the parent is a file
pub fn ensure_parent_dir_exists(path: &Path) -> Result<(), EngineError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir_exists(parent),
        _ => Ok(()),
    }
}

/// Ensure `dir` exists as a directory, creating it recursively.
pub fn ensure_dir_exists(dir: &Path) -> Result<(), EngineError> {
    match fs::metadata(dir) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(EngineError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                "Path exists but is not a directory",
            ),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| EngineError::DirectoryCreationFailed {
                path: dir.to_path_buf(),
                source: e,
            })
        }
        Err(e) => Err(EngineError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::{Duration, SystemTime};

    #[test]
    fn test_read_dir_entries_classifies_and_sorts() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path();
        fs::write(src.join("b.txt"), "b").expect("Failed to write b");
        fs::write(src.join("a.txt"), "a").expect("Failed to write a");
        fs::create_dir(src.join("sub")).expect("Failed to create sub");

        let entries = read_dir_entries(src).expect("Failed to list");
        let names: Vec<_> = entries
            .iter()
            .map(|e| (e.name.to_string_lossy().into_owned(), e.kind))
            .collect();
        assert_eq!(
            names,
            vec![
                ("a.txt".to_string(), EntryKind::File),
                ("b.txt".to_string(), EntryKind::File),
                ("sub".to_string(), EntryKind::Dir),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_classified() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path();
        fs::create_dir(root.join("real_dir")).unwrap();
        fs::write(root.join("real.txt"), "x").unwrap();
        std::os::unix::fs::symlink(root.join("real_dir"), root.join("link_dir")).unwrap();
        std::os::unix::fs::symlink(root.join("real.txt"), root.join("link.txt")).unwrap();
        std::os::unix::fs::symlink(root.join("nowhere"), root.join("dangling")).unwrap();

        let entries = read_dir_entries(root).expect("Failed to list");
        let kind_of = |name: &str| {
            entries
                .iter()
                .find(|e| e.name.as_os_str() == std::ffi::OsStr::new(name))
                .map(|e| e.kind)
                .unwrap()
        };
        assert_eq!(kind_of("link_dir"), EntryKind::Other);
        assert_eq!(kind_of("link.txt"), EntryKind::File);
        assert_eq!(kind_of("dangling"), EntryKind::File);
        assert_eq!(kind_of("real_dir"), EntryKind::Dir);
    }

    #[test]
    fn test_read_dir_entries_nonexistent() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let result = read_dir_entries(&temp_dir.path().join("nonexistent"));
        assert!(matches!(result, Err(EngineError::EnumerationFailed { .. })));
    }

    #[test]
    fn test_copy_file_with_metadata() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src_file = temp_dir.path().join("source.txt");
        let dst_file = temp_dir.path().join("deep").join("dest.txt");

        let mut file = fs::File::create(&src_file).expect("Failed to create source");
        file.write_all(b"test content").expect("Failed to write source");
        drop(file);

        let mtime = SystemTime::now() - Duration::from_secs(3 * 24 * 3600);
        filetime::set_file_mtime(&src_file, filetime::FileTime::from_system_time(mtime))
            .expect("Failed to set mtime");

        let bytes = copy_file_with_metadata(&src_file, &dst_file).expect("Failed to copy");
        assert_eq!(bytes, 12);

        let content = fs::read_to_string(&dst_file).expect("Failed to read dest");
        assert_eq!(content, "test content");

        let src_mtime = fs::metadata(&src_file).unwrap().modified().unwrap();
        let dst_mtime = fs::metadata(&dst_file).unwrap().modified().unwrap();
        let drift = match src_mtime.duration_since(dst_mtime) {
            Ok(d) => d,
            Err(e) => e.duration(),
        };
        assert!(drift < Duration::from_secs(2), "mtime should be preserved");
    }

    #[test]
    fn test_copy_overwrites_existing() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src_file = temp_dir.path().join("source.txt");
        let dst_file = temp_dir.path().join("dest.txt");
        fs::write(&src_file, "new").unwrap();
        fs::write(&dst_file, "old and longer").unwrap();

        copy_file_with_metadata(&src_file, &dst_file).expect("Failed to copy");
        assert_eq!(fs::read_to_string(&dst_file).unwrap(), "new");
    }

    #[test]
    fn test_ensure_parent_dir_exists() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("subdir").join("file.txt");

        ensure_parent_dir_exists(&path).expect("Failed to create parent");
        assert!(path.parent().unwrap().is_dir());
    }

    #[test]
    fn test_ensure_dir_exists_rejects_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("file.txt");
        fs::write(&path, "x").unwrap();

        assert!(matches!(
            ensure_dir_exists(&path),
            Err(EngineError::DirectoryCreationFailed { .. })
        ));
    }
}
