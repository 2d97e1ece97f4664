//! Persistent fingerprint store.
//!
//! Maps canonical absolute source paths to the hex digest recorded when the
//! file was last copied. Loaded once per run, mutated in memory, and written
//! back wholesale at the end of the run.

use crate::error::EngineError;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintStore {
    records: BTreeMap<String, String>,
    dirty: bool,
}

impl FingerprintStore {
    pub fn new() -> Self {
        FingerprintStore::default()
    }

    /// Read the persisted mapping; a missing file yields an empty store.
    ///
    /// # Errors
    /// Returns `EngineError::StateFile` if the file exists but cannot be read
    /// or is not a JSON object of strings.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no fingerprint state yet");
                return Ok(FingerprintStore::new());
            }
            Err(e) => return Err(state_error(path, e)),
        };

        let records: BTreeMap<String, String> =
            serde_json::from_str(&contents).map_err(|e| state_error(path, e))?;
        debug!(path = %path.display(), records = records.len(), "loaded fingerprint state");

        Ok(FingerprintStore {
            records,
            dirty: false,
        })
    }

    /// Write the full mapping, replacing any prior state.
    ///
    /// The document goes to a sibling temporary file first and is renamed
    /// over `path`, so readers see either the old or the new state.
    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| state_error(path, e))?;
            }
        }

        let body = serde_json::to_string_pretty(&self.records).map_err(|e| state_error(path, e))?;
        let tmp = temp_path(path);
        fs::write(&tmp, body).map_err(|e| state_error(path, e))?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(state_error(path, e));
        }

        debug!(path = %path.display(), records = self.records.len(), "saved fingerprint state");
        Ok(())
    }

    /// Recorded digest for a canonical source path.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.records.get(key).map(String::as_str)
    }

    /// Record a digest, marking the store as changed if it differs.
    pub fn insert(&mut self, key: impl Into<String>, fingerprint: impl Into<String>) {
        let fingerprint = fingerprint.into();
        let previous = self.records.insert(key.into(), fingerprint.clone());
        if previous.as_deref() != Some(fingerprint.as_str()) {
            self.dirty = true;
        }
    }

    /// True if the recorded digest for `key` equals `fingerprint`.
    pub fn is_current(&self, key: &str, fingerprint: &str) -> bool {
        self.get(key) == Some(fingerprint)
    }

    /// True if any record changed since load.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Read-only view of the mapping
    pub fn records(&self) -> &BTreeMap<String, String> {
        &self.records
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn state_error(path: &Path, err: impl std::fmt::Display) -> EngineError {
    EngineError::StateFile {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
