//! Named backup profiles.
//!
//! A profile stores a set of sources and a destination under a name so a
//! front end can rerun the same backup. Profiles live in a small JSON
//! document keyed by name. Presets name the usual Pinokio folders so they
//! can be picked without typing their paths.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Well-known Pinokio folders, relative to the Pinokio root.
pub const PINOKIO_PRESETS: &[(&str, &str)] = &[
    ("Models", "models"),
    ("LoRAs", "models/loras"),
    ("Checkpoints", "models/checkpoints"),
    ("ControlNet", "models/controlnet"),
    ("Apps", "apps"),
    ("Extensions", "extensions"),
];

/// Relative folder for a preset name, ignoring ASCII case.
pub fn preset_path(name: &str) -> Option<&'static str> {
    PINOKIO_PRESETS
        .iter()
        .find(|(preset, _)| preset.eq_ignore_ascii_case(name))
        .map(|(_, path)| *path)
}

/// Resolve preset names to source folders under `root`, in order, without
/// duplicates.
///
/// # Errors
/// Returns `EngineError::InvalidArgument` for an unknown preset name.
pub fn resolve_presets<S: AsRef<str>>(
    names: &[S],
    root: &Path,
) -> Result<Vec<PathBuf>, EngineError> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for name in names {
        let name = name.as_ref();
        let relative = preset_path(name).ok_or_else(|| {
            let known: Vec<&str> = PINOKIO_PRESETS.iter().map(|(preset, _)| *preset).collect();
            EngineError::invalid_argument(format!(
                "unknown preset '{}', expected one of: {}",
                name,
                known.join(", ")
            ))
        })?;
        let path = root.join(relative);
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    Ok(paths)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub sources: Vec<PathBuf>,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileStore {
    profiles: BTreeMap<String, Profile>,
}

impl ProfileStore {
    /// Read profiles from `path`; a missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ProfileStore::default()),
            Err(e) => return Err(profile_error(path, e)),
        };

        let profiles = serde_json::from_str(&contents).map_err(|e| profile_error(path, e))?;
        Ok(ProfileStore { profiles })
    }

    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| profile_error(path, e))?;
            }
        }
        let body =
            serde_json::to_string_pretty(&self.profiles).map_err(|e| profile_error(path, e))?;
        fs::write(path, body).map_err(|e| profile_error(path, e))?;
        debug!(path = %path.display(), profiles = self.profiles.len(), "saved profiles");
        Ok(())
    }

    /// Insert or replace a profile.
    pub fn upsert(&mut self, name: impl Into<String>, profile: Profile) {
        self.profiles.insert(name.into(), profile);
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Profile> {
        self.profiles.remove(name)
    }

    /// Profile names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }
}

fn profile_error(path: &Path, err: impl std::fmt::Display) -> EngineError {
    EngineError::config(format!("profile file {}: {}", path.display(), err))
}
