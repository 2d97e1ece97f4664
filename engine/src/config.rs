//! Engine configuration.
//!
//! `EngineConfig` is an immutable snapshot taken at call time. Defaults put
//! the fingerprint state, ignore rules and profiles next to the working
//! directory; an optional INI file with a `[backup]` section overrides them.

use crate::error::EngineError;
use crate::fingerprint::{FingerprintAlgorithm, DEFAULT_CHUNK_SIZE};
use configparser::ini::Ini;
use std::path::{Path, PathBuf};

const SECTION: &str = "backup";

pub const DEFAULT_STATE_FILE: &str = "backup_state.json";
pub const DEFAULT_IGNORE_FILE: &str = "ignore_patterns.txt";
pub const DEFAULT_PROFILE_FILE: &str = "profiles.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Persisted path → fingerprint mapping
    pub state_file: PathBuf,
    /// Newline-separated ignore globs
    pub ignore_file: PathBuf,
    /// Saved source/destination profiles
    pub profile_file: PathBuf,
    pub algorithm: FingerprintAlgorithm,
    /// Streaming read size for fingerprinting
    pub chunk_size: usize,
    /// Re-hash each output after copying and compare with the source
    pub verify_after_copy: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            ignore_file: PathBuf::from(DEFAULT_IGNORE_FILE),
            profile_file: PathBuf::from(DEFAULT_PROFILE_FILE),
            algorithm: FingerprintAlgorithm::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            verify_after_copy: false,
        }
    }
}

impl EngineConfig {
    /// Keep every engine file under `dir` (handy for tests and portable setups).
    pub fn in_dir(dir: &Path) -> Self {
        EngineConfig {
            state_file: dir.join(DEFAULT_STATE_FILE),
            ignore_file: dir.join(DEFAULT_IGNORE_FILE),
            profile_file: dir.join(DEFAULT_PROFILE_FILE),
            ..EngineConfig::default()
        }
    }
}

/// Load configuration from an INI file, falling back to defaults.
///
/// A missing file yields `EngineConfig::default()`. Relative paths in the
/// file are resolved against the file's own directory.
///
/// # Errors
/// Returns `EngineError::Config` if the file cannot be parsed or a value is
/// invalid.
pub fn load_config(path: &Path) -> Result<EngineConfig, EngineError> {
    let mut config = EngineConfig::default();

    if !path.exists() {
        return Ok(config);
    }

    let mut conf = Ini::new();
    conf.load(path)
        .map_err(|e| EngineError::config(format!("Failed to parse {}: {}", path.display(), e)))?;

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let resolve = |value: String| {
        let value = PathBuf::from(value);
        if value.is_absolute() {
            value
        } else {
            base.join(value)
        }
    };

    if let Some(value) = conf.get(SECTION, "state_file") {
        config.state_file = resolve(value);
    }
    if let Some(value) = conf.get(SECTION, "ignore_file") {
        config.ignore_file = resolve(value);
    }
    if let Some(value) = conf.get(SECTION, "profile_file") {
        config.profile_file = resolve(value);
    }
    if let Some(value) = conf.get(SECTION, "algorithm") {
        config.algorithm = value
            .parse()
            .map_err(|e: EngineError| EngineError::config(e.to_string()))?;
    }
    if let Some(value) = conf.get(SECTION, "chunk_size") {
        config.chunk_size = value
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|size| *size > 0)
            .ok_or_else(|| EngineError::config(format!("Invalid chunk_size: {}", value)))?;
    }
    if let Some(value) = conf.get(SECTION, "verify_after_copy") {
        config.verify_after_copy = parse_bool(&value)
            .ok_or_else(|| EngineError::config(format!("Invalid verify_after_copy: {}", value)))?;
    }

    Ok(config)
}

/// Parse a boolean value from INI string
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

/// Sample configuration file contents
pub fn sample_config() -> String {
    format!(
        r#"[{SECTION}]
# Where fingerprints of previously copied files are kept
state_file = {DEFAULT_STATE_FILE}

# Newline-separated glob patterns matched against file and directory names
ignore_file = {DEFAULT_IGNORE_FILE}

# Saved source/destination profiles
profile_file = {DEFAULT_PROFILE_FILE}

# Fingerprint algorithm: sha256 or blake3
algorithm = sha256

# Bytes read per chunk while fingerprinting
chunk_size = {DEFAULT_CHUNK_SIZE}

# Re-hash every copied file and compare with its source (true/false)
verify_after_copy = false
"#
    )
}
