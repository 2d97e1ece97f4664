//! Ignore rules.
//!
//! Patterns are shell globs (`*`, `?`, `[...]`) matched against the final
//! segment of a path only, never the full path. The pattern file is read
//! fresh on every run so external edits take effect immediately.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Patterns written to a fresh ignore file.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] =
    &["*.tmp", "*.log", "*.cache", "__pycache__", ".git", ".venv"];

/// Compiled set of ignore globs.
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    patterns: Vec<String>,
    set: GlobSet,
}

impl IgnoreMatcher {
    /// Compile `patterns`. A pattern that does not compile is dropped and
    /// therefore never matches.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            let pattern = pattern.as_ref();
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                    kept.push(pattern.to_string());
                }
                Err(e) => warn!(pattern, error = %e, "ignoring unparsable ignore pattern"),
            }
        }

        let set = builder.build().unwrap_or_else(|e| {
            warn!(error = %e, "failed to build ignore set, nothing will be ignored");
            GlobSet::empty()
        });

        IgnoreMatcher {
            patterns: kept,
            set,
        }
    }

    /// Matcher that ignores nothing.
    pub fn empty() -> Self {
        IgnoreMatcher {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    /// True if `entry_name` (a base name) matches any pattern.
    pub fn matches(&self, entry_name: impl AsRef<Path>) -> bool {
        self.set.is_match(entry_name.as_ref())
    }

    /// True if the final segment of `path` matches any pattern.
    pub fn matches_path(&self, path: &Path) -> bool {
        path.file_name().map(|name| self.matches(name)).unwrap_or(false)
    }

    /// The patterns that compiled
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for IgnoreMatcher {
    fn default() -> Self {
        IgnoreMatcher::new(DEFAULT_IGNORE_PATTERNS)
    }
}

/// Test a single base name against a list of patterns.
pub fn matches<S: AsRef<str>>(entry_name: &str, patterns: &[S]) -> bool {
    IgnoreMatcher::new(patterns).matches(entry_name)
}

fn default_patterns() -> Vec<String> {
    DEFAULT_IGNORE_PATTERNS.iter().map(|p| p.to_string()).collect()
}

/// Read the ignore file, creating it with the default set if it is absent.
///
/// Never fails: an unreadable file or a file that cannot be created falls
/// back to the defaults with a warning.
pub fn load_ignore_patterns(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(contents) => parse_patterns(&contents),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let defaults = default_patterns();
            match save_ignore_patterns(path, &defaults) {
                Ok(()) => debug!(path = %path.display(), "created default ignore file"),
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "could not create ignore file, using defaults"
                ),
            }
            defaults
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "could not read ignore file, using defaults"
            );
            default_patterns()
        }
    }
}

/// Overwrite the ignore file with `patterns`, one per line.
pub fn save_ignore_patterns<S: AsRef<str>>(path: &Path, patterns: &[S]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let body: Vec<&str> = patterns
        .iter()
        .map(|p| p.as_ref().trim())
        .filter(|p| !p.is_empty())
        .collect();
    fs::write(path, body.join("\n"))
}

fn parse_patterns(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn test_glob_semantics_on_names() {
        let matcher = IgnoreMatcher::new(&["*.log", "file?.txt", "[ab]*.bin", ".git"]);
        assert!(matcher.matches("debug.log"));
        assert!(matcher.matches("file1.txt"));
        assert!(!matcher.matches("file10.txt"));
        assert!(matcher.matches("alpha.bin"));
        assert!(!matcher.matches("gamma.bin"));
        assert!(matcher.matches(".git"));
        assert!(!matcher.matches("notes.txt"));
    }

    #[test]
    fn test_matches_final_segment_only() {
        let matcher = IgnoreMatcher::new(&["cache"]);
        assert!(!matcher.matches_path(&PathBuf::from("/home/cache/file.txt")));
        assert!(matcher.matches_path(&PathBuf::from("/home/user/cache")));
    }

    #[test]
    fn test_free_function_contract() {
        assert!(matches("debug.log", &["*.tmp", "*.log"]));
        assert!(!matches("debug.txt", &["*.tmp", "*.log"]));
        let empty: [&str; 0] = [];
        assert!(!matches("anything", &empty));
    }

    #[test]
    fn test_malformed_pattern_never_matches() {
        let matcher = IgnoreMatcher::new(&["[unclosed", "*.tmp"]);
        assert_eq!(matcher.patterns(), &["*.tmp".to_string()]);
        assert!(!matcher.matches("[unclosed"));
        assert!(matcher.matches("x.tmp"));
    }

    #[test]
    fn test_case_sensitive() {
        let matcher = IgnoreMatcher::new(&["*.log"]);
        assert!(!matcher.matches("DEBUG.LOG"));
    }

    #[test]
    fn test_load_creates_default_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("ignore_patterns.txt");

        let patterns = load_ignore_patterns(&path);
        assert_eq!(patterns, default_patterns());
        assert!(path.exists(), "ignore file should be created");

        let contents = fs::read_to_string(&path).expect("Failed to read ignore file");
        assert_eq!(contents, DEFAULT_IGNORE_PATTERNS.join("\n"));
    }

    #[test]
    fn test_load_reads_edits_and_drops_blank_lines() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("ignore_patterns.txt");
        fs::write(&path, "  *.bak \n\n*.swp\n   \n").expect("Failed to write ignore file");

        assert_eq!(
            load_ignore_patterns(&path),
            vec!["*.bak".to_string(), "*.swp".to_string()]
        );
    }

    #[test]
    fn test_unreadable_file_falls_back_to_defaults() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        // A directory in place of the file cannot be read as text
        let path = temp_dir.path().join("ignore_patterns.txt");
        fs::create_dir(&path).expect("Failed to create dir");

        assert_eq!(load_ignore_patterns(&path), default_patterns());
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("nested").join("ignore.txt");
        save_ignore_patterns(&path, &["*.o", "target"]).expect("Failed to save");
        assert_eq!(
            load_ignore_patterns(&path),
            vec!["*.o".to_string(), "target".to_string()]
        );
    }
}
