//! Deciding which local paths take part in sync.
//!
//! `.git` directories are always excluded. Beyond that, a directory inside a
//! git work tree follows its ignore rules ([`GitIgnoreFilter`]); anything else
//! uses simple name patterns ([`PatternFilter`]).

use crate::sync::SyncError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

const GIT_DIR: &str = ".git";

/// Predicate over paths relative to the sync root (forward slashes).
pub trait PathFilter: Send + Sync {
    /// Called once at the start of every scan, before any `accepts` call.
    fn refresh(&mut self) -> Result<(), SyncError> {
        Ok(())
    }

    /// Whether `relative_path` should be synced (or, for a directory, descended into).
    fn accepts(&self, relative_path: &str, is_dir: bool) -> bool;
}

fn is_git_dir(relative_path: &str) -> bool {
    relative_path.split('/').any(|segment| segment == GIT_DIR)
}

/// Name-pattern filter.
#[derive(Debug, Clone, Default)]
pub struct PatternFilter {
    /// Include hidden files (starting with '.')
    pub include_hidden: bool,
    /// Ignore patterns matched against each path segment (glob-style `*`)
    pub ignore_patterns: Vec<String>,
}

impl PatternFilter {
    pub fn new(include_hidden: bool, ignore_patterns: Vec<String>) -> Self {
        Self {
            include_hidden,
            ignore_patterns,
        }
    }
}

impl PathFilter for PatternFilter {
    fn accepts(&self, relative_path: &str, _is_dir: bool) -> bool {
        if is_git_dir(relative_path) {
            return false;
        }
        relative_path.split('/').all(|segment| {
            (self.include_hidden || !segment.starts_with('.'))
                && !should_ignore(segment, &self.ignore_patterns)
        })
    }
}

/// Check if a filename matches any ignore pattern.
fn should_ignore(name: &str, patterns: &[String]) -> bool {
    patterns
        .iter()
        .any(|pattern| pattern_matches(pattern, name))
}

/// Simple glob pattern matching: exact names or a single `*` wildcard.
fn pattern_matches(pattern: &str, name: &str) -> bool {
    if pattern == name {
        return true;
    }

    if let Some((prefix, suffix)) = pattern.split_once('*') {
        if !suffix.contains('*') {
            return name.len() >= prefix.len() + suffix.len()
                && name.starts_with(prefix)
                && name.ends_with(suffix);
        }
    }

    false
}

/// Follows the ignore rules of the git work tree containing `root`.
///
/// Each refresh asks git once for every ignored untracked path under the
/// root, so a scan costs one process spawn rather than one per file.
#[derive(Debug, Clone)]
pub struct GitIgnoreFilter {
    root: PathBuf,
    ignored_files: HashSet<String>,
    ignored_dirs: HashSet<String>,
}

impl GitIgnoreFilter {
    /// Build a filter for `root` if it lies inside a git work tree.
    pub fn discover(root: &Path) -> Option<Self> {
        let output = Command::new("git")
            .arg("rev-parse")
            .arg("--is-inside-work-tree")
            .current_dir(root)
            .output()
            .ok()?;

        if output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "true" {
            Some(Self {
                root: root.to_path_buf(),
                ignored_files: HashSet::new(),
                ignored_dirs: HashSet::new(),
            })
        } else {
            None
        }
    }

    fn load_ignored(&mut self) -> Result<(), SyncError> {
        let output = Command::new("git")
            .args([
                "ls-files",
                "--others",
                "--ignored",
                "--exclude-standard",
                "--directory",
                "-z",
            ])
            .current_dir(&self.root)
            .output()
            .map_err(SyncError::io(&self.root))?;

        if !output.status.success() {
            return Err(SyncError::Ignore {
                path: self.root.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        self.ignored_files.clear();
        self.ignored_dirs.clear();
        for entry in output.stdout.split(|b| *b == 0).filter(|e| !e.is_empty()) {
            let entry = String::from_utf8_lossy(entry);
            match entry.strip_suffix('/') {
                Some(dir) => self.ignored_dirs.insert(dir.to_string()),
                None => self.ignored_files.insert(entry.to_string()),
            };
        }
        debug!(
            "git ignores {} file(s) and {} dir(s) under {}",
            self.ignored_files.len(),
            self.ignored_dirs.len(),
            self.root.display()
        );
        Ok(())
    }

    fn under_ignored_dir(&self, relative_path: &str) -> bool {
        let mut end = 0;
        for segment in relative_path.split('/') {
            end += segment.len();
            if self.ignored_dirs.contains(&relative_path[..end]) {
                return true;
            }
            end += 1;
        }
        false
    }
}

impl PathFilter for GitIgnoreFilter {
    fn refresh(&mut self) -> Result<(), SyncError> {
        self.load_ignored()
    }

    fn accepts(&self, relative_path: &str, _is_dir: bool) -> bool {
        !(is_git_dir(relative_path)
            || self.ignored_files.contains(relative_path)
            || self.under_ignored_dir(relative_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_pattern_matches() {
        assert!(pattern_matches("*.swp", "notes.md.swp"));
        assert!(pattern_matches("build", "build"));
        assert!(pattern_matches("tmp*", "tmpfile"));
        assert!(!pattern_matches("*.swp", "notes.md"));
        assert!(!pattern_matches("a*a", "a"));
    }

    #[test]
    fn test_pattern_filter_defaults() {
        let filter = PatternFilter::default();
        assert!(filter.accepts("notes/idea.md", false));
        assert!(!filter.accepts(".hidden.txt", false));
        assert!(!filter.accepts("notes/.cache", true));
        assert!(!filter.accepts(".git/HEAD", false));
    }

    #[test]
    fn test_pattern_filter_hidden_and_patterns() {
        let filter = PatternFilter::new(true, vec!["*.tmp".to_string(), "target".to_string()]);
        assert!(filter.accepts(".env", false));
        assert!(!filter.accepts(".git", true));
        assert!(!filter.accepts("scratch.tmp", false));
        assert!(!filter.accepts("target/debug/app", false));
        assert!(filter.accepts("src/main.rs", false));
    }

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_git_filter_follows_gitignore() {
        if !git_available() {
            return;
        }
        let temp = tempfile::tempdir().unwrap();
        let init = Command::new("git")
            .arg("init")
            .arg("-q")
            .current_dir(temp.path())
            .status()
            .unwrap();
        assert!(init.success());

        fs::write(temp.path().join(".gitignore"), "*.log\nbuild/\n").unwrap();
        fs::write(temp.path().join("keep.txt"), "keep").unwrap();
        fs::write(temp.path().join("debug.log"), "noise").unwrap();
        fs::create_dir(temp.path().join("build")).unwrap();
        fs::write(temp.path().join("build/out.bin"), "bin").unwrap();

        let mut filter = GitIgnoreFilter::discover(temp.path()).expect("inside work tree");
        filter.refresh().unwrap();

        assert!(filter.accepts("keep.txt", false));
        assert!(filter.accepts(".gitignore", false));
        assert!(!filter.accepts("debug.log", false));
        assert!(!filter.accepts("build", true));
        assert!(!filter.accepts("build/out.bin", false));
        assert!(!filter.accepts(".git/config", false));
    }

    #[test]
    fn test_git_filter_absent_outside_work_tree() {
        if !git_available() {
            return;
        }
        let temp = tempfile::tempdir().unwrap();
        // A temp dir could in principle sit inside a work tree; only assert
        // when git agrees it does not.
        let inside = Command::new("git")
            .args(["rev-parse", "--is-inside-work-tree"])
            .current_dir(temp.path())
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
        if !inside {
            assert!(GitIgnoreFilter::discover(temp.path()).is_none());
        }
    }
}
