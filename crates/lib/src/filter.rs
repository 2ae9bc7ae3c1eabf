//! Deterministic source-tree filtering.
//!
//! The build input is a cleaned view of the source directory: every path
//! matching an exclusion pattern (editor state, prior build outputs, lock
//! caches) is dropped before anything reaches the build executor. Filtering
//! the same root with the same patterns always yields the same tree.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// Errors that can occur while filtering a source tree.
#[derive(Debug, Error)]
pub enum FilterError {
  /// An exclusion pattern is not a valid regular expression.
  #[error("invalid exclusion pattern `{pattern}`: {source}")]
  Pattern {
    pattern: String,
    #[source]
    source: regex::Error,
  },

  /// The source root does not exist or cannot be read.
  #[error("source root {path} is not readable: {message}")]
  RootUnreadable { path: String, message: String },

  /// A filesystem entry below the root could not be read.
  #[error("failed to read {path}: {message}")]
  ReadEntry { path: String, message: String },

  /// Copying the filtered tree to a staging directory failed.
  #[error("failed to materialize {}: {source}", path.display())]
  Materialize {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// An ordered set of path-exclusion patterns.
///
/// Patterns use full-match semantics against the `/`-separated path relative
/// to the source root. Directory paths carry a trailing `/`, so `^target/`
/// excludes the `target` directory and everything below it.
#[derive(Debug)]
pub struct ExclusionPatternSet {
  patterns: Vec<Regex>,
}

impl ExclusionPatternSet {
  /// Compile a list of pattern strings. An empty list is valid and excludes
  /// nothing.
  pub fn compile(patterns: &[String]) -> Result<Self, FilterError> {
    let mut compiled = Vec::with_capacity(patterns.len());
    for pattern in patterns {
      let anchored = format!("^(?:{})$", pattern);
      let regex = Regex::new(&anchored).map_err(|source| FilterError::Pattern {
        pattern: pattern.clone(),
        source,
      })?;
      compiled.push(regex);
    }
    Ok(Self { patterns: compiled })
  }

  /// Whether a relative path is excluded.
  ///
  /// A path is excluded if any pattern matches the path itself, the path
  /// with a trailing `/` (for directories), or any ancestor directory with a
  /// trailing `/`. The ancestor check keeps exclusion of a directory
  /// equivalent to exclusion of all its descendants, independent of walk
  /// order.
  pub fn excludes(&self, rel_path: &str, is_dir: bool) -> bool {
    if self.matches(rel_path) {
      return true;
    }
    if is_dir && self.matches(&format!("{}/", rel_path)) {
      return true;
    }
    // Ancestor directories, each with a trailing slash.
    for (idx, byte) in rel_path.bytes().enumerate() {
      if byte == b'/' && self.matches(&rel_path[..=idx]) {
        return true;
      }
    }
    false
  }

  pub fn len(&self) -> usize {
    self.patterns.len()
  }

  pub fn is_empty(&self) -> bool {
    self.patterns.is_empty()
  }

  fn matches(&self, candidate: &str) -> bool {
    self.patterns.iter().any(|p| p.is_match(candidate))
  }
}

/// Kind of a filesystem entry retained in a [`SourceTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
  File,
  Dir,
  Symlink,
}

/// A single retained entry: path relative to the root, `/`-separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
  pub path: String,
  pub kind: EntryKind,
}

/// A cleaned, deterministic view of a source directory.
///
/// Entries are sorted by relative path. The tree is immutable once produced
/// and is consumed by the build executor via [`SourceTree::materialize`].
#[derive(Debug)]
pub struct SourceTree {
  root: PathBuf,
  entries: Vec<SourceEntry>,
}

impl SourceTree {
  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn entries(&self) -> &[SourceEntry] {
    &self.entries
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn contains(&self, rel_path: &str) -> bool {
    self.entries.iter().any(|e| e.path == rel_path)
  }

  /// Absolute path of an entry under the root.
  pub fn abs_path(&self, entry: &SourceEntry) -> PathBuf {
    self.root.join(&entry.path)
  }

  /// Deterministic content fingerprint of the tree.
  ///
  /// Hashes the sorted entry list together with file contents and symlink
  /// targets. Metadata (timestamps, permissions) is not included, so the
  /// fingerprint is stable across checkouts.
  pub fn fingerprint(&self) -> Result<String, FilterError> {
    let mut hasher = Sha256::new();
    for entry in &self.entries {
      hasher.update(entry.path.as_bytes());
      hasher.update([0u8]);
      match entry.kind {
        EntryKind::Dir => hasher.update(b"dir"),
        EntryKind::File => {
          let content = fs::read(self.abs_path(entry)).map_err(|e| FilterError::ReadEntry {
            path: entry.path.clone(),
            message: e.to_string(),
          })?;
          hasher.update(b"file");
          hasher.update(&content);
        }
        EntryKind::Symlink => {
          let target = fs::read_link(self.abs_path(entry)).map_err(|e| FilterError::ReadEntry {
            path: entry.path.clone(),
            message: e.to_string(),
          })?;
          hasher.update(b"link");
          hasher.update(target.to_string_lossy().as_bytes());
        }
      }
      hasher.update([0u8]);
    }
    Ok(format!("{:x}", hasher.finalize()))
  }

  /// Copy the filtered tree into `dest`, making `dest` mirror the tree.
  ///
  /// Files whose bytes are already identical are left untouched so their
  /// mtimes are preserved and an unchanged input does not retrigger
  /// compilation. Files present in `dest` but absent from the tree are
  /// removed.
  pub fn materialize(&self, dest: &Path) -> Result<(), FilterError> {
    let io_err = |path: &Path| {
      let path = path.to_path_buf();
      move |source: io::Error| FilterError::Materialize { path, source }
    };

    fs::create_dir_all(dest).map_err(io_err(dest))?;

    let wanted: BTreeSet<&str> = self.entries.iter().map(|e| e.path.as_str()).collect();

    // Remove stale entries first, deepest paths before their parents.
    let mut stale: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dest).min_depth(1).sort_by_file_name() {
      let entry = entry.map_err(|e| FilterError::ReadEntry {
        path: dest.display().to_string(),
        message: e.to_string(),
      })?;
      let rel = rel_path_string(entry.path(), dest);
      if !wanted.contains(rel.as_str()) {
        stale.push(entry.path().to_path_buf());
      }
    }
    for path in stale.iter().rev() {
      let Ok(meta) = path.symlink_metadata() else {
        continue; // removed together with a stale parent directory
      };
      if meta.is_dir() {
        fs::remove_dir_all(path).map_err(io_err(path))?;
      } else {
        fs::remove_file(path).map_err(io_err(path))?;
      }
    }

    for entry in &self.entries {
      let src = self.abs_path(entry);
      let target = dest.join(&entry.path);
      match entry.kind {
        EntryKind::Dir => {
          fs::create_dir_all(&target).map_err(io_err(&target))?;
        }
        EntryKind::File => {
          let content = fs::read(&src).map_err(io_err(&src))?;
          let unchanged = matches!(fs::read(&target), Ok(existing) if existing == content);
          if !unchanged {
            if let Some(parent) = target.parent() {
              fs::create_dir_all(parent).map_err(io_err(parent))?;
            }
            fs::write(&target, &content).map_err(io_err(&target))?;
          }
        }
        EntryKind::Symlink => {
          let link_target = fs::read_link(&src).map_err(io_err(&src))?;
          if target.symlink_metadata().is_ok() {
            fs::remove_file(&target).map_err(io_err(&target))?;
          }
          #[cfg(unix)]
          std::os::unix::fs::symlink(&link_target, &target).map_err(io_err(&target))?;
          #[cfg(windows)]
          std::os::windows::fs::symlink_file(&link_target, &target).map_err(io_err(&target))?;
        }
      }
    }

    Ok(())
  }
}

/// Filter `root` against `patterns`, producing the cleaned source tree.
///
/// Excluded directories are not descended into. The result is sorted by
/// relative path regardless of filesystem iteration order.
pub fn filter(root: &Path, patterns: &ExclusionPatternSet) -> Result<SourceTree, FilterError> {
  let meta = fs::metadata(root).map_err(|e| FilterError::RootUnreadable {
    path: root.display().to_string(),
    message: e.to_string(),
  })?;
  if !meta.is_dir() {
    return Err(FilterError::RootUnreadable {
      path: root.display().to_string(),
      message: "not a directory".to_string(),
    });
  }

  let mut entries: Vec<SourceEntry> = Vec::new();

  let walker = WalkDir::new(root)
    .min_depth(1)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| {
      let rel = rel_path_string(e.path(), root);
      !patterns.excludes(&rel, e.file_type().is_dir())
    });

  for entry in walker {
    let entry = entry.map_err(|e| FilterError::ReadEntry {
      path: e
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| root.display().to_string()),
      message: e.to_string(),
    })?;
    let rel = rel_path_string(entry.path(), root);
    let kind = if entry.path_is_symlink() {
      EntryKind::Symlink
    } else if entry.file_type().is_dir() {
      EntryKind::Dir
    } else {
      EntryKind::File
    };
    entries.push(SourceEntry { path: rel, kind });
  }

  entries.sort_by(|a, b| a.path.cmp(&b.path));
  debug!(root = %root.display(), kept = entries.len(), "filtered source tree");

  Ok(SourceTree {
    root: root.to_path_buf(),
    entries,
  })
}

/// Relative path as a `/`-separated string, independent of the host
/// platform's separator.
pub(crate) fn rel_path_string(path: &Path, root: &Path) -> String {
  let rel = path.strip_prefix(root).unwrap_or(path);
  let parts: Vec<String> = rel
    .components()
    .map(|c| c.as_os_str().to_string_lossy().into_owned())
    .collect();
  parts.join("/")
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn patterns(list: &[&str]) -> ExclusionPatternSet {
    let owned: Vec<String> = list.iter().map(|s| s.to_string()).collect();
    ExclusionPatternSet::compile(&owned).unwrap()
  }

  fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
  }

  fn file_paths(tree: &SourceTree) -> Vec<&str> {
    tree
      .entries()
      .iter()
      .filter(|e| e.kind == EntryKind::File)
      .map(|e| e.path.as_str())
      .collect()
  }

  #[test]
  fn default_patterns_keep_only_source() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "foo.rs", "fn main() {}");
    write(root, ".jj/state", "state");
    write(root, "target/debug/jj", "binary");
    write(root, "flake.lock", "{}");

    let set = patterns(&[r".*\.nix$", r"^\.jj/", r"^flake\.lock$", r"^target/"]);
    let tree = filter(root, &set).unwrap();

    assert_eq!(file_paths(&tree), vec!["foo.rs"]);
  }

  #[test]
  fn excluded_directory_excludes_descendants() {
    let set = patterns(&[r"^target/"]);
    assert!(set.excludes("target", true));
    assert!(set.excludes("target/debug/jj", false));
    assert!(!set.excludes("targets/foo", false));
  }

  #[test]
  fn patterns_are_full_match_not_substring() {
    let set = patterns(&["lock"]);
    assert!(set.excludes("lock", false));
    assert!(!set.excludes("flake.lock", false));
    assert!(!set.excludes("lockfile", false));
  }

  #[test]
  fn empty_pattern_set_keeps_everything() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "a.rs", "a");
    write(root, "b/c.rs", "c");

    let tree = filter(root, &patterns(&[])).unwrap();

    assert_eq!(file_paths(&tree), vec!["a.rs", "b/c.rs"]);
  }

  #[test]
  fn unreadable_root_is_an_error() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("does-not-exist");

    let result = filter(&missing, &patterns(&[]));

    assert!(matches!(result, Err(FilterError::RootUnreadable { .. })));
  }

  #[test]
  fn filter_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("src");
    write(&root, "keep.rs", "keep");
    write(&root, "target/out", "drop");
    write(&root, "nested/also.rs", "keep");

    let set = patterns(&[r"^target/"]);
    let tree = filter(&root, &set).unwrap();

    let staged = temp.path().join("staged");
    tree.materialize(&staged).unwrap();
    let again = filter(&staged, &set).unwrap();

    assert_eq!(tree.entries(), again.entries());
  }

  #[test]
  fn fingerprint_stable_and_content_sensitive() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "main.rs", "fn main() {}");

    let set = patterns(&[]);
    let first = filter(root, &set).unwrap().fingerprint().unwrap();
    let second = filter(root, &set).unwrap().fingerprint().unwrap();
    assert_eq!(first, second);

    write(root, "main.rs", "fn main() { /* changed */ }");
    let third = filter(root, &set).unwrap().fingerprint().unwrap();
    assert_ne!(first, third);
  }

  #[test]
  fn materialize_prunes_stale_entries() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("src");
    write(&root, "a.rs", "a");

    let dest = temp.path().join("out");
    write(&dest, "stale.rs", "old");
    write(&dest, "stale_dir/deep.rs", "old");

    let tree = filter(&root, &patterns(&[])).unwrap();
    tree.materialize(&dest).unwrap();

    assert!(dest.join("a.rs").exists());
    assert!(!dest.join("stale.rs").exists());
    assert!(!dest.join("stale_dir").exists());
  }

  #[test]
  fn materialize_preserves_unchanged_files() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("src");
    write(&root, "a.rs", "a");

    let dest = temp.path().join("out");
    let tree = filter(&root, &patterns(&[])).unwrap();
    tree.materialize(&dest).unwrap();
    let before = dest.join("a.rs").metadata().unwrap().modified().unwrap();

    tree.materialize(&dest).unwrap();
    let after = dest.join("a.rs").metadata().unwrap().modified().unwrap();

    assert_eq!(before, after);
  }

  #[test]
  fn invalid_pattern_is_rejected() {
    let result = ExclusionPatternSet::compile(&["[unclosed".to_string()]);
    assert!(matches!(result, Err(FilterError::Pattern { .. })));
  }
}
