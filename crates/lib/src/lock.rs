//! Read-only adapter over the pinned dependency lock artifact.
//!
//! The lock artifact (`Cargo.lock`) pins every dependency to an exact
//! version and content checksum, so the build executor never performs
//! network resolution. This module only reads and parses; resolution itself
//! is the package manager's job.
//!
//! # Lock Artifact Format
//!
//! ```toml
//! version = 4
//!
//! [[package]]
//! name = "anyhow"
//! version = "1.0.86"
//! source = "registry+https://github.com/rust-lang/crates.io-index"
//! checksum = "b3d1d046238990b9cf5bcde22a3fb3584ee5cf65fb2765f454ed428c7a0063da"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Lock artifact versions this adapter understands.
pub const SUPPORTED_LOCK_VERSIONS: std::ops::RangeInclusive<u32> = 3..=4;

/// Conventional lock artifact file name.
pub const LOCK_FILENAME: &str = "Cargo.lock";

/// Errors that can occur when reading the lock artifact.
#[derive(Debug, Error)]
pub enum LockError {
  /// The referenced lock artifact does not exist.
  #[error("lock artifact not found: {}", .0.display())]
  Missing(PathBuf),

  /// Failed to read the lock artifact.
  #[error("failed to read lock artifact: {0}")]
  Read(#[source] io::Error),

  /// Failed to parse the lock artifact TOML.
  #[error("failed to parse lock artifact: {0}")]
  Parse(#[source] toml::de::Error),

  /// Lock artifact version is not supported.
  #[error("unsupported lock artifact version {0}")]
  UnsupportedVersion(u32),
}

/// A pinned dependency entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedPackage {
  /// Exact resolved version.
  pub version: String,
  /// Registry or git source the package resolves from. `None` for path
  /// dependencies and the workspace's own members.
  pub source: Option<String>,
  /// Content checksum. `None` for packages without a registry source.
  pub checksum: Option<String>,
}

/// An immutable snapshot of the resolved dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyLock {
  version: u32,
  packages: BTreeMap<String, LockedPackage>,
}

#[derive(Deserialize)]
struct RawLock {
  version: Option<u32>,
  #[serde(default, rename = "package")]
  packages: Vec<RawPackage>,
}

#[derive(Deserialize)]
struct RawPackage {
  name: String,
  version: String,
  source: Option<String>,
  checksum: Option<String>,
}

impl DependencyLock {
  /// Load the lock artifact from the given path.
  pub fn load(path: &Path) -> Result<Self, LockError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        return Err(LockError::Missing(path.to_path_buf()));
      }
      Err(e) => return Err(LockError::Read(e)),
    };
    let lock = Self::parse(&content)?;
    debug!(path = %path.display(), packages = lock.len(), "loaded lock artifact");
    Ok(lock)
  }

  /// Parse lock artifact content.
  pub fn parse(content: &str) -> Result<Self, LockError> {
    let raw: RawLock = toml::from_str(content).map_err(LockError::Parse)?;

    // Version 1/2 artifacts carry no version field; treat them as the
    // oldest supported format.
    let version = raw.version.unwrap_or(*SUPPORTED_LOCK_VERSIONS.start());
    if !SUPPORTED_LOCK_VERSIONS.contains(&version) {
      return Err(LockError::UnsupportedVersion(version));
    }

    let mut packages = BTreeMap::new();
    for pkg in raw.packages {
      packages.insert(
        pkg.name,
        LockedPackage {
          version: pkg.version,
          source: pkg.source,
          checksum: pkg.checksum,
        },
      );
    }

    Ok(Self { version, packages })
  }

  /// Get a pinned dependency by name.
  pub fn get(&self, name: &str) -> Option<&LockedPackage> {
    self.packages.get(name)
  }

  /// Names of all pinned packages, in sorted order.
  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.packages.keys().map(String::as_str)
  }

  pub fn version(&self) -> u32 {
    self.version
  }

  pub fn len(&self) -> usize {
    self.packages.len()
  }

  pub fn is_empty(&self) -> bool {
    self.packages.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  const SAMPLE: &str = r#"
version = 4

[[package]]
name = "anyhow"
version = "1.0.86"
source = "registry+https://github.com/rust-lang/crates.io-index"
checksum = "b3d1d046238990b9cf5bcde22a3fb3584ee5cf65fb2765f454ed428c7a0063da"

[[package]]
name = "jj"
version = "0.1.0"
"#;

  #[test]
  fn parse_pins_versions_and_checksums() {
    let lock = DependencyLock::parse(SAMPLE).unwrap();

    assert_eq!(lock.version(), 4);
    assert_eq!(lock.len(), 2);

    let anyhow = lock.get("anyhow").unwrap();
    assert_eq!(anyhow.version, "1.0.86");
    assert!(anyhow.checksum.as_deref().unwrap().starts_with("b3d1d046"));

    // The workspace's own package has no source or checksum.
    let own = lock.get("jj").unwrap();
    assert!(own.source.is_none());
    assert!(own.checksum.is_none());
  }

  #[test]
  fn load_missing_artifact_is_an_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(LOCK_FILENAME);

    let result = DependencyLock::load(&path);

    assert!(matches!(result, Err(LockError::Missing(_))));
  }

  #[test]
  fn load_roundtrip_through_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(LOCK_FILENAME);
    fs::write(&path, SAMPLE).unwrap();

    let loaded = DependencyLock::load(&path).unwrap();

    assert_eq!(loaded, DependencyLock::parse(SAMPLE).unwrap());
  }

  #[test]
  fn malformed_toml_is_a_parse_error() {
    let result = DependencyLock::parse("version = [not toml");
    assert!(matches!(result, Err(LockError::Parse(_))));
  }

  #[test]
  fn unsupported_version_is_rejected() {
    let result = DependencyLock::parse("version = 99\n");
    assert!(matches!(result, Err(LockError::UnsupportedVersion(99))));
  }

  #[test]
  fn missing_version_field_defaults_to_oldest_supported() {
    let lock = DependencyLock::parse("[[package]]\nname = \"a\"\nversion = \"0.1.0\"\n").unwrap();
    assert_eq!(lock.version(), 3);
    assert_eq!(lock.names().collect::<Vec<_>>(), vec!["a"]);
  }
}
