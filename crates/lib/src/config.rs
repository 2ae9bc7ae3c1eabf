//! Orchestrator configuration.
//!
//! All pipeline state comes from an [`OrchestratorConfig`] passed into the
//! entry point for each invocation; there is no global registry. The config
//! is usually loaded from a `shipwright.toml` manifest next to the source
//! tree, with every field optional except the package name.
//!
//! # Manifest Format
//!
//! ```toml
//! [package]
//! name = "jj"
//!
//! [source]
//! exclude = [".*\\.nix$", "^\\.jj/", "^flake\\.lock$", "^target/"]
//!
//! [build]
//! features = ["packaging", "watchman"]
//!
//! [install]
//! prefix = "dist"
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Conventional manifest file name.
pub const MANIFEST_FILENAME: &str = "shipwright.toml";

/// Default per-subcommand timeout for artifact derivation.
pub const DEFAULT_DERIVE_TIMEOUT_SECS: u64 = 60;

/// Errors that can occur when loading the manifest.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read manifest {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse manifest {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
}

#[derive(Debug, Deserialize)]
struct Manifest {
  package: PackageSection,
  #[serde(default)]
  source: SourceSection,
  #[serde(default)]
  build: BuildSection,
  #[serde(default)]
  install: InstallSection,
}

#[derive(Debug, Deserialize)]
struct PackageSection {
  name: String,
  /// Binary name, when it differs from the package name.
  bin: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SourceSection {
  root: Option<PathBuf>,
  exclude: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct BuildSection {
  #[serde(default)]
  features: Vec<String>,
  lock_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct InstallSection {
  prefix: Option<PathBuf>,
  derive_timeout_secs: Option<u64>,
}

/// Everything one pipeline invocation needs, resolved to absolute paths.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
  /// Package name; also names the derived artifacts.
  pub pname: String,
  /// Name of the compiled binary.
  pub bin_name: String,
  /// Root of the source tree to filter and build.
  pub source_root: PathBuf,
  /// Path to the pinned dependency lock artifact.
  pub lock_file: PathBuf,
  /// Exclusion patterns applied by the source filter.
  pub exclude: Vec<String>,
  /// Explicitly enabled build features (default feature set stays off).
  pub features: Vec<String>,
  /// Install prefix for derived artifacts.
  pub install_prefix: PathBuf,
  /// Staging and target directory for the build executor.
  pub work_dir: PathBuf,
  /// Per-subcommand timeout during artifact derivation.
  pub derive_timeout: Duration,
}

impl OrchestratorConfig {
  /// Load a manifest file and resolve it against its own directory.
  pub fn load(manifest_path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(manifest_path).map_err(|source| ConfigError::Read {
      path: manifest_path.to_path_buf(),
      source,
    })?;
    let manifest: Manifest = toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: manifest_path.to_path_buf(),
      source,
    })?;

    // A bare file name has an empty parent; treat that as the current dir.
    let base = match manifest_path.parent() {
      Some(p) if !p.as_os_str().is_empty() => p,
      _ => Path::new("."),
    };
    Ok(Self::from_manifest(manifest, base))
  }

  /// Configuration with all defaults for a package rooted at `root`.
  pub fn for_root(pname: &str, root: &Path) -> Self {
    Self {
      pname: pname.to_string(),
      bin_name: pname.to_string(),
      source_root: root.to_path_buf(),
      lock_file: root.join(crate::lock::LOCK_FILENAME),
      exclude: default_exclude(),
      features: Vec::new(),
      install_prefix: root.join("dist"),
      work_dir: root.join("target").join("shipwright"),
      derive_timeout: Duration::from_secs(DEFAULT_DERIVE_TIMEOUT_SECS),
    }
  }

  fn from_manifest(manifest: Manifest, base: &Path) -> Self {
    let resolve = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };

    let source_root = manifest.source.root.map(&resolve).unwrap_or_else(|| base.to_path_buf());

    let mut config = Self::for_root(&manifest.package.name, &source_root);
    if let Some(bin) = manifest.package.bin {
      config.bin_name = bin;
    }
    if let Some(exclude) = manifest.source.exclude {
      config.exclude = exclude;
    }
    config.features = manifest.build.features;
    if let Some(lock) = manifest.build.lock_file {
      config.lock_file = resolve(lock);
    }
    if let Some(prefix) = manifest.install.prefix {
      config.install_prefix = resolve(prefix);
    }
    if let Some(secs) = manifest.install.derive_timeout_secs {
      config.derive_timeout = Duration::from_secs(secs);
    }
    config
  }
}

/// Exclusion patterns used when the manifest does not override them:
/// build-system metadata, the VCS working copies, prior build outputs, and
/// the flake-level lock cache.
pub fn default_exclude() -> Vec<String> {
  [r".*\.nix$", r"^\.jj/", r"^\.git/", r"^flake\.lock$", r"^target/"]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
