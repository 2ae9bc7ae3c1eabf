//! Build executor.
//!
//! Compiles the filtered source tree against the pinned dependency graph.
//! The tree is materialized into a staging directory under the work dir and
//! the toolchain is invoked there with `--locked --offline`, the default
//! feature set disabled, and only the resolved feature set enabled.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::OrchestratorConfig;
use crate::filter::{FilterError, SourceTree};
use crate::lock::DependencyLock;
use crate::platform::PlatformProfile;

/// Errors that can occur during build execution.
#[derive(Debug, Error)]
pub enum BuildError {
  /// Staging the filtered tree failed.
  #[error(transparent)]
  Stage(#[from] FilterError),

  /// The toolchain could not be spawned or its output read.
  #[error("failed to run the build toolchain: {0}")]
  Io(#[from] io::Error),

  /// Compilation failed; diagnostics are the toolchain's stderr, verbatim.
  #[error("compilation failed:\n{diagnostics}")]
  Compile { diagnostics: String },

  /// The build reported success but the expected binary is absent.
  #[error("built binary not found at {}", .0.display())]
  MissingBinary(PathBuf),
}

/// Whether to build the release artifact or the stricter debug one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildType {
  Release,
  /// Debug assertions and backtraces enabled; used by the verification
  /// runner only.
  Debug,
}

impl BuildType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Release => "release",
      Self::Debug => "debug",
    }
  }

  /// Profile directory name under the target dir.
  fn profile_dir(&self) -> &'static str {
    self.as_str()
  }
}

/// The resolved set of build features.
///
/// Starts from the no-default-features baseline; the explicit feature list
/// and the platform profile's extras are unioned in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeatureSet(BTreeSet<String>);

impl FeatureSet {
  pub fn resolve(explicit: &[String], profile: &PlatformProfile) -> Self {
    let mut set: BTreeSet<String> = explicit.iter().cloned().collect();
    set.extend(profile.extra_features.iter().cloned());
    Self(set)
  }

  /// Comma-joined value for `--features`.
  pub fn as_arg(&self) -> String {
    self.0.iter().cloned().collect::<Vec<_>>().join(",")
  }

  pub fn contains(&self, feature: &str) -> bool {
    self.0.contains(feature)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

/// The compiled binary plus its identifying version string.
#[derive(Debug, Clone)]
pub struct BuildArtifact {
  /// Static package name.
  pub name: String,
  /// `unstable-<shortrev>`, or `unstable-dirty` when no revision is
  /// determinable.
  pub version: String,
  /// Path to the compiled binary.
  pub binary: PathBuf,
  pub build_type: BuildType,
}

impl BuildArtifact {
  /// Full identifier, e.g. `jj-unstable-a1b2c3d`.
  pub fn ident(&self) -> String {
    format!("{}-{}", self.name, self.version)
  }
}

/// Compile the filtered tree into a binary artifact.
///
/// Fatal on any compilation failure; no partial artifact is produced.
pub async fn build(
  tree: &SourceTree,
  lock: &DependencyLock,
  features: &FeatureSet,
  build_type: BuildType,
  config: &OrchestratorConfig,
) -> Result<BuildArtifact, BuildError> {
  let src_dir = config.work_dir.join("src");
  let target_dir = config.work_dir.join("target");

  tree.materialize(&src_dir)?;

  // The configured lock artifact is authoritative: the filtered tree may
  // carry its own copy (or none at all), but the toolchain must resolve
  // against the one `prepare` loaded. Content-compared so an unchanged lock
  // keeps its mtime.
  let staged_lock = src_dir.join(crate::lock::LOCK_FILENAME);
  let lock_content = std::fs::read(&config.lock_file)?;
  if std::fs::read(&staged_lock).ok().as_deref() != Some(lock_content.as_slice()) {
    std::fs::write(&staged_lock, &lock_content)?;
  }

  info!(
    package = %config.pname,
    build_type = build_type.as_str(),
    packages = lock.len(),
    features = %features.as_arg(),
    "building"
  );

  let mut command = Command::new("cargo");
  command
    .arg("build")
    .arg("--locked")
    .arg("--offline")
    .arg("--no-default-features")
    .current_dir(&src_dir)
    .env("CARGO_TARGET_DIR", &target_dir);
  if !features.is_empty() {
    command.arg("--features").arg(features.as_arg());
  }
  match build_type {
    BuildType::Release => {
      command.arg("--release");
    }
    BuildType::Debug => {
      command.env("RUST_BACKTRACE", "1");
    }
  }

  let output = command.output().await?;
  if !output.status.success() {
    return Err(BuildError::Compile {
      diagnostics: String::from_utf8_lossy(&output.stderr).into_owned(),
    });
  }

  let binary = target_dir
    .join(build_type.profile_dir())
    .join(format!("{}{}", config.bin_name, std::env::consts::EXE_SUFFIX));
  if !binary.exists() {
    return Err(BuildError::MissingBinary(binary));
  }

  let version = version_string(&config.source_root).await;
  debug!(binary = %binary.display(), version = %version, "build complete");

  Ok(BuildArtifact {
    name: config.pname.clone(),
    version,
    binary,
    build_type,
  })
}

/// Version string for the artifact: `unstable-<shortrev>` from the source
/// root's repository, or `unstable-dirty` when no revision is determinable.
pub async fn version_string(source_root: &Path) -> String {
  match short_revision(source_root).await {
    Some(rev) => format!("unstable-{}", rev),
    None => "unstable-dirty".to_string(),
  }
}

/// Short revision of the source root, if it is a clean repository checkout.
pub async fn short_revision(source_root: &Path) -> Option<String> {
  let output = Command::new("git")
    .args(["rev-parse", "--short", "HEAD"])
    .current_dir(source_root)
    .output()
    .await
    .ok()?;
  if !output.status.success() {
    return None;
  }
  let rev = String::from_utf8_lossy(&output.stdout).trim().to_string();
  if rev.is_empty() { None } else { Some(rev) }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::OrchestratorConfig;
  use crate::filter::{ExclusionPatternSet, filter};
  use crate::lock::LOCK_FILENAME;
  use crate::platform::HostOs;
  use tempfile::TempDir;

  #[test]
  fn feature_set_unions_explicit_and_platform_features() {
    let mut profile = PlatformProfile::for_os(HostOs::Linux);
    profile.extra_features.insert("vendored-openssl".to_string());

    let features = FeatureSet::resolve(&["packaging".to_string(), "watchman".to_string()], &profile);

    assert!(features.contains("packaging"));
    assert!(features.contains("watchman"));
    assert!(features.contains("vendored-openssl"));
    // Sorted, comma-joined, deterministic.
    assert_eq!(features.as_arg(), "packaging,vendored-openssl,watchman");
  }

  #[test]
  fn empty_feature_set_produces_no_arg() {
    let profile = PlatformProfile::for_os(HostOs::Other);
    let features = FeatureSet::resolve(&[], &profile);

    assert!(features.is_empty());
    assert_eq!(features.as_arg(), "");
  }

  #[tokio::test]
  async fn version_is_dirty_outside_a_repository() {
    let temp = TempDir::new().unwrap();
    let version = version_string(temp.path()).await;
    assert_eq!(version, "unstable-dirty");
  }

  fn single_package_lock(name: &str) -> String {
    format!("version = 4\n\n[[package]]\nname = \"{}\"\nversion = \"0.1.0\"\n", name)
  }

  #[tokio::test]
  async fn staging_replaces_the_tree_lock_with_the_configured_one() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    // The tree carries its own lock, pinning a different graph than the
    // configured one.
    std::fs::write(root.join(LOCK_FILENAME), single_package_lock("stale")).unwrap();
    let pinned = root.join("pinned.lock");
    std::fs::write(&pinned, single_package_lock("pinned")).unwrap();

    let mut config = OrchestratorConfig::for_root("jj", root);
    config.lock_file = pinned.clone();

    let patterns = ExclusionPatternSet::compile(&config.exclude).unwrap();
    let tree = filter(root, &patterns).unwrap();
    let lock = DependencyLock::load(&pinned).unwrap();

    // No manifest in the tree, so compilation fails; staging happens first.
    let result = build(&tree, &lock, &FeatureSet::default(), BuildType::Debug, &config).await;
    assert!(result.is_err());

    let staged = DependencyLock::load(&config.work_dir.join("src").join(LOCK_FILENAME)).unwrap();
    assert_eq!(staged.names().collect::<Vec<_>>(), vec!["pinned"]);
  }

  #[test]
  fn artifact_ident_joins_name_and_version() {
    let artifact = BuildArtifact {
      name: "jj".to_string(),
      version: "unstable-a1b2c3d".to_string(),
      binary: PathBuf::from("/tmp/jj"),
      build_type: BuildType::Release,
    };
    assert_eq!(artifact.ident(), "jj-unstable-a1b2c3d");
  }
}
