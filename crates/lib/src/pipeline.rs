//! The build-and-release pipeline, as an explicit ordered call chain.
//!
//! filter → {lock, platform} → build → derive. Sequential and fail-fast:
//! every stage's output is a precondition for the next, no stage retries,
//! and either the whole pipeline completes or no derived artifact is
//! installed.

use std::path::Path;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::info;

use crate::build::{BuildArtifact, BuildError, BuildType, FeatureSet, build};
use crate::config::OrchestratorConfig;
use crate::derive::{DeriveError, DerivedArtifact, InstallLayout, derive};
use crate::filter::{ExclusionPatternSet, FilterError, SourceTree, filter};
use crate::lock::{DependencyLock, LockError};
use crate::platform::PlatformProfile;

/// Any stage failure, propagated upward immediately.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error(transparent)]
  Filter(#[from] FilterError),

  #[error(transparent)]
  Lock(#[from] LockError),

  #[error(transparent)]
  Build(#[from] BuildError),

  #[error(transparent)]
  Derive(#[from] DeriveError),
}

/// What a completed pipeline produced.
#[derive(Debug)]
pub struct PipelineReport {
  pub artifact: BuildArtifact,
  pub installed: Vec<DerivedArtifact>,
  pub tree_entries: usize,
  pub locked_packages: usize,
  pub elapsed: Duration,
}

/// The inputs every build shares: the filtered tree, the pinned dependency
/// graph, and the resolved feature set.
pub(crate) struct BuildInputs {
  pub tree: SourceTree,
  pub lock: DependencyLock,
  pub features: FeatureSet,
}

pub(crate) fn prepare(config: &OrchestratorConfig) -> Result<BuildInputs, PipelineError> {
  let patterns = ExclusionPatternSet::compile(&exclusions(config))?;
  let tree = filter(&config.source_root, &patterns)?;
  let fingerprint = tree.fingerprint()?;
  let lock = DependencyLock::load(&config.lock_file)?;
  let profile = PlatformProfile::current();
  let features = FeatureSet::resolve(&config.features, &profile);
  info!(
    entries = tree.len(),
    fingerprint = %fingerprint,
    packages = lock.len(),
    libraries = profile.native_libraries.len(),
    "pipeline inputs ready"
  );
  Ok(BuildInputs { tree, lock, features })
}

/// The configured exclusion patterns, plus one derived for the install
/// prefix when it lies under the source root. Without it, artifacts
/// installed by one run would re-enter the next run's tree as build input.
fn exclusions(config: &OrchestratorConfig) -> Vec<String> {
  let mut patterns = config.exclude.clone();
  if let Ok(rel) = config.install_prefix.strip_prefix(&config.source_root) {
    if !rel.as_os_str().is_empty() {
      let rel = crate::filter::rel_path_string(rel, Path::new(""));
      patterns.push(format!("^{}/", regex::escape(&rel)));
    }
  }
  patterns
}

/// Run the full pipeline: filter, resolve, build the release artifact, then
/// derive and install the man page and completion scripts.
pub async fn run(config: &OrchestratorConfig) -> Result<PipelineReport, PipelineError> {
  let started = Instant::now();

  let inputs = prepare(config)?;
  let artifact = build(&inputs.tree, &inputs.lock, &inputs.features, BuildType::Release, config).await?;

  let layout = InstallLayout::new(&config.install_prefix);
  let installed = derive(&artifact, &layout, config.derive_timeout).await?;

  let elapsed = started.elapsed();
  info!(ident = %artifact.ident(), elapsed = ?elapsed, "pipeline complete");

  Ok(PipelineReport {
    artifact,
    installed,
    tree_entries: inputs.tree.len(),
    locked_packages: inputs.lock.len(),
    elapsed,
  })
}
