//! Implementation of the `shipwright build` command.
//!
//! Runs the full pipeline: filter the source tree, read the pinned lock
//! artifact, build the release binary, then derive and install the manual
//! page and shell completion scripts.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use shipwright_lib::pipeline::{self, PipelineReport};

use crate::cmd::load_config;
use crate::output::{self, OutputFormat, format_bytes, format_duration, print_stat, print_success};

#[derive(Serialize)]
struct BuildSummary {
  ident: String,
  version: String,
  binary: PathBuf,
  artifacts: Vec<ArtifactSummary>,
  elapsed_ms: u128,
}

#[derive(Serialize)]
struct ArtifactSummary {
  kind: String,
  path: PathBuf,
  bytes: usize,
}

impl BuildSummary {
  fn from_report(report: &PipelineReport) -> Self {
    Self {
      ident: report.artifact.ident(),
      version: report.artifact.version.clone(),
      binary: report.artifact.binary.clone(),
      artifacts: report
        .installed
        .iter()
        .map(|a| ArtifactSummary {
          kind: a.kind.describe().to_string(),
          path: a.path.clone(),
          bytes: a.bytes,
        })
        .collect(),
      elapsed_ms: report.elapsed.as_millis(),
    }
  }
}

/// Execute the build command.
pub fn cmd_build(manifest: Option<&Path>, prefix: Option<&Path>, format: OutputFormat) -> Result<()> {
  let mut config = load_config(manifest)?;
  if let Some(prefix) = prefix {
    config.install_prefix = prefix.to_path_buf();
  }

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt.block_on(pipeline::run(&config)).context("Build pipeline failed")?;

  let summary = BuildSummary::from_report(&report);
  if format.is_json() {
    return output::print_json(&summary);
  }

  print_success(&format!(
    "Built {} in {}",
    summary.ident,
    format_duration(report.elapsed)
  ));
  print_stat("binary", &summary.binary.display().to_string());
  print_stat("tree entries", &report.tree_entries.to_string());
  print_stat("locked packages", &report.locked_packages.to_string());
  for artifact in &summary.artifacts {
    println!(
      "  {} {} ({})",
      output::symbols::ARROW,
      artifact.path.display(),
      format_bytes(artifact.bytes as u64)
    );
  }

  Ok(())
}
