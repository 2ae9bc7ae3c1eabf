//! Verification runner: the CI gate.
//!
//! Re-executes the build pipeline in its stricter mode: a debug-level build
//! with backtraces enabled. The artifact deriver is never invoked here; the
//! gate targets correctness of the compiled artifact only. The outcome is
//! binary pass/fail, with the first failure's full diagnostic text attached.

use std::error::Error as _;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::build::{BuildArtifact, BuildType, build};
use crate::config::OrchestratorConfig;
use crate::pipeline::{PipelineError, prepare};

/// Result of a verification run.
#[derive(Debug)]
pub enum VerifyOutcome {
  Pass {
    artifact: BuildArtifact,
    elapsed: Duration,
  },
  Fail {
    reason: String,
  },
}

impl VerifyOutcome {
  pub fn passed(&self) -> bool {
    matches!(self, Self::Pass { .. })
  }
}

/// Run filter → resolve → debug build and report pass/fail.
pub async fn verify(config: &OrchestratorConfig) -> VerifyOutcome {
  let started = Instant::now();
  match verify_inner(config).await {
    Ok(artifact) => {
      let elapsed = started.elapsed();
      info!(ident = %artifact.ident(), elapsed = ?elapsed, "verification passed");
      VerifyOutcome::Pass { artifact, elapsed }
    }
    Err(e) => {
      let reason = render_chain(&e);
      warn!(reason = %reason, "verification failed");
      VerifyOutcome::Fail { reason }
    }
  }
}

async fn verify_inner(config: &OrchestratorConfig) -> Result<BuildArtifact, PipelineError> {
  let inputs = prepare(config)?;
  let artifact = build(&inputs.tree, &inputs.lock, &inputs.features, BuildType::Debug, config).await?;
  Ok(artifact)
}

/// Render an error with its full source chain, one cause per line.
fn render_chain(error: &PipelineError) -> String {
  let mut reason = error.to_string();
  let mut source = error.source();
  while let Some(cause) = source {
    let text = cause.to_string();
    if !reason.contains(&text) {
      reason.push_str("\n  caused by: ");
      reason.push_str(&text);
    }
    source = cause.source();
  }
  reason
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[tokio::test]
  async fn missing_lock_fails_before_any_build_work() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("main.rs"), "fn main() {}").unwrap();
    let config = OrchestratorConfig::for_root("jj", temp.path());

    let outcome = verify(&config).await;

    match outcome {
      VerifyOutcome::Fail { reason } => {
        assert!(reason.contains("lock artifact not found"), "reason: {}", reason);
      }
      VerifyOutcome::Pass { .. } => panic!("expected failure"),
    }
  }

  #[tokio::test]
  async fn unreadable_root_fails() {
    let temp = TempDir::new().unwrap();
    let config = OrchestratorConfig::for_root("jj", &temp.path().join("missing"));

    let outcome = verify(&config).await;
    assert!(!outcome.passed());
  }

  #[tokio::test]
  async fn invalid_exclusion_pattern_fails() {
    let temp = TempDir::new().unwrap();
    let mut config = OrchestratorConfig::for_root("jj", temp.path());
    config.exclude = vec!["[unclosed".to_string()];

    let outcome = verify(&config).await;

    match outcome {
      VerifyOutcome::Fail { reason } => {
        assert!(reason.contains("invalid exclusion pattern"), "reason: {}", reason);
      }
      VerifyOutcome::Pass { .. } => panic!("expected failure"),
    }
  }
}
