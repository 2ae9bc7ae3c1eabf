//! Implementation of the `shipwright check` command.
//!
//! The CI gate: re-runs filter → resolve → build in debug mode with
//! backtraces enabled and exits 0 on pass, 1 on fail. The artifact deriver
//! is not part of the gate.

use anyhow::{Context, Result};
use tracing::info;

use shipwright_lib::verify::{VerifyOutcome, verify};

use crate::cmd::load_config;
use crate::output::{format_duration, print_error, print_success};

/// Execute the check command.
pub fn cmd_check() -> Result<()> {
  let config = load_config(None)?;

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcome = rt.block_on(verify(&config));

  match outcome {
    VerifyOutcome::Pass { artifact, elapsed } => {
      info!(binary = %artifact.binary.display(), "verified artifact");
      print_success(&format!(
        "Verification passed for {} in {}",
        artifact.ident(),
        format_duration(elapsed)
      ));
      Ok(())
    }
    VerifyOutcome::Fail { reason } => {
      print_error(&format!("Verification failed: {}", reason));
      std::process::exit(1);
    }
  }
}
