mod build;
mod check;
mod devshell;

pub use build::cmd_build;
pub use check::cmd_check;
pub use devshell::cmd_devshell;

use std::path::Path;

use anyhow::{Context, Result, bail};
use shipwright_lib::config::{MANIFEST_FILENAME, OrchestratorConfig};

/// Load the orchestrator configuration: from an explicit manifest path, or
/// from `shipwright.toml` in the current directory.
pub(crate) fn load_config(manifest: Option<&Path>) -> Result<OrchestratorConfig> {
  let path = match manifest {
    Some(path) => path.to_path_buf(),
    None => {
      let path = Path::new(MANIFEST_FILENAME).to_path_buf();
      if !path.exists() {
        bail!("no {} found in the current directory (pass --config)", MANIFEST_FILENAME);
      }
      path
    }
  };
  OrchestratorConfig::load(&path).with_context(|| format!("Failed to load manifest {}", path.display()))
}
