//! Declarative developer environment description.
//!
//! Not on the artifact-production path: this only describes which tool
//! invocations a reproducible development shell provides, so the CLI can
//! print them and provisioning scripts can consume them.

use std::fmt;

/// A pinned toolchain request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainSpec {
  /// Toolchain channel or exact version, e.g. `"stable"` or `"1.84.0"`.
  pub channel: String,
}

impl Default for ToolchainSpec {
  fn default() -> Self {
    Self {
      channel: "stable".to_string(),
    }
  }
}

/// One tool invocation available inside the provisioned shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevTool {
  pub name: &'static str,
  pub summary: &'static str,
}

impl fmt::Display for DevTool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} - {}", self.name, self.summary)
  }
}

/// Auxiliary developer tools, beyond the toolchain itself.
const AUXILIARY_TOOLS: [DevTool; 4] = [
  DevTool {
    name: "cargo-clippy",
    summary: "lint the workspace",
  },
  DevTool {
    name: "cargo-insta",
    summary: "review snapshot test changes",
  },
  DevTool {
    name: "cargo-nextest",
    summary: "run tests in parallel",
  },
  DevTool {
    name: "cargo-watch",
    summary: "rebuild on file changes",
  },
];

/// A provisioned development shell description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevShell {
  pub toolchain: ToolchainSpec,
  pub tools: Vec<DevTool>,
}

/// Assemble the tool list for a development shell: the pinned toolchain's
/// own binaries followed by the static auxiliary tools. Pure and static; no
/// tool is actually installed here.
pub fn provision(toolchain: &ToolchainSpec) -> DevShell {
  let mut tools = vec![
    DevTool {
      name: "cargo",
      summary: "build and test driver",
    },
    DevTool {
      name: "rustc",
      summary: "compiler",
    },
    DevTool {
      name: "rustfmt",
      summary: "source formatter",
    },
    DevTool {
      name: "rust-analyzer",
      summary: "editor language server",
    },
  ];
  tools.extend(AUXILIARY_TOOLS);
  DevShell {
    toolchain: toolchain.clone(),
    tools,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn provision_is_static_and_ordered() {
    let first = provision(&ToolchainSpec::default());
    let second = provision(&ToolchainSpec::default());
    assert_eq!(first, second);
    assert_eq!(first.toolchain.channel, "stable");

    let names: Vec<&str> = first.tools.iter().map(|t| t.name).collect();
    assert_eq!(
      names,
      vec![
        "cargo",
        "rustc",
        "rustfmt",
        "rust-analyzer",
        "cargo-clippy",
        "cargo-insta",
        "cargo-nextest",
        "cargo-watch",
      ]
    );
  }
}
