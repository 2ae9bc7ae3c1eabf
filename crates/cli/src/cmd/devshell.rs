//! Implementation of the `shipwright devshell` command.
//!
//! Prints the reproducible developer environment: the pinned toolchain and
//! the auxiliary tools it provides. Purely informational.

use anyhow::Result;

use shipwright_lib::devshell::{ToolchainSpec, provision};

use crate::output::{print_info, print_stat};

/// Execute the devshell command.
pub fn cmd_devshell(channel: Option<String>) -> Result<()> {
  let toolchain = match channel {
    Some(channel) => ToolchainSpec { channel },
    None => ToolchainSpec::default(),
  };
  let shell = provision(&toolchain);

  print_info(&format!("Developer shell (toolchain: {})", shell.toolchain.channel));
  for tool in &shell.tools {
    print_stat(tool.name, tool.summary);
  }

  Ok(())
}
