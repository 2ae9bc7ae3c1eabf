//! shipwright - reproducible build-and-release orchestrator.
//!
//! Produces a verified binary artifact from a filtered source tree, then
//! derives the manual page and shell completion scripts by invoking the
//! freshly built binary's own introspection subcommands.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;
mod output;

use output::OutputFormat;

/// Reproducible build-and-release orchestrator
#[derive(Parser)]
#[command(name = "shipwright")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build the binary and install its derived artifacts
  Build {
    /// Path to the manifest (default: shipwright.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Install prefix for derived artifacts (overrides the manifest)
    #[arg(short, long)]
    prefix: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
  },

  /// Verify the pipeline in strict mode (CI gate)
  Check,

  /// Print the reproducible developer environment
  Devshell {
    /// Toolchain channel to pin (default: stable)
    #[arg(long)]
    channel: Option<String>,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_filter = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Build { config, prefix, format } => cmd::cmd_build(config.as_deref(), prefix.as_deref(), format),
    Commands::Check => cmd::cmd_check(),
    Commands::Devshell { channel } => cmd::cmd_devshell(channel),
  }
}
