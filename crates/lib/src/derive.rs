//! Artifact derivation.
//!
//! Once the binary exists, it is introspected for its own documentation:
//! `support mangen` emits the manual page and `support completion --<shell>`
//! emits a completion script per shell. Stdout is captured verbatim and
//! installed under the conventional layout for each artifact.
//!
//! Derivation is all-or-nothing: every subcommand runs before anything is
//! written, so a failing generation leaves zero files installed.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::build::BuildArtifact;

/// Errors that can occur during artifact derivation.
#[derive(Debug, Error)]
pub enum DeriveError {
  /// An introspection subcommand exited non-zero.
  #[error("{} generation failed with exit code {code:?}: {stderr}", kind.describe())]
  Subcommand {
    kind: DerivedKind,
    code: Option<i32>,
    stderr: String,
  },

  /// An introspection subcommand did not finish within the timeout.
  #[error("{} generation timed out after {timeout:?}", kind.describe())]
  Timeout { kind: DerivedKind, timeout: Duration },

  /// The binary could not be spawned or its output read.
  #[error("failed to invoke the built binary: {0}")]
  Spawn(#[from] io::Error),

  /// Writing a derived artifact to its install path failed.
  #[error("failed to install {}: {source}", path.display())]
  Install {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// The four derived artifacts, in their fixed generation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedKind {
  ManPage,
  BashCompletion,
  FishCompletion,
  ZshCompletion,
}

impl DerivedKind {
  /// Generation order: man page first, then bash, fish, zsh.
  pub const ALL: [DerivedKind; 4] = [
    DerivedKind::ManPage,
    DerivedKind::BashCompletion,
    DerivedKind::FishCompletion,
    DerivedKind::ZshCompletion,
  ];

  /// Argument vector passed to the built binary.
  pub fn args(&self) -> &'static [&'static str] {
    match self {
      Self::ManPage => &["support", "mangen"],
      Self::BashCompletion => &["support", "completion", "--bash"],
      Self::FishCompletion => &["support", "completion", "--fish"],
      Self::ZshCompletion => &["support", "completion", "--zsh"],
    }
  }

  pub fn describe(&self) -> &'static str {
    match self {
      Self::ManPage => "man page",
      Self::BashCompletion => "bash completion",
      Self::FishCompletion => "fish completion",
      Self::ZshCompletion => "zsh completion",
    }
  }

  /// Install file name. Zsh completions take a leading underscore so the
  /// completion system discovers them; the others take the plain name.
  pub fn file_name(&self, pname: &str) -> String {
    match self {
      Self::ManPage => format!("{}.1", pname),
      Self::BashCompletion => format!("{}.bash", pname),
      Self::FishCompletion => format!("{}.fish", pname),
      Self::ZshCompletion => format!("_{}", pname),
    }
  }
}

/// Conventional install locations under a prefix.
#[derive(Debug, Clone)]
pub struct InstallLayout {
  prefix: PathBuf,
}

impl InstallLayout {
  pub fn new(prefix: &Path) -> Self {
    Self {
      prefix: prefix.to_path_buf(),
    }
  }

  pub fn prefix(&self) -> &Path {
    &self.prefix
  }

  /// Directory a derived artifact installs into.
  pub fn dir_for(&self, kind: DerivedKind) -> PathBuf {
    let rel: &[&str] = match kind {
      DerivedKind::ManPage => &["share", "man", "man1"],
      DerivedKind::BashCompletion => &["share", "bash-completion", "completions"],
      DerivedKind::FishCompletion => &["share", "fish", "vendor_completions.d"],
      DerivedKind::ZshCompletion => &["share", "zsh", "site-functions"],
    };
    rel.iter().fold(self.prefix.clone(), |p, part| p.join(part))
  }

  /// Full install path for a derived artifact of the named package.
  pub fn path_for(&self, kind: DerivedKind, pname: &str) -> PathBuf {
    self.dir_for(kind).join(kind.file_name(pname))
  }
}

/// A derived artifact that has been installed.
#[derive(Debug, Clone)]
pub struct DerivedArtifact {
  pub kind: DerivedKind,
  pub path: PathBuf,
  pub bytes: usize,
}

/// Generate and install the four derived artifacts.
///
/// Fail-fast: the first failing subcommand aborts the whole step, and since
/// generation completes before installation begins, nothing is written in
/// that case.
pub async fn derive(
  artifact: &BuildArtifact,
  layout: &InstallLayout,
  timeout: Duration,
) -> Result<Vec<DerivedArtifact>, DeriveError> {
  let mut generated: Vec<(DerivedKind, Vec<u8>)> = Vec::with_capacity(DerivedKind::ALL.len());
  for kind in DerivedKind::ALL {
    let content = generate(&artifact.binary, kind, timeout).await?;
    generated.push((kind, content));
  }

  let mut installed = Vec::with_capacity(generated.len());
  for (kind, content) in generated {
    let path = layout.path_for(kind, &artifact.name);
    let install_err = |source: io::Error| DeriveError::Install {
      path: path.clone(),
      source,
    };
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await.map_err(install_err)?;
    }
    tokio::fs::write(&path, &content).await.map_err(install_err)?;
    info!(kind = kind.describe(), path = %path.display(), bytes = content.len(), "installed");
    installed.push(DerivedArtifact {
      kind,
      path,
      bytes: content.len(),
    });
  }

  Ok(installed)
}

/// Run one introspection subcommand and capture its stdout verbatim.
async fn generate(binary: &Path, kind: DerivedKind, timeout: Duration) -> Result<Vec<u8>, DeriveError> {
  debug!(binary = %binary.display(), args = ?kind.args(), "generating");

  let mut command = Command::new(binary);
  command.args(kind.args()).kill_on_drop(true);

  let output = tokio::time::timeout(timeout, command.output())
    .await
    .map_err(|_| DeriveError::Timeout { kind, timeout })??;

  if !output.status.success() {
    return Err(DeriveError::Subcommand {
      kind,
      code: output.status.code(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    });
  }

  Ok(output.stdout)
}
