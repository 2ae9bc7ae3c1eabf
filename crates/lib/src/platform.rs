//! Host-platform conditioning for native libraries and build features.
//!
//! A pure lookup: each OS family maps to the set of native libraries the
//! binary links against and any extra build features the platform needs.
//! There is no runtime negotiation and no failure path.

use std::collections::BTreeSet;
use std::fmt;

/// Operating system families the conditioner distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOs {
  Linux,
  MacOs,
  /// Anything else falls back to the baseline profile.
  Other,
}

impl HostOs {
  /// Detect the current operating system at runtime. Total: unknown systems
  /// map to [`HostOs::Other`].
  pub fn current() -> Self {
    match std::env::consts::OS {
      "linux" => Self::Linux,
      "macos" => Self::MacOs,
      _ => Self::Other,
    }
  }

  /// Returns the lowercase string identifier for this OS family.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "darwin",
      Self::Other => "other",
    }
  }
}

impl fmt::Display for HostOs {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Native libraries always linked, regardless of OS.
const BASELINE_LIBRARIES: [&str; 3] = ["openssl", "dbus", "sqlite"];

/// Additional libraries and frameworks required on macOS.
const DARWIN_LIBRARIES: [&str; 3] = ["Security", "SecurityFoundation", "libiconv"];

/// Platform-conditional build inputs for one OS family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProfile {
  /// Native libraries the binary links against.
  pub native_libraries: BTreeSet<String>,
  /// Build features enabled only on this platform.
  pub extra_features: BTreeSet<String>,
}

impl PlatformProfile {
  /// Profile for the given OS family.
  ///
  /// Every platform gets the baseline libraries (TLS backend, system bus
  /// client, embedded SQL engine). macOS additionally links the Security
  /// frameworks and libiconv. Unknown systems get the baseline with no
  /// extras.
  pub fn for_os(os: HostOs) -> Self {
    let mut native_libraries: BTreeSet<String> =
      BASELINE_LIBRARIES.iter().map(|s| s.to_string()).collect();
    let extra_features = BTreeSet::new();

    if os == HostOs::MacOs {
      native_libraries.extend(DARWIN_LIBRARIES.iter().map(|s| s.to_string()));
    }

    Self {
      native_libraries,
      extra_features,
    }
  }

  /// Profile for the machine this process runs on.
  pub fn current() -> Self {
    Self::for_os(HostOs::current())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn linux_gets_only_baseline_libraries() {
    let profile = PlatformProfile::for_os(HostOs::Linux);

    let libs: Vec<&str> = profile.native_libraries.iter().map(String::as_str).collect();
    assert_eq!(libs, vec!["dbus", "openssl", "sqlite"]);
    assert!(profile.extra_features.is_empty());
  }

  #[test]
  fn macos_adds_frameworks_and_libiconv() {
    let profile = PlatformProfile::for_os(HostOs::MacOs);

    assert!(profile.native_libraries.contains("Security"));
    assert!(profile.native_libraries.contains("SecurityFoundation"));
    assert!(profile.native_libraries.contains("libiconv"));
    // Baseline is still present.
    assert!(profile.native_libraries.contains("openssl"));
    assert!(profile.native_libraries.contains("dbus"));
    assert!(profile.native_libraries.contains("sqlite"));
  }

  #[test]
  fn unknown_os_falls_back_to_baseline_with_no_extras() {
    let profile = PlatformProfile::for_os(HostOs::Other);

    assert_eq!(profile, {
      let mut baseline = PlatformProfile::for_os(HostOs::Linux);
      baseline.extra_features.clear();
      baseline
    });
  }

  #[test]
  fn profile_is_a_pure_function_of_the_os() {
    assert_eq!(PlatformProfile::for_os(HostOs::MacOs), PlatformProfile::for_os(HostOs::MacOs));
    assert_eq!(PlatformProfile::for_os(HostOs::Linux), PlatformProfile::for_os(HostOs::Linux));
  }

  #[test]
  fn macos_uses_darwin_identifier() {
    assert_eq!(HostOs::MacOs.as_str(), "darwin");
  }
}
