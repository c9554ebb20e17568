//! Version detection from `<command> -v`.

use crate::config::{AppConfig, CommandConfig};
use regex::Regex;
use std::process::Stdio;
use std::sync::LazyLock;
use tokio::process::Command;
use tracing::{error, info, warn};

/// Either `v<major>.<minor>.<patch>` or an `alpha-<hex>` build tag.
pub const VERSION_PATTERN: &str = r"(\bv\d+\.\d+\.\d+\b|\balpha-[0-9a-f]+\b)";

static VERSION_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(VERSION_PATTERN));

/// Outcome of a version probe. `matched == false` means `version` is "unknown".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionProbeResult {
    pub version: String,
    pub matched: bool,
}

impl VersionProbeResult {
    pub fn unknown() -> Self {
        Self {
            version: AppConfig::UNKNOWN_VERSION.to_string(),
            matched: false,
        }
    }
}

/// Extract the first version token from `text`.
pub fn match_version(text: &str) -> VersionProbeResult {
    match VERSION_RE.as_ref() {
        Ok(re) => match_with(re, text),
        Err(e) => {
            error!("Version pattern {} is invalid: {}", VERSION_PATTERN, e);
            VersionProbeResult::unknown()
        }
    }
}

/// Same as [`match_version`] with a caller-supplied pattern.
///
/// An invalid pattern degrades to an unknown version.
pub fn match_version_with(pattern: &str, text: &str) -> VersionProbeResult {
    match Regex::new(pattern) {
        Ok(re) => match_with(&re, text),
        Err(e) => {
            error!("Version pattern {} is invalid: {}", pattern, e);
            VersionProbeResult::unknown()
        }
    }
}

fn match_with(re: &Regex, text: &str) -> VersionProbeResult {
    match re.find(text) {
        Some(m) => VersionProbeResult {
            version: m.as_str().to_string(),
            matched: true,
        },
        None => {
            warn!("No version token in output: {:?}", text);
            VersionProbeResult::unknown()
        }
    }
}

/// Runs the version flag of a located command.
pub struct VersionProbe;

impl VersionProbe {
    /// Run `<command> -v` and extract its version.
    ///
    /// Waits for the command to exit. Every failure degrades to "unknown";
    /// the command stays usable.
    pub async fn probe(command: &str) -> VersionProbeResult {
        let output = Command::new(command)
            .arg(CommandConfig::VERSION_FLAG)
            .stdin(Stdio::null())
            .output()
            .await;

        let output = match output {
            Ok(o) => o,
            Err(e) => {
                warn!("Failed to run {} {}: {}", command, CommandConfig::VERSION_FLAG, e);
                return VersionProbeResult::unknown();
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut result = match_version(&stdout);
        if !result.matched && !output.stderr.is_empty() {
            result = match_version(&String::from_utf8_lossy(&output.stderr));
        }

        if result.matched {
            info!(command, version = %result.version, "Detected version");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_semver() {
        let result = match_version("Mihomo Meta v1.2.3 linux amd64 with go1.22");
        assert!(result.matched);
        assert_eq!(result.version, "v1.2.3");
    }

    #[test]
    fn test_match_alpha_build() {
        let result = match_version("Mihomo Meta alpha-de4db33f linux amd64");
        assert!(result.matched);
        assert_eq!(result.version, "alpha-de4db33f");
    }

    #[test]
    fn test_first_match_wins() {
        let result = match_version("alpha-abc123 built from v1.18.0");
        assert_eq!(result.version, "alpha-abc123");
    }

    #[test]
    fn test_no_match_is_unknown() {
        let result = match_version("Clash Premium 2023.08.17");
        assert_eq!(result, VersionProbeResult::unknown());
        assert_eq!(result.version, "unknown");
    }

    #[test]
    fn test_partial_tokens_do_not_match() {
        assert!(!match_version("v1.2").matched);
        assert!(!match_version("xalpha-ff").matched);
    }

    #[test]
    fn test_invalid_pattern_degrades() {
        let result = match_version_with(r"(v\d+", "v1.2.3");
        assert!(!result.matched);
        assert_eq!(result.version, "unknown");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_script() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::TempDir::new().unwrap();
        let script = temp_dir.path().join("fake-mihomo");
        std::fs::write(&script, "#!/bin/sh\necho \"Mihomo Meta v1.19.2 linux\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let result = VersionProbe::probe(script.to_str().unwrap()).await;
        assert!(result.matched);
        assert_eq!(result.version, "v1.19.2");
    }

    #[tokio::test]
    async fn test_probe_missing_command() {
        let result = VersionProbe::probe("clashtray-definitely-missing-binary").await;
        assert_eq!(result, VersionProbeResult::unknown());
    }
}
