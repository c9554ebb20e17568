//! Configuration dry-run: `<command> -d <config_dir> -t`.

use crate::config::CommandConfig;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{error, info};

/// Result of a configuration test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub ok: bool,
    /// `None` when the command could not be run or was killed by a signal.
    pub exit_code: Option<i32>,
    /// Captured stdout on failure; the proxy reports test errors there.
    /// Holds the OS error text when the command could not be spawned.
    pub diagnostic: String,
}

/// Arguments for the config test invocation.
pub fn test_args(config_dir: &Path) -> Vec<OsString> {
    vec![
        CommandConfig::CONFIG_DIR_FLAG.into(),
        config_dir.as_os_str().to_os_string(),
        CommandConfig::TEST_FLAG.into(),
    ]
}

/// Arguments for the long-running invocation.
pub fn run_args(config_dir: &Path) -> Vec<OsString> {
    vec![
        CommandConfig::CONFIG_DIR_FLAG.into(),
        config_dir.as_os_str().to_os_string(),
    ]
}

/// Runs the proxy's configuration test mode.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Test `config_dir` with `command`, waiting for it to finish.
    pub async fn validate(command: &str, config_dir: &Path) -> ValidationReport {
        info!(command, config_dir = %config_dir.display(), "Testing configuration");

        let output = Command::new(command)
            .args(test_args(config_dir))
            .stdin(Stdio::null())
            .output()
            .await;

        let output = match output {
            Ok(o) => o,
            Err(e) => {
                error!("Failed to run configuration test with {}: {}", command, e);
                return ValidationReport {
                    ok: false,
                    exit_code: None,
                    diagnostic: e.to_string(),
                };
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            info!("Configuration test passed: {}", stdout.trim());
            ValidationReport {
                ok: true,
                exit_code: output.status.code(),
                diagnostic: String::new(),
            }
        } else {
            error!(
                exit_code = ?output.status.code(),
                "Configuration test failed: {}",
                stdout.trim()
            );
            ValidationReport {
                ok: false,
                exit_code: output.status.code(),
                diagnostic: stdout,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_invocation_args() {
        let dir = PathBuf::from("/home/user/.config/clash");
        assert_eq!(
            test_args(&dir),
            vec![
                OsString::from("-d"),
                OsString::from("/home/user/.config/clash"),
                OsString::from("-t")
            ]
        );
        assert_eq!(run_args(&dir).len(), 2);
    }

    #[tokio::test]
    async fn test_validate_missing_command() {
        let report =
            ConfigValidator::validate("clashtray-definitely-missing-binary", Path::new("/tmp")).await;
        assert!(!report.ok);
        assert!(report.exit_code.is_none());
        assert!(!report.diagnostic.is_empty());
    }
}
