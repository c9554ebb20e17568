//! Centralized configuration for Clash Tray.
//!
//! Constants live in `*Config` unit structs. The runtime values a front-end
//! hands to the controller live in [`TrayConfig`], which can be loaded from a
//! JSON file and falls back to these constants for every missing field.

use crate::error::{Result, TrayError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "Clash Tray";
    pub const DASHBOARD_URL: &'static str = "https://d.metacubex.one";
    pub const CONFIG_DIR_NAME: &'static str = "clash";
    pub const CONFIG_FILE_NAME: &'static str = "config.yaml";
    pub const UNKNOWN_VERSION: &'static str = "unknown";
    pub const NOT_INSTALLED: &'static str = "Clash not installed";
}

/// Candidate executables, highest priority first.
pub struct CommandConfig;

impl CommandConfig {
    pub const CANDIDATES: &'static [&'static str] = &[
        "clash-meta-alpha",
        "clash-alpha",
        "mihomo-alpha",
        "clash-meta",
        "clash",
        "mihomo",
    ];
    pub const VERSION_FLAG: &'static str = "-v";
    pub const CONFIG_DIR_FLAG: &'static str = "-d";
    pub const TEST_FLAG: &'static str = "-t";
}

/// Supervisor timing.
pub struct SupervisorConfig;

impl SupervisorConfig {
    pub const GRACE_PERIOD: Duration = Duration::from_millis(500);
    pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);
    pub const OUTPUT_TAIL_LINES: usize = 200;
    pub const EVENT_CHANNEL_CAPACITY: usize = 64;
    pub const EXIT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);
}

/// Runtime configuration passed to the controller at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrayConfig {
    /// Executable names tried in order.
    pub candidates: Vec<String>,
    /// Directory passed to the proxy with `-d`.
    pub config_dir: PathBuf,
    /// Configuration file inside `config_dir` that must exist before a run.
    pub config_file: String,
    /// Dashboard opened from the menu.
    pub dashboard_url: String,
    /// Delay before a freshly spawned child is reported as started.
    pub grace_period_ms: u64,
    /// Bounded wait for each PATH lookup.
    pub lookup_timeout_ms: u64,
    /// Force-kill a child that ignores a stop request for this long.
    /// `None` keeps the stop graceful-only.
    pub stop_timeout_ms: Option<u64>,
    /// Lines of stdout/stderr kept for diagnostics.
    pub output_tail_lines: usize,
}

impl Default for TrayConfig {
    fn default() -> Self {
        Self {
            candidates: CommandConfig::CANDIDATES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            config_dir: default_config_dir(),
            config_file: AppConfig::CONFIG_FILE_NAME.to_string(),
            dashboard_url: AppConfig::DASHBOARD_URL.to_string(),
            grace_period_ms: SupervisorConfig::GRACE_PERIOD.as_millis() as u64,
            lookup_timeout_ms: SupervisorConfig::LOOKUP_TIMEOUT.as_millis() as u64,
            stop_timeout_ms: None,
            output_tail_lines: SupervisorConfig::OUTPUT_TAIL_LINES,
        }
    }
}

impl TrayConfig {
    /// Load configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| TrayError::io_with_path(e, path))?;
        let config: TrayConfig = serde_json::from_str(&content)?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                debug!("No configuration file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject values the supervisor cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.candidates.iter().all(|c| c.trim().is_empty()) {
            return Err(TrayError::Config {
                message: "candidates must contain at least one command".to_string(),
            });
        }
        if self.config_file.trim().is_empty() {
            return Err(TrayError::Config {
                message: "configFile must not be empty".to_string(),
            });
        }
        if self.output_tail_lines == 0 {
            return Err(TrayError::Config {
                message: "outputTailLines must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn with_config_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_candidates<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidates = candidates.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period_ms = grace.as_millis() as u64;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stop_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    /// Full path of the configuration file.
    pub fn config_file_path(&self) -> PathBuf {
        self.config_dir.join(&self.config_file)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Option<Duration> {
        self.stop_timeout_ms.map(Duration::from_millis)
    }
}

/// `~/.config/clash` on every platform, matching where the proxy itself looks.
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".config")
        .join(AppConfig::CONFIG_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_candidates_order() {
        let config = TrayConfig::default();
        assert_eq!(config.candidates.first().map(String::as_str), Some("clash-meta-alpha"));
        assert_eq!(config.candidates.last().map(String::as_str), Some("mihomo"));
        assert_eq!(config.grace_period(), Duration::from_millis(500));
        assert!(config.stop_timeout().is_none());
    }

    #[test]
    fn test_config_file_path() {
        let config = TrayConfig::default().with_config_dir("/tmp/clash");
        assert_eq!(config.config_file_path(), PathBuf::from("/tmp/clash/config.yaml"));
    }

    #[test]
    fn test_load_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tray.json");
        fs::write(
            &path,
            r#"{"candidates": ["mihomo"], "gracePeriodMs": 250, "stopTimeoutMs": 3000}"#,
        )
        .unwrap();

        let config = TrayConfig::load(&path).unwrap();
        assert_eq!(config.candidates, vec!["mihomo".to_string()]);
        assert_eq!(config.grace_period(), Duration::from_millis(250));
        assert_eq!(config.stop_timeout(), Some(Duration::from_secs(3)));
        assert_eq!(config.config_file, "config.yaml");
        assert_eq!(config.dashboard_url, AppConfig::DASHBOARD_URL);
    }

    #[test]
    fn test_load_rejects_empty_candidates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tray.json");
        fs::write(&path, r#"{"candidates": []}"#).unwrap();

        let result = TrayConfig::load(&path);
        assert!(matches!(result, Err(TrayError::Config { .. })));
    }

    #[test]
    fn test_load_missing_file() {
        let result = TrayConfig::load("/nonexistent/tray.json");
        assert!(matches!(result, Err(TrayError::Io { .. })));
    }
}
