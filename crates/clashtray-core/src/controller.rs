//! Front-end façade: the toggle flow, tooltip text and notifications.
//!
//! A tray, CLI or any other front-end drives the proxy through
//! [`TrayController`] and renders the [`Notification`]s it produces.

use crate::config::{AppConfig, SupervisorConfig, TrayConfig};
use crate::error::{Result, TrayError};
use crate::process::{
    run_args, CommandLocator, ConfigValidator, LifecycleEvent, LifecycleState, ProcessSupervisor,
    ResolvedCommand, RunId, StatusSubscription, SupervisorOptions, ValidationReport,
};
use crate::system;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{info, warn};

/// How prominently a notification should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Information,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Information => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub severity: Severity,
}

impl Notification {
    fn new(title: impl Into<String>, body: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            severity,
        }
    }

    /// Notification for a failed toggle or check.
    pub fn from_error(err: &TrayError) -> Self {
        match err {
            TrayError::CommandNotFound { tried } => Self::new(
                "Clash executable not found",
                format!(
                    "None of these commands were found on PATH: [{}]. Check that Clash is installed.",
                    tried.join(" ")
                ),
                Severity::Critical,
            ),
            TrayError::ConfigNotFound(path) => Self::new(
                "Configuration missing",
                format!("Config file does not exist: {}", path.display()),
                Severity::Critical,
            ),
            TrayError::ValidationFailed { diagnostic } => Self::new(
                "Configuration test failed",
                diagnostic.trim(),
                Severity::Warning,
            ),
            TrayError::ToggleInProgress => Self::new(
                "Busy",
                "A start or stop is already in progress",
                Severity::Warning,
            ),
            TrayError::NotFound(path) => Self::new(
                "Failed to open",
                format!("Path does not exist: {}", path.display()),
                Severity::Warning,
            ),
            other => Self::new("Clash Tray error", other.to_string(), Severity::Critical),
        }
    }

    /// Notification for a lifecycle event.
    pub fn from_event(event: &LifecycleEvent) -> Self {
        match event {
            LifecycleEvent::Started { pid, .. } => Self::new(
                "Clash started",
                match pid {
                    Some(pid) => format!("Running with PID {}", pid),
                    None => "Running".to_string(),
                },
                Severity::Information,
            ),
            LifecycleEvent::Finished { exit_code, .. } => Self::new(
                "Clash stopped",
                match exit_code {
                    Some(code) => format!("Exited with code {}", code),
                    None => "Stopped".to_string(),
                },
                Severity::Information,
            ),
            LifecycleEvent::Crashed {
                exit, diagnostic, ..
            } => Self::new(
                "Clash crashed",
                body_or(diagnostic, exit),
                Severity::Critical,
            ),
            LifecycleEvent::FailedToStart { diagnostic, .. } => Self::new(
                "Clash failed to start",
                body_or(diagnostic, "See the log for details"),
                Severity::Critical,
            ),
        }
    }

    /// Warning shown when a command was found but its version was not recognized.
    pub fn version_unknown(resolved: &ResolvedCommand) -> Option<Self> {
        (!resolved.version_matched).then(|| {
            Self::new(
                "Version not recognized",
                format!(
                    "Could not read a version from `{} -v`; see the log for its output",
                    resolved.name
                ),
                Severity::Warning,
            )
        })
    }
}

fn body_or(text: &str, fallback: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// What a toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// A run was started; watch events for its outcome.
    Started(RunId),
    /// A stop was requested for the live run.
    StopRequested,
}

/// Resets the in-flight flag when a toggle ends, however it ends.
struct ToggleGuard<'a>(&'a AtomicBool);

impl<'a> ToggleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ToggleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Wires locator, validator and supervisor for a front-end.
pub struct TrayController {
    config: TrayConfig,
    locator: CommandLocator,
    supervisor: ProcessSupervisor,
    resolved: RwLock<Option<ResolvedCommand>>,
    toggling: AtomicBool,
}

impl TrayController {
    pub fn new(config: TrayConfig) -> Result<Self> {
        config.validate()?;
        let locator = CommandLocator::new(config.lookup_timeout());
        let supervisor = ProcessSupervisor::new(SupervisorOptions::from(&config));
        Ok(Self {
            config,
            locator,
            supervisor,
            resolved: RwLock::new(None),
            toggling: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &TrayConfig {
        &self.config
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    pub fn subscribe(&self) -> StatusSubscription {
        self.supervisor.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.supervisor.state() == LifecycleState::Running
    }

    /// The cached command, if one has been resolved.
    pub fn resolved_command(&self) -> Option<ResolvedCommand> {
        self.resolved
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Locate and probe the proxy command.
    ///
    /// The result is cached for the lifetime of the controller; `force`
    /// discards the cache and checks again.
    pub async fn check_command(&self, force: bool) -> Result<ResolvedCommand> {
        if !force {
            if let Some(resolved) = self.resolved_command() {
                return Ok(resolved);
            }
        }

        let result = self.locator.resolve(&self.config.candidates).await;
        let mut cache = self.resolved.write().unwrap_or_else(PoisonError::into_inner);
        match result {
            Ok(resolved) => {
                info!(
                    command = %resolved.name,
                    version = %resolved.version,
                    "Resolved proxy command"
                );
                *cache = Some(resolved.clone());
                Ok(resolved)
            }
            Err(e) => {
                *cache = None;
                Err(e)
            }
        }
    }

    /// Run the configuration test with the resolved command.
    ///
    /// # Errors
    ///
    /// `InvalidState` while a proxy run is live; the test never runs beside it.
    pub async fn validate_config(&self) -> Result<ValidationReport> {
        let state = self.supervisor.state();
        if state != LifecycleState::Idle {
            warn!(state = %state, "Configuration test refused while the proxy is live");
            return Err(TrayError::InvalidState {
                action: "validate".to_string(),
                state: state.to_string(),
            });
        }
        let resolved = self.check_command(false).await?;
        Ok(ConfigValidator::validate(&resolved.name, &self.config.config_dir).await)
    }

    /// Start the proxy when idle, otherwise request it to stop.
    ///
    /// # Errors
    ///
    /// - `ToggleInProgress` if another toggle has not returned yet
    /// - `ConfigNotFound`, `CommandNotFound`, `ValidationFailed` when a start
    ///   is blocked; nothing is spawned
    pub async fn toggle(&self) -> Result<ToggleOutcome> {
        let Some(_guard) = ToggleGuard::acquire(&self.toggling) else {
            warn!("Toggle ignored, another toggle is in progress");
            return Err(TrayError::ToggleInProgress);
        };

        if !self.supervisor.is_idle() {
            self.supervisor.stop();
            return Ok(ToggleOutcome::StopRequested);
        }

        self.start_proxy().await.map(ToggleOutcome::Started)
    }

    async fn start_proxy(&self) -> Result<RunId> {
        let config_file = self.config.config_file_path();
        let (exists, message) = system::file_exists(&config_file);
        if !exists {
            warn!("{}", message);
            return Err(TrayError::ConfigNotFound(config_file));
        }

        let resolved = self.check_command(false).await?;
        let report = ConfigValidator::validate(&resolved.name, &self.config.config_dir).await;
        if !report.ok {
            return Err(TrayError::ValidationFailed {
                diagnostic: report.diagnostic,
            });
        }

        self.supervisor
            .start(&resolved.name, run_args(&self.config.config_dir))
    }

    /// Request a stop and wait up to `timeout` for the run to end.
    ///
    /// Returns `true` once the supervisor is idle.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        let mut events = self.supervisor.subscribe();
        if !self.supervisor.stop() {
            return true;
        }

        let wait_terminal = async {
            while let Some(event) = events.recv().await {
                if event.is_terminal() {
                    break;
                }
            }
        };
        if tokio::time::timeout(timeout, wait_terminal).await.is_err() {
            warn!("Process still running {:?} after stop request", timeout);
        }
        self.supervisor.is_idle()
    }

    /// [`shutdown`](Self::shutdown) with the default exit wait.
    pub async fn exit(&self) -> bool {
        info!("Exiting {}", AppConfig::APP_NAME);
        self.shutdown(SupervisorConfig::EXIT_WAIT_TIMEOUT).await
    }

    /// `"<command> <version>\nTun mode: on|off"`.
    pub fn tooltip(&self) -> String {
        let (command, version) = match self.resolved_command() {
            Some(r) => (r.name, r.version),
            None => (
                AppConfig::NOT_INSTALLED.to_string(),
                AppConfig::UNKNOWN_VERSION.to_string(),
            ),
        };
        let mode = if self.is_running() { "on" } else { "off" };
        format!("{} {}\nTun mode: {}", command, version, mode)
    }

    pub fn open_dashboard(&self) -> Result<()> {
        system::open_url(&self.config.dashboard_url)
    }

    pub fn open_config_dir(&self) -> Result<()> {
        system::open_dir(&self.config.config_dir)
    }

    pub fn open_config_file(&self) -> Result<()> {
        system::open_file(&self.config.config_file_path())
    }
}
