//! Lifecycle supervision of the long-running proxy process.
//!
//! The supervisor owns at most one child. Each `start` spawns the child and a
//! monitor task; the monitor holds the child handle, confirms liveness after
//! the grace period, forwards stop requests and classifies the exit.
//!
//! ```text
//! Idle --start--> Starting --(alive after grace)--> Running
//!   ^                 |                                 |
//!   +---- Finished | Crashed | FailedToStart <---------+
//! ```

use super::events::{LifecycleEvent, RunId, StatusNotifier, StatusSubscription};
use super::output::{spawn_capture, SharedTail};
use crate::config::{SupervisorConfig, TrayConfig};
use crate::error::{Result, TrayError};
use crate::platform;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, error, info, warn};

/// Observable state of the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No child. Initial state, and the state after every terminal event.
    Idle,
    /// Spawned, grace period not yet elapsed.
    Starting,
    /// Confirmed alive.
    Running,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables for a supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub grace_period: Duration,
    /// Force-kill after a stop request has been ignored this long.
    /// `None` never force-kills.
    pub stop_timeout: Option<Duration>,
    pub output_tail_lines: usize,
    pub event_capacity: usize,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            grace_period: SupervisorConfig::GRACE_PERIOD,
            stop_timeout: None,
            output_tail_lines: SupervisorConfig::OUTPUT_TAIL_LINES,
            event_capacity: SupervisorConfig::EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl From<&TrayConfig> for SupervisorOptions {
    fn from(config: &TrayConfig) -> Self {
        Self {
            grace_period: config.grace_period(),
            stop_timeout: config.stop_timeout(),
            output_tail_lines: config.output_tail_lines,
            event_capacity: SupervisorConfig::EVENT_CHANNEL_CAPACITY,
        }
    }
}

/// Snapshot of the live run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
    pub run: RunId,
    pub pid: Option<u32>,
    pub command: String,
    pub args: Vec<OsString>,
    pub state: LifecycleState,
    pub stop_requested: bool,
}

/// The single live child as seen from outside the monitor task.
struct ProcessHandle {
    run: RunId,
    pid: Option<u32>,
    command: String,
    args: Vec<OsString>,
    stop_requested: bool,
    stop_tx: mpsc::UnboundedSender<()>,
}

struct Shared {
    state: LifecycleState,
    last_run: RunId,
    current: Option<ProcessHandle>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns zero or one supervised child process.
pub struct ProcessSupervisor {
    options: SupervisorOptions,
    notifier: StatusNotifier,
    shared: Arc<Mutex<Shared>>,
}

impl ProcessSupervisor {
    pub fn new(options: SupervisorOptions) -> Self {
        let notifier = StatusNotifier::new(options.event_capacity);
        Self {
            options,
            notifier,
            shared: Arc::new(Mutex::new(Shared {
                state: LifecycleState::Idle,
                last_run: 0,
                current: None,
            })),
        }
    }

    pub fn options(&self) -> &SupervisorOptions {
        &self.options
    }

    pub fn notifier(&self) -> &StatusNotifier {
        &self.notifier
    }

    /// Subscribe to lifecycle events of all future runs.
    pub fn subscribe(&self) -> StatusSubscription {
        self.notifier.subscribe()
    }

    pub fn state(&self) -> LifecycleState {
        lock(&self.shared).state
    }

    pub fn is_idle(&self) -> bool {
        self.state() == LifecycleState::Idle
    }

    pub fn pid(&self) -> Option<u32> {
        lock(&self.shared).current.as_ref().and_then(|h| h.pid)
    }

    pub fn current_run(&self) -> Option<RunInfo> {
        let shared = lock(&self.shared);
        shared.current.as_ref().map(|h| RunInfo {
            run: h.run,
            pid: h.pid,
            command: h.command.clone(),
            args: h.args.clone(),
            state: shared.state,
            stop_requested: h.stop_requested,
        })
    }

    /// Spawn `command` with `args` and start monitoring it.
    ///
    /// Returns as soon as the child is spawned; progress is reported through
    /// lifecycle events. A spawn refused by the OS is reported as
    /// `FailedToStart` for the returned run id. Must be called from within a
    /// Tokio runtime.
    ///
    /// # Errors
    ///
    /// `InvalidState` if a child is already live. Nothing is spawned.
    pub fn start<I, S>(&self, command: &str, args: I) -> Result<RunId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let runtime = Handle::try_current().map_err(|_| {
            TrayError::Other("ProcessSupervisor::start requires a Tokio runtime".to_string())
        })?;
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();

        let mut shared = lock(&self.shared);
        if shared.state != LifecycleState::Idle {
            error!(
                state = %shared.state,
                "Refusing to start {}: a process is already supervised",
                command
            );
            return Err(TrayError::InvalidState {
                action: "start".to_string(),
                state: shared.state.to_string(),
            });
        }

        shared.last_run += 1;
        let run = shared.last_run;

        let mut cmd = Command::new(command);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        info!(run, command, args = ?args, "Starting process");

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                drop(shared);
                error!(run, "Failed to spawn {}: {}", command, e);
                self.notifier.emit(LifecycleEvent::FailedToStart {
                    run,
                    diagnostic: e.to_string(),
                });
                return Ok(run);
            }
        };

        let pid = child.id();
        let stdout_tail = SharedTail::new(self.options.output_tail_lines);
        let stderr_tail = SharedTail::new(self.options.output_tail_lines);
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_capture(&runtime, "stdout", stdout, stdout_tail.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_capture(&runtime, "stderr", stderr, stderr_tail.clone()));
        }

        let (stop_tx, stop_rx) = mpsc::unbounded_channel();
        shared.state = LifecycleState::Starting;
        shared.current = Some(ProcessHandle {
            run,
            pid,
            command: command.to_string(),
            args,
            stop_requested: false,
            stop_tx,
        });
        drop(shared);

        debug!(run, pid = ?pid, "Process spawned, waiting {:?} before confirming", self.options.grace_period);

        let monitor = Monitor {
            run,
            pid,
            child,
            stop_rx,
            readers,
            stdout_tail,
            stderr_tail,
            shared: Arc::clone(&self.shared),
            notifier: self.notifier.clone(),
            options: self.options.clone(),
        };
        runtime.spawn(monitor.run());

        Ok(run)
    }

    /// Ask the live child to exit and return immediately.
    ///
    /// The outcome arrives as a terminal event. Returns `false` when idle,
    /// in which case nothing happens.
    pub fn stop(&self) -> bool {
        let mut shared = lock(&self.shared);
        let Some(handle) = shared.current.as_mut() else {
            debug!("Stop requested while idle, nothing to do");
            return false;
        };

        if handle.stop_requested {
            debug!(run = handle.run, "Stop already requested");
            return true;
        }

        info!(run = handle.run, pid = ?handle.pid, "Requesting process stop");
        handle.stop_requested = true;
        if handle.stop_tx.send(()).is_err() {
            warn!(run = handle.run, "Monitor already finished, stop request dropped");
        }
        true
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new(SupervisorOptions::default())
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        if self.stop() {
            info!("Supervisor dropped, stop requested for the live process");
        }
    }
}

/// Per-run task owning the child handle.
struct Monitor {
    run: RunId,
    pid: Option<u32>,
    child: Child,
    stop_rx: mpsc::UnboundedReceiver<()>,
    readers: Vec<JoinHandle<()>>,
    stdout_tail: SharedTail,
    stderr_tail: SharedTail,
    shared: Arc<Mutex<Shared>>,
    notifier: StatusNotifier,
    options: SupervisorOptions,
}

/// How the monitor loop saw the run before the exit.
#[derive(Debug, Clone, Copy, Default)]
struct RunFacts {
    confirmed: bool,
    stop_requested: bool,
    force_killed: bool,
}

async fn sleep_until_set(deadline: &mut Option<Pin<Box<Sleep>>>) {
    match deadline {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

impl Monitor {
    async fn run(mut self) {
        let run = self.run;
        let grace = tokio::time::sleep(self.options.grace_period);
        tokio::pin!(grace);

        let mut facts = RunFacts::default();
        let mut grace_done = false;
        let mut stop_open = true;
        let mut kill_deadline: Option<Pin<Box<Sleep>>> = None;

        let status = loop {
            tokio::select! {
                status = self.child.wait() => break status,

                _ = &mut grace, if !grace_done => {
                    grace_done = true;
                    if facts.stop_requested {
                        continue;
                    }
                    match self.child.try_wait() {
                        Ok(None) => {
                            facts.confirmed = true;
                            self.confirm_running();
                        }
                        Ok(Some(status)) => {
                            debug!(run, "Process exited within the grace period: {}", status);
                        }
                        Err(e) => warn!(run, "Liveness check failed: {}", e),
                    }
                }

                request = self.stop_rx.recv(), if stop_open && !facts.stop_requested => {
                    match request {
                        Some(()) => {
                            facts.stop_requested = true;
                            self.request_terminate();
                            if let Some(timeout) = self.options.stop_timeout {
                                kill_deadline = Some(Box::pin(tokio::time::sleep(timeout)));
                            }
                        }
                        None => stop_open = false,
                    }
                }

                _ = sleep_until_set(&mut kill_deadline), if kill_deadline.is_some() => {
                    kill_deadline = None;
                    warn!(run, "Process ignored the stop request, killing it");
                    match self.child.start_kill() {
                        Ok(()) => facts.force_killed = true,
                        Err(e) => error!(run, "Failed to kill process: {}", e),
                    }
                }
            }
        };

        for mut reader in self.readers.drain(..) {
            if tokio::time::timeout(SupervisorConfig::OUTPUT_DRAIN_TIMEOUT, &mut reader)
                .await
                .is_err()
            {
                debug!(run, "Output capture still open after exit, aborting it");
                reader.abort();
            }
        }

        let event = classify(
            run,
            status,
            facts,
            self.stdout_tail.take(),
            self.stderr_tail.take(),
        );
        self.release();
        log_terminal(&event);
        self.notifier.emit(event);
    }

    fn confirm_running(&self) {
        {
            let mut shared = lock(&self.shared);
            let is_current = shared.current.as_ref().map(|h| h.run) == Some(self.run);
            if !is_current || shared.state != LifecycleState::Starting {
                return;
            }
            shared.state = LifecycleState::Running;
        }
        info!(run = self.run, pid = ?self.pid, "Process started");
        self.notifier.emit(LifecycleEvent::Started {
            run: self.run,
            pid: self.pid,
        });
    }

    fn request_terminate(&mut self) {
        let Some(pid) = self.pid else {
            debug!(run = self.run, "Process has no pid, it already exited");
            return;
        };
        if let Err(e) = platform::request_terminate(pid) {
            error!(run = self.run, "Graceful stop request failed: {}", e);
        }
    }

    /// Drop the handle so the next `start` sees an idle supervisor.
    fn release(&self) {
        let mut shared = lock(&self.shared);
        if shared.current.as_ref().map(|h| h.run) == Some(self.run) {
            shared.current = None;
            shared.state = LifecycleState::Idle;
        }
    }
}

/// Map an exit to its terminal event.
fn classify(
    run: RunId,
    status: std::io::Result<ExitStatus>,
    facts: RunFacts,
    stdout: String,
    stderr: String,
) -> LifecycleEvent {
    let status = match status {
        Ok(status) => status,
        Err(e) if facts.confirmed => {
            return LifecycleEvent::Crashed {
                run,
                exit: format!("wait failed: {}", e),
                diagnostic: stderr,
            };
        }
        Err(e) => {
            return LifecycleEvent::FailedToStart {
                run,
                diagnostic: first_non_empty([stdout, stderr, e.to_string()]),
            };
        }
    };

    if facts.stop_requested && is_stop_exit(&status, facts) {
        return LifecycleEvent::Finished {
            run,
            exit_code: status.code(),
        };
    }

    if !facts.confirmed {
        return LifecycleEvent::FailedToStart {
            run,
            diagnostic: first_non_empty([stdout, stderr, describe_exit(&status)]),
        };
    }

    if is_crash_exit(&status) {
        LifecycleEvent::Crashed {
            run,
            exit: describe_exit(&status),
            diagnostic: stderr,
        }
    } else {
        LifecycleEvent::Finished {
            run,
            exit_code: status.code(),
        }
    }
}

/// Whether an exit after a stop request is the one the request asked for.
///
/// # Platform Behavior
/// - **Unix**: a normal exit, `SIGTERM`, or `SIGKILL` after a force-kill
/// - **Windows**: anything but an NTSTATUS crash code, or any code after a force-kill
fn is_stop_exit(status: &ExitStatus, facts: RunFacts) -> bool {
    #[cfg(unix)]
    {
        use nix::sys::signal::Signal;
        use std::os::unix::process::ExitStatusExt;
        match status.signal() {
            None => true,
            Some(s) if s == Signal::SIGTERM as i32 => true,
            Some(s) if s == Signal::SIGKILL as i32 => facts.force_killed,
            Some(_) => false,
        }
    }

    #[cfg(not(unix))]
    {
        facts.force_killed || !is_crash_exit(status)
    }
}

fn first_non_empty<const N: usize>(texts: [String; N]) -> String {
    texts
        .into_iter()
        .find(|t| !t.trim().is_empty())
        .unwrap_or_default()
}

/// Whether the process died instead of exiting.
///
/// # Platform Behavior
/// - **Unix**: terminated by a signal
/// - **Windows**: NTSTATUS error codes (`0xC0000000` and above), e.g. access violations
fn is_crash_exit(status: &ExitStatus) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status.signal().is_some()
    }

    #[cfg(windows)]
    {
        status
            .code()
            .map(|c| (c as u32) >= 0xC000_0000)
            .unwrap_or(false)
    }

    #[cfg(not(any(unix, windows)))]
    {
        status.code().is_none()
    }
}

fn describe_exit(status: &ExitStatus) -> String {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("terminated by signal {}", signal);
        }
    }
    match status.code() {
        Some(code) => format!("exited with code {}", code),
        None => "exited".to_string(),
    }
}

fn log_terminal(event: &LifecycleEvent) {
    match event {
        LifecycleEvent::Finished { run, exit_code } => {
            info!(run, exit_code = ?exit_code, "Process finished");
        }
        LifecycleEvent::Crashed {
            run,
            exit,
            diagnostic,
        } => {
            error!(run, exit = %exit, "Process crashed: {}", diagnostic);
        }
        LifecycleEvent::FailedToStart { run, diagnostic } => {
            error!(run, "Process failed to start: {}", diagnostic);
        }
        LifecycleEvent::Started { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn exit_status(raw: i32) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(raw)
    }

    #[test]
    fn test_new_supervisor_is_idle() {
        let supervisor = ProcessSupervisor::default();
        assert_eq!(supervisor.state(), LifecycleState::Idle);
        assert!(supervisor.pid().is_none());
        assert!(supervisor.current_run().is_none());
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let supervisor = ProcessSupervisor::default();
        let mut events = supervisor.subscribe();
        assert!(!supervisor.stop());
        assert!(events.try_recv().is_none());
        assert!(supervisor.is_idle());
    }

    #[test]
    fn test_start_outside_runtime_is_rejected() {
        let supervisor = ProcessSupervisor::default();
        let result = supervisor.start("sh", ["-c", "true"]);
        assert!(matches!(result, Err(TrayError::Other(_))));
        assert!(supervisor.is_idle());
    }

    #[cfg(unix)]
    #[test]
    fn test_classify_exit_before_grace() {
        let facts = RunFacts::default();
        let event = classify(
            7,
            Ok(exit_status(1 << 8)),
            facts,
            "parse config error".into(),
            String::new(),
        );
        assert_eq!(
            event,
            LifecycleEvent::FailedToStart {
                run: 7,
                diagnostic: "parse config error".into()
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_classify_signal_after_confirmation() {
        let facts = RunFacts {
            confirmed: true,
            ..RunFacts::default()
        };
        let event = classify(2, Ok(exit_status(9)), facts, String::new(), "panic".into());
        assert_eq!(
            event,
            LifecycleEvent::Crashed {
                run: 2,
                exit: "terminated by signal 9".into(),
                diagnostic: "panic".into()
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_classify_requested_stop_is_finished() {
        let facts = RunFacts {
            confirmed: true,
            stop_requested: true,
            ..RunFacts::default()
        };
        let event = classify(4, Ok(exit_status(15)), facts, String::new(), String::new());
        assert_eq!(
            event,
            LifecycleEvent::Finished {
                run: 4,
                exit_code: None
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_classify_fault_during_stop_is_crash() {
        let facts = RunFacts {
            confirmed: true,
            stop_requested: true,
            ..RunFacts::default()
        };
        let event = classify(5, Ok(exit_status(11)), facts, String::new(), "segfault".into());
        assert_eq!(
            event,
            LifecycleEvent::Crashed {
                run: 5,
                exit: "terminated by signal 11".into(),
                diagnostic: "segfault".into()
            }
        );

        let event = classify(6, Ok(exit_status(6)), facts, String::new(), String::new());
        assert!(matches!(event, LifecycleEvent::Crashed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_classify_kill_after_stop_depends_on_force_kill() {
        let stopped = RunFacts {
            confirmed: true,
            stop_requested: true,
            force_killed: false,
        };
        let event = classify(8, Ok(exit_status(9)), stopped, String::new(), String::new());
        assert!(matches!(event, LifecycleEvent::Crashed { .. }));

        let killed = RunFacts {
            force_killed: true,
            ..stopped
        };
        let event = classify(8, Ok(exit_status(9)), killed, String::new(), String::new());
        assert_eq!(
            event,
            LifecycleEvent::Finished {
                run: 8,
                exit_code: None
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_classify_silent_early_exit_describes_status() {
        let event = classify(
            1,
            Ok(exit_status(3 << 8)),
            RunFacts::default(),
            String::new(),
            String::new(),
        );
        assert_eq!(
            event,
            LifecycleEvent::FailedToStart {
                run: 1,
                diagnostic: "exited with code 3".into()
            }
        );
    }
}
