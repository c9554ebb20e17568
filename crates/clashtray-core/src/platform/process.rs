//! Platform-specific process signalling.
//!
//! Only the polite half of termination lives here. Force-killing a supervised
//! child goes through the child handle owned by the supervisor.

use crate::error::{Result, TrayError};
use tracing::{debug, warn};

/// Check if a process with the given PID is alive.
///
/// # Platform Behavior
/// - **Linux/macOS**: `kill(pid, 0)` via `nix`
/// - **Windows**: `tasklist /FI "PID eq <pid>"`
pub fn is_process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        kill(Pid::from_raw(raw), None).is_ok()
    }

    #[cfg(windows)]
    {
        std::process::Command::new("tasklist")
            .args(["/FI", &format!("PID eq {}", pid), "/NH"])
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
            .unwrap_or(false)
    }

    #[cfg(not(any(unix, windows)))]
    {
        warn!("Process alive check not implemented for this platform");
        true
    }
}

/// Ask a process to exit without forcing it.
///
/// # Platform Behavior
/// - **Linux/macOS**: sends `SIGTERM`
/// - **Windows**: `taskkill /PID <pid>` without `/F`, which posts a close
///   request to the process windows
///
/// A process that is already gone is not an error.
pub fn request_terminate(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let raw = i32::try_from(pid)
            .map_err(|_| TrayError::Other(format!("PID {} out of range", pid)))?;

        debug!("Sending SIGTERM to process {}", pid);
        match kill(Pid::from_raw(raw), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => {
                warn!("Failed to send SIGTERM to {}: {}", pid, e);
                Err(TrayError::Other(format!(
                    "Failed to signal process {}: {}",
                    pid, e
                )))
            }
        }
    }

    #[cfg(windows)]
    {
        debug!("Requesting close of process {} with taskkill", pid);
        let output = std::process::Command::new("taskkill")
            .args(["/PID", &pid.to_string()])
            .output()
            .map_err(|e| TrayError::Other(format!("Failed to run taskkill: {}", e)))?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("not found") {
            Ok(())
        } else {
            warn!("taskkill failed for {}: {}", pid, stderr);
            Err(TrayError::Other(format!(
                "Failed to request close of process {}: {}",
                pid,
                stderr.trim()
            )))
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        Err(TrayError::Other(format!(
            "Process termination not implemented for this platform (pid {})",
            pid
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_process_alive_self() {
        assert!(is_process_alive(std::process::id()));
    }

    #[test]
    fn test_is_process_alive_nonexistent() {
        assert!(!is_process_alive(4_000_000_000));
    }

    #[cfg(unix)]
    #[test]
    fn test_request_terminate_out_of_range() {
        assert!(request_terminate(4_000_000_000).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_request_terminate_stops_sleep() {
        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        request_terminate(child.id()).unwrap();
        let status = child.wait().unwrap();
        assert!(!status.success());
    }
}
