//! Executable lookup on the system PATH.

use crate::error::{Result, TrayError};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// The OS tool used to resolve a command name.
///
/// # Platform Behavior
/// - **Linux/macOS**: `which`
/// - **Windows**: `where`
pub fn lookup_program() -> &'static str {
    #[cfg(windows)]
    {
        "where"
    }
    #[cfg(not(windows))]
    {
        "which"
    }
}

/// Resolve `cmd` through the OS lookup tool, waiting at most `timeout`.
///
/// Returns `Ok(None)` when the tool reports the command missing or does not
/// answer in time. If the lookup tool itself cannot be spawned, PATH is
/// searched in-process instead.
pub async fn find_on_path(cmd: &str, timeout: Duration) -> Result<Option<PathBuf>> {
    if cmd.trim().is_empty() {
        return Err(TrayError::Validation {
            field: "command".to_string(),
            message: "command name is empty".to_string(),
        });
    }

    let spawned = Command::new(lookup_program())
        .arg(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn();

    let child = match spawned {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(
                "{} unavailable, searching PATH directly for {}",
                lookup_program(),
                cmd
            );
            return Ok(search_path_env(cmd, std::env::var_os("PATH").as_deref()));
        }
        Err(e) => return Err(e.into()),
    };

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => output?,
        Err(_) => {
            debug!("Lookup of {} timed out after {:?}", cmd, timeout);
            return Ok(None);
        }
    };

    if !output.status.success() {
        return Ok(None);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let resolved = stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(cmd));
    Ok(Some(resolved))
}

/// Search the directories of a PATH-style value for an executable `cmd`.
///
/// Names containing a path separator are checked directly.
pub fn search_path_env(cmd: &str, path_var: Option<&OsStr>) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    which::which_in(cmd, path_var, cwd).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_command_rejected() {
        let result = find_on_path("  ", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(TrayError::Validation { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_find_shell() {
        let found = find_on_path("sh", Duration::from_secs(5)).await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_missing_command() {
        let found = find_on_path("clashtray-definitely-missing-binary", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_search_path_env_requires_exec_bit() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::TempDir::new().unwrap();
        let plain = temp_dir.path().join("plain");
        let exec = temp_dir.path().join("exec");
        std::fs::write(&plain, "").unwrap();
        std::fs::write(&exec, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&exec, std::fs::Permissions::from_mode(0o755)).unwrap();

        let path_var = temp_dir.path().as_os_str();
        assert!(search_path_env("plain", Some(path_var)).is_none());
        assert_eq!(search_path_env("exec", Some(path_var)), Some(exec));
        assert!(search_path_env("exec", None).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_search_path_env_absolute_path() {
        assert!(search_path_env("/bin/sh", None).is_some());
        assert!(search_path_env("/nonexistent/clash", None).is_none());
    }
}
