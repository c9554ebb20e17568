//! Opening URLs, directories and files with the desktop's default handlers.
//!
//! Used by front-ends for the "open dashboard / directory / config" menu
//! entries. The supervisor never calls into this module.

use crate::error::{Result, TrayError};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

/// Check that `dir` names an existing directory.
///
/// The message is suitable for a notification body either way.
pub fn dir_exists(dir: &Path) -> (bool, String) {
    if dir.as_os_str().is_empty() {
        return (false, "Directory path is empty".to_string());
    }
    if !dir.is_dir() {
        return (false, format!("Directory does not exist: {}", dir.display()));
    }
    (true, format!("Found directory: {}", dir.display()))
}

/// Check that `file` names an existing regular file.
pub fn file_exists(file: &Path) -> (bool, String) {
    if file.as_os_str().is_empty() {
        return (false, "File path is empty".to_string());
    }
    if !file.is_file() {
        return (false, format!("File does not exist: {}", file.display()));
    }
    (true, format!("Found file: {}", file.display()))
}

/// Open a URL in the default browser. Only http and https are accepted.
pub fn open_url(url: &str) -> Result<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(TrayError::Validation {
            field: "url".to_string(),
            message: "Only http/https URLs are allowed".to_string(),
        });
    }
    info!("Opening URL {}", url);
    launch_default_handler(url)
}

/// Open a directory in the file manager.
pub fn open_dir(dir: &Path) -> Result<()> {
    let (exists, message) = dir_exists(dir);
    if !exists {
        warn!("{}", message);
        return Err(TrayError::NotFound(dir.to_path_buf()));
    }
    info!("Opening directory {}", dir.display());
    launch_default_handler(&dir.to_string_lossy())
}

/// Open a file with its default application.
pub fn open_file(file: &Path) -> Result<()> {
    let (exists, message) = file_exists(file);
    if !exists {
        warn!("{}", message);
        return Err(TrayError::NotFound(file.to_path_buf()));
    }
    info!("Opening file {}", file.display());
    launch_default_handler(&file.to_string_lossy())
}

/// The opener command for the current platform.
///
/// # Platform Behavior
/// - **Linux**: `xdg-open`
/// - **macOS**: `open`
/// - **Windows**: `cmd /C start "" <target>`
fn opener(target: &str) -> Command {
    #[cfg(target_os = "windows")]
    {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", ""]).arg(target);
        cmd
    }

    #[cfg(target_os = "macos")]
    {
        let mut cmd = Command::new("open");
        cmd.arg(target);
        cmd
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(target);
        cmd
    }
}

fn launch_default_handler(target: &str) -> Result<()> {
    let result = opener(target)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    match result {
        Ok(mut child) => {
            // Reap the opener in the background; it may outlive this call.
            std::thread::spawn(move || {
                let _ = child.wait();
            });
            Ok(())
        }
        Err(e) => {
            debug!("Opener failed for {}: {}", target, e);
            Err(TrayError::Shell {
                target: target.to_string(),
                message: e.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dir_exists_messages() {
        let temp_dir = TempDir::new().unwrap();

        let (found, message) = dir_exists(temp_dir.path());
        assert!(found);
        assert!(message.starts_with("Found directory"));

        let (found, message) = dir_exists(&temp_dir.path().join("missing"));
        assert!(!found);
        assert!(message.starts_with("Directory does not exist"));

        let (found, message) = dir_exists(Path::new(""));
        assert!(!found);
        assert_eq!(message, "Directory path is empty");
    }

    #[test]
    fn test_file_exists_rejects_directories() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("config.yaml");
        std::fs::write(&file, "mixed-port: 7890\n").unwrap();

        assert!(file_exists(&file).0);
        assert!(!file_exists(temp_dir.path()).0);
    }

    #[test]
    fn test_open_url_rejects_other_schemes() {
        assert!(matches!(
            open_url("file:///etc/passwd"),
            Err(TrayError::Validation { .. })
        ));
    }

    #[test]
    fn test_open_missing_paths() {
        assert!(matches!(
            open_dir(Path::new("/nonexistent/clash")),
            Err(TrayError::NotFound(_))
        ));
        assert!(matches!(
            open_file(Path::new("/nonexistent/clash/config.yaml")),
            Err(TrayError::NotFound(_))
        ));
    }
}
