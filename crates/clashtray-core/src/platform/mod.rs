//! Platform abstraction layer for cross-platform compatibility.
//!
//! All `#[cfg]` blocks for OS-specific behavior live in this module rather
//! than being scattered through the supervisor and controller.
//!
//! - `paths` - PATH lookup of executables
//! - `process` - Liveness checks and graceful termination requests

pub mod paths;
pub mod process;

pub use paths::{find_on_path, lookup_program};
pub use process::{is_process_alive, request_terminate};

/// Returns the current platform name.
pub fn current_platform() -> &'static str {
    #[cfg(target_os = "linux")]
    {
        "linux"
    }
    #[cfg(target_os = "windows")]
    {
        "windows"
    }
    #[cfg(target_os = "macos")]
    {
        "macos"
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        "unknown"
    }
}
