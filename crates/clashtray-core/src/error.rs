//! Error types for Clash Tray.
//!
//! Helper-level failures (probe, start, crash) are reported as values or
//! lifecycle events. The variants here cover what is returned through
//! `Result` to the front-end.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the Clash Tray library.
#[derive(Debug, Error)]
pub enum TrayError {
    // Discovery errors
    #[error("No Clash executable found, tried: [{}]", tried.join(" "))]
    CommandNotFound { tried: Vec<String> },

    // Configuration test errors
    #[error("Configuration test failed: {diagnostic}")]
    ValidationFailed { diagnostic: String },

    // Supervisor errors
    #[error("Invalid supervisor state: cannot {action} while {state}")]
    InvalidState { action: String, state: String },

    #[error("Another toggle is already in progress")]
    ToggleInProgress,

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Shell integration errors
    #[error("Failed to open {target}: {message}")]
    Shell { target: String, message: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Clash Tray operations.
pub type Result<T> = std::result::Result<T, TrayError>;

impl From<std::io::Error> for TrayError {
    fn from(err: std::io::Error) -> Self {
        TrayError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for TrayError {
    fn from(err: serde_json::Error) -> Self {
        TrayError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl TrayError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        TrayError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Whether the user can fix the cause and retry without restarting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TrayError::ValidationFailed { .. }
                | TrayError::ConfigNotFound(_)
                | TrayError::ToggleInProgress
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_not_found_lists_candidates() {
        let err = TrayError::CommandNotFound {
            tried: vec!["clash-meta".into(), "mihomo".into()],
        };
        assert_eq!(
            err.to_string(),
            "No Clash executable found, tried: [clash-meta mihomo]"
        );
    }

    #[test]
    fn test_invalid_state_display() {
        let err = TrayError::InvalidState {
            action: "start".into(),
            state: "running".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid supervisor state: cannot start while running"
        );
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(TrayError::ValidationFailed {
            diagnostic: "bad yaml".into()
        }
        .is_recoverable());
        assert!(!TrayError::CommandNotFound { tried: vec![] }.is_recoverable());
    }
}
