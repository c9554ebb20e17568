//! Clash Tray Core - headless supervisor for Clash/Mihomo proxy processes.
//!
//! This crate finds an installed proxy executable, tests its configuration,
//! runs it as a supervised child process and reports lifecycle events. It has
//! no UI; a tray icon, CLI or any other front-end subscribes to the events and
//! renders the [`Notification`]s produced by [`TrayController`].
//!
//! # Example
//!
//! ```rust,no_run
//! use clashtray_core::{Notification, TrayConfig, TrayController};
//!
//! #[tokio::main]
//! async fn main() -> clashtray_core::Result<()> {
//!     let controller = TrayController::new(TrayConfig::default())?;
//!     let mut events = controller.subscribe();
//!
//!     if let Err(e) = controller.toggle().await {
//!         let note = Notification::from_error(&e);
//!         eprintln!("{}: {}", note.title, note.body);
//!         return Ok(());
//!     }
//!
//!     while let Some(event) = events.recv().await {
//!         println!("{}", Notification::from_event(&event).title);
//!         println!("{}", controller.tooltip());
//!         if event.is_terminal() {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod platform;
pub mod process;
pub mod system;

// Re-export commonly used types
pub use config::{AppConfig, CommandConfig, SupervisorConfig, TrayConfig};
pub use controller::{Notification, Severity, ToggleOutcome, TrayController};
pub use error::{Result, TrayError};
pub use process::{
    CommandLocator, ConfigValidator, LifecycleEvent, LifecycleState, ProcessSupervisor,
    ResolvedCommand, RunId, StatusNotifier, StatusSubscription, SupervisorOptions,
    ValidationReport, VersionProbe, VersionProbeResult,
};
