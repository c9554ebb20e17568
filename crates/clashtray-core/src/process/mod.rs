//! Process management module.
//!
//! Handles discovery, version probing, configuration testing and supervision
//! of the proxy executable.
//!
//! # Invocation contract
//!
//! | Purpose        | Command line                    |
//! |----------------|---------------------------------|
//! | version check  | `<command> -v`                  |
//! | config test    | `<command> -d <config_dir> -t`  |
//! | run            | `<command> -d <config_dir>`     |
//!
//! # Example
//!
//! ```rust,no_run
//! use clashtray_core::process::{run_args, CommandLocator, ConfigValidator, ProcessSupervisor};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> clashtray_core::Result<()> {
//!     let resolved = CommandLocator::default().resolve(&["mihomo", "clash"]).await?;
//!     let config_dir = Path::new("/home/me/.config/clash");
//!
//!     let report = ConfigValidator::validate(&resolved.name, config_dir).await;
//!     if !report.ok {
//!         eprintln!("{}", report.diagnostic);
//!         return Ok(());
//!     }
//!
//!     let supervisor = ProcessSupervisor::default();
//!     let mut events = supervisor.subscribe();
//!     supervisor.start(&resolved.name, run_args(config_dir))?;
//!     while let Some(event) = events.recv().await {
//!         println!("{:?}", event);
//!         if event.is_terminal() {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod events;
mod locator;
mod output;
mod probe;
mod supervisor;
mod validator;

pub use events::{LifecycleEvent, RunId, StatusNotifier, StatusSubscription};
pub use locator::{CommandLocator, LocatedCommand, ResolvedCommand};
pub use output::{OutputTail, SharedTail};
pub use probe::{match_version, match_version_with, VersionProbe, VersionProbeResult, VERSION_PATTERN};
pub use supervisor::{LifecycleState, ProcessSupervisor, RunInfo, SupervisorOptions};
pub use validator::{run_args, test_args, ConfigValidator, ValidationReport};
