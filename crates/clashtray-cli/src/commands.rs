//! Subcommand handlers.

use crate::output::Printer;
use crate::OpenTarget;
use clashtray_core::{LifecycleEvent, Notification, ToggleOutcome, TrayController};
use tracing::{info, warn};

pub async fn check(controller: &TrayController, printer: &Printer, force: bool) -> bool {
    match controller.check_command(force).await {
        Ok(resolved) => {
            if let Some(warning) = Notification::version_unknown(&resolved) {
                printer.notify(&warning);
            }
            info!(path = %resolved.path.display(), "Found {}", resolved.name);
            printer.tooltip(&controller.tooltip());
            true
        }
        Err(e) => {
            printer.notify(&Notification::from_error(&e));
            false
        }
    }
}

pub async fn test(controller: &TrayController, printer: &Printer) -> bool {
    match controller.validate_config().await {
        Ok(report) if report.ok => {
            info!("Configuration test passed");
            true
        }
        Ok(report) => {
            let err = clashtray_core::TrayError::ValidationFailed {
                diagnostic: report.diagnostic,
            };
            printer.notify(&Notification::from_error(&err));
            false
        }
        Err(e) => {
            printer.notify(&Notification::from_error(&e));
            false
        }
    }
}

/// Start the proxy and print each lifecycle event until the run ends.
pub async fn run(controller: &TrayController, printer: &Printer) -> anyhow::Result<bool> {
    let mut events = controller.subscribe();

    match controller.toggle().await {
        Ok(ToggleOutcome::Started(run)) => info!(run, "Proxy launched"),
        Ok(ToggleOutcome::StopRequested) => {
            warn!("A proxy run was already live, stop requested");
        }
        Err(e) => {
            printer.notify(&Notification::from_error(&e));
            return Ok(false);
        }
    }
    if let Some(warning) = controller
        .resolved_command()
        .as_ref()
        .and_then(Notification::version_unknown)
    {
        printer.notify(&warning);
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    return Ok(false);
                };
                report(controller, printer, &event);
                if event.is_terminal() {
                    return Ok(is_clean_exit(&event));
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Shutdown signal received, stopping proxy");
                if !controller.exit().await {
                    warn!("Proxy did not exit in time");
                }
                while let Some(event) = events.try_recv() {
                    report(controller, printer, &event);
                }
                return Ok(true);
            }
        }
    }
}

pub fn open(controller: &TrayController, printer: &Printer, target: OpenTarget) -> bool {
    let result = match target {
        OpenTarget::Dashboard => controller.open_dashboard(),
        OpenTarget::Dir => controller.open_config_dir(),
        OpenTarget::File => controller.open_config_file(),
    };
    match result {
        Ok(()) => true,
        Err(e) => {
            printer.notify(&Notification::from_error(&e));
            false
        }
    }
}

fn report(controller: &TrayController, printer: &Printer, event: &LifecycleEvent) {
    printer.notify(&Notification::from_event(event));
    printer.tooltip(&controller.tooltip());
}

fn is_clean_exit(event: &LifecycleEvent) -> bool {
    matches!(
        event,
        LifecycleEvent::Finished {
            exit_code: Some(0) | None,
            ..
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clashtray_core::TrayConfig;
    use tempfile::TempDir;

    #[test]
    fn test_clean_exit_classification() {
        let finished = LifecycleEvent::Finished {
            run: 1,
            exit_code: Some(0),
        };
        assert!(is_clean_exit(&finished));

        let failed = LifecycleEvent::FailedToStart {
            run: 1,
            diagnostic: String::new(),
        };
        assert!(!is_clean_exit(&failed));
    }

    #[tokio::test]
    async fn test_run_without_config_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let config = TrayConfig::default()
            .with_config_dir(temp_dir.path())
            .with_candidates(["clashtray-missing-a"]);
        let controller = TrayController::new(config).unwrap();

        let ok = run(&controller, &Printer::new(false)).await.unwrap();
        assert!(!ok);
        assert!(controller.supervisor().is_idle());
    }

    #[test]
    fn test_open_missing_config_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let config = TrayConfig::default().with_config_dir(temp_dir.path().join("missing"));
        let controller = TrayController::new(config).unwrap();

        assert!(!open(&controller, &Printer::new(false), OpenTarget::File));
    }
}
