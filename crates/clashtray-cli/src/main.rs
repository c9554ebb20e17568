//! Clash Tray CLI - terminal front-end for the proxy supervisor.
//!
//! Renders the same notifications and tooltip a tray icon would show, one
//! per line on stdout. Logs go to stderr.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use clashtray_core::TrayConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "clash-tray")]
#[command(about = "Start, stop and monitor a Clash/Mihomo proxy")]
struct Args {
    /// JSON settings file (defaults are used for missing fields)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the proxy configuration directory
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Print notifications as JSON lines
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Locate the proxy executable and print its version
    Check {
        /// Ignore the cached result
        #[arg(short, long)]
        force: bool,
    },
    /// Test the proxy configuration without starting it
    Test,
    /// Run the proxy until it exits or Ctrl-C is pressed
    Run,
    /// Open the dashboard, configuration directory or configuration file
    Open {
        #[arg(value_enum)]
        target: OpenTarget,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OpenTarget {
    Dashboard,
    Dir,
    File,
}

/// Compact log lines: timestamp, level, target (the emitting module) and message.
fn log_subscriber<W>(filter: EnvFilter, writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_thread_ids(false)
        .compact()
        .finish()
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing::subscriber::set_global_default(log_subscriber(filter, std::io::stderr))?;

    let mut config = TrayConfig::load_or_default(args.config.as_deref())?;
    if let Some(dir) = args.config_dir {
        config = config.with_config_dir(dir);
    }
    debug!(
        platform = clashtray_core::platform::current_platform(),
        config_dir = %config.config_dir.display(),
        "Using configuration"
    );

    let printer = output::Printer::new(args.json);
    let controller = clashtray_core::TrayController::new(config)?;

    info!("Starting {}", clashtray_core::AppConfig::APP_NAME);

    let ok = match args.command {
        Commands::Check { force } => commands::check(&controller, &printer, force).await,
        Commands::Test => commands::test(&controller, &printer).await,
        Commands::Run => commands::run(&controller, &printer).await?,
        Commands::Open { target } => commands::open(&controller, &printer, target),
    };
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_log_lines_carry_component() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = log_subscriber(EnvFilter::new("info"), move || writer.clone());

        tracing::subscriber::with_default(subscriber, || {
            info!("Proxy launched");
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("INFO"));
        assert!(output.contains("clashtray_cli"));
        assert!(output.contains("Proxy launched"));
    }

    #[test]
    fn test_parse_run_command() {
        let args = Args::try_parse_from(["clash-tray", "--debug", "run"]).unwrap();
        assert!(args.debug);
        assert!(matches!(args.command, Commands::Run));
    }
}
