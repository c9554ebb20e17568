//! Discovery of the installed proxy executable.

use super::probe::VersionProbe;
use crate::error::{Result, TrayError};
use crate::platform;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// A candidate that was found on PATH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedCommand {
    /// The candidate name as configured.
    pub name: String,
    /// What the OS lookup resolved it to.
    pub path: PathBuf,
}

/// A located command together with its probed version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub name: String,
    pub path: PathBuf,
    /// Version token, or "unknown".
    pub version: String,
    pub version_matched: bool,
}

/// Finds the first available command among ordered candidates.
#[derive(Debug, Clone)]
pub struct CommandLocator {
    lookup_timeout: Duration,
}

impl CommandLocator {
    pub fn new(lookup_timeout: Duration) -> Self {
        Self { lookup_timeout }
    }

    /// Return the first candidate present on PATH.
    ///
    /// Candidates after the first match are not checked. When nothing
    /// matches, the error lists every candidate tried.
    pub async fn locate<S: AsRef<str>>(&self, candidates: &[S]) -> Result<LocatedCommand> {
        let mut tried = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let name = candidate.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            tried.push(name.to_string());
            info!("Checking for command: {}", name);

            match platform::find_on_path(name, self.lookup_timeout).await {
                Ok(Some(path)) => {
                    info!("Found command {} at {}", name, path.display());
                    return Ok(LocatedCommand {
                        name: name.to_string(),
                        path,
                    });
                }
                Ok(None) => warn!("Command not found: {}", name),
                Err(e) => warn!("Lookup of {} failed: {}", name, e),
            }
        }

        warn!("None of the candidate commands were found: {:?}", tried);
        Err(TrayError::CommandNotFound { tried })
    }

    /// Locate a command and probe its version.
    pub async fn resolve<S: AsRef<str>>(&self, candidates: &[S]) -> Result<ResolvedCommand> {
        let located = self.locate(candidates).await?;
        let probe = VersionProbe::probe(&located.name).await;
        Ok(ResolvedCommand {
            name: located.name,
            path: located.path,
            version: probe.version,
            version_matched: probe.matched,
        })
    }
}

impl Default for CommandLocator {
    fn default() -> Self {
        Self::new(crate::config::SupervisorConfig::LOOKUP_TIMEOUT)
    }
}
