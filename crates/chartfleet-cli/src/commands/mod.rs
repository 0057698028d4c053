//! CLI commands

use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, ValueEnum};
use serde::Serialize;
use tracing::warn;

use chartfleet_common::CallContext;
use chartfleet_federation::{FederationOrchestrator, FederationProject};
use chartfleet_installer::BackendFactory;

use crate::config::FleetConfig;
use crate::{Error, Result};

pub mod federation;
pub mod release;
pub mod subcluster;

/// Extension trait to convert errors with Display to CLI Error::CommandFailed.
pub trait CommandErrorExt<T> {
    /// Convert an error to `Error::CommandFailed` using its Display implementation.
    fn cmd_err(self) -> Result<T>;
}

impl<T, E: Display> CommandErrorExt<T> for std::result::Result<T, E> {
    fn cmd_err(self) -> Result<T> {
        self.map_err(|e| Error::command_failed(e.to_string()))
    }
}

/// Project selection shared by every command
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project code
    #[arg(long, env = "CHARTFLEET_PROJECT")]
    pub project: String,

    /// Project ID, when it differs from the code
    #[arg(long)]
    pub project_id: Option<String>,
}

impl ProjectArgs {
    pub fn federation_project(&self) -> FederationProject {
        FederationProject {
            project_id: self.project_id.clone().unwrap_or_else(|| self.project.clone()),
            project_code: self.project.clone(),
        }
    }
}

/// How status commands print
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Root context for one command: Ctrl-C cancels it, `--timeout-secs` bounds it.
///
/// Must be called inside the runtime.
pub fn call_context(timeout_secs: Option<u64>) -> CallContext {
    let root = CallContext::new();
    let canceller = root.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight calls");
            canceller.cancel();
        }
    });

    match timeout_secs {
        Some(secs) => root.with_timeout(Duration::from_secs(secs)),
        None => root,
    }
}

/// Read values files in the order given
pub fn read_values_files(paths: &[PathBuf]) -> Result<Vec<String>> {
    paths
        .iter()
        .map(|path| {
            std::fs::read_to_string(path).map_err(|e| Error::ReadFile {
                path: path.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}

/// Orchestrator over HTTP backends built from `config`.
///
/// `wait_secs` overrides the configured wait; zero disables waiting.
pub fn orchestrator(
    config: &FleetConfig,
    project: &ProjectArgs,
    wait_secs: Option<u64>,
) -> Result<FederationOrchestrator> {
    let factory: Arc<dyn BackendFactory> = Arc::new(config.installer_context()?);
    let orchestrator = FederationOrchestrator::new(
        factory,
        project.federation_project(),
        config.federation.components.clone(),
    );

    Ok(match wait_secs.or(config.federation.wait_timeout_secs) {
        Some(secs) if secs > 0 => orchestrator.wait_for_ready(Duration::from_secs(secs)),
        _ => orchestrator,
    })
}

/// Print `value` as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).cmd_err()?);
    Ok(())
}
