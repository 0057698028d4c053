//! chartfleet CLI library

pub mod commands;
pub mod config;
pub mod error;

pub use error::{Error, Result};

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use chartfleet_common::telemetry::LogFormat;

/// chartfleet - chart release installer and federation rollout
#[derive(Parser, Debug)]
#[command(name = "chartfleet")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the chartfleet config file
    #[arg(long, global = true, env = config::CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Log output format (text or json)
    #[arg(long, global = true, default_value = "text", env = "CHARTFLEET_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Give up on the whole command after this many seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install, remove or inspect the federation control plane
    #[command(subcommand)]
    Federation(commands::federation::FederationCommand),
    /// Join or remove a sub-cluster
    #[command(subcommand)]
    Subcluster(commands::subcluster::SubclusterCommand),
    /// Operate on a single release through one backend
    #[command(subcommand)]
    Release(commands::release::ReleaseCommand),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        let config = config::FleetConfig::load(self.config.as_deref())?;
        let ctx = commands::call_context(self.timeout_secs);

        match self.command {
            Commands::Federation(cmd) => commands::federation::run(cmd, &config, &ctx).await,
            Commands::Subcluster(cmd) => commands::subcluster::run(cmd, &config, &ctx).await,
            Commands::Release(cmd) => commands::release::run(cmd, &config, &ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_federation_install() {
        let cli = Cli::try_parse_from([
            "chartfleet",
            "--log-format",
            "json",
            "federation",
            "install",
            "--project",
            "demo",
            "--host-cluster",
            "BCS-K8S-40000",
            "--user-token",
            "t0ken",
            "--load-balancer",
            "lb-123",
        ])
        .unwrap();

        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(
            cli.command,
            Commands::Federation(commands::federation::FederationCommand::Install(_))
        ));
    }

    #[test]
    fn release_requires_backend() {
        let res = Cli::try_parse_from([
            "chartfleet",
            "release",
            "status",
            "--project",
            "demo",
            "--cluster",
            "BCS-K8S-1",
            "--namespace",
            "default",
            "--name",
            "web",
            "--chart",
            "nginx",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from([
            "chartfleet",
            "subcluster",
            "leave",
            "--project",
            "demo",
            "--host-cluster",
            "BCS-K8S-40000",
            "--sub-cluster",
            "BCS-K8S-40001",
            "--timeout-secs",
            "60",
        ])
        .unwrap();
        assert_eq!(cli.timeout_secs, Some(60));
    }
}
