//! Federation commands - install, uninstall and inspect the host components
//!
//! Usage: chartfleet federation install --project <code> --host-cluster <id> --load-balancer <lb-...>

use std::path::PathBuf;

use clap::{Args, Subcommand};

use chartfleet_common::CallContext;
use chartfleet_federation::{FederationInstall, InstallOutcome};

use super::{orchestrator, print_json, read_values_files, OutputFormat, ProjectArgs};
use crate::config::FleetConfig;
use crate::Result;

#[derive(Subcommand, Debug)]
pub enum FederationCommand {
    /// Install the host components unless the federation already exists
    Install(InstallArgs),
    /// Remove the host components
    Uninstall(UninstallArgs),
    /// Show which federation releases exist
    Status(StatusArgs),
}

#[derive(Args, Debug)]
pub struct InstallArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Cluster that runs the control plane
    #[arg(long)]
    pub host_cluster: String,

    /// Cluster ID the federation presents (defaults to the host cluster)
    #[arg(long)]
    pub federation_cluster: Option<String>,

    /// Platform token for the federation components
    #[arg(long, env = "CHARTFLEET_USER_TOKEN", hide_env_values = true)]
    pub user_token: String,

    /// Load balancer (`lb-...`) or subnet (`subnet-...`) for the unified apiserver
    #[arg(long)]
    pub load_balancer: String,

    /// Extra values files, applied in order after the built-in values
    #[arg(short = 'f', long = "values")]
    pub values: Vec<PathBuf>,

    /// Wait this many seconds for each component to deploy (0 disables)
    #[arg(long)]
    pub wait_secs: Option<u64>,
}

#[derive(Args, Debug)]
pub struct UninstallArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Cluster that runs the control plane
    #[arg(long)]
    pub host_cluster: String,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Cluster that runs the control plane
    #[arg(long)]
    pub host_cluster: String,

    /// Also report the agents of these sub-clusters
    #[arg(long = "sub-cluster")]
    pub sub_clusters: Vec<String>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

pub async fn run(cmd: FederationCommand, config: &FleetConfig, ctx: &CallContext) -> Result<()> {
    match cmd {
        FederationCommand::Install(args) => install(args, config, ctx).await,
        FederationCommand::Uninstall(args) => uninstall(args, config, ctx).await,
        FederationCommand::Status(args) => status(args, config, ctx).await,
    }
}

async fn install(args: InstallArgs, config: &FleetConfig, ctx: &CallContext) -> Result<()> {
    let orchestrator = orchestrator(config, &args.project, args.wait_secs)?;
    let req = FederationInstall {
        federation_cluster_id: args
            .federation_cluster
            .unwrap_or_else(|| args.host_cluster.clone()),
        host_cluster_id: args.host_cluster,
        user_token: args.user_token,
        load_balancer: args.load_balancer,
        values: read_values_files(&args.values)?,
    };

    match orchestrator.install_federation(ctx, &req).await? {
        InstallOutcome::Installed => {
            println!("federation installed on {}", req.host_cluster_id)
        }
        InstallOutcome::AlreadyInstalled => {
            println!("federation already installed on {}, nothing to do", req.host_cluster_id)
        }
    }
    Ok(())
}

async fn uninstall(args: UninstallArgs, config: &FleetConfig, ctx: &CallContext) -> Result<()> {
    let orchestrator = orchestrator(config, &args.project, Some(0))?;
    orchestrator
        .uninstall_federation(ctx, &args.host_cluster)
        .await?;
    println!("federation uninstalled from {}", args.host_cluster);
    Ok(())
}

async fn status(args: StatusArgs, config: &FleetConfig, ctx: &CallContext) -> Result<()> {
    let orchestrator = orchestrator(config, &args.project, Some(0))?;
    let statuses = orchestrator
        .federation_status(ctx, &args.host_cluster, &args.sub_clusters)
        .await?;

    match args.output {
        OutputFormat::Json => print_json(&statuses)?,
        OutputFormat::Text => {
            println!("{:<48} {:<56} INSTALLED", "COMPONENT", "RELEASE");
            for s in &statuses {
                println!("{:<48} {:<56} {}", s.component, s.release, s.installed);
            }
        }
    }
    Ok(())
}
