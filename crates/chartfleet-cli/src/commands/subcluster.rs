//! Sub-cluster commands - join a member cluster to a federation or remove it
//!
//! Usage: chartfleet subcluster join --project <code> --host-cluster <id> --sub-cluster <id> ...

use std::path::PathBuf;

use clap::{Args, Subcommand};

use chartfleet_common::CallContext;
use chartfleet_federation::{RegistrationToken, SubClusterJoin};

use super::{orchestrator, read_values_files, ProjectArgs};
use crate::config::FleetConfig;
use crate::Result;

#[derive(Subcommand, Debug)]
pub enum SubclusterCommand {
    /// Install the agent and estimator for a sub-cluster
    Join(JoinArgs),
    /// Remove the agent and estimator of a sub-cluster
    Leave(LeaveArgs),
}

#[derive(Args, Debug)]
pub struct JoinArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Cluster that runs the control plane
    #[arg(long)]
    pub host_cluster: String,

    /// Cluster being joined
    #[arg(long)]
    pub sub_cluster: String,

    /// Federation apiserver URL the agent registers with
    #[arg(long)]
    pub parent_url: String,

    /// Gateway that proxies to member clusters
    #[arg(long, env = "CHARTFLEET_GATEWAY_URL")]
    pub gateway_url: String,

    /// Bearer token for the gateway
    #[arg(long, env = "CHARTFLEET_GATEWAY_TOKEN", hide_env_values = true)]
    pub gateway_token: String,

    /// Registration token for the agent (generated when omitted)
    #[arg(long, env = "CHARTFLEET_REGISTRATION_TOKEN", hide_env_values = true)]
    pub registration_token: Option<String>,

    /// Extra values files, applied in order after the built-in values
    #[arg(short = 'f', long = "values")]
    pub values: Vec<PathBuf>,

    /// Wait this many seconds for each component to deploy (0 disables)
    #[arg(long)]
    pub wait_secs: Option<u64>,
}

#[derive(Args, Debug)]
pub struct LeaveArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Cluster that runs the control plane
    #[arg(long)]
    pub host_cluster: String,

    /// Cluster being removed
    #[arg(long)]
    pub sub_cluster: String,
}

pub async fn run(cmd: SubclusterCommand, config: &FleetConfig, ctx: &CallContext) -> Result<()> {
    match cmd {
        SubclusterCommand::Join(args) => join(args, config, ctx).await,
        SubclusterCommand::Leave(args) => leave(args, config, ctx).await,
    }
}

async fn join(args: JoinArgs, config: &FleetConfig, ctx: &CallContext) -> Result<()> {
    let orchestrator = orchestrator(config, &args.project, args.wait_secs)?;
    let req = SubClusterJoin {
        host_cluster_id: args.host_cluster,
        sub_cluster_id: args.sub_cluster,
        parent_url: args.parent_url,
        gateway_url: args.gateway_url,
        gateway_token: args.gateway_token,
        registration_token: args.registration_token.map(RegistrationToken::from_string),
        values: read_values_files(&args.values)?,
    };

    orchestrator.install_sub_cluster(ctx, &req).await?;
    println!(
        "sub-cluster {} joined via {}",
        req.sub_cluster_id, req.host_cluster_id
    );
    Ok(())
}

async fn leave(args: LeaveArgs, config: &FleetConfig, ctx: &CallContext) -> Result<()> {
    let orchestrator = orchestrator(config, &args.project, Some(0))?;
    orchestrator
        .uninstall_sub_cluster(ctx, &args.host_cluster, &args.sub_cluster)
        .await?;
    println!(
        "sub-cluster {} removed from {}",
        args.sub_cluster, args.host_cluster
    );
    Ok(())
}
