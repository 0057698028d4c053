//! Release commands - operate on one release through a single backend
//!
//! Usage: chartfleet release install --backend helm --project <code> --cluster <id> \
//!            --namespace <ns> --name <release> --chart <chart> [-f values.yaml]

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use serde::Serialize;
use tracing::{debug, info};

use chartfleet_common::{CallContext, Release};
use chartfleet_installer::{build_backend, BackendKind, BackendOptions, InstallerBackend};

use super::{print_json, read_values_files, OutputFormat, ProjectArgs};
use crate::config::FleetConfig;
use crate::Result;

#[derive(Subcommand, Debug)]
pub enum ReleaseCommand {
    /// Report whether the release exists, optionally waiting for it to deploy
    Status(StatusArgs),
    /// Install the release
    Install(InstallArgs),
    /// Upgrade the release
    Upgrade(UpgradeArgs),
    /// Uninstall the release; absent releases are not an error
    Uninstall(TargetArgs),
}

/// The release and the backend that manages it
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Backend: helm, addons or legacy
    #[arg(long)]
    pub backend: BackendKind,

    #[command(flatten)]
    pub project: ProjectArgs,

    /// Target cluster
    #[arg(long)]
    pub cluster: String,

    /// Release namespace
    #[arg(long)]
    pub namespace: String,

    /// Release name
    #[arg(long)]
    pub name: String,

    /// Chart name
    #[arg(long)]
    pub chart: String,

    /// Chart version (latest when omitted)
    #[arg(long, default_value = "")]
    pub version: String,

    /// Chart repository
    #[arg(long, default_value = "")]
    pub repository: String,

    /// Chart lives in the shared public repository
    #[arg(long)]
    pub public: bool,
}

impl TargetArgs {
    fn release(&self) -> Release {
        let project = self.project.federation_project();
        let release = Release::new(
            self.project.project.as_str(),
            self.namespace.as_str(),
            self.name.as_str(),
            self.chart.as_str(),
        )
        .with_project(project.project_id, project.project_code)
        .with_version(self.version.as_str())
        .with_repository(self.repository.as_str());

        if self.public {
            release.public()
        } else {
            release
        }
    }

    fn backend(
        &self,
        config: &FleetConfig,
        options: BackendOptions,
    ) -> Result<Box<dyn InstallerBackend>> {
        let installer = config.installer_context()?;
        Ok(build_backend(self.backend, &installer, self.release(), options)?)
    }
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Wait up to this many seconds for the release to deploy
    #[arg(long)]
    pub wait_secs: Option<u64>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

#[derive(Args, Debug)]
pub struct InstallArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Values files, applied in order
    #[arg(short = 'f', long = "values")]
    pub values: Vec<PathBuf>,

    /// Do nothing if the release already exists
    #[arg(long)]
    pub skip_existing: bool,

    /// Wait up to this many seconds for the release to deploy
    #[arg(long)]
    pub wait_secs: Option<u64>,
}

#[derive(Args, Debug)]
pub struct UpgradeArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Values files, applied in order
    #[arg(short = 'f', long = "values")]
    pub values: Vec<PathBuf>,

    /// Move the chart version too (Helm only; otherwise the deployed version is kept)
    #[arg(long)]
    pub upgrade_version: bool,

    /// Wait up to this many seconds for the release to deploy
    #[arg(long)]
    pub wait_secs: Option<u64>,
}

/// Machine-readable `release status` output
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseReport {
    release: String,
    backend: BackendKind,
    installed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    ready: Option<bool>,
}

pub async fn run(cmd: ReleaseCommand, config: &FleetConfig, ctx: &CallContext) -> Result<()> {
    match cmd {
        ReleaseCommand::Status(args) => status(args, config, ctx).await,
        ReleaseCommand::Install(args) => install(args, config, ctx).await,
        ReleaseCommand::Upgrade(args) => upgrade(args, config, ctx).await,
        ReleaseCommand::Uninstall(args) => uninstall(args, config, ctx).await,
    }
}

async fn status(args: StatusArgs, config: &FleetConfig, ctx: &CallContext) -> Result<()> {
    let target = &args.target;
    let backend = target.backend(config, BackendOptions::default())?;

    let installed = backend.is_installed(ctx, &target.cluster).await?;
    let ready = match args.wait_secs {
        Some(secs) if installed => Some(
            backend
                .check_app_status(ctx, &target.cluster, Duration::from_secs(secs), false)
                .await?,
        ),
        _ => None,
    };
    backend.close();

    let report = ReleaseReport {
        release: target.release().label(&target.cluster),
        backend: target.backend,
        installed,
        ready,
    };
    match args.output {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            let state = match (report.installed, report.ready) {
                (false, _) => "not installed",
                (true, Some(true)) => "deployed",
                (true, _) => "installed",
            };
            println!("{} ({}): {}", report.release, report.backend, state);
        }
    }
    Ok(())
}

async fn install(args: InstallArgs, config: &FleetConfig, ctx: &CallContext) -> Result<()> {
    let target = &args.target;
    let values = read_values_files(&args.values)?;
    let options = BackendOptions {
        skip_when_existed: args.skip_existing,
        ..Default::default()
    };
    let backend = target.backend(config, options)?;

    info!(release = %target.name, cluster = %target.cluster, backend = %target.backend, "Installing release");
    let res = async {
        backend.install(ctx, &target.cluster, &values).await?;
        wait(backend.as_ref(), ctx, &target.cluster, args.wait_secs).await
    }
    .await;
    backend.close();
    res?;

    println!("{} installed", target.release().label(&target.cluster));
    Ok(())
}

async fn upgrade(args: UpgradeArgs, config: &FleetConfig, ctx: &CallContext) -> Result<()> {
    let target = &args.target;
    let values = read_values_files(&args.values)?;
    let options = BackendOptions {
        upgrade_version: args.upgrade_version,
        ..Default::default()
    };
    let backend = target.backend(config, options)?;

    info!(release = %target.name, cluster = %target.cluster, backend = %target.backend, "Upgrading release");
    let res = async {
        backend.upgrade(ctx, &target.cluster, &values).await?;
        wait(backend.as_ref(), ctx, &target.cluster, args.wait_secs).await
    }
    .await;
    backend.close();
    res?;

    println!("{} upgraded", target.release().label(&target.cluster));
    Ok(())
}

async fn uninstall(target: TargetArgs, config: &FleetConfig, ctx: &CallContext) -> Result<()> {
    let backend = target.backend(config, BackendOptions::default())?;
    let res = backend.uninstall(ctx, &target.cluster).await;
    backend.close();
    res?;

    println!("{} uninstalled", target.release().label(&target.cluster));
    Ok(())
}

async fn wait(
    backend: &dyn InstallerBackend,
    ctx: &CallContext,
    cluster: &str,
    wait_secs: Option<u64>,
) -> Result<()> {
    let Some(secs) = wait_secs.filter(|s| *s > 0) else {
        return Ok(());
    };
    debug!(cluster = %cluster, timeout_secs = secs, "Waiting for release to deploy");
    backend
        .check_app_status(ctx, cluster, Duration::from_secs(secs), false)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(public: bool) -> TargetArgs {
        TargetArgs {
            backend: BackendKind::Helm,
            project: ProjectArgs {
                project: "demo".to_string(),
                project_id: Some("p-1".to_string()),
            },
            cluster: "BCS-K8S-1".to_string(),
            namespace: "web".to_string(),
            name: "nginx".to_string(),
            chart: "nginx".to_string(),
            version: String::new(),
            repository: String::new(),
            public,
        }
    }

    #[test]
    fn release_carries_project_id_and_code() {
        let release = target(false).release();
        assert_eq!(release.project_id, "p-1");
        assert_eq!(release.project_code, "demo");
        assert_eq!(release.namespace, "web");
        assert!(release.needs_version_lookup());
        assert!(!release.public);
    }

    #[test]
    fn public_flag_marks_release_public() {
        assert!(target(true).release().public);
    }

    #[test]
    fn building_without_endpoint_fails() {
        let err = target(false)
            .backend(&FleetConfig::default(), BackendOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, crate::Error::Chartfleet(_)));
    }
}
