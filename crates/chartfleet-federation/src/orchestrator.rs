//! Federation control-plane install and teardown
//!
//! Host components are installed on the host cluster once per federation;
//! the whole set is skipped if any of them is already present. Sub-cluster
//! components live on the host cluster too, one release pair per joined
//! sub-cluster. Every step is idempotent, so a failed run is recovered by
//! running it again; there is no rollback.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use chartfleet_common::kubeconfig::MinimalKubeconfig;
use chartfleet_common::naming::ReleaseNamer;
use chartfleet_common::release::Release;
use chartfleet_common::{CallContext, Result};
use chartfleet_installer::{BackendFactory, BackendKind, BackendOptions, InstallerBackend};

use crate::charts::{FederationComponentSet, FederationProject, HostComponent, SubClusterComponent};
use crate::token::RegistrationToken;
use crate::values::{agent_values, estimator_values, host_values, LoadBalancerRef};

/// Inputs for installing the host components
#[derive(Debug, Clone)]
pub struct FederationInstall {
    /// Cluster the control plane runs on
    pub host_cluster_id: String,
    /// Identity the federation presents to its members
    pub federation_cluster_id: String,
    /// Narrowly scoped token the components use against the platform
    pub user_token: String,
    /// `lb-...` or `subnet-...` for the unified apiserver
    pub load_balancer: String,
    /// Caller values appended after defaults and rendered values
    pub values: Vec<String>,
}

/// Inputs for joining one sub-cluster
#[derive(Debug, Clone)]
pub struct SubClusterJoin {
    /// Cluster the control plane runs on
    pub host_cluster_id: String,
    /// Cluster being joined
    pub sub_cluster_id: String,
    /// URL of the federation apiserver the agent registers with
    pub parent_url: String,
    /// Gateway base URL that proxies to member clusters
    pub gateway_url: String,
    /// Bearer token for the sub-cluster kubeconfig
    pub gateway_token: String,
    /// Agent registration token; generated when absent
    pub registration_token: Option<RegistrationToken>,
    /// Caller values appended after defaults and rendered values
    pub values: Vec<String>,
}

/// Whether an install call changed anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Components were installed
    Installed,
    /// The federation was already present; nothing was done
    AlreadyInstalled,
}

/// Presence of one component's release
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentStatus {
    /// Component name
    pub component: String,
    /// Release name
    pub release: String,
    /// Whether the release exists
    pub installed: bool,
}

/// Closes the backend when dropped
struct Scoped(Box<dyn InstallerBackend>);

impl Deref for Scoped {
    type Target = dyn InstallerBackend;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl Drop for Scoped {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Installs and removes the federation control plane
pub struct FederationOrchestrator {
    factory: Arc<dyn BackendFactory>,
    project: FederationProject,
    components: FederationComponentSet,
    namer: ReleaseNamer,
    wait_timeout: Option<Duration>,
}

impl FederationOrchestrator {
    /// Orchestrator for `project` building backends from `factory`
    pub fn new(
        factory: Arc<dyn BackendFactory>,
        project: FederationProject,
        components: FederationComponentSet,
    ) -> Self {
        Self {
            factory,
            project,
            components,
            namer: ReleaseNamer::default(),
            wait_timeout: None,
        }
    }

    /// Use a different release namer
    pub fn with_namer(mut self, namer: ReleaseNamer) -> Self {
        self.namer = namer;
        self
    }

    /// After each install, wait up to `timeout` for the release to deploy
    pub fn wait_for_ready(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    /// Release for a host component
    pub fn host_release(&self, component: HostComponent) -> Release {
        let desc = self.components.host(component);
        desc.release(&self.project, &desc.release_name)
    }

    /// Release for a sub-cluster component of `sub_cluster_id`
    pub fn sub_cluster_release(
        &self,
        component: SubClusterComponent,
        sub_cluster_id: &str,
    ) -> Release {
        let desc = self.components.sub_cluster(component);
        let name = self.namer.name(&desc.release_name, sub_cluster_id);
        desc.release(&self.project, &name)
    }

    fn backend(&self, release: Release, options: BackendOptions) -> Result<Scoped> {
        Ok(Scoped(self.factory.build(BackendKind::Helm, release, options)?))
    }

    /// Whether any host component is installed, probing in install order and
    /// stopping at the first one found
    pub async fn is_installed_for_federation(
        &self,
        ctx: &CallContext,
        host_cluster_id: &str,
    ) -> Result<bool> {
        for component in HostComponent::ALL {
            let backend = self.backend(self.host_release(component), BackendOptions::default())?;
            if backend.is_installed(ctx, host_cluster_id).await? {
                debug!(component = %component, cluster = %host_cluster_id, "Federation component found");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Install the host components unless the federation already exists
    pub async fn install_federation(
        &self,
        ctx: &CallContext,
        req: &FederationInstall,
    ) -> Result<InstallOutcome> {
        let load_balancer = LoadBalancerRef::parse(&req.load_balancer)?;

        if self
            .is_installed_for_federation(ctx, &req.host_cluster_id)
            .await?
        {
            info!(cluster = %req.host_cluster_id, "Federation already installed, skipping");
            return Ok(InstallOutcome::AlreadyInstalled);
        }

        for component in HostComponent::ALL {
            let rendered = host_values(
                component,
                &req.federation_cluster_id,
                &req.user_token,
                Some(&load_balancer),
            )?;
            self.install_one(
                ctx,
                &component.to_string(),
                self.host_release(component),
                BackendOptions::default(),
                &req.host_cluster_id,
                rendered,
                &req.values,
            )
            .await?;
        }

        info!(cluster = %req.host_cluster_id, "Federation control plane installed");
        Ok(InstallOutcome::Installed)
    }

    /// Remove every host component that is present
    pub async fn uninstall_federation(&self, ctx: &CallContext, host_cluster_id: &str) -> Result<()> {
        for component in HostComponent::ALL {
            let release = self.host_release(component);
            info!(component = %component, release = %release.name, "Uninstalling federation component");
            let backend = self.backend(release, BackendOptions::default())?;
            backend.uninstall(ctx, host_cluster_id).await?;
        }
        Ok(())
    }

    /// Install the agent pair for one sub-cluster.
    ///
    /// The estimator agent is skipped when it already exists. The clusternet
    /// agent install is always issued, with no existence check.
    pub async fn install_sub_cluster(&self, ctx: &CallContext, req: &SubClusterJoin) -> Result<()> {
        let kubeconfig =
            MinimalKubeconfig::for_gateway(&req.gateway_url, &req.sub_cluster_id, &req.gateway_token);
        let token = req
            .registration_token
            .clone()
            .unwrap_or_else(RegistrationToken::generate);

        let agent = SubClusterComponent::ClusternetAgent;
        self.install_one(
            ctx,
            &agent.to_string(),
            self.sub_cluster_release(agent, &req.sub_cluster_id),
            BackendOptions::default(),
            &req.host_cluster_id,
            agent_values(&req.parent_url, &token, &kubeconfig, &req.sub_cluster_id)?,
            &req.values,
        )
        .await?;

        let estimator = SubClusterComponent::EstimatorAgent;
        self.install_one(
            ctx,
            &estimator.to_string(),
            self.sub_cluster_release(estimator, &req.sub_cluster_id),
            BackendOptions::skip_when_existed(),
            &req.host_cluster_id,
            estimator_values(&kubeconfig, &req.sub_cluster_id)?,
            &req.values,
        )
        .await?;

        info!(
            cluster = %req.host_cluster_id,
            sub_cluster = %req.sub_cluster_id,
            "Sub-cluster joined"
        );
        Ok(())
    }

    /// Remove the agent pair of one sub-cluster
    pub async fn uninstall_sub_cluster(
        &self,
        ctx: &CallContext,
        host_cluster_id: &str,
        sub_cluster_id: &str,
    ) -> Result<()> {
        for component in SubClusterComponent::ALL {
            let release = self.sub_cluster_release(component, sub_cluster_id);
            info!(
                component = %component,
                release = %release.name,
                sub_cluster = %sub_cluster_id,
                "Uninstalling sub-cluster component"
            );
            let backend = self.backend(release, BackendOptions::default())?;
            backend.uninstall(ctx, host_cluster_id).await?;
        }
        Ok(())
    }

    /// Presence of every host component, plus the agents of `sub_clusters`
    pub async fn federation_status(
        &self,
        ctx: &CallContext,
        host_cluster_id: &str,
        sub_clusters: &[String],
    ) -> Result<Vec<ComponentStatus>> {
        let mut releases: Vec<(String, Release)> = HostComponent::ALL
            .iter()
            .map(|c| (c.to_string(), self.host_release(*c)))
            .collect();
        for sub in sub_clusters {
            for c in SubClusterComponent::ALL {
                releases.push((format!("{}/{}", c, sub), self.sub_cluster_release(c, sub)));
            }
        }

        let mut statuses = Vec::with_capacity(releases.len());
        for (component, release) in releases {
            let name = release.name.clone();
            let backend = self.backend(release, BackendOptions::default())?;
            let installed = backend.is_installed(ctx, host_cluster_id).await?;
            statuses.push(ComponentStatus {
                component,
                release: name,
                installed,
            });
        }
        Ok(statuses)
    }

    #[allow(clippy::too_many_arguments)]
    async fn install_one(
        &self,
        ctx: &CallContext,
        component: &str,
        release: Release,
        options: BackendOptions,
        cluster_id: &str,
        rendered: String,
        caller_values: &[String],
    ) -> Result<()> {
        let release_name = release.name.clone();
        let backend = self.backend(release, options)?;

        let mut values = Vec::with_capacity(caller_values.len() + 1);
        values.push(rendered);
        values.extend_from_slice(caller_values);

        info!(component, release = %release_name, cluster = %cluster_id, "Installing component");
        if let Err(e) = backend.install(ctx, cluster_id, &values).await {
            warn!(component, release = %release_name, error = %e, "Component install failed");
            return Err(e);
        }

        if let Some(timeout) = self.wait_timeout {
            backend.check_app_status(ctx, cluster_id, timeout, false).await?;
        }
        Ok(())
    }
}
