//! Backend for the Helm release manager
//!
//! The only backend with the full status vocabulary. Upgrades are gated on a
//! pre-check so a release is never mutated mid-transition.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use chartfleet_common::poll::{poll_until_terminal, Probe, StatusCheck};
use chartfleet_common::release::{Release, ReleaseStatus};
use chartfleet_common::retry::retry_transient;
use chartfleet_common::{CallContext, Error, Result, REMOTE_NOT_FOUND_CODE};

use crate::api::{
    ChartQuery, HelmManagerApi, InstallReleaseRequest, ReleaseDetail, ReleaseQuery,
    UpgradeReleaseRequest,
};
use crate::handle::Handle;
use crate::{BackendKind, BackendSettings, InstallerBackend};

/// [`InstallerBackend`] for one release on the Helm manager
pub struct HelmBackend<A> {
    release: Release,
    api: Handle<A>,
    settings: BackendSettings,
    skip_when_existed: bool,
    upgrade_version: bool,
}

impl<A: HelmManagerApi> HelmBackend<A> {
    /// Backend for `release` over `api`
    pub fn new(release: Release, api: A, settings: BackendSettings) -> Self {
        Self {
            release,
            api: Handle::new(BackendKind::Helm, api),
            settings,
            skip_when_existed: false,
            upgrade_version: false,
        }
    }

    /// Make `install` a no-op when the release already exists
    pub fn skip_when_existed(mut self, skip: bool) -> Self {
        self.skip_when_existed = skip;
        self
    }

    /// Let `upgrade` move the chart to the release's version (or the latest
    /// one when unpinned). Without this, upgrades keep the deployed version.
    pub fn with_upgrade_version(mut self, upgrade: bool) -> Self {
        self.upgrade_version = upgrade;
        self
    }

    /// The release this backend drives
    pub fn release(&self) -> &Release {
        &self.release
    }

    fn query(&self, cluster_id: &str) -> ReleaseQuery {
        ReleaseQuery {
            project_code: self.release.project_code.clone(),
            cluster_id: cluster_id.to_string(),
            namespace: self.release.namespace.clone(),
            name: self.release.name.clone(),
        }
    }

    /// Release detail, `None` when the manager reports not-found
    async fn detail(&self, ctx: &CallContext, cluster_id: &str) -> Result<Option<ReleaseDetail>> {
        let api = self.api.get()?;
        let api = api.as_ref();
        let query = self.query(cluster_id);
        let query = &query;

        let res = retry_transient(ctx, &self.settings.retry, "get_release_detail", move || {
            api.get_release_detail(query)
        })
        .await;

        match res {
            Ok(detail) => Ok(Some(detail)),
            Err(Error::Remote { code, .. }) if code == REMOTE_NOT_FOUND_CODE => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn status(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
    ) -> Result<(ReleaseStatus, Option<String>)> {
        Ok(match self.detail(ctx, cluster_id).await? {
            Some(detail) => (
                ReleaseStatus::from_helm_manager(&detail.status),
                detail.request_id,
            ),
            None => (ReleaseStatus::NotFound, None),
        })
    }

    async fn latest_version(&self, ctx: &CallContext) -> Result<String> {
        let api = self.api.get()?;
        let api = api.as_ref();
        let query = ChartQuery {
            project_code: self.release.project_code.clone(),
            repository: self.release.effective_repository().to_string(),
            chart_name: self.release.chart_name.clone(),
        };
        let query = &query;

        let version = retry_transient(
            ctx,
            &self.settings.retry,
            "get_chart_latest_version",
            move || api.get_chart_latest_version(query),
        )
        .await?;

        if version.trim().is_empty() {
            return Err(Error::validation(format!(
                "no versions found for chart {} in repository {}",
                query.chart_name, query.repository
            )));
        }
        Ok(version)
    }
}

#[async_trait]
impl<A: HelmManagerApi + 'static> InstallerBackend for HelmBackend<A> {
    fn kind(&self) -> BackendKind {
        BackendKind::Helm
    }

    async fn is_installed(&self, ctx: &CallContext, cluster_id: &str) -> Result<bool> {
        let (status, _) = self.status(ctx, cluster_id).await?;
        Ok(status.exists())
    }

    async fn install(&self, ctx: &CallContext, cluster_id: &str, values: &[String]) -> Result<()> {
        let label = self.release.label(cluster_id);

        if self.skip_when_existed && self.is_installed(ctx, cluster_id).await? {
            info!(release = %label, "Release already exists, skipping install");
            return Ok(());
        }

        let version = if self.release.needs_version_lookup() {
            let latest = self.latest_version(ctx).await?;
            debug!(release = %label, version = %latest, "Resolved latest chart version");
            latest
        } else {
            self.release.chart_version.clone()
        };

        let api = self.api.get()?;
        let api = api.as_ref();
        let request = InstallReleaseRequest {
            release: self.query(cluster_id),
            repository: self.release.effective_repository().to_string(),
            chart: self.release.chart_name.clone(),
            version,
            values: self.release.merged_values(values),
            args: self.release.args.clone(),
        };
        let request = &request;

        info!(
            release = %label,
            chart = %request.chart,
            version = %request.version,
            "Installing release"
        );
        retry_transient(ctx, &self.settings.retry, "install_release", move || {
            api.install_release(request)
        })
        .await
    }

    async fn upgrade(&self, ctx: &CallContext, cluster_id: &str, values: &[String]) -> Result<()> {
        let label = self.release.label(cluster_id);

        let ready = self
            .check_app_status(ctx, cluster_id, self.settings.pre_check_timeout, true)
            .await?;
        if !ready {
            return Err(Error::validation(format!(
                "release {} is not installed, cannot upgrade",
                label
            )));
        }

        let version = if !self.upgrade_version {
            match self.detail(ctx, cluster_id).await? {
                Some(detail) if !detail.chart_version.is_empty() => detail.chart_version,
                _ => self.release.chart_version.clone(),
            }
        } else if self.release.needs_version_lookup() {
            self.latest_version(ctx).await?
        } else {
            self.release.chart_version.clone()
        };

        let api = self.api.get()?;
        let api = api.as_ref();
        let request = UpgradeReleaseRequest {
            release: self.query(cluster_id),
            repository: self.release.effective_repository().to_string(),
            chart: self.release.chart_name.clone(),
            version,
            values: self.release.merged_values(values),
            args: self.release.args.clone(),
        };
        let request = &request;

        info!(release = %label, version = %request.version, "Upgrading release");
        retry_transient(ctx, &self.settings.retry, "upgrade_release", move || {
            api.upgrade_release(request)
        })
        .await
    }

    async fn uninstall(&self, ctx: &CallContext, cluster_id: &str) -> Result<()> {
        let label = self.release.label(cluster_id);

        if !self.is_installed(ctx, cluster_id).await? {
            debug!(release = %label, "Release not installed, nothing to uninstall");
            return Ok(());
        }

        let api = self.api.get()?;
        let api = api.as_ref();
        let query = self.query(cluster_id);
        let query = &query;

        info!(release = %label, "Uninstalling release");
        retry_transient(ctx, &self.settings.retry, "uninstall_release", move || {
            api.uninstall_release(query)
        })
        .await
    }

    async fn check_app_status(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        timeout: Duration,
        pre: bool,
    ) -> Result<bool> {
        let check = StatusCheck::from_pre(pre);
        let name = self.release.name.as_str();
        let label = self.release.label(cluster_id);
        let label = label.as_str();

        poll_until_terminal(
            ctx,
            &self.settings.poll(timeout),
            "check_app_status",
            move || async move {
                match self.status(ctx, cluster_id).await {
                    Ok((status, request_id)) => {
                        debug!(
                            release = %label,
                            status = %status,
                            request_id = request_id.as_deref().unwrap_or("-"),
                            "Observed release status"
                        );
                        check.classify(name, &status, request_id.as_deref())
                    }
                    Err(e) => Probe::from_fetch_error("check_app_status", e),
                }
            },
        )
        .await
    }

    fn close(&self) {
        if self.api.close() {
            debug!(release = %self.release.name, "Closed helm backend");
        }
    }
}
