//! Backend for the add-on manager
//!
//! The add-on manager owns convergence for its add-ons, so status checks
//! report ready immediately and upgrades are left to the manager.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use chartfleet_common::release::{merge_values, Release};
use chartfleet_common::retry::retry_transient;
use chartfleet_common::{CallContext, Error, Result, REMOTE_NOT_FOUND_CODE};

use crate::api::{AddonQuery, AddonsManagerApi, InstallAddonRequest};
use crate::handle::Handle;
use crate::{BackendKind, BackendSettings, InstallerBackend};

/// [`InstallerBackend`] for one add-on
pub struct AddonsBackend<A> {
    release: Release,
    api: Handle<A>,
    settings: BackendSettings,
    skip_when_existed: bool,
}

impl<A: AddonsManagerApi> AddonsBackend<A> {
    /// Backend for `release` over `api`; the release name is the add-on name
    pub fn new(release: Release, api: A, settings: BackendSettings) -> Self {
        Self {
            release,
            api: Handle::new(BackendKind::Addons, api),
            settings,
            skip_when_existed: false,
        }
    }

    /// Make `install` a no-op when the add-on already exists
    pub fn skip_when_existed(mut self, skip: bool) -> Self {
        self.skip_when_existed = skip;
        self
    }

    fn query(&self, cluster_id: &str) -> AddonQuery {
        AddonQuery {
            project_code: self.release.project_code.clone(),
            cluster_id: cluster_id.to_string(),
            name: self.release.name.clone(),
        }
    }
}

#[async_trait]
impl<A: AddonsManagerApi + 'static> InstallerBackend for AddonsBackend<A> {
    fn kind(&self) -> BackendKind {
        BackendKind::Addons
    }

    async fn is_installed(&self, ctx: &CallContext, cluster_id: &str) -> Result<bool> {
        let api = self.api.get()?;
        let api = api.as_ref();
        let query = self.query(cluster_id);
        let query = &query;

        let res = retry_transient(ctx, &self.settings.retry, "get_addon", move || {
            api.get_addon(query)
        })
        .await;

        match res {
            Ok(_) => Ok(true),
            Err(Error::Remote { code, .. }) if code == REMOTE_NOT_FOUND_CODE => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn install(&self, ctx: &CallContext, cluster_id: &str, values: &[String]) -> Result<()> {
        let label = self.release.label(cluster_id);

        if self.skip_when_existed && self.is_installed(ctx, cluster_id).await? {
            info!(release = %label, "Add-on already exists, skipping install");
            return Ok(());
        }

        let api = self.api.get()?;
        let api = api.as_ref();
        let request = InstallAddonRequest {
            addon: self.query(cluster_id),
            version: self.release.chart_version.clone(),
            values: merge_values(&self.release.merged_values(values))?,
        };
        let request = &request;

        info!(release = %label, version = %request.version, "Installing add-on");
        retry_transient(ctx, &self.settings.retry, "install_addon", move || {
            api.install_addon(request)
        })
        .await
    }

    async fn upgrade(&self, _ctx: &CallContext, cluster_id: &str, _values: &[String]) -> Result<()> {
        debug!(
            release = %self.release.label(cluster_id),
            "Add-on upgrades are driven by the add-on manager, nothing to do"
        );
        Ok(())
    }

    async fn uninstall(&self, ctx: &CallContext, cluster_id: &str) -> Result<()> {
        let label = self.release.label(cluster_id);

        if !self.is_installed(ctx, cluster_id).await? {
            debug!(release = %label, "Add-on not installed, nothing to uninstall");
            return Ok(());
        }

        let api = self.api.get()?;
        let api = api.as_ref();
        let query = self.query(cluster_id);
        let query = &query;

        info!(release = %label, "Uninstalling add-on");
        retry_transient(ctx, &self.settings.retry, "uninstall_addon", move || {
            api.uninstall_addon(query)
        })
        .await
    }

    async fn check_app_status(
        &self,
        _ctx: &CallContext,
        _cluster_id: &str,
        _timeout: Duration,
        _pre: bool,
    ) -> Result<bool> {
        Ok(true)
    }

    fn close(&self) {
        if self.api.close() {
            debug!(release = %self.release.name, "Closed addons backend");
        }
    }
}
