//! Add-on manager API

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use chartfleet_common::Result;

use super::{segment, ApiClient, Endpoint};

/// Identifies one add-on on a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonQuery {
    /// Project code
    pub project_code: String,
    /// Target cluster
    pub cluster_id: String,
    /// Add-on name
    pub name: String,
}

/// Add-on as reported by the manager
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddonDetail {
    /// Add-on name
    pub name: String,
    /// Installed version
    pub version: String,
    /// Raw status string
    pub status: String,
    /// Status message
    pub message: String,
}

/// Install request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallAddonRequest {
    /// Add-on identity
    #[serde(flatten)]
    pub addon: AddonQuery,
    /// Version; empty lets the manager pick its default
    pub version: String,
    /// Values as one merged YAML document
    pub values: String,
}

/// Operations the add-ons backend needs from the add-on manager
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AddonsManagerApi: Send + Sync {
    /// Fetch one add-on; missing add-ons are a remote error with the
    /// not-found code
    async fn get_addon(&self, query: &AddonQuery) -> Result<AddonDetail>;

    /// Install an add-on
    async fn install_addon(&self, request: &InstallAddonRequest) -> Result<()>;

    /// Remove an add-on
    async fn uninstall_addon(&self, query: &AddonQuery) -> Result<()>;
}

/// [`AddonsManagerApi`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpAddonsManager {
    client: ApiClient,
}

impl HttpAddonsManager {
    /// Connect to the add-on manager at `endpoint`
    pub fn new(endpoint: &Endpoint, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: ApiClient::new("addons-manager", endpoint, timeout)?,
        })
    }

    fn addon_path(query: &AddonQuery) -> String {
        format!(
            "addonsmanager/v1/projects/{}/clusters/{}/addons/{}",
            segment(&query.project_code),
            segment(&query.cluster_id),
            segment(&query.name)
        )
    }
}

#[async_trait]
impl AddonsManagerApi for HttpAddonsManager {
    async fn get_addon(&self, query: &AddonQuery) -> Result<AddonDetail> {
        let op = "get_addon";
        self.client
            .get(op, &Self::addon_path(query), &[])
            .await?
            .into_required(op)
    }

    async fn install_addon(&self, request: &InstallAddonRequest) -> Result<()> {
        let op = "install_addon";
        self.client
            .post::<_, serde_json::Value>(op, &Self::addon_path(&request.addon), request)
            .await?
            .check(op)
    }

    async fn uninstall_addon(&self, query: &AddonQuery) -> Result<()> {
        let op = "uninstall_addon";
        self.client
            .delete::<serde_json::Value>(op, &Self::addon_path(query), &[])
            .await?
            .check(op)
    }
}
