//! Helm manager API

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use chartfleet_common::Result;

use super::{segment, ApiClient, Endpoint};

/// Identifies one release on the Helm manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseQuery {
    /// Project code
    pub project_code: String,
    /// Target cluster
    pub cluster_id: String,
    /// Release namespace
    pub namespace: String,
    /// Release name, sent verbatim
    #[serde(rename = "releaseName")]
    pub name: String,
}

/// Identifies a chart in a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartQuery {
    /// Project code
    pub project_code: String,
    /// Repository name
    pub repository: String,
    /// Chart name
    pub chart_name: String,
}

/// Release as reported by the Helm manager
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReleaseDetail {
    /// Release name
    pub name: String,
    /// Release namespace
    pub namespace: String,
    /// Raw status string, e.g. `pending-install`
    pub status: String,
    /// Deployed chart version
    pub chart_version: String,
    /// Helm revision
    pub revision: i64,
    /// Status message
    pub message: String,
    /// Request ID of the response that carried this detail
    #[serde(skip)]
    pub request_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ChartInfo {
    latest_version: String,
}

/// Install request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallReleaseRequest {
    /// Release identity
    #[serde(flatten)]
    pub release: ReleaseQuery,
    /// Repository the chart comes from
    pub repository: String,
    /// Chart name
    pub chart: String,
    /// Chart version, always resolved before sending
    pub version: String,
    /// Values fragments, merged in order by the manager
    pub values: Vec<String>,
    /// Passthrough helm flags
    pub args: Vec<String>,
}

/// Upgrade request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeReleaseRequest {
    /// Release identity
    #[serde(flatten)]
    pub release: ReleaseQuery,
    /// Repository the chart comes from
    pub repository: String,
    /// Chart name
    pub chart: String,
    /// Target chart version
    pub version: String,
    /// Values fragments, merged in order by the manager
    pub values: Vec<String>,
    /// Passthrough helm flags
    pub args: Vec<String>,
}

/// Operations the Helm backend needs from the Helm manager
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HelmManagerApi: Send + Sync {
    /// Fetch one release; a missing release is a remote error with the
    /// not-found code
    async fn get_release_detail(&self, query: &ReleaseQuery) -> Result<ReleaseDetail>;

    /// Latest version of a chart
    async fn get_chart_latest_version(&self, query: &ChartQuery) -> Result<String>;

    /// Create a release
    async fn install_release(&self, request: &InstallReleaseRequest) -> Result<()>;

    /// Upgrade an existing release
    async fn upgrade_release(&self, request: &UpgradeReleaseRequest) -> Result<()>;

    /// Remove a release
    async fn uninstall_release(&self, query: &ReleaseQuery) -> Result<()>;
}

/// [`HelmManagerApi`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpHelmManager {
    client: ApiClient,
}

impl HttpHelmManager {
    /// Connect to the Helm manager at `endpoint`
    pub fn new(endpoint: &Endpoint, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: ApiClient::new("helm-manager", endpoint, timeout)?,
        })
    }

    fn release_path(query: &ReleaseQuery) -> String {
        format!(
            "helmmanager/v1/projects/{}/clusters/{}/namespaces/{}/releases/{}",
            segment(&query.project_code),
            segment(&query.cluster_id),
            segment(&query.namespace),
            segment(&query.name)
        )
    }
}

#[async_trait]
impl HelmManagerApi for HttpHelmManager {
    async fn get_release_detail(&self, query: &ReleaseQuery) -> Result<ReleaseDetail> {
        let op = "get_release_detail";
        let env = self
            .client
            .get::<ReleaseDetail>(op, &Self::release_path(query), &[])
            .await?;
        let request_id = env.request_id.clone();
        let mut detail = env.into_required(op)?;
        detail.request_id = request_id;
        Ok(detail)
    }

    async fn get_chart_latest_version(&self, query: &ChartQuery) -> Result<String> {
        let op = "get_chart_latest_version";
        let path = format!(
            "helmmanager/v1/projects/{}/repos/{}/charts/{}",
            segment(&query.project_code),
            segment(&query.repository),
            segment(&query.chart_name)
        );
        let info: ChartInfo = self.client.get(op, &path, &[]).await?.into_required(op)?;
        Ok(info.latest_version)
    }

    async fn install_release(&self, request: &InstallReleaseRequest) -> Result<()> {
        let op = "install_release";
        self.client
            .post::<_, serde_json::Value>(op, &Self::release_path(&request.release), request)
            .await?
            .check(op)
    }

    async fn upgrade_release(&self, request: &UpgradeReleaseRequest) -> Result<()> {
        let op = "upgrade_release";
        self.client
            .put::<_, serde_json::Value>(op, &Self::release_path(&request.release), request)
            .await?
            .check(op)
    }

    async fn uninstall_release(&self, query: &ReleaseQuery) -> Result<()> {
        let op = "uninstall_release";
        self.client
            .delete::<serde_json::Value>(op, &Self::release_path(query), &[])
            .await?
            .check(op)
    }
}
