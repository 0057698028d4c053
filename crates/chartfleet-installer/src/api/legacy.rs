//! Legacy application platform API
//!
//! The legacy platform addresses namespaces and chart versions by numeric ID
//! and has no single-app lookup, so callers list and scan.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use chartfleet_common::release::{DeployedVia, FailedOp, PendingOp, ReleaseStatus};
use chartfleet_common::Result;

use super::{segment, ApiClient, Endpoint};

/// Default page size for app listings
pub const DEFAULT_APP_PAGE_SIZE: u32 = 500;

/// Namespace known to the legacy platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LegacyNamespace {
    /// Numeric namespace ID
    pub id: i64,
    /// Namespace name
    pub name: String,
    /// Cluster the namespace lives in
    pub cluster_id: String,
}

/// Namespace creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateNamespaceRequest {
    /// Owning project
    pub project_id: String,
    /// Target cluster
    pub cluster_id: String,
    /// Namespace name
    pub name: String,
}

/// One version of a chart
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChartVersionInfo {
    /// Numeric chart-version ID
    pub id: i64,
    /// Version string
    pub version: String,
}

/// App listing filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppListQuery {
    /// Owning project
    pub project_id: String,
    /// Cluster filter
    pub cluster_id: String,
    /// Namespace filter
    pub namespace: String,
    /// Maximum number of apps returned
    pub page_size: u32,
}

/// Application as listed by the legacy platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LegacyApp {
    /// Numeric app ID
    pub id: i64,
    /// App (release) name
    pub name: String,
    /// Cluster the app runs in
    pub cluster_id: String,
    /// Namespace name
    pub namespace: String,
    /// Whether an operation is in flight
    pub transitioning_on: bool,
    /// Outcome of the last operation
    pub transitioning_result: bool,
    /// Last operation: `create`, `update`, `rollback` or `delete`
    pub transitioning_action: String,
    /// Message attached to the last operation
    pub transitioning_message: String,
}

impl LegacyApp {
    /// Whether this app is the release `name` in `cluster_id`/`namespace`
    pub fn matches(&self, name: &str, cluster_id: &str, namespace: &str) -> bool {
        self.name == name && self.cluster_id == cluster_id && self.namespace == namespace
    }

    /// Normalized status
    pub fn status(&self) -> ReleaseStatus {
        let action = self.transitioning_action.to_ascii_lowercase();
        if self.transitioning_on {
            return match action.as_str() {
                "update" | "upgrade" => ReleaseStatus::Pending(PendingOp::Upgrade),
                "rollback" => ReleaseStatus::Pending(PendingOp::Rollback),
                "delete" => ReleaseStatus::Pending(PendingOp::Uninstall),
                _ => ReleaseStatus::Pending(PendingOp::Install),
            };
        }
        if self.transitioning_result {
            return match action.as_str() {
                "update" | "upgrade" => ReleaseStatus::Deployed(DeployedVia::Upgrade),
                "rollback" => ReleaseStatus::Deployed(DeployedVia::Rollback),
                _ => ReleaseStatus::Deployed(DeployedVia::Install),
            };
        }
        match action.as_str() {
            "create" => ReleaseStatus::Failed(FailedOp::Install),
            "update" | "upgrade" => ReleaseStatus::Failed(FailedOp::Upgrade),
            "rollback" => ReleaseStatus::Failed(FailedOp::Rollback),
            "delete" => ReleaseStatus::Failed(FailedOp::Uninstall),
            _ => ReleaseStatus::Failed(FailedOp::State),
        }
    }
}

/// App creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateAppRequest {
    /// Owning project
    pub project_id: String,
    /// Target cluster
    pub cluster_id: String,
    /// Numeric namespace ID
    pub namespace_id: i64,
    /// App (release) name
    pub name: String,
    /// Numeric chart-version ID
    pub chart_version_id: i64,
    /// Values as one merged YAML document
    pub values: String,
}

/// App update request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateAppRequest {
    /// Owning project
    pub project_id: String,
    /// Numeric app ID
    pub app_id: i64,
    /// Numeric chart-version ID
    pub chart_version_id: i64,
    /// Values as one merged YAML document
    pub values: String,
}

/// Operations the legacy backend needs from the legacy platform
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LegacyAppApi: Send + Sync {
    /// Namespaces of a project in a cluster
    async fn list_namespaces(&self, project_id: &str, cluster_id: &str)
        -> Result<Vec<LegacyNamespace>>;

    /// Create a namespace, returning its ID
    async fn create_namespace(&self, request: &CreateNamespaceRequest) -> Result<i64>;

    /// Versions of a chart, newest first
    async fn list_chart_versions(
        &self,
        project_id: &str,
        chart_name: &str,
    ) -> Result<Vec<ChartVersionInfo>>;

    /// One page of apps
    async fn list_apps(&self, query: &AppListQuery) -> Result<Vec<LegacyApp>>;

    /// Create an app
    async fn create_app(&self, request: &CreateAppRequest) -> Result<()>;

    /// Update an app
    async fn update_app(&self, request: &UpdateAppRequest) -> Result<()>;

    /// Delete an app
    async fn delete_app(&self, project_id: &str, app_id: i64) -> Result<()>;
}

/// [`LegacyAppApi`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpLegacyApp {
    client: ApiClient,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Page<T> {
    count: i64,
    results: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Created {
    id: i64,
}

impl HttpLegacyApp {
    /// Connect to the legacy platform at `endpoint`
    pub fn new(endpoint: &Endpoint, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: ApiClient::new("legacy-app", endpoint, timeout)?,
        })
    }

    fn project_path(project_id: &str) -> String {
        format!("legacy/v1/projects/{}", segment(project_id))
    }
}

#[async_trait]
impl LegacyAppApi for HttpLegacyApp {
    async fn list_namespaces(
        &self,
        project_id: &str,
        cluster_id: &str,
    ) -> Result<Vec<LegacyNamespace>> {
        let op = "list_namespaces";
        let path = format!(
            "{}/clusters/{}/namespaces",
            Self::project_path(project_id),
            segment(cluster_id)
        );
        Ok(self
            .client
            .get(op, &path, &[])
            .await?
            .into_data(op)?
            .unwrap_or_default())
    }

    async fn create_namespace(&self, request: &CreateNamespaceRequest) -> Result<i64> {
        let op = "create_namespace";
        let path = format!(
            "{}/clusters/{}/namespaces",
            Self::project_path(&request.project_id),
            segment(&request.cluster_id)
        );
        let created: Created = self.client.post(op, &path, request).await?.into_required(op)?;
        Ok(created.id)
    }

    async fn list_chart_versions(
        &self,
        project_id: &str,
        chart_name: &str,
    ) -> Result<Vec<ChartVersionInfo>> {
        let op = "list_chart_versions";
        let path = format!(
            "{}/charts/{}/versions",
            Self::project_path(project_id),
            segment(chart_name)
        );
        Ok(self
            .client
            .get(op, &path, &[])
            .await?
            .into_data(op)?
            .unwrap_or_default())
    }

    async fn list_apps(&self, query: &AppListQuery) -> Result<Vec<LegacyApp>> {
        let op = "list_apps";
        let path = format!("{}/apps", Self::project_path(&query.project_id));
        let params = [
            ("cluster_id", query.cluster_id.clone()),
            ("namespace", query.namespace.clone()),
            ("limit", query.page_size.to_string()),
            ("offset", "0".to_string()),
        ];
        let page: Page<LegacyApp> = self
            .client
            .get(op, &path, &params)
            .await?
            .into_data(op)?
            .unwrap_or_default();
        if page.count > page.results.len() as i64 {
            tracing::debug!(
                total = page.count,
                listed = page.results.len(),
                "App listing truncated by page size"
            );
        }
        Ok(page.results)
    }

    async fn create_app(&self, request: &CreateAppRequest) -> Result<()> {
        let op = "create_app";
        let path = format!("{}/apps", Self::project_path(&request.project_id));
        self.client
            .post::<_, serde_json::Value>(op, &path, request)
            .await?
            .check(op)
    }

    async fn update_app(&self, request: &UpdateAppRequest) -> Result<()> {
        let op = "update_app";
        let path = format!(
            "{}/apps/{}",
            Self::project_path(&request.project_id),
            request.app_id
        );
        self.client
            .put::<_, serde_json::Value>(op, &path, request)
            .await?
            .check(op)
    }

    async fn delete_app(&self, project_id: &str, app_id: i64) -> Result<()> {
        let op = "delete_app";
        let path = format!("{}/apps/{}", Self::project_path(project_id), app_id);
        self.client
            .delete::<serde_json::Value>(op, &path, &[])
            .await?
            .check(op)
    }
}
