//! Backend for the legacy application platform
//!
//! Creating an app needs two numeric IDs resolved first: the namespace
//! (created on demand, under the slower namespace retry policy) and the chart
//! version. The platform has no single-app lookup, so presence is a linear
//! scan of one listed page.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use chartfleet_common::poll::{poll_until_terminal, Probe, StatusCheck};
use chartfleet_common::release::{merge_values, Release, ReleaseStatus};
use chartfleet_common::retry::retry_transient;
use chartfleet_common::{CallContext, Error, Result};

use crate::api::{
    AppListQuery, CreateAppRequest, CreateNamespaceRequest, LegacyApp, LegacyAppApi,
    UpdateAppRequest,
};
use crate::handle::Handle;
use crate::{BackendKind, BackendSettings, InstallerBackend};

/// [`InstallerBackend`] for one app on the legacy platform
pub struct LegacyAppBackend<A> {
    release: Release,
    api: Handle<A>,
    settings: BackendSettings,
    skip_when_existed: bool,
}

impl<A: LegacyAppApi> LegacyAppBackend<A> {
    /// Backend for `release` over `api`
    pub fn new(release: Release, api: A, settings: BackendSettings) -> Self {
        Self {
            release,
            api: Handle::new(BackendKind::LegacyApp, api),
            settings,
            skip_when_existed: false,
        }
    }

    /// Make `install` a no-op when the app already exists
    pub fn skip_when_existed(mut self, skip: bool) -> Self {
        self.skip_when_existed = skip;
        self
    }

    async fn find_app(&self, ctx: &CallContext, cluster_id: &str) -> Result<Option<LegacyApp>> {
        let api = self.api.get()?;
        let api = api.as_ref();
        let query = AppListQuery {
            project_id: self.release.project_id.clone(),
            cluster_id: cluster_id.to_string(),
            namespace: self.release.namespace.clone(),
            page_size: self.settings.legacy_page_size,
        };
        let query = &query;

        let apps = retry_transient(ctx, &self.settings.retry, "list_apps", move || {
            api.list_apps(query)
        })
        .await?;

        Ok(apps.into_iter().find(|app| {
            app.matches(&self.release.name, cluster_id, &self.release.namespace)
        }))
    }

    async fn namespace_id(&self, ctx: &CallContext, cluster_id: &str) -> Result<i64> {
        let api = self.api.get()?;
        let api = api.as_ref();
        let project_id = self.release.project_id.as_str();

        let namespaces = retry_transient(ctx, &self.settings.retry, "list_namespaces", move || {
            api.list_namespaces(project_id, cluster_id)
        })
        .await?;
        if let Some(ns) = namespaces
            .iter()
            .find(|ns| ns.name == self.release.namespace)
        {
            return Ok(ns.id);
        }

        let request = CreateNamespaceRequest {
            project_id: project_id.to_string(),
            cluster_id: cluster_id.to_string(),
            name: self.release.namespace.clone(),
        };
        let request = &request;

        info!(
            cluster = %cluster_id,
            namespace = %request.name,
            "Creating namespace on legacy platform"
        );
        retry_transient(
            ctx,
            &self.settings.namespace_retry,
            "create_namespace",
            move || api.create_namespace(request),
        )
        .await
    }

    async fn chart_version_id(&self, ctx: &CallContext) -> Result<i64> {
        let api = self.api.get()?;
        let api = api.as_ref();
        let project_id = self.release.project_id.as_str();
        let chart = self.release.chart_name.as_str();

        let versions = retry_transient(ctx, &self.settings.retry, "list_chart_versions", move || {
            api.list_chart_versions(project_id, chart)
        })
        .await?;

        let found = if self.release.needs_version_lookup() {
            versions.first()
        } else {
            versions
                .iter()
                .find(|v| v.version == self.release.chart_version)
        };

        match found {
            Some(v) => {
                debug!(chart = %chart, version = %v.version, id = v.id, "Resolved chart version");
                Ok(v.id)
            }
            None => Err(Error::validation(format!(
                "chart {} has no version {}",
                chart,
                if self.release.needs_version_lookup() {
                    "at all"
                } else {
                    self.release.chart_version.as_str()
                }
            ))),
        }
    }

    async fn status(&self, ctx: &CallContext, cluster_id: &str) -> Result<ReleaseStatus> {
        Ok(match self.find_app(ctx, cluster_id).await? {
            Some(app) => app.status(),
            None => ReleaseStatus::NotFound,
        })
    }
}

#[async_trait]
impl<A: LegacyAppApi + 'static> InstallerBackend for LegacyAppBackend<A> {
    fn kind(&self) -> BackendKind {
        BackendKind::LegacyApp
    }

    async fn is_installed(&self, ctx: &CallContext, cluster_id: &str) -> Result<bool> {
        Ok(self.find_app(ctx, cluster_id).await?.is_some())
    }

    async fn install(&self, ctx: &CallContext, cluster_id: &str, values: &[String]) -> Result<()> {
        let label = self.release.label(cluster_id);

        if self.skip_when_existed && self.is_installed(ctx, cluster_id).await? {
            info!(release = %label, "App already exists, skipping install");
            return Ok(());
        }

        let namespace_id = self.namespace_id(ctx, cluster_id).await?;
        let chart_version_id = self.chart_version_id(ctx).await?;

        let api = self.api.get()?;
        let api = api.as_ref();
        let request = CreateAppRequest {
            project_id: self.release.project_id.clone(),
            cluster_id: cluster_id.to_string(),
            namespace_id,
            name: self.release.name.clone(),
            chart_version_id,
            values: merge_values(&self.release.merged_values(values))?,
        };
        let request = &request;

        info!(release = %label, namespace_id, chart_version_id, "Creating app");
        retry_transient(ctx, &self.settings.retry, "create_app", move || {
            api.create_app(request)
        })
        .await
    }

    async fn upgrade(&self, ctx: &CallContext, cluster_id: &str, values: &[String]) -> Result<()> {
        let label = self.release.label(cluster_id);

        let app = self.find_app(ctx, cluster_id).await?.ok_or_else(|| {
            Error::validation(format!("release {} is not installed, cannot upgrade", label))
        })?;
        let chart_version_id = self.chart_version_id(ctx).await?;

        let api = self.api.get()?;
        let api = api.as_ref();
        let request = UpdateAppRequest {
            project_id: self.release.project_id.clone(),
            app_id: app.id,
            chart_version_id,
            values: merge_values(&self.release.merged_values(values))?,
        };
        let request = &request;

        info!(release = %label, app_id = app.id, "Updating app");
        retry_transient(ctx, &self.settings.retry, "update_app", move || {
            api.update_app(request)
        })
        .await
    }

    async fn uninstall(&self, ctx: &CallContext, cluster_id: &str) -> Result<()> {
        let label = self.release.label(cluster_id);

        let Some(app) = self.find_app(ctx, cluster_id).await? else {
            debug!(release = %label, "App not installed, nothing to uninstall");
            return Ok(());
        };

        let api = self.api.get()?;
        let api = api.as_ref();
        let project_id = self.release.project_id.as_str();
        let app_id = app.id;

        info!(release = %label, app_id, "Deleting app");
        retry_transient(ctx, &self.settings.retry, "delete_app", move || {
            api.delete_app(project_id, app_id)
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

        poll_until_terminal(
            ctx,
            &self.settings.poll(timeout),
            "check_app_status",
            move || async move {
                match self.status(ctx, cluster_id).await {
                    Ok(status) => {
                        debug!(release = %name, cluster = %cluster_id, status = %status, "Observed app status");
                        check.classify(name, &status, None)
                    }
                    Err(e) => Probe::from_fetch_error("check_app_status", e),
                }
            },
        )
        .await
    }

    fn close(&self) {
        if self.api.close() {
            debug!(release = %self.release.name, "Closed legacy backend");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ChartVersionInfo, LegacyNamespace, MockLegacyAppApi};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn release() -> Release {
        Release::new("10086", "bcs-system", "bcs-cluster-autoscaler", "cluster-autoscaler")
    }

    fn backend(api: MockLegacyAppApi) -> LegacyAppBackend<MockLegacyAppApi> {
        LegacyAppBackend::new(release(), api, BackendSettings::default())
    }

    fn app(name: &str, cluster: &str, namespace: &str, id: i64) -> LegacyApp {
        LegacyApp {
            id,
            name: name.into(),
            cluster_id: cluster.into(),
            namespace: namespace.into(),
            transitioning_on: false,
            transitioning_result: true,
            transitioning_action: "create".into(),
            ..Default::default()
        }
    }

    fn versions() -> Vec<ChartVersionInfo> {
        vec![
            ChartVersionInfo {
                id: 31,
                version: "1.22.0".into(),
            },
            ChartVersionInfo {
                id: 30,
                version: "1.21.0".into(),
            },
        ]
    }

    // ==========================================================================
    // Story: presence is a linear scan of the app listing
    // ==========================================================================

    #[tokio::test(start_paused = true)]
    async fn only_exact_name_cluster_namespace_match_counts() {
        let mut api = MockLegacyAppApi::new();
        api.expect_list_apps()
            .withf(|q| q.page_size == 500 && q.cluster_id == "BCS-K8S-1")
            .returning(|_| {
                Ok(vec![
                    app("bcs-cluster-autoscaler", "BCS-K8S-2", "bcs-system", 1),
                    app("bcs-cluster-autoscaler", "BCS-K8S-1", "default", 2),
                    app("other", "BCS-K8S-1", "bcs-system", 3),
                ])
            });

        assert!(!backend(api)
            .is_installed(&CallContext::new(), "BCS-K8S-1")
            .await
            .unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn uninstall_deletes_the_matching_app_only() {
        let mut api = MockLegacyAppApi::new();
        api.expect_list_apps().returning(|_| {
            Ok(vec![
                app("other", "BCS-K8S-1", "bcs-system", 3),
                app("bcs-cluster-autoscaler", "BCS-K8S-1", "bcs-system", 7),
            ])
        });
        api.expect_delete_app()
            .withf(|project, id| project == "10086" && *id == 7)
            .times(1)
            .returning(|_, _| Ok(()));

        backend(api)
            .uninstall(&CallContext::new(), "BCS-K8S-1")
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn uninstall_of_missing_app_issues_no_mutation() {
        let mut api = MockLegacyAppApi::new();
        api.expect_list_apps().returning(|_| Ok(vec![]));
        api.expect_delete_app().times(0);

        backend(api)
            .uninstall(&CallContext::new(), "BCS-K8S-1")
            .await
            .unwrap();
    }

    // ==========================================================================
    // Story: install resolves namespace and chart-version IDs first
    // ==========================================================================

    #[tokio::test(start_paused = true)]
    async fn install_uses_existing_namespace_and_latest_version() {
        let mut api = MockLegacyAppApi::new();
        api.expect_list_namespaces().times(1).returning(|_, _| {
            Ok(vec![LegacyNamespace {
                id: 42,
                name: "bcs-system".into(),
                cluster_id: "BCS-K8S-1".into(),
            }])
        });
        api.expect_create_namespace().times(0);
        api.expect_list_chart_versions()
            .times(1)
            .returning(|_, _| Ok(versions()));
        api.expect_create_app()
            .withf(|r| r.namespace_id == 42 && r.chart_version_id == 31)
            .times(1)
            .returning(|_| Ok(()));

        backend(api)
            .install(&CallContext::new(), "BCS-K8S-1", &[])
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn install_resolves_pinned_version_id() {
        let mut api = MockLegacyAppApi::new();
        api.expect_list_namespaces().returning(|_, _| {
            Ok(vec![LegacyNamespace {
                id: 42,
                name: "bcs-system".into(),
                cluster_id: "BCS-K8S-1".into(),
            }])
        });
        api.expect_list_chart_versions()
            .returning(|_, _| Ok(versions()));
        api.expect_create_app()
            .withf(|r| r.chart_version_id == 30)
            .times(1)
            .returning(|_| Ok(()));

        LegacyAppBackend::new(
            release().with_version("1.21.0"),
            api,
            BackendSettings::default(),
        )
        .install(&CallContext::new(), "BCS-K8S-1", &[])
        .await
        .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_pinned_version_is_validation_error() {
        let mut api = MockLegacyAppApi::new();
        api.expect_list_namespaces()
            .returning(|_, _| Ok(vec![]));
        api.expect_create_namespace().returning(|_| Ok(1));
        api.expect_list_chart_versions()
            .returning(|_, _| Ok(versions()));
        api.expect_create_app().times(0);

        let err = LegacyAppBackend::new(
            release().with_version("9.9.9"),
            api,
            BackendSettings::default(),
        )
        .install(&CallContext::new(), "BCS-K8S-1", &[])
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn namespace_creation_retries_ten_times_ten_seconds_apart() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let mut api = MockLegacyAppApi::new();
        api.expect_list_namespaces()
            .returning(|_, _| Ok(vec![]));
        api.expect_create_namespace().returning(move |_| {
            let n = c.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 10 {
                Err(Error::transient("create_namespace", "namespace controller busy"))
            } else {
                Ok(99)
            }
        });
        api.expect_list_chart_versions()
            .returning(|_, _| Ok(versions()));
        api.expect_create_app()
            .withf(|r| r.namespace_id == 99)
            .times(1)
            .returning(|_| Ok(()));

        let started = tokio::time::Instant::now();
        backend(api)
            .install(&CallContext::new(), "BCS-K8S-1", &[])
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 10);
        // nine 10s waits between ten attempts
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(90) && elapsed < Duration::from_secs(100));
    }

    #[tokio::test(start_paused = true)]
    async fn namespace_creation_gives_up_after_ten_attempts() {
        let mut api = MockLegacyAppApi::new();
        api.expect_list_namespaces()
            .returning(|_, _| Ok(vec![]));
        api.expect_create_namespace()
            .times(10)
            .returning(|_| Err(Error::transient("create_namespace", "timeout")));
        api.expect_create_app().times(0);

        let err = backend(api)
            .install(&CallContext::new(), "BCS-K8S-1", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RetriesExhausted { attempts: 10, .. }));
    }

    // ==========================================================================
    // Story: status and upgrade
    // ==========================================================================

    #[tokio::test(start_paused = true)]
    async fn post_check_waits_for_transition_to_finish() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let mut api = MockLegacyAppApi::new();
        api.expect_list_apps().returning(move |_| {
            let n = c.fetch_add(1, Ordering::SeqCst);
            let mut a = app("bcs-cluster-autoscaler", "BCS-K8S-1", "bcs-system", 7);
            a.transitioning_on = n < 2;
            Ok(vec![a])
        });

        let ready = backend(api)
            .check_app_status(&CallContext::new(), "BCS-K8S-1", Duration::from_secs(300), false)
            .await
            .unwrap();
        assert!(ready);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn upgrade_of_missing_app_fails() {
        let mut api = MockLegacyAppApi::new();
        api.expect_list_apps().returning(|_| Ok(vec![]));
        api.expect_update_app().times(0);

        let err = backend(api)
            .upgrade(&CallContext::new(), "BCS-K8S-1", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn upgrade_updates_existing_app() {
        let mut api = MockLegacyAppApi::new();
        api.expect_list_apps().returning(|_| {
            Ok(vec![app("bcs-cluster-autoscaler", "BCS-K8S-1", "bcs-system", 7)])
        });
        api.expect_list_chart_versions()
            .returning(|_, _| Ok(versions()));
        api.expect_update_app()
            .withf(|r| r.app_id == 7 && r.chart_version_id == 31 && r.values.contains("replicas"))
            .times(1)
            .returning(|_| Ok(()));

        backend(api)
            .upgrade(&CallContext::new(), "BCS-K8S-1", &["replicas: 2".to_string()])
            .await
            .unwrap();
    }
}
