//! Orchestrator behavior over a recording in-memory backend factory

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use chartfleet_common::release::Release;
use chartfleet_common::{CallContext, Error, Result};
use chartfleet_federation::{
    FederationComponentSet, FederationInstall, FederationOrchestrator, FederationProject,
    InstallOutcome, RegistrationToken, SubClusterJoin,
};
use chartfleet_installer::{BackendFactory, BackendKind, BackendOptions, InstallerBackend};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Build { release: String, skip_when_existed: bool },
    IsInstalled { release: String },
    Install { release: String, values: Vec<String> },
    Uninstall { release: String },
    CheckStatus { release: String },
    Close { release: String },
}

#[derive(Default)]
struct State {
    installed: HashSet<(String, String)>,
    calls: Vec<Call>,
    fail_install: Option<String>,
}

#[derive(Clone, Default)]
struct RecordingFactory {
    state: Arc<Mutex<State>>,
}

impl RecordingFactory {
    fn preinstall(&self, cluster: &str, release: &str) {
        self.state
            .lock()
            .installed
            .insert((cluster.to_string(), release.to_string()));
    }

    fn fail_install_of(&self, release: &str) {
        self.state.lock().fail_install = Some(release.to_string());
    }

    fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    fn installs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Install { release, .. } => Some(release),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }
}

impl BackendFactory for RecordingFactory {
    fn build(
        &self,
        kind: BackendKind,
        release: Release,
        options: BackendOptions,
    ) -> Result<Box<dyn InstallerBackend>> {
        assert_eq!(kind, BackendKind::Helm);
        self.state.lock().calls.push(Call::Build {
            release: release.name.clone(),
            skip_when_existed: options.skip_when_existed,
        });
        Ok(Box::new(FakeBackend {
            release,
            options,
            state: self.state.clone(),
        }))
    }
}

struct FakeBackend {
    release: Release,
    options: BackendOptions,
    state: Arc<Mutex<State>>,
}

impl FakeBackend {
    fn key(&self, cluster: &str) -> (String, String) {
        (cluster.to_string(), self.release.name.clone())
    }

    fn record(&self, call: Call) {
        self.state.lock().calls.push(call);
    }
}

#[async_trait]
impl InstallerBackend for FakeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Helm
    }

    async fn is_installed(&self, _ctx: &CallContext, cluster_id: &str) -> Result<bool> {
        self.record(Call::IsInstalled {
            release: self.release.name.clone(),
        });
        Ok(self.state.lock().installed.contains(&self.key(cluster_id)))
    }

    async fn install(&self, ctx: &CallContext, cluster_id: &str, values: &[String]) -> Result<()> {
        if self.options.skip_when_existed && self.is_installed(ctx, cluster_id).await? {
            return Ok(());
        }
        self.record(Call::Install {
            release: self.release.name.clone(),
            values: self.release.merged_values(values),
        });
        let mut state = self.state.lock();
        if state.fail_install.as_deref() == Some(self.release.name.as_str()) {
            return Err(Error::remote("install_release", 40010, "chart rejected", None));
        }
        state.installed.insert(self.key(cluster_id));
        Ok(())
    }

    async fn upgrade(&self, _ctx: &CallContext, _cluster_id: &str, _values: &[String]) -> Result<()> {
        Ok(())
    }

    async fn uninstall(&self, ctx: &CallContext, cluster_id: &str) -> Result<()> {
        if !self.is_installed(ctx, cluster_id).await? {
            return Ok(());
        }
        self.record(Call::Uninstall {
            release: self.release.name.clone(),
        });
        self.state.lock().installed.remove(&self.key(cluster_id));
        Ok(())
    }

    async fn check_app_status(
        &self,
        _ctx: &CallContext,
        _cluster_id: &str,
        _timeout: Duration,
        _pre: bool,
    ) -> Result<bool> {
        self.record(Call::CheckStatus {
            release: self.release.name.clone(),
        });
        Ok(true)
    }

    fn close(&self) {
        self.record(Call::Close {
            release: self.release.name.clone(),
        });
    }
}

const HOST: &str = "BCS-K8S-40000";

fn orchestrator(factory: &RecordingFactory) -> FederationOrchestrator {
    FederationOrchestrator::new(
        Arc::new(factory.clone()),
        FederationProject::new("blueking"),
        FederationComponentSet::default(),
    )
}

fn install_request(load_balancer: &str) -> FederationInstall {
    FederationInstall {
        host_cluster_id: HOST.to_string(),
        federation_cluster_id: "BCS-K8S-90001".to_string(),
        user_token: "user-token".to_string(),
        load_balancer: load_balancer.to_string(),
        values: vec!["extra: true".to_string()],
    }
}

fn join_request(sub: &str) -> SubClusterJoin {
    SubClusterJoin {
        host_cluster_id: HOST.to_string(),
        sub_cluster_id: sub.to_string(),
        parent_url: "https://federation.example.com".to_string(),
        gateway_url: "https://gateway.example.com".to_string(),
        gateway_token: "gw-token".to_string(),
        registration_token: Some(RegistrationToken::from_string("reg-token")),
        values: vec![],
    }
}

// =============================================================================
// Story: installing the host control plane
// =============================================================================

#[tokio::test]
async fn fresh_install_installs_every_host_component_in_order() {
    let factory = RecordingFactory::default();
    let outcome = orchestrator(&factory)
        .install_federation(&CallContext::new(), &install_request("lb-123"))
        .await
        .unwrap();

    assert_eq!(outcome, InstallOutcome::Installed);
    assert_eq!(
        factory.installs(),
        vec![
            "clusternet-hub",
            "clusternet-scheduler",
            "clusternet-controller",
            "bcs-unified-apiserver",
        ]
    );

    let apiserver_values = factory
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::Install { release, values } if release == "bcs-unified-apiserver" => Some(values),
            _ => None,
        })
        .unwrap();
    // rendered values first, caller values last
    assert!(apiserver_values[0].contains("clusterId: BCS-K8S-90001"));
    assert!(apiserver_values[0].contains("id: lb-123"));
    assert_eq!(apiserver_values.last().unwrap(), "extra: true");
}

#[tokio::test]
async fn second_install_is_skipped_after_one_probe() {
    let factory = RecordingFactory::default();
    factory.preinstall(HOST, "clusternet-hub");

    let outcome = orchestrator(&factory)
        .install_federation(&CallContext::new(), &install_request("subnet-7"))
        .await
        .unwrap();

    assert_eq!(outcome, InstallOutcome::AlreadyInstalled);
    assert!(factory.installs().is_empty());
    assert_eq!(factory.count(|c| matches!(c, Call::IsInstalled { .. })), 1);
}

#[tokio::test]
async fn presence_probe_stops_at_first_installed_component() {
    let factory = RecordingFactory::default();
    factory.preinstall(HOST, "clusternet-scheduler");

    let installed = orchestrator(&factory)
        .is_installed_for_federation(&CallContext::new(), HOST)
        .await
        .unwrap();

    assert!(installed);
    let probed: Vec<_> = factory
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::IsInstalled { release } => Some(release),
            _ => None,
        })
        .collect();
    assert_eq!(probed, vec!["clusternet-hub", "clusternet-scheduler"]);
}

#[tokio::test]
async fn invalid_load_balancer_fails_before_any_remote_call() {
    let factory = RecordingFactory::default();
    let err = orchestrator(&factory)
        .install_federation(&CallContext::new(), &install_request("vpc-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation { .. }));
    assert!(factory.calls().is_empty());
}

#[tokio::test]
async fn first_failure_stops_the_remaining_components() {
    let factory = RecordingFactory::default();
    factory.fail_install_of("clusternet-scheduler");

    let err = orchestrator(&factory)
        .install_federation(&CallContext::new(), &install_request("lb-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Remote { code: 40010, .. }));
    assert_eq!(
        factory.installs(),
        vec!["clusternet-hub", "clusternet-scheduler"]
    );
}

#[tokio::test]
async fn every_built_backend_is_closed() {
    let factory = RecordingFactory::default();
    factory.fail_install_of("clusternet-controller");

    let _ = orchestrator(&factory)
        .install_federation(&CallContext::new(), &install_request("lb-1"))
        .await;

    let builds = factory.count(|c| matches!(c, Call::Build { .. }));
    let closes = factory.count(|c| matches!(c, Call::Close { .. }));
    assert!(builds > 0);
    assert_eq!(builds, closes);
}

#[tokio::test]
async fn wait_for_ready_post_checks_each_component() {
    let factory = RecordingFactory::default();
    orchestrator(&factory)
        .wait_for_ready(Duration::from_secs(600))
        .install_federation(&CallContext::new(), &install_request("lb-1"))
        .await
        .unwrap();

    assert_eq!(factory.count(|c| matches!(c, Call::CheckStatus { .. })), 4);
}

// =============================================================================
// Story: joining and leaving sub-clusters
// =============================================================================

#[tokio::test]
async fn join_names_releases_after_the_sub_cluster() {
    let factory = RecordingFactory::default();
    orchestrator(&factory)
        .install_sub_cluster(&CallContext::new(), &join_request("BCS-K8S-99999"))
        .await
        .unwrap();

    assert_eq!(
        factory.installs(),
        vec![
            "bcs-clusternet-agent-bcs-k8s-99999",
            "bcs-clusternet-estimator-agent-bcs-k8s-99999",
        ]
    );

    let agent_values = factory
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::Install { release, values } if release.starts_with("bcs-clusternet-agent") => {
                Some(values)
            }
            _ => None,
        })
        .unwrap();
    assert!(agent_values[0].contains("registrationToken: reg-token"));
    assert!(agent_values[0].contains("https://gateway.example.com/clusters/BCS-K8S-99999"));
}

#[tokio::test]
async fn only_the_estimator_agent_skips_when_present() {
    let factory = RecordingFactory::default();
    factory.preinstall(HOST, "bcs-clusternet-agent-bcs-k8s-1");
    factory.preinstall(HOST, "bcs-clusternet-estimator-agent-bcs-k8s-1");

    orchestrator(&factory)
        .install_sub_cluster(&CallContext::new(), &join_request("BCS-K8S-1"))
        .await
        .unwrap();

    let builds: Vec<_> = factory
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Build {
                release,
                skip_when_existed,
            } => Some((release, skip_when_existed)),
            _ => None,
        })
        .collect();
    assert_eq!(
        builds,
        vec![
            ("bcs-clusternet-agent-bcs-k8s-1".to_string(), false),
            ("bcs-clusternet-estimator-agent-bcs-k8s-1".to_string(), true),
        ]
    );
    // the agent is resubmitted, the estimator is not
    assert_eq!(factory.installs(), vec!["bcs-clusternet-agent-bcs-k8s-1"]);
}

#[tokio::test]
async fn leaving_is_idempotent() {
    let factory = RecordingFactory::default();
    let orch = orchestrator(&factory);
    let ctx = CallContext::new();

    orch.install_sub_cluster(&ctx, &join_request("BCS-K8S-2"))
        .await
        .unwrap();
    orch.uninstall_sub_cluster(&ctx, HOST, "BCS-K8S-2")
        .await
        .unwrap();
    orch.uninstall_sub_cluster(&ctx, HOST, "BCS-K8S-2")
        .await
        .unwrap();

    assert_eq!(factory.count(|c| matches!(c, Call::Uninstall { .. })), 2);
}

#[tokio::test]
async fn uninstalling_an_absent_federation_mutates_nothing() {
    let factory = RecordingFactory::default();
    orchestrator(&factory)
        .uninstall_federation(&CallContext::new(), HOST)
        .await
        .unwrap();

    assert_eq!(factory.count(|c| matches!(c, Call::Uninstall { .. })), 0);
    assert_eq!(factory.count(|c| matches!(c, Call::IsInstalled { .. })), 4);
}

#[tokio::test]
async fn status_reports_host_and_sub_cluster_components() {
    let factory = RecordingFactory::default();
    factory.preinstall(HOST, "clusternet-hub");
    factory.preinstall(HOST, "bcs-clusternet-agent-bcs-k8s-3");

    let statuses = orchestrator(&factory)
        .federation_status(&CallContext::new(), HOST, &["BCS-K8S-3".to_string()])
        .await
        .unwrap();

    assert_eq!(statuses.len(), 6);
    let installed: Vec<_> = statuses
        .iter()
        .filter(|s| s.installed)
        .map(|s| s.release.as_str())
        .collect();
    assert_eq!(installed, vec!["clusternet-hub", "bcs-clusternet-agent-bcs-k8s-3"]);
}
