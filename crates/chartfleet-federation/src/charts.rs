//! Chart descriptors for the federation control plane
//!
//! Host components are installed once per federation on the host cluster.
//! Sub-cluster components are installed on the host cluster once per joined
//! sub-cluster, under a release name derived from the sub-cluster ID.

use std::fmt;

use serde::{Deserialize, Serialize};

use chartfleet_common::release::Release;

/// Namespace the clusternet components run in
pub const CLUSTERNET_NAMESPACE: &str = "clusternet-system";

/// Namespace the unified apiserver runs in
pub const BCS_SYSTEM_NAMESPACE: &str = "bcs-system";

/// Static definition of one federation component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartDescriptor {
    /// Chart name
    pub chart_name: String,
    /// Chart version; empty resolves the latest at install time
    pub chart_version: String,
    /// Repository; empty with `public` set uses the public repository
    pub repository: String,
    /// Whether the chart is in the public repository
    pub public: bool,
    /// Release namespace
    pub namespace: String,
    /// Release name, or the name prefix for per-sub-cluster components
    pub release_name: String,
    /// Values fragment applied before rendered and caller values
    pub default_values: String,
}

impl Default for ChartDescriptor {
    fn default() -> Self {
        Self {
            chart_name: String::new(),
            chart_version: String::new(),
            repository: String::new(),
            public: true,
            namespace: CLUSTERNET_NAMESPACE.to_string(),
            release_name: String::new(),
            default_values: String::new(),
        }
    }
}

impl ChartDescriptor {
    /// Public chart `chart` released as `release_name` in `namespace`
    pub fn new(chart: &str, namespace: &str, release_name: &str) -> Self {
        Self {
            chart_name: chart.to_string(),
            namespace: namespace.to_string(),
            release_name: release_name.to_string(),
            ..Default::default()
        }
    }

    /// The release for this component under `release_name`
    pub fn release(&self, project: &FederationProject, release_name: &str) -> Release {
        let mut release = Release::new(
            project.project_code.clone(),
            self.namespace.clone(),
            release_name,
            self.chart_name.clone(),
        )
        .with_project(project.project_id.clone(), project.project_code.clone())
        .with_version(self.chart_version.clone())
        .with_repository(self.repository.clone());
        release.public = self.public;
        if !self.default_values.trim().is_empty() {
            release = release.with_values(self.default_values.clone());
        }
        release
    }
}

/// Project that owns every federation release
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederationProject {
    /// Project ID
    pub project_id: String,
    /// Project code
    pub project_code: String,
}

impl FederationProject {
    /// A project whose ID and code are the same
    pub fn new(project: impl Into<String>) -> Self {
        let project = project.into();
        Self {
            project_id: project.clone(),
            project_code: project,
        }
    }
}

/// Components installed once per federation, in install order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostComponent {
    /// clusternet hub
    Hub,
    /// clusternet scheduler
    Scheduler,
    /// clusternet controller manager
    Controller,
    /// BCS unified apiserver
    UnifiedApiserver,
}

impl HostComponent {
    /// Every host component in install order
    pub const ALL: [HostComponent; 4] = [
        HostComponent::Hub,
        HostComponent::Scheduler,
        HostComponent::Controller,
        HostComponent::UnifiedApiserver,
    ];
}

impl fmt::Display for HostComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hub => "hub",
            Self::Scheduler => "scheduler",
            Self::Controller => "controller",
            Self::UnifiedApiserver => "unified-apiserver",
        })
    }
}

/// Components installed once per joined sub-cluster, in install order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubClusterComponent {
    /// clusternet agent registering the sub-cluster with the hub
    ClusternetAgent,
    /// scheduler estimator agent
    EstimatorAgent,
}

impl SubClusterComponent {
    /// Every sub-cluster component in install order
    pub const ALL: [SubClusterComponent; 2] = [
        SubClusterComponent::ClusternetAgent,
        SubClusterComponent::EstimatorAgent,
    ];
}

impl fmt::Display for SubClusterComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ClusternetAgent => "clusternet-agent",
            Self::EstimatorAgent => "estimator-agent",
        })
    }
}

/// Every chart the federation control plane is made of
///
/// When deserialized, each descriptor starts from its default and only the
/// fields present in the input replace it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "ComponentSetOverrides")]
pub struct FederationComponentSet {
    /// clusternet hub
    pub hub: ChartDescriptor,
    /// clusternet scheduler
    pub scheduler: ChartDescriptor,
    /// clusternet controller manager
    pub controller: ChartDescriptor,
    /// BCS unified apiserver
    pub unified_apiserver: ChartDescriptor,
    /// clusternet agent; `release_name` is a prefix
    pub clusternet_agent: ChartDescriptor,
    /// estimator agent; `release_name` is a prefix
    pub estimator_agent: ChartDescriptor,
}

impl Default for FederationComponentSet {
    fn default() -> Self {
        Self {
            hub: ChartDescriptor::new("clusternet-hub", CLUSTERNET_NAMESPACE, "clusternet-hub"),
            scheduler: ChartDescriptor::new(
                "clusternet-scheduler",
                CLUSTERNET_NAMESPACE,
                "clusternet-scheduler",
            ),
            controller: ChartDescriptor::new(
                "clusternet-controller",
                CLUSTERNET_NAMESPACE,
                "clusternet-controller",
            ),
            unified_apiserver: ChartDescriptor::new(
                "bcs-unified-apiserver",
                BCS_SYSTEM_NAMESPACE,
                "bcs-unified-apiserver",
            ),
            clusternet_agent: ChartDescriptor::new(
                "clusternet-agent",
                CLUSTERNET_NAMESPACE,
                "bcs-clusternet-agent",
            ),
            estimator_agent: ChartDescriptor::new(
                "bcs-clusternet-estimator-agent",
                CLUSTERNET_NAMESPACE,
                "bcs-clusternet-estimator-agent",
            ),
        }
    }
}

impl FederationComponentSet {
    /// Descriptor for a host component
    pub fn host(&self, component: HostComponent) -> &ChartDescriptor {
        match component {
            HostComponent::Hub => &self.hub,
            HostComponent::Scheduler => &self.scheduler,
            HostComponent::Controller => &self.controller,
            HostComponent::UnifiedApiserver => &self.unified_apiserver,
        }
    }

    /// Descriptor for a sub-cluster component
    pub fn sub_cluster(&self, component: SubClusterComponent) -> &ChartDescriptor {
        match component {
            SubClusterComponent::ClusternetAgent => &self.clusternet_agent,
            SubClusterComponent::EstimatorAgent => &self.estimator_agent,
        }
    }
}

/// Partial descriptor read from configuration
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ChartOverride {
    chart_name: Option<String>,
    chart_version: Option<String>,
    repository: Option<String>,
    public: Option<bool>,
    namespace: Option<String>,
    release_name: Option<String>,
    default_values: Option<String>,
}

impl ChartOverride {
    fn apply(self, base: &mut ChartDescriptor) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }
        set(&mut base.chart_name, self.chart_name);
        set(&mut base.chart_version, self.chart_version);
        set(&mut base.repository, self.repository);
        set(&mut base.public, self.public);
        set(&mut base.namespace, self.namespace);
        set(&mut base.release_name, self.release_name);
        set(&mut base.default_values, self.default_values);
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ComponentSetOverrides {
    hub: ChartOverride,
    scheduler: ChartOverride,
    controller: ChartOverride,
    unified_apiserver: ChartOverride,
    clusternet_agent: ChartOverride,
    estimator_agent: ChartOverride,
}

impl From<ComponentSetOverrides> for FederationComponentSet {
    fn from(o: ComponentSetOverrides) -> Self {
        let mut set = Self::default();
        o.hub.apply(&mut set.hub);
        o.scheduler.apply(&mut set.scheduler);
        o.controller.apply(&mut set.controller);
        o.unified_apiserver.apply(&mut set.unified_apiserver);
        o.clusternet_agent.apply(&mut set.clusternet_agent);
        o.estimator_agent.apply(&mut set.estimator_agent);
        set
    }
}
