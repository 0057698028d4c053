//! Release identity, normalized status, and the remote response envelope

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, PUBLIC_REPOSITORY};

/// One chart deployed (or to be deployed) into a namespace under a name.
///
/// The target cluster is supplied per call; everything else is fixed once an
/// install has been issued. An upgrade supersedes `values` and
/// `chart_version` only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Numeric or opaque project identifier
    pub project_id: String,
    /// Human-readable project code (used by the Helm manager)
    pub project_code: String,
    /// Namespace the release lives in
    pub namespace: String,
    /// Release name, unique per (project, cluster, namespace)
    pub name: String,
    /// Chart to install
    pub chart_name: String,
    /// Chart version; empty means "resolve latest at install time"
    pub chart_version: String,
    /// Chart repository; ignored when `public` is set and this is empty
    pub repository: String,
    /// Whether the chart lives in the shared public repository
    pub public: bool,
    /// Values fragments merged last-wins
    pub values: Vec<String>,
    /// Extra helm-style flags passed through to the backend
    pub args: Vec<String>,
}

impl Release {
    /// Create a release with no version pin, values, or flags
    pub fn new(
        project: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        chart_name: impl Into<String>,
    ) -> Self {
        let project = project.into();
        Self {
            project_id: project.clone(),
            project_code: project,
            namespace: namespace.into(),
            name: name.into(),
            chart_name: chart_name.into(),
            ..Default::default()
        }
    }

    /// Set distinct project ID and project code
    pub fn with_project(mut self, id: impl Into<String>, code: impl Into<String>) -> Self {
        self.project_id = id.into();
        self.project_code = code.into();
        self
    }

    /// Pin the chart version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.chart_version = version.into();
        self
    }

    /// Use a named repository
    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = repository.into();
        self
    }

    /// Mark the chart as coming from the public repository
    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    /// Append a values fragment
    pub fn with_values(mut self, fragment: impl Into<String>) -> Self {
        self.values.push(fragment.into());
        self
    }

    /// Append a passthrough flag
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Whether the version must be looked up before installing
    pub fn needs_version_lookup(&self) -> bool {
        self.chart_version.trim().is_empty()
    }

    /// Repository the chart is resolved from
    pub fn effective_repository(&self) -> &str {
        if self.repository.is_empty() && self.public {
            PUBLIC_REPOSITORY
        } else {
            &self.repository
        }
    }

    /// Release values followed by per-call values, in merge order
    pub fn merged_values(&self, extra: &[String]) -> Vec<String> {
        self.values.iter().chain(extra).cloned().collect()
    }

    /// Identity label used in logs and errors
    pub fn label(&self, cluster_id: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.project_code, cluster_id, self.namespace, self.name
        )
    }
}

/// Deep-merge YAML values fragments, later fragments winning.
///
/// Mappings merge key by key; any other value (scalar or sequence) is
/// replaced whole. Blank fragments are skipped, and no fragments at all yield
/// an empty string.
pub fn merge_values(fragments: &[String]) -> Result<String> {
    let mut merged: Option<serde_yaml::Value> = None;
    for fragment in fragments.iter().filter(|f| !f.trim().is_empty()) {
        let value: serde_yaml::Value = serde_yaml::from_str(fragment)?;
        merged = Some(match merged {
            Some(base) => merge_value(base, value),
            None => value,
        });
    }
    match merged {
        Some(value) => Ok(serde_yaml::to_string(&value)?),
        None => Ok(String::new()),
    }
}

fn merge_value(base: serde_yaml::Value, overlay: serde_yaml::Value) -> serde_yaml::Value {
    use serde_yaml::Value;
    match (base, overlay) {
        (Value::Mapping(mut base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => {
                        let current = std::mem::take(existing);
                        *existing = merge_value(current, value);
                    }
                    None => {
                        base.insert(key, value);
                    }
                }
            }
            Value::Mapping(base)
        }
        (_, overlay) => overlay,
    }
}

/// In-flight operation a pending release is performing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingOp {
    /// First install in progress
    Install,
    /// Upgrade in progress
    Upgrade,
    /// Rollback in progress
    Rollback,
    /// Removal in progress
    Uninstall,
}

/// Operation that produced a deployed release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeployedVia {
    /// Deployed by the first install
    Install,
    /// Deployed by an upgrade
    Upgrade,
    /// Deployed by a rollback
    Rollback,
}

/// Operation (or steady state) that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailedOp {
    /// Install failed
    Install,
    /// Upgrade failed
    Upgrade,
    /// Rollback failed
    Rollback,
    /// Removal failed
    Uninstall,
    /// Release is in a failed state with no recorded operation
    State,
}

/// Release status normalized across every backend's vocabulary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseStatus {
    /// The remote has no such release
    NotFound,
    /// An operation is in flight
    Pending(PendingOp),
    /// Running successfully
    Deployed(DeployedVia),
    /// Settled into a failure
    Failed(FailedOp),
    /// A status string this layer does not recognize; never terminal
    Unknown(String),
}

impl ReleaseStatus {
    /// Parse the Helm manager's status vocabulary
    pub fn from_helm_manager(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending-install" => Self::Pending(PendingOp::Install),
            "pending-upgrade" => Self::Pending(PendingOp::Upgrade),
            "pending-rollback" => Self::Pending(PendingOp::Rollback),
            "uninstalling" | "pending-uninstall" => Self::Pending(PendingOp::Uninstall),
            "deployed" => Self::Deployed(DeployedVia::Install),
            "upgraded" => Self::Deployed(DeployedVia::Upgrade),
            "rolled-back" | "rollbacked" => Self::Deployed(DeployedVia::Rollback),
            "failed-install" => Self::Failed(FailedOp::Install),
            "failed-upgrade" => Self::Failed(FailedOp::Upgrade),
            "failed-rollback" => Self::Failed(FailedOp::Rollback),
            "failed-uninstall" => Self::Failed(FailedOp::Uninstall),
            "failed" | "failed-state" => Self::Failed(FailedOp::State),
            "uninstalled" | "not-found" => Self::NotFound,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Whether the release is deployed, by any operation
    pub fn is_deployed(&self) -> bool {
        matches!(self, Self::Deployed(_))
    }

    /// Whether the release settled into a failure
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Whether the remote will not transition without a new operation
    pub fn is_terminal(&self) -> bool {
        self.is_deployed() || self.is_failed()
    }

    /// Whether the release exists on the remote at all
    pub fn exists(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not-found",
            Self::Pending(PendingOp::Install) => "pending-install",
            Self::Pending(PendingOp::Upgrade) => "pending-upgrade",
            Self::Pending(PendingOp::Rollback) => "pending-rollback",
            Self::Pending(PendingOp::Uninstall) => "uninstalling",
            Self::Deployed(DeployedVia::Install) => "deployed",
            Self::Deployed(DeployedVia::Upgrade) => "upgraded",
            Self::Deployed(DeployedVia::Rollback) => "rolled-back",
            Self::Failed(FailedOp::Install) => "failed-install",
            Self::Failed(FailedOp::Upgrade) => "failed-upgrade",
            Self::Failed(FailedOp::Rollback) => "failed-rollback",
            Self::Failed(FailedOp::Uninstall) => "failed-uninstall",
            Self::Failed(FailedOp::State) => "failed",
            Self::Unknown(raw) => return write!(f, "unknown({})", raw),
        };
        f.write_str(s)
    }
}

/// Response envelope shared by every remote manager
///
/// `code == 0` means success. The Helm manager additionally sets `result`,
/// which must be true on success when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    /// Business code; 0 is success
    #[serde(default)]
    pub code: i64,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
    /// Remote request ID for correlation
    #[serde(
        default,
        alias = "requestID",
        alias = "request_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub request_id: Option<String>,
    /// Helm manager success flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<bool>,
    /// Payload
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// A successful envelope carrying `data`
    pub fn ok(data: T) -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            request_id: None,
            result: Some(true),
            data: Some(data),
        }
    }

    /// A failed envelope with a business code
    pub fn failure(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            request_id: None,
            result: Some(false),
            data: None,
        }
    }

    /// Attach a request ID
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Whether the remote accepted the request
    pub fn is_success(&self) -> bool {
        self.code == 0 && self.result != Some(false)
    }

    /// Convert a rejected envelope into a permanent error
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.is_success() {
            return Ok(());
        }
        // result=false with code 0 still has to surface as a non-zero code
        let code = if self.code == 0 { -1 } else { self.code };
        Err(Error::remote(
            operation,
            code,
            self.message.clone(),
            self.request_id.clone(),
        ))
    }

    /// Check the envelope and take its payload
    pub fn into_data(self, operation: &str) -> Result<Option<T>> {
        self.check(operation)?;
        Ok(self.data)
    }

    /// Check the envelope and require a payload
    pub fn into_required(self, operation: &str) -> Result<T> {
        let request_id = self.request_id.clone();
        self.into_data(operation)?.ok_or_else(|| {
            Error::serialization_of(
                operation,
                format!(
                    "response carried no data (request_id={})",
                    request_id.as_deref().unwrap_or("-")
                ),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helm_manager_vocabulary_normalizes() {
        assert_eq!(
            ReleaseStatus::from_helm_manager("pending-install"),
            ReleaseStatus::Pending(PendingOp::Install)
        );
        assert_eq!(
            ReleaseStatus::from_helm_manager("uninstalling"),
            ReleaseStatus::Pending(PendingOp::Uninstall)
        );
        assert_eq!(
            ReleaseStatus::from_helm_manager("DEPLOYED"),
            ReleaseStatus::Deployed(DeployedVia::Install)
        );
        assert_eq!(
            ReleaseStatus::from_helm_manager("failed-upgrade"),
            ReleaseStatus::Failed(FailedOp::Upgrade)
        );
        assert_eq!(
            ReleaseStatus::from_helm_manager("failed"),
            ReleaseStatus::Failed(FailedOp::State)
        );
        assert_eq!(
            ReleaseStatus::from_helm_manager("uninstalled"),
            ReleaseStatus::NotFound
        );
        assert_eq!(
            ReleaseStatus::from_helm_manager("superseded"),
            ReleaseStatus::Unknown("superseded".to_string())
        );
    }

    #[test]
    fn only_deployed_and_failed_are_terminal() {
        assert!(ReleaseStatus::Deployed(DeployedVia::Rollback).is_terminal());
        assert!(ReleaseStatus::Failed(FailedOp::Uninstall).is_terminal());
        assert!(!ReleaseStatus::Pending(PendingOp::Upgrade).is_terminal());
        assert!(!ReleaseStatus::NotFound.is_terminal());
        assert!(!ReleaseStatus::Unknown("x".to_string()).is_terminal());
    }

    #[test]
    fn display_uses_wire_names() {
        assert_eq!(
            ReleaseStatus::Pending(PendingOp::Install).to_string(),
            "pending-install"
        );
        assert_eq!(
            ReleaseStatus::Failed(FailedOp::Install).to_string(),
            "failed-install"
        );
        assert_eq!(
            ReleaseStatus::Unknown("odd".to_string()).to_string(),
            "unknown(odd)"
        );
    }

    // ==========================================================================
    // Story: release values and repositories
    // ==========================================================================

    #[test]
    fn caller_values_are_appended_after_defaults() {
        let release = Release::new("proj", "ns", "hub", "bcs-clusternet-hub")
            .with_values("a: 1")
            .with_values("b: 2");
        let merged = release.merged_values(&["a: 3".to_string()]);
        assert_eq!(merged, vec!["a: 1", "b: 2", "a: 3"]);
    }

    #[test]
    fn public_release_defaults_to_public_repository() {
        let release = Release::new("proj", "ns", "hub", "chart").public();
        assert_eq!(release.effective_repository(), PUBLIC_REPOSITORY);

        let release = Release::new("proj", "ns", "hub", "chart")
            .public()
            .with_repository("mirror");
        assert_eq!(release.effective_repository(), "mirror");

        let release = Release::new("proj", "ns", "hub", "chart").with_repository("private");
        assert_eq!(release.effective_repository(), "private");
    }

    #[test]
    fn blank_version_needs_lookup() {
        assert!(Release::new("p", "n", "r", "c").needs_version_lookup());
        assert!(Release::new("p", "n", "r", "c")
            .with_version("  ")
            .needs_version_lookup());
        assert!(!Release::new("p", "n", "r", "c")
            .with_version("1.2.0")
            .needs_version_lookup());
    }

    // ==========================================================================
    // Story: envelopes decide success, not HTTP status
    // ==========================================================================

    #[test]
    fn envelope_non_zero_code_is_failure() {
        let env: Envelope<()> = Envelope::failure(40010, "exists").with_request_id("r-1");
        let err = env.check("install_release").unwrap_err();
        assert!(matches!(err, Error::Remote { code: 40010, .. }));
        assert_eq!(err.request_id(), Some("r-1"));
    }

    #[test]
    fn envelope_result_false_is_failure_even_with_zero_code() {
        let env: Envelope<()> = Envelope {
            code: 0,
            message: "helm refused".to_string(),
            request_id: None,
            result: Some(false),
            data: None,
        };
        assert!(!env.is_success());
        assert!(env.check("install_release").is_err());
    }

    #[test]
    fn envelope_decodes_wire_shape() {
        let json = r#"{"code":0,"message":"ok","requestID":"abc","result":true,"data":{"v":"1"}}"#;
        let env: Envelope<serde_json::Value> = serde_json::from_str(json).unwrap();
        assert_eq!(env.request_id.as_deref(), Some("abc"));

        let json = r#"{"code":0,"message":"ok","requestId":"abc","data":{"v":"1"}}"#;
        let env: Envelope<serde_json::Value> = serde_json::from_str(json).unwrap();
        assert_eq!(env.request_id.as_deref(), Some("abc"));
        assert!(env.is_success());
        let data = env.into_required("get").unwrap();
        assert_eq!(data["v"], "1");
    }

    #[test]
    fn envelope_without_data_fails_into_required() {
        let env: Envelope<String> = Envelope {
            code: 0,
            message: String::new(),
            request_id: None,
            result: None,
            data: None,
        };
        assert!(env.into_required("get_chart").is_err());
    }

    #[test]
    fn later_values_win_and_maps_merge() {
        let merged = merge_values(&[
            "federation:\n  clusterId: a\n  replicas: 1\nimage: v1\n".to_string(),
            "   ".to_string(),
            "federation:\n  clusterId: b\n".to_string(),
        ])
        .unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&merged).unwrap();
        assert_eq!(value["federation"]["clusterId"], "b");
        assert_eq!(value["federation"]["replicas"], 1);
        assert_eq!(value["image"], "v1");
    }

    #[test]
    fn no_fragments_merge_to_empty() {
        assert_eq!(merge_values(&[]).unwrap(), "");
        assert!(merge_values(&["a: [".to_string()]).is_err());
    }
}
