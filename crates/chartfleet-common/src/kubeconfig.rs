//! Minimal kubeconfig for agents that reach their parent through a gateway
//!
//! One cluster, one token user, one context binding them. TLS verification is
//! disabled on the cluster entry because the gateway terminates TLS with a
//! certificate the agent cannot validate.

use serde::{Deserialize, Serialize};

use crate::Result;

/// Kubeconfig with exactly one cluster, user, and context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimalKubeconfig {
    /// Always `v1`
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    /// Always `Config`
    pub kind: String,
    /// Cluster entries
    pub clusters: Vec<NamedCluster>,
    /// User entries
    pub users: Vec<NamedUser>,
    /// Context entries
    pub contexts: Vec<NamedContext>,
    /// Active context name
    #[serde(rename = "current-context")]
    pub current_context: String,
}

/// Named cluster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedCluster {
    /// Entry name
    pub name: String,
    /// Cluster connection details
    pub cluster: ClusterEntry,
}

/// Cluster connection details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEntry {
    /// API server URL
    pub server: String,
    /// Skip server certificate verification
    #[serde(rename = "insecure-skip-tls-verify", default)]
    pub insecure_skip_tls_verify: bool,
}

/// Named user entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedUser {
    /// Entry name
    pub name: String,
    /// Credentials
    pub user: UserEntry,
}

/// Bearer token credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    /// Bearer token
    pub token: String,
}

impl std::fmt::Debug for UserEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserEntry").field("token", &"<redacted>").finish()
    }
}

/// Named context entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedContext {
    /// Entry name
    pub name: String,
    /// Cluster and user binding
    pub context: ContextEntry,
}

/// Cluster and user binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    /// Cluster entry name
    pub cluster: String,
    /// User entry name
    pub user: String,
}

impl MinimalKubeconfig {
    /// Build a kubeconfig named `name` pointing at `server` with `token`
    pub fn new(name: &str, server: impl Into<String>, token: impl Into<String>) -> Self {
        let user = format!("{}-user", name);
        Self {
            api_version: "v1".to_string(),
            kind: "Config".to_string(),
            clusters: vec![NamedCluster {
                name: name.to_string(),
                cluster: ClusterEntry {
                    server: server.into(),
                    insecure_skip_tls_verify: true,
                },
            }],
            users: vec![NamedUser {
                name: user.clone(),
                user: UserEntry {
                    token: token.into(),
                },
            }],
            contexts: vec![NamedContext {
                name: name.to_string(),
                context: ContextEntry {
                    cluster: name.to_string(),
                    user,
                },
            }],
            current_context: name.to_string(),
        }
    }

    /// Kubeconfig for `cluster_id` reached through `gateway`
    pub fn for_gateway(gateway: &str, cluster_id: &str, token: impl Into<String>) -> Self {
        Self::new(cluster_id, gateway_server_url(gateway, cluster_id), token)
    }

    /// Serialize as YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Server URL for a cluster proxied by the gateway
pub fn gateway_server_url(gateway: &str, cluster_id: &str) -> String {
    format!("{}/clusters/{}", gateway.trim_end_matches('/'), cluster_id)
}
