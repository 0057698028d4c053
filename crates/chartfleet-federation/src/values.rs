//! Component-specific values rendered as YAML

use serde::Serialize;

use chartfleet_common::kubeconfig::MinimalKubeconfig;
use chartfleet_common::{Error, Result};

use crate::charts::HostComponent;
use crate::token::RegistrationToken;

/// Load balancer placement for the unified apiserver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadBalancerRef {
    /// An existing load balancer (`lb-...`)
    Id(String),
    /// A subnet to create one in (`subnet-...`)
    Subnet(String),
}

impl LoadBalancerRef {
    /// Classify an identifier by its prefix
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.starts_with("lb-") && raw.len() > "lb-".len() {
            Ok(Self::Id(raw.to_string()))
        } else if raw.starts_with("subnet-") && raw.len() > "subnet-".len() {
            Ok(Self::Subnet(raw.to_string()))
        } else {
            Err(Error::validation(format!(
                "load balancer identifier must start with lb- or subnet-, got {:?}",
                raw
            )))
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FederationSection<'a> {
    cluster_id: &'a str,
    user_token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoadBalancerSection<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subnet_id: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HostValues<'a> {
    federation: FederationSection<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    load_balancer: Option<LoadBalancerSection<'a>>,
}

/// Values for a host component.
///
/// Only the unified apiserver takes a load balancer, and for it one is
/// required.
pub fn host_values(
    component: HostComponent,
    federation_cluster_id: &str,
    user_token: &str,
    load_balancer: Option<&LoadBalancerRef>,
) -> Result<String> {
    let load_balancer = match (component, load_balancer) {
        (HostComponent::UnifiedApiserver, Some(LoadBalancerRef::Id(id))) => {
            Some(LoadBalancerSection {
                id: Some(id),
                subnet_id: None,
            })
        }
        (HostComponent::UnifiedApiserver, Some(LoadBalancerRef::Subnet(subnet))) => {
            Some(LoadBalancerSection {
                id: None,
                subnet_id: Some(subnet),
            })
        }
        (HostComponent::UnifiedApiserver, None) => {
            return Err(Error::validation(
                "unified apiserver needs a load balancer or subnet identifier",
            ))
        }
        _ => None,
    };

    let values = HostValues {
        federation: FederationSection {
            cluster_id: federation_cluster_id,
            user_token,
        },
        load_balancer,
    };
    Ok(serde_yaml::to_string(&values)?)
}

#[derive(Serialize)]
struct AgentValues<'a> {
    #[serde(rename = "parentURL")]
    parent_url: &'a str,
    #[serde(rename = "registrationToken")]
    registration_token: &'a str,
    #[serde(rename = "childKubeconfig")]
    child_kubeconfig: &'a str,
    #[serde(rename = "clusterId")]
    cluster_id: &'a str,
}

#[derive(Serialize)]
struct EstimatorValues<'a> {
    #[serde(rename = "clusterId")]
    cluster_id: &'a str,
    #[serde(rename = "childKubeconfig")]
    child_kubeconfig: &'a str,
}

/// Values for the clusternet agent of one sub-cluster
pub fn agent_values(
    parent_url: &str,
    token: &RegistrationToken,
    kubeconfig: &MinimalKubeconfig,
    sub_cluster_id: &str,
) -> Result<String> {
    let child_kubeconfig = kubeconfig.to_yaml()?;
    let values = AgentValues {
        parent_url,
        registration_token: token.as_str(),
        child_kubeconfig: &child_kubeconfig,
        cluster_id: sub_cluster_id,
    };
    Ok(serde_yaml::to_string(&values)?)
}

/// Values for the estimator agent of one sub-cluster
pub fn estimator_values(kubeconfig: &MinimalKubeconfig, sub_cluster_id: &str) -> Result<String> {
    let child_kubeconfig = kubeconfig.to_yaml()?;
    let values = EstimatorValues {
        cluster_id: sub_cluster_id,
        child_kubeconfig: &child_kubeconfig,
    };
    Ok(serde_yaml::to_string(&values)?)
}
