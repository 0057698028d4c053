//! Federation control plane orchestration
//!
//! Composes Helm-backed installer backends into the ordered set of releases
//! that make up a federation: hub, scheduler, controller and unified
//! apiserver on the host cluster, plus an agent pair per joined sub-cluster.

#![deny(missing_docs)]

pub mod charts;
pub mod orchestrator;
pub mod token;
pub mod values;

pub use charts::{
    ChartDescriptor, FederationComponentSet, FederationProject, HostComponent,
    SubClusterComponent,
};
pub use orchestrator::{
    ComponentStatus, FederationInstall, FederationOrchestrator, InstallOutcome, SubClusterJoin,
};
pub use token::RegistrationToken;
