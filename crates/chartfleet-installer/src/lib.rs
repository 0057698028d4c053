//! Release installer backends
//!
//! One [`InstallerBackend`] contract over three remote managers with
//! different status models:
//!
//! - [`HelmBackend`]: the Helm release manager, full status vocabulary
//! - [`AddonsBackend`]: the add-on manager, which owns convergence itself
//! - [`LegacyAppBackend`]: the legacy app platform, addressed by numeric IDs
//!
//! Backends are built from an [`InstallerContext`] via [`build_backend`] or
//! the [`BackendFactory`] trait.

#![deny(missing_docs)]

pub mod api;
mod addons;
mod backend;
mod factory;
mod handle;
mod helm;
mod legacy;
mod settings;

pub use addons::AddonsBackend;
pub use backend::InstallerBackend;
pub use factory::{
    build_backend, BackendFactory, BackendKind, BackendOptions, InstallerContext,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use helm::HelmBackend;
pub use legacy::LegacyAppBackend;
pub use settings::{BackendSettings, DEFAULT_PRE_CHECK_TIMEOUT};
