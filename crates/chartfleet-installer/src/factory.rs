//! Backend selection and construction
//!
//! An [`InstallerContext`] holds every endpoint and setting a backend needs.
//! It is built once by the caller and handed to [`build_backend`]; backends
//! never read ambient global state.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use chartfleet_common::release::Release;
use chartfleet_common::{Error, Result};

use crate::api::{Endpoint, HttpAddonsManager, HttpHelmManager, HttpLegacyApp};
use crate::{AddonsBackend, BackendSettings, HelmBackend, InstallerBackend, LegacyAppBackend};

/// Per-request timeout for remote calls
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Which remote manager a release is deployed through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// The Helm release manager
    Helm,
    /// The add-on manager
    Addons,
    /// The legacy application platform
    LegacyApp,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Helm => "helm",
            Self::Addons => "addons",
            Self::LegacyApp => "legacy-app",
        })
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "helm" => Ok(Self::Helm),
            "addons" | "addon" => Ok(Self::Addons),
            "legacy" | "legacy-app" | "legacyapp" => Ok(Self::LegacyApp),
            other => Err(Error::validation(format!("unknown backend: {}", other))),
        }
    }
}

/// Per-release switches applied when a backend is built
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendOptions {
    /// `install` is a no-op when the release already exists
    pub skip_when_existed: bool,
    /// Helm only: `upgrade` moves the chart version as well
    pub upgrade_version: bool,
}

impl BackendOptions {
    /// Options with `skip_when_existed` set
    pub fn skip_when_existed() -> Self {
        Self {
            skip_when_existed: true,
            ..Default::default()
        }
    }
}

/// Builds backends; the seam the orchestrator is tested through
#[cfg_attr(test, automock)]
pub trait BackendFactory: Send + Sync {
    /// A backend of `kind` scoped to `release`
    fn build(
        &self,
        kind: BackendKind,
        release: Release,
        options: BackendOptions,
    ) -> Result<Box<dyn InstallerBackend>>;
}

/// Endpoints and settings for every backend kind
#[derive(Debug, Clone, Default)]
pub struct InstallerContext {
    /// Helm manager endpoint
    pub helm: Option<Endpoint>,
    /// Add-on manager endpoint
    pub addons: Option<Endpoint>,
    /// Legacy platform endpoint
    pub legacy: Option<Endpoint>,
    /// Retry and polling settings
    pub settings: BackendSettings,
    /// Per-request HTTP timeout; `None` uses [`DEFAULT_REQUEST_TIMEOUT`]
    pub request_timeout: Option<Duration>,
}

impl InstallerContext {
    fn endpoint(&self, kind: BackendKind) -> Result<&Endpoint> {
        let endpoint = match kind {
            BackendKind::Helm => self.helm.as_ref(),
            BackendKind::Addons => self.addons.as_ref(),
            BackendKind::LegacyApp => self.legacy.as_ref(),
        };
        endpoint.ok_or_else(|| Error::setup(kind.to_string(), "no endpoint configured"))
    }

    fn timeout(&self) -> Duration {
        self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl BackendFactory for InstallerContext {
    fn build(
        &self,
        kind: BackendKind,
        release: Release,
        options: BackendOptions,
    ) -> Result<Box<dyn InstallerBackend>> {
        build_backend(kind, self, release, options)
    }
}

/// Build the HTTP-backed backend of `kind` for `release`
pub fn build_backend(
    kind: BackendKind,
    ctx: &InstallerContext,
    release: Release,
    options: BackendOptions,
) -> Result<Box<dyn InstallerBackend>> {
    let endpoint = ctx.endpoint(kind)?;
    let settings = ctx.settings.clone();

    Ok(match kind {
        BackendKind::Helm => {
            let api = HttpHelmManager::new(endpoint, ctx.timeout())?;
            Box::new(
                HelmBackend::new(release, api, settings)
                    .skip_when_existed(options.skip_when_existed)
                    .with_upgrade_version(options.upgrade_version),
            )
        }
        BackendKind::Addons => {
            let api = HttpAddonsManager::new(endpoint, ctx.timeout())?;
            Box::new(
                AddonsBackend::new(release, api, settings)
                    .skip_when_existed(options.skip_when_existed),
            )
        }
        BackendKind::LegacyApp => {
            let api = HttpLegacyApp::new(endpoint, ctx.timeout())?;
            Box::new(
                LegacyAppBackend::new(release, api, settings)
                    .skip_when_existed(options.skip_when_existed),
            )
        }
    })
}
