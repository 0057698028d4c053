//! chartfleet configuration file
//!
//! YAML, located by `--config` or `CHARTFLEET_CONFIG`. Every section is
//! optional; a missing file section falls back to defaults. Tokens can be
//! given inline or, preferably, as the name of an environment variable.
//!
//! ```yaml
//! backends:
//!   helm:
//!     baseUrl: https://helm-manager.example.com
//!     tokenEnv: CHARTFLEET_HELM_TOKEN
//!   requestTimeoutSecs: 30
//! retry:
//!   maxAttempts: 3
//! poll:
//!   intervalSecs: 10
//! federation:
//!   components:
//!     hub:
//!       chartVersion: 0.17.0
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use chartfleet_common::retry::RetryConfig;
use chartfleet_federation::FederationComponentSet;
use chartfleet_installer::api::{Endpoint, DEFAULT_APP_PAGE_SIZE};
use chartfleet_installer::{BackendSettings, InstallerContext, DEFAULT_PRE_CHECK_TIMEOUT};

use crate::{Error, Result};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "CHARTFLEET_CONFIG";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FleetConfig {
    /// Remote manager endpoints
    pub backends: BackendsConfig,
    /// Retry policy
    pub retry: RetrySection,
    /// Polling settings
    pub poll: PollSection,
    /// Federation charts
    pub federation: FederationSection,
}

/// Remote manager endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendsConfig {
    /// Helm manager
    pub helm: Option<EndpointConfig>,
    /// Add-on manager
    pub addons: Option<EndpointConfig>,
    /// Legacy app platform
    pub legacy: Option<EndpointConfig>,
    /// Per-request timeout
    pub request_timeout_secs: u64,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            helm: None,
            addons: None,
            legacy: None,
            request_timeout_secs: chartfleet_installer::DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

/// One endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    /// Base URL
    pub base_url: String,
    /// Inline bearer token
    #[serde(default)]
    pub token: Option<String>,
    /// Environment variable holding the bearer token
    #[serde(default)]
    pub token_env: Option<String>,
}

impl EndpointConfig {
    fn resolve(&self) -> Result<Endpoint> {
        let token = match (&self.token, &self.token_env) {
            (Some(token), _) => Some(token.clone()),
            (None, Some(var)) => Some(std::env::var(var).map_err(|_| {
                Error::config(format!("environment variable {} is not set", var))
            })?),
            (None, None) => None,
        };
        Ok(Endpoint {
            base_url: self.base_url.clone(),
            token,
        })
    }
}

/// Retry policy for remote calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrySection {
    /// Attempts per remote call
    pub max_attempts: u32,
    /// Delay between attempts
    pub delay_secs: u64,
    /// Attempts for legacy namespace creation
    pub namespace_max_attempts: u32,
    /// Delay between namespace creation attempts
    pub namespace_delay_secs: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        let call = RetryConfig::remote_call();
        let ns = RetryConfig::namespace_creation();
        Self {
            max_attempts: call.max_attempts,
            delay_secs: call.delay.as_secs(),
            namespace_max_attempts: ns.max_attempts,
            namespace_delay_secs: ns.delay.as_secs(),
        }
    }
}

/// Polling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollSection {
    /// Interval between status probes
    pub interval_secs: u64,
    /// Timeout of the readiness check before an upgrade
    pub pre_check_timeout_secs: u64,
    /// Page size for legacy app listings
    pub legacy_page_size: u32,
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            interval_secs: chartfleet_common::DEFAULT_POLL_INTERVAL.as_secs(),
            pre_check_timeout_secs: DEFAULT_PRE_CHECK_TIMEOUT.as_secs(),
            legacy_page_size: DEFAULT_APP_PAGE_SIZE,
        }
    }
}

/// Federation charts and rollout settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FederationSection {
    /// Chart descriptors
    pub components: FederationComponentSet,
    /// Wait this long for each component to deploy; unset skips waiting
    pub wait_timeout_secs: Option<u64>,
}

impl FleetConfig {
    /// Load from `path`, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let data = std::fs::read_to_string(path).map_err(|e| Error::ReadFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&data)
    }

    /// Parse YAML; an empty document is the default config
    pub fn from_yaml(data: &str) -> Result<Self> {
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.poll.interval_secs == 0 {
            return Err(Error::config("poll.intervalSecs must be positive"));
        }
        if self.retry.max_attempts == 0 || self.retry.namespace_max_attempts == 0 {
            return Err(Error::config("retry attempts must be at least 1"));
        }
        Ok(())
    }

    /// Backend settings derived from the retry and poll sections
    pub fn backend_settings(&self) -> BackendSettings {
        BackendSettings {
            retry: RetryConfig::fixed(
                self.retry.max_attempts,
                Duration::from_secs(self.retry.delay_secs),
            ),
            namespace_retry: RetryConfig::fixed(
                self.retry.namespace_max_attempts,
                Duration::from_secs(self.retry.namespace_delay_secs),
            ),
            poll_interval: Duration::from_secs(self.poll.interval_secs),
            pre_check_timeout: Duration::from_secs(self.poll.pre_check_timeout_secs),
            legacy_page_size: self.poll.legacy_page_size,
        }
    }

    /// Installer context with tokens resolved from the environment
    pub fn installer_context(&self) -> Result<InstallerContext> {
        let resolve = |ep: &Option<EndpointConfig>| ep.as_ref().map(EndpointConfig::resolve).transpose();
        Ok(InstallerContext {
            helm: resolve(&self.backends.helm)?,
            addons: resolve(&self.backends.addons)?,
            legacy: resolve(&self.backends.legacy)?,
            settings: self.backend_settings(),
            request_timeout: Some(Duration::from_secs(self.backends.request_timeout_secs)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_default() {
        let cfg = FleetConfig::from_yaml("").unwrap();
        assert_eq!(cfg, FleetConfig::default());
        assert_eq!(cfg.backend_settings(), BackendSettings::default());
    }

    #[test]
    fn full_config_parses() {
        let yaml = r#"
backends:
  helm:
    baseUrl: https://helm.example.com
    token: inline-token
  legacy:
    baseUrl: https://legacy.example.com
  requestTimeoutSecs: 5
retry:
  maxAttempts: 5
poll:
  intervalSecs: 2
  legacyPageSize: 100
federation:
  waitTimeoutSecs: 600
  components:
    hub:
      chartVersion: 0.17.0
"#;
        let cfg = FleetConfig::from_yaml(yaml).unwrap();
        let ctx = cfg.installer_context().unwrap();

        assert_eq!(ctx.helm.unwrap().token.as_deref(), Some("inline-token"));
        assert!(ctx.addons.is_none());
        assert!(ctx.legacy.unwrap().token.is_none());
        assert_eq!(ctx.request_timeout, Some(Duration::from_secs(5)));
        assert_eq!(ctx.settings.retry.max_attempts, 5);
        assert_eq!(ctx.settings.namespace_retry.max_attempts, 10);
        assert_eq!(ctx.settings.poll_interval, Duration::from_secs(2));
        assert_eq!(ctx.settings.legacy_page_size, 100);
        assert_eq!(cfg.federation.wait_timeout_secs, Some(600));
        assert_eq!(cfg.federation.components.hub.chart_version, "0.17.0");
        assert_eq!(cfg.federation.components.hub.chart_name, "clusternet-hub");
    }

    #[test]
    fn missing_token_env_is_config_error() {
        let yaml = r#"
backends:
  addons:
    baseUrl: https://addons.example.com
    tokenEnv: CHARTFLEET_TEST_TOKEN_THAT_IS_NEVER_SET
"#;
        let cfg = FleetConfig::from_yaml(yaml).unwrap();
        assert!(matches!(cfg.installer_context(), Err(Error::Config { .. })));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = FleetConfig::from_yaml("poll:\n  intervalSecs: 0\n").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
