//! Per-backend timing and retry settings

use std::time::Duration;

use chartfleet_common::poll::PollConfig;
use chartfleet_common::retry::RetryConfig;
use chartfleet_common::DEFAULT_POLL_INTERVAL;

/// Budget for the readiness check that precedes an upgrade
pub const DEFAULT_PRE_CHECK_TIMEOUT: Duration = Duration::from_secs(300);

/// Retry and polling knobs shared by every backend built from one context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    /// Retry policy for ordinary remote calls
    pub retry: RetryConfig,
    /// Retry policy for legacy namespace creation
    pub namespace_retry: RetryConfig,
    /// Delay between status probes
    pub poll_interval: Duration,
    /// Timeout for the pre-upgrade readiness check
    pub pre_check_timeout: Duration,
    /// Page size for legacy app listings
    pub legacy_page_size: u32,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            retry: RetryConfig::remote_call(),
            namespace_retry: RetryConfig::namespace_creation(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            pre_check_timeout: DEFAULT_PRE_CHECK_TIMEOUT,
            legacy_page_size: crate::api::DEFAULT_APP_PAGE_SIZE,
        }
    }
}

impl BackendSettings {
    pub(crate) fn poll(&self, timeout: Duration) -> PollConfig {
        PollConfig::new(timeout).with_interval(self.poll_interval)
    }
}
