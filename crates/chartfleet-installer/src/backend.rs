//! The installer contract shared by every backend

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use chartfleet_common::{CallContext, Result};

use crate::BackendKind;

/// Drives one release on one remote manager.
///
/// A backend is scoped to a single (project, namespace, release) tuple; the
/// cluster is supplied per call. Operations on the same tuple are not
/// synchronized here, so callers issue them sequentially.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InstallerBackend: Send + Sync {
    /// Which remote manager this backend talks to
    fn kind(&self) -> BackendKind;

    /// Whether the release exists on `cluster_id`; a remote "not found" is
    /// `Ok(false)`
    async fn is_installed(&self, ctx: &CallContext, cluster_id: &str) -> Result<bool>;

    /// Create the release, resolving the chart version first when unset
    async fn install(&self, ctx: &CallContext, cluster_id: &str, values: &[String]) -> Result<()>;

    /// Upgrade the release with new values
    async fn upgrade(&self, ctx: &CallContext, cluster_id: &str, values: &[String]) -> Result<()>;

    /// Remove the release; a missing release is `Ok(())` with no mutating call
    async fn uninstall(&self, ctx: &CallContext, cluster_id: &str) -> Result<()>;

    /// Wait until the release settles.
    ///
    /// With `pre` set, any deployed or failed status is settled and a missing
    /// release yields `Ok(false)`. Otherwise only a deployed status succeeds
    /// and a failed one is [`chartfleet_common::Error::ReleaseFailed`].
    async fn check_app_status(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        timeout: Duration,
        pre: bool,
    ) -> Result<bool>;

    /// Drop the transport handle. Idempotent; later calls return
    /// [`chartfleet_common::Error::Closed`].
    fn close(&self);
}
