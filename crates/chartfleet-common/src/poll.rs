//! Convergence polling against eventually-consistent remotes
//!
//! [`poll_until_terminal`] calls a probe immediately and then once per fixed
//! interval until it reports [`Probe::Done`] or [`Probe::Failed`], the caller
//! cancels, or the deadline passes. It runs on the caller's task and never
//! spawns.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::context::CallContext;
use crate::release::ReleaseStatus;
use crate::{Error, Result, DEFAULT_POLL_INTERVAL};

/// Outcome of one probe invocation
#[derive(Debug)]
pub enum Probe<T> {
    /// Not terminal yet; probe again after the interval
    Continue,
    /// Terminal success
    Done(T),
    /// Terminal failure; stop polling and return this error
    Failed(Error),
}

impl<T> Probe<T> {
    /// Outcome for a status fetch that errored.
    ///
    /// Transport trouble (a transient failure, or retries exhausted on one)
    /// says nothing about the release, so polling continues. Any other error
    /// stops the loop.
    pub fn from_fetch_error(operation: &str, err: Error) -> Self {
        match err {
            Error::Transient { .. } | Error::RetriesExhausted { .. } => {
                warn!(operation = %operation, error = %err, "Status fetch failed, polling again");
                Probe::Continue
            }
            err => Probe::Failed(err),
        }
    }
}

/// Interval and overall timeout for one polling loop
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollConfig {
    /// Fixed delay between probes
    pub interval: Duration,
    /// Budget for the whole loop, clamped by the context deadline
    pub timeout: Duration,
}

impl PollConfig {
    /// Default interval with the given timeout
    pub fn new(timeout: Duration) -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout,
        }
    }

    /// Override the interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Which statuses end a status check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusCheck {
    /// Before mutating: any settled state will do, success or failure
    Pre,
    /// After mutating: only a deployed state is success
    Post,
}

impl StatusCheck {
    /// Pick the check for the `pre` flag used by backends
    pub fn from_pre(pre: bool) -> Self {
        if pre {
            Self::Pre
        } else {
            Self::Post
        }
    }

    /// Classify one observed status.
    ///
    /// `Done(true)` means ready. A pre-check on a missing release is
    /// `Done(false)`: nothing is transitioning, but there is nothing to operate
    /// on either. A post-check keeps polling through `NotFound`, since the
    /// remote may not list a freshly created release yet.
    pub fn classify(
        self,
        release: &str,
        status: &ReleaseStatus,
        request_id: Option<&str>,
    ) -> Probe<bool> {
        match (self, status) {
            (_, ReleaseStatus::Deployed(_)) => Probe::Done(true),
            (Self::Pre, ReleaseStatus::Failed(_)) => Probe::Done(true),
            (Self::Pre, ReleaseStatus::NotFound) => Probe::Done(false),
            (Self::Post, ReleaseStatus::Failed(_)) => Probe::Failed(Error::ReleaseFailed {
                release: release.to_string(),
                status: status.clone(),
                request_id: request_id.map(String::from),
            }),
            _ => Probe::Continue,
        }
    }
}

/// Poll `probe` until it reports a terminal outcome.
///
/// The deadline is `config.timeout` from now or the context deadline,
/// whichever comes first. Expiry yields [`Error::ConvergenceTimeout`];
/// cancellation yields [`Error::Cancelled`].
pub async fn poll_until_terminal<F, Fut, T>(
    ctx: &CallContext,
    config: &PollConfig,
    operation: &str,
    mut probe: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Probe<T>>,
{
    let started = Instant::now();
    let scoped = ctx.with_deadline(started + config.timeout);
    let mut probes = 0u32;

    let timed_out = |probes: u32| Error::ConvergenceTimeout {
        operation: operation.to_string(),
        probes,
        elapsed: started.elapsed(),
    };

    loop {
        let outcome = tokio::select! {
            biased;
            _ = scoped.cancelled() => return Err(Error::cancelled(operation)),
            _ = scoped.expired() => return Err(timed_out(probes)),
            outcome = probe() => outcome,
        };
        probes += 1;

        match outcome {
            Probe::Done(value) => {
                debug!(operation = %operation, probes, "Reached terminal state");
                return Ok(value);
            }
            Probe::Failed(Error::DeadlineExceeded { .. }) => return Err(timed_out(probes)),
            Probe::Failed(e) => return Err(e),
            Probe::Continue => {
                trace!(operation = %operation, probes, "Not terminal yet, polling again");
            }
        }

        tokio::select! {
            biased;
            _ = scoped.cancelled() => return Err(Error::cancelled(operation)),
            _ = tokio::time::sleep(config.interval) => {}
            _ = scoped.expired() => return Err(timed_out(probes)),
        }
    }
}
