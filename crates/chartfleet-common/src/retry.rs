//! Bounded retries for transient remote failures.
//!
//! Only [`Error::Transient`] is retried. A remote that answered with a
//! non-zero code has already processed the request, so re-issuing it could
//! duplicate side effects; those errors return on the first attempt.
//!
//! # Example
//!
//! ```ignore
//! use chartfleet_common::retry::{retry_transient, RetryConfig};
//!
//! let detail = retry_transient(&ctx, &RetryConfig::remote_call(), "get_release_detail", || {
//!     api.get_release_detail(&query)
//! })
//! .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::context::CallContext;
use crate::{Error, Result};

/// How the delay grows between attempts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Same delay before every retry
    #[default]
    Fixed,
    /// `delay * attempt` before retry number `attempt`
    Linear,
}

/// Retry policy for one call site
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts including the first one (values below 1 act as 1)
    pub max_attempts: u32,
    /// Base delay between attempts
    pub delay: Duration,
    /// Delay growth
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::remote_call()
    }
}

impl RetryConfig {
    /// Fixed delay between a fixed number of attempts
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: Backoff::Fixed,
        }
    }

    /// Linearly growing delay
    pub fn linear(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: Backoff::Linear,
        }
    }

    /// Policy for ordinary calls against the remote managers
    pub fn remote_call() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }

    /// Policy for namespace creation against the slower legacy platform
    pub fn namespace_creation() -> Self {
        Self::fixed(10, Duration::from_secs(10))
    }

    /// A copy with a different attempt count
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Linear => self.delay.saturating_mul(attempt.max(1)),
        }
    }
}

/// Run `operation`, retrying transient failures according to `config`.
///
/// Each attempt runs under `ctx`, so cancellation and deadlines interrupt both
/// the call and the sleep between calls. Permanent errors return immediately.
/// When the attempts run out, the last error is wrapped in
/// [`Error::RetriesExhausted`] together with its response body.
pub async fn retry_transient<F, Fut, T>(
    ctx: &CallContext,
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.attempts();
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let err = match ctx.run(operation_name, operation()).await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => e,
        };

        if attempt >= max_attempts {
            error!(
                operation = %operation_name,
                attempt = attempt,
                error = %err,
                "Operation failed after max retries"
            );
            return Err(Error::RetriesExhausted {
                operation: operation_name.to_string(),
                attempts: attempt,
                last_body: err.response_body().map(String::from),
                source: Box::new(err),
            });
        }

        let delay = config.delay_after(attempt);
        warn!(
            operation = %operation_name,
            attempt = attempt,
            error = %err,
            delay_ms = delay.as_millis() as u64,
            "Transient failure, retrying"
        );
        ctx.sleep(operation_name, delay).await?;
    }
}
