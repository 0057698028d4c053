//! Call context: cancellation plus an optional deadline
//!
//! Every remote call made by a backend runs under a [`CallContext`]. Cancelling
//! the token or letting the deadline pass aborts the in-flight future at its
//! next await point.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Cancellation token and deadline shared by one logical operation
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context with no deadline that is only cancelled explicitly
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing cancellation token
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Derive a child whose deadline is at most `timeout` from now
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a child whose deadline is the earlier of `deadline` and ours
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        };
        Self {
            cancel: self.cancel.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Cancel this context and every child derived from it
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The deadline, if one was set
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// The underlying token
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Resolves when the context is cancelled
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Resolves when the deadline passes; never resolves without one
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }

    /// Run `fut` unless the context is cancelled or expires first
    pub async fn run<F, T>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(Error::cancelled(operation));
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(Error::cancelled(operation)),
            _ = self.expired() => Err(Error::deadline_exceeded(operation)),
            res = fut => res,
        }
    }

    /// Sleep for `delay` unless the context is cancelled or expires first
    pub async fn sleep(&self, operation: &str, delay: Duration) -> Result<()> {
        self.run(operation, async {
            tokio::time::sleep(delay).await;
            Ok(())
        })
        .await
    }
}
