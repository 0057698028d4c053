//! Error types for release installation
//!
//! Errors are split by how callers are expected to react to them:
//! transient failures are retried, business failures reported by a remote
//! manager are surfaced as-is, and convergence failures distinguish a release
//! that is still transitioning from one that settled into a failed state.

use std::time::Duration;

use thiserror::Error;

use crate::release::ReleaseStatus;

/// Placeholder used when a remote did not return a request ID
const NO_REQUEST_ID: &str = "-";

/// Main error type for chartfleet operations
#[derive(Debug, Error)]
pub enum Error {
    /// The backend could not be constructed or reached at all
    #[error("setup error [{context}]: {message}")]
    Setup {
        /// Where the setup failed (e.g., "helm-manager client")
        context: String,
        /// Description of what failed
        message: String,
    },

    /// A remote manager processed the request and rejected it
    #[error(
        "remote error in {operation}: code={code} message={message} request_id={}",
        .request_id.as_deref().unwrap_or(NO_REQUEST_ID)
    )]
    Remote {
        /// Remote operation that was rejected
        operation: String,
        /// Application-specific result code (never 0)
        code: i64,
        /// Human-readable message returned by the remote
        message: String,
        /// Correlation ID returned by the remote
        request_id: Option<String>,
    },

    /// Upstream timeout, dropped connection, or gateway-level unavailability
    #[error("transient error in {operation}: {message}")]
    Transient {
        /// Remote operation that failed
        operation: String,
        /// Description of the failure
        message: String,
        /// HTTP status, when the failure came from a response
        status: Option<u16>,
        /// Raw response body, kept for diagnostics
        body: Option<String>,
    },

    /// A transient failure persisted through every configured attempt
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Operation that was retried
        operation: String,
        /// Number of attempts made
        attempts: u32,
        /// Last response body seen, if any
        last_body: Option<String>,
        /// The last underlying error
        #[source]
        source: Box<Error>,
    },

    /// The release never reached a terminal state before the deadline
    #[error("{operation} timed out while transitioning after {probes} probes ({elapsed:?})")]
    ConvergenceTimeout {
        /// Operation that was polling
        operation: String,
        /// Number of probe invocations made
        probes: u32,
        /// Time spent polling
        elapsed: Duration,
    },

    /// The release converged, but into a failed state
    #[error(
        "release {release} reached status {status} (request_id={})",
        .request_id.as_deref().unwrap_or(NO_REQUEST_ID)
    )]
    ReleaseFailed {
        /// Release name
        release: String,
        /// Terminal failed status observed
        status: ReleaseStatus,
        /// Request ID of the status response that reported the failure
        request_id: Option<String>,
    },

    /// The call context was cancelled
    #[error("{operation} cancelled")]
    Cancelled {
        /// Operation that was interrupted
        operation: String,
    },

    /// The call context deadline elapsed before the operation finished
    #[error("{operation} exceeded its deadline")]
    DeadlineExceeded {
        /// Operation that was interrupted
        operation: String,
    },

    /// Invalid input supplied by a caller
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The payload kind being (de)serialized, if known
        kind: Option<String>,
    },

    /// Configuration could not be loaded or is inconsistent
    #[error("config error: {message}")]
    Config {
        /// Description of what's wrong
        message: String,
    },

    /// The backend was used after `close()`
    #[error("{backend} backend is closed")]
    Closed {
        /// Backend kind
        backend: String,
    },
}

impl Error {
    /// Create a setup error
    pub fn setup(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Setup {
            context: context.into(),
            message: msg.into(),
        }
    }

    /// Create a remote business error
    pub fn remote(
        operation: impl Into<String>,
        code: i64,
        msg: impl Into<String>,
        request_id: Option<String>,
    ) -> Self {
        Self::Remote {
            operation: operation.into(),
            code,
            message: msg.into(),
            request_id,
        }
    }

    /// Create a transient error without response details
    pub fn transient(operation: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Transient {
            operation: operation.into(),
            message: msg.into(),
            status: None,
            body: None,
        }
    }

    /// Create a transient error from an HTTP response
    pub fn transient_response(
        operation: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        Self::Transient {
            operation: operation.into(),
            message: format!("upstream returned HTTP {}", status),
            status: Some(status),
            body: Some(body.into()),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create a deadline error
    pub fn deadline_exceeded(operation: impl Into<String>) -> Self {
        Self::DeadlineExceeded {
            operation: operation.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error for a known payload kind
    pub fn serialization_of(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a closed-backend error
    pub fn closed(backend: impl Into<String>) -> Self {
        Self::Closed {
            backend: backend.into(),
        }
    }

    /// Whether the retry policy may re-issue the call that produced this error
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Whether the error means "still converging" rather than "converged to failure"
    pub fn is_convergence_timeout(&self) -> bool {
        matches!(self, Self::ConvergenceTimeout { .. })
    }

    /// Remote request ID carried by this error, if any
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Remote { request_id, .. } | Self::ReleaseFailed { request_id, .. } => {
                request_id.as_deref()
            }
            Self::RetriesExhausted { source, .. } => source.request_id(),
            _ => None,
        }
    }

    /// Last response body attached to this error, if any
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Self::Transient { body, .. } => body.as_deref(),
            Self::RetriesExhausted { last_body, .. } => last_body.as_deref(),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Self::serialization_of("yaml", e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::{FailedOp, ReleaseStatus};

    // ==========================================================================
    // Story: callers tell retryable failures from permanent ones
    // ==========================================================================

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(Error::transient("install", "connection reset").is_transient());
        assert!(Error::transient_response("install", 503, "busy").is_transient());

        assert!(!Error::remote("install", 40001, "chart missing", None).is_transient());
        assert!(!Error::validation("bad input").is_transient());
        assert!(!Error::cancelled("install").is_transient());
        assert!(!Error::setup("helm-manager client", "bad url").is_transient());
    }

    #[test]
    fn remote_errors_surface_code_message_and_request_id() {
        let err = Error::remote(
            "install_release",
            40010,
            "release already exists",
            Some("req-42".to_string()),
        );
        let msg = err.to_string();
        assert!(msg.contains("40010"));
        assert!(msg.contains("release already exists"));
        assert!(msg.contains("req-42"));
        assert_eq!(err.request_id(), Some("req-42"));
    }

    #[test]
    fn remote_errors_without_request_id_render_placeholder() {
        let err = Error::remote("uninstall_release", 1, "boom", None);
        assert!(err.to_string().contains("request_id=-"));
    }

    // ==========================================================================
    // Story: exhausted retries keep the last failure for diagnostics
    // ==========================================================================

    #[test]
    fn retries_exhausted_keeps_last_body_and_source() {
        let last = Error::transient_response("get_release_detail", 504, "gateway timeout");
        let err = Error::RetriesExhausted {
            operation: "get_release_detail".to_string(),
            attempts: 3,
            last_body: last.response_body().map(String::from),
            source: Box::new(last),
        };

        assert!(err.to_string().contains("after 3 attempts"));
        assert!(err.to_string().contains("HTTP 504"));
        assert_eq!(err.response_body(), Some("gateway timeout"));
        assert!(!err.is_transient());
        assert!(std::error::Error::source(&err).is_some());
    }

    // ==========================================================================
    // Story: convergence outcomes are distinguishable
    // ==========================================================================

    #[test]
    fn convergence_timeout_is_distinct_from_failed_release() {
        let timeout = Error::ConvergenceTimeout {
            operation: "check bcs-hub".to_string(),
            probes: 4,
            elapsed: Duration::from_secs(30),
        };
        let failed = Error::ReleaseFailed {
            release: "bcs-hub".to_string(),
            status: ReleaseStatus::Failed(FailedOp::Upgrade),
            request_id: Some("req-9".to_string()),
        };

        assert!(timeout.is_convergence_timeout());
        assert!(timeout.to_string().contains("timed out while transitioning"));
        assert!(!failed.is_convergence_timeout());
        assert!(failed.to_string().contains("failed-upgrade"));
        assert!(failed.to_string().contains("req-9"));
    }

    #[test]
    fn yaml_errors_convert_to_serialization() {
        let yaml_err = serde_yaml::from_str::<Vec<String>>("{not: [valid").unwrap_err();
        let err: Error = yaml_err.into();
        match err {
            Error::Serialization { kind, .. } => assert_eq!(kind.as_deref(), Some("yaml")),
            other => panic!("expected Serialization, got {other:?}"),
        }
    }
}
