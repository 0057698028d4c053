//! Common types for chartfleet: release model, errors, retry, and polling

#![deny(missing_docs)]

pub mod context;
pub mod error;
pub mod kubeconfig;
pub mod naming;
pub mod poll;
pub mod release;
pub mod retry;
pub mod telemetry;

use std::time::Duration;

pub use context::CallContext;
pub use error::Error;
pub use release::{Release, ReleaseStatus};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Fixed interval between convergence probes
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Upper bound on derived release names
pub const DEFAULT_RELEASE_NAME_MAX_LEN: usize = 48;

/// Repository used for charts marked public without an explicit repository
pub const PUBLIC_REPOSITORY: &str = "public-repo";

/// Business code the remote managers return for a missing release
pub const REMOTE_NOT_FOUND_CODE: i64 = 40404;
