//! Crate-level error type.
//!
//! Every fallible operation in the viewer returns [`ViewerError`]. Each
//! variant carries enough context to diagnose the failure without needing to
//! inspect the originating error directly.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ViewerError>;

#[derive(Debug, Error)]
pub enum ViewerError {
    /// A TCP-level connection could not be established, or the request
    /// failed before a response arrived.
    #[error("connection failed to {url}: {detail}")]
    Connect { url: String, detail: String },

    /// The backend replied with a non-2xx status and no usable `detail`.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// The backend refused the request and explained why.
    #[error("request rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// The response body did not match the expected shape.
    #[error("malformed payload: {detail}")]
    Malformed { detail: String },

    /// No stored credential is available for an authenticated call.
    #[error("not logged in; run `login` first")]
    Unauthorized,

    /// Orchestration progress never reached 100% within the poll budget.
    #[error("orchestration progress unavailable after {polls} polls")]
    OrchestrationTimeout { polls: u32 },

    /// The credential store could not be read or written.
    #[error("credential store error at {path}: {detail}")]
    Store { path: String, detail: String },

    /// The configuration file is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ViewerError {
    /// True for failures the poller retries: transport errors, non-2xx
    /// statuses and undecodable bodies.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ViewerError::Connect { .. }
                | ViewerError::Http { .. }
                | ViewerError::Rejected { .. }
                | ViewerError::Malformed { .. }
        )
    }

    pub(crate) fn malformed(detail: impl std::fmt::Display) -> Self {
        ViewerError::Malformed {
            detail: detail.to_string(),
        }
    }
}

impl From<serde_json::Error> for ViewerError {
    fn from(e: serde_json::Error) -> Self {
        ViewerError::malformed(e)
    }
}
