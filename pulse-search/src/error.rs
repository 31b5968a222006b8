//! Error types for the pulse-search crate.
//!
//! Two layers: [`BackendError`] describes why a single backend request
//! failed, and drives transport / model fallback. [`SearchError`] is what a
//! whole research session can fail with, which is deliberately narrow: most
//! backend trouble degrades the session instead of aborting it.
//!
//! No API keys or sensitive data appear in error messages.

/// Failure of a single search request against one backend transport.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    /// The transport cannot be used at all (missing credential, helper
    /// tool not installed or not logged in).
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The request did not finish within its time budget.
    #[error("backend timed out: {0}")]
    Timeout(String),

    /// The account is not entitled to the requested model or resource.
    #[error("backend access denied: {0}")]
    AccessDenied(String),

    /// HTTP / process level failure (connection error, non-success status,
    /// rate limiting, non-zero exit).
    #[error("backend transport error: {0}")]
    Transport(String),

    /// The backend answered but the payload could not be understood.
    #[error("backend parse error: {0}")]
    Parse(String),
}

impl BackendError {
    /// Whether the next transport in a backend's chain should be tried.
    ///
    /// Everything except an entitlement failure is transport-level.
    pub fn is_transport_failure(&self) -> bool {
        !matches!(self, Self::AccessDenied(_))
    }

    /// Whether this is a timeout (retried once with a smaller limit).
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Errors that abort a whole research session.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// No backend is reachable and the external web fallback is disabled.
    #[error("no usable backend: {0}")]
    NoUsableBackend(String),

    /// Invalid search configuration.
    #[error("config error: {0}")]
    Config(String),

    /// A backend failure surfaced directly to the caller.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Convenience type alias for pulse-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
