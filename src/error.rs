//! Error types for the pulse CLI.

/// Top-level error type for the CLI.
#[derive(Debug, thiserror::Error)]
pub enum PulseError {
    /// Configuration file or argument error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Research session error.
    #[error(transparent)]
    Search(#[from] pulse_search::SearchError),
}

impl PulseError {
    /// Whether the error stems from how pulse was invoked rather than from
    /// a failed search.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Search(pulse_search::SearchError::Config(_))
        )
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PulseError>;
