//! Shared HTTP client and request pacing.
//!
//! One [`reqwest::Client`] is built per session and shared by every HTTP
//! transport and the engagement enricher.

use crate::config::SearchConfig;
use crate::error::BackendError;
use rand::Rng;
use std::time::Duration;

/// Build the session's [`reqwest::Client`].
///
/// The client has:
/// - Request timeout from config (the orchestrator adds its own deadline
///   on top, so this is only a backstop)
/// - The configured User-Agent, which the public forum endpoints require
/// - gzip decompression
///
/// # Errors
///
/// Returns [`BackendError::Transport`] if the client cannot be constructed.
pub fn build_client(config: &SearchConfig) -> Result<reqwest::Client, BackendError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(config.user_agent.clone())
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| BackendError::Transport(format!("failed to build HTTP client: {e}")))
}

/// Pick a random delay within `(min_ms, max_ms)`.
pub fn jitter(range_ms: (u64, u64)) -> Duration {
    let (min, max) = range_ms;
    if max <= min {
        return Duration::from_millis(min);
    }
    Duration::from_millis(rand::thread_rng().gen_range(min..=max))
}

/// Map a non-success HTTP status and body to a [`BackendError`].
///
/// 401 is an unusable credential; 429 and 5xx are transport trouble the
/// caller may route around. Entitlement detection for 400/403 is left to
/// the transport that knows its provider's wording, so both map to
/// [`BackendError::Transport`] here.
pub fn status_error(status: reqwest::StatusCode, body: &str) -> BackendError {
    let snippet: String = body.chars().take(300).collect();
    match status.as_u16() {
        401 => BackendError::Unavailable(format!("HTTP 401: {snippet}")),
        408 | 504 => BackendError::Timeout(format!("HTTP {}: {snippet}", status.as_u16())),
        code => BackendError::Transport(format!("HTTP {code}: {snippet}")),
    }
}
