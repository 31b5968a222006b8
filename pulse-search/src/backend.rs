//! Backend abstraction and the per-source client built on it.
//!
//! Each transport (public listing, model search, helper tool, social API)
//! implements [`Backend`]. A [`BackendClient`] owns one source's transport
//! chain, as ordered by the capability detector, and applies the shared
//! recovery rules:
//!
//! - every attempt runs under a timeout; a timed-out request is retried
//!   once with half the limit before [`BackendError::Timeout`] surfaces
//! - transport-level failures move silently to the next transport
//! - entitlement failures ([`BackendError::AccessDenied`]) propagate
//!
//! Query-term fallback (shorter candidates on an empty result) sits one
//! level up in [`BackendClient::search_candidates`].

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::BackendError;
use crate::types::{RawRecord, SearchRequest, Source, Transport};

/// A pluggable search transport.
///
/// Implementors translate a [`SearchRequest`] into one backend call and
/// normalise the response into [`RawRecord`]s. An empty result is a valid
/// outcome and must be returned as `Ok(vec![])`, never as an error.
///
/// All implementations must be `Send + Sync` for concurrent queries.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Which transport this implementation represents.
    fn transport(&self) -> Transport;

    /// Run one search.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the transport is unusable, times out,
    /// is refused, or answers with something unparseable.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawRecord>, BackendError>;

    /// The source searched by this transport.
    fn source(&self) -> Source {
        self.transport().source()
    }
}

/// One source's ordered transport chain plus timeout policy.
#[derive(Clone)]
pub struct BackendClient {
    source: Source,
    chain: Vec<Arc<dyn Backend>>,
    timeout: Duration,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("source", &self.source)
            .field("chain", &self.transports())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl BackendClient {
    /// Create a client. Backends whose source differs from `source` are
    /// ignored.
    pub fn new(source: Source, chain: Vec<Arc<dyn Backend>>, timeout: Duration) -> Self {
        let chain = chain.into_iter().filter(|b| b.source() == source).collect();
        Self {
            source,
            chain,
            timeout,
        }
    }

    /// Source this client searches.
    pub fn source(&self) -> Source {
        self.source
    }

    /// Transports in preference order.
    pub fn transports(&self) -> Vec<Transport> {
        self.chain.iter().map(|b| b.transport()).collect()
    }

    /// Search through the transport chain.
    ///
    /// # Errors
    ///
    /// Returns the last transport-level error when every transport failed,
    /// or the first [`BackendError::AccessDenied`].
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<RawRecord>, BackendError> {
        let mut last_error = None;

        for backend in &self.chain {
            let transport = backend.transport();
            match self.attempt(backend.as_ref(), request).await {
                Ok(records) => {
                    tracing::debug!(%transport, count = records.len(), "transport returned records");
                    return Ok(records);
                }
                Err(err) if err.is_transport_failure() => {
                    tracing::warn!(%transport, error = %err, "transport failed, trying next");
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BackendError::Unavailable(format!("no transport configured for {}", self.source))
        }))
    }

    /// Search with query-term fallback: each candidate is tried in turn
    /// until one yields records. Errors stop the walk immediately.
    ///
    /// # Errors
    ///
    /// Propagates the first error from [`BackendClient::search`].
    pub async fn search_candidates<'a, I>(
        &self,
        request: &SearchRequest,
        candidates: I,
    ) -> Result<Vec<RawRecord>, BackendError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for (attempt, candidate) in candidates.into_iter().enumerate() {
            let records = self.search(&request.with_query(candidate)).await?;
            if !records.is_empty() {
                return Ok(records);
            }
            tracing::debug!(source = %self.source, attempt, "empty result, trying shorter query");
            tracing::trace!(query = candidate, "empty candidate");
        }
        Ok(Vec::new())
    }

    /// One transport attempt with the timeout-then-reduced-retry rule.
    async fn attempt(
        &self,
        backend: &dyn Backend,
        request: &SearchRequest,
    ) -> Result<Vec<RawRecord>, BackendError> {
        match tokio::time::timeout(self.timeout, backend.search(request)).await {
            Ok(Err(err)) if !err.is_timeout() => return Err(err),
            Ok(Ok(records)) => return Ok(records),
            _ => {}
        }

        let reduced = request.with_limit((request.limit / 2).max(1));
        tracing::debug!(
            transport = %backend.transport(),
            limit = reduced.limit,
            "request timed out, retrying with reduced limit"
        );

        match tokio::time::timeout(self.timeout, backend.search(&reduced)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(format!(
                "{} exceeded {}s twice",
                backend.transport(),
                self.timeout.as_secs()
            ))),
        }
    }
}
