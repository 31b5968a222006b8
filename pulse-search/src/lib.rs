//! # pulse-search
//!
//! Research orchestrator for pulse: gathers recent discussion of a topic
//! from a forum source and a short-form social source, ranks it, and emits
//! a compact digest for downstream synthesis.
//!
//! ## Design
//!
//! - Capability detection picks, once per session, which backends are
//!   reachable and through which transports (free first, paid as fallback)
//! - Verbose topics are reduced to their core subject, with shorter
//!   fallback queries when a backend returns nothing
//! - Phase 1 searches every reachable backend concurrently; recurring
//!   authors and communities then drive a narrower Phase-2 pass
//! - Forum engagement estimates are replaced by real counts from the
//!   public thread endpoint
//! - Results are deduplicated by canonical origin id, scored on recency,
//!   relevance and engagement, and truncated to per-tier ceilings
//! - Graceful degradation: a failing backend shrinks the digest, it never
//!   aborts the session
//!
//! ## Security
//!
//! - API keys live in an immutable [`Credentials`] value with a redacting
//!   `Debug` and never appear in errors or logs
//! - Query text is logged only at trace / debug level

pub mod backend;
pub mod backends;
pub mod capability;
pub mod config;
pub mod digest;
pub mod enrich;
pub mod entities;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod query;
pub mod session;
pub mod types;

pub use backend::{Backend, BackendClient};
pub use capability::{Credentials, Mode, ModeKind};
pub use config::{Depth, SearchConfig, SourceFilter};
pub use digest::Digest;
pub use error::{BackendError, Result, SearchError};
pub use orchestrator::Orchestrator;
pub use session::{ResearchSession, SourceStatus};
pub use types::{Engagement, Entity, Phase, RawRecord, SearchResult, Source, Transport};

use enrich::Enricher;

/// Detect which backends this environment can reach.
pub async fn detect(credentials: &Credentials, config: &SearchConfig) -> Mode {
    let capabilities = capability::probe_environment(credentials, config).await;
    capability::detect_mode(&capabilities, config.sources)
}

/// Run a full research session on `topic`.
///
/// `web_results` are results the caller gathered with its own web search,
/// if any; they are ranked alongside the backend results.
///
/// # Errors
///
/// Returns [`SearchError::Config`] for an invalid config or empty topic,
/// and [`SearchError::NoUsableBackend`] when no backend is reachable and
/// the web fallback is disabled. Individual backend failures are reported
/// in the session's per-source status instead.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> pulse_search::Result<()> {
/// let config = pulse_search::SearchConfig::default();
/// let credentials = pulse_search::Credentials::new(std::env::var("OPENAI_API_KEY").ok(), None);
/// let session = pulse_search::research("vibe motion", &config, &credentials, Vec::new()).await?;
/// let digest = pulse_search::Digest::from_session(&session, None);
/// println!("{}", digest.to_json().unwrap_or_default());
/// # Ok(())
/// # }
/// ```
pub async fn research(
    topic: &str,
    config: &SearchConfig,
    credentials: &Credentials,
    web_results: Vec<RawRecord>,
) -> Result<ResearchSession> {
    config.validate()?;
    let mode = detect(credentials, config).await;
    let client = http::build_client(config)?;
    let clients = backends::build_clients(&mode, config, credentials, &client);

    let reaches_forum = mode.reaches(Source::Forum);
    let mut orchestrator = Orchestrator::new(config.clone(), mode, clients);
    if reaches_forum {
        orchestrator = orchestrator.with_enricher(Enricher::new(client, config));
    }
    orchestrator.run(topic, web_results).await
}
