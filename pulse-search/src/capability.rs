//! Capability detection: which backends a session can reach, and how.
//!
//! Detection happens once per session. [`probe_environment`] performs the
//! read-only inspection (credential presence, helper tool on `PATH` and
//! logged in) and [`detect_mode`] turns the resulting [`Capabilities`] into
//! an immutable [`Mode`]. Transport ordering lives here and nowhere else:
//! free transports first, paid ones as fallback.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::process::Command;

use crate::config::{SearchConfig, SourceFilter};
use crate::types::{Source, Transport};

/// How long `whoami` on the helper tool may take.
const HELPER_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// API credentials, loaded once at startup.
///
/// `Debug` redacts every value.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    forum_api_key: Option<String>,
    social_api_key: Option<String>,
}

impl Credentials {
    /// Build credentials; empty or whitespace-only keys count as absent.
    pub fn new(forum_api_key: Option<String>, social_api_key: Option<String>) -> Self {
        let clean = |key: Option<String>| key.filter(|k| !k.trim().is_empty());
        Self {
            forum_api_key: clean(forum_api_key),
            social_api_key: clean(social_api_key),
        }
    }

    /// Key for the forum model-search API.
    pub fn forum_api_key(&self) -> Option<&str> {
        self.forum_api_key.as_deref()
    }

    /// Key for the social search API.
    pub fn social_api_key(&self) -> Option<&str> {
        self.social_api_key.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("forum_api_key", &self.forum_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("social_api_key", &self.social_api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// State of the optional local social helper tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelperStatus {
    /// The program was found on `PATH`.
    pub installed: bool,
    /// Logged-in user reported by `whoami`, if any.
    pub username: Option<String>,
}

impl HelperStatus {
    /// Whether the tool can run searches.
    pub fn is_ready(&self) -> bool {
        self.installed && self.username.is_some()
    }
}

/// Raw facts about the environment, gathered without side effects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// A forum model-search API key is configured.
    pub forum_api_key: bool,
    /// A social search API key is configured.
    pub social_api_key: bool,
    /// The public forum listing is enabled in configuration.
    pub public_forum_search: bool,
    /// Local social helper state.
    pub social_helper: HelperStatus,
}

/// Coarse summary of the reachable backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModeKind {
    /// Forum and social both reachable.
    Both,
    /// Only the forum backend.
    ForumOnly,
    /// Only the social backend.
    SocialOnly,
    /// Neither; the external web search is the only source.
    WebOnly,
}

impl ModeKind {
    /// Returns the kebab-case name used in digests.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Both => "both",
            Self::ForumOnly => "forum-only",
            Self::SocialOnly => "social-only",
            Self::WebOnly => "web-only",
        }
    }
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-session capability record: the ordered transport chain of every
/// reachable backend. Immutable once detected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mode {
    forum: Vec<Transport>,
    social: Vec<Transport>,
}

impl Mode {
    /// Build a mode from explicit chains. Transports are filtered to the
    /// matching source.
    pub fn new(forum: Vec<Transport>, social: Vec<Transport>) -> Self {
        Self {
            forum: forum.into_iter().filter(|t| t.source() == Source::Forum).collect(),
            social: social.into_iter().filter(|t| t.source() == Source::Social).collect(),
        }
    }

    /// Transport chain for a source, primary first. Empty when unreachable.
    pub fn transports(&self, source: Source) -> &[Transport] {
        match source {
            Source::Forum => &self.forum,
            Source::Social => &self.social,
            Source::Web => &[],
        }
    }

    /// Whether a source has at least one transport.
    pub fn reaches(&self, source: Source) -> bool {
        !self.transports(source).is_empty()
    }

    /// Searchable sources in this mode.
    pub fn sources(&self) -> Vec<Source> {
        [Source::Forum, Source::Social]
            .into_iter()
            .filter(|s| self.reaches(*s))
            .collect()
    }

    /// Coarse summary.
    pub fn kind(&self) -> ModeKind {
        match (self.reaches(Source::Forum), self.reaches(Source::Social)) {
            (true, true) => ModeKind::Both,
            (true, false) => ModeKind::ForumOnly,
            (false, true) => ModeKind::SocialOnly,
            (false, false) => ModeKind::WebOnly,
        }
    }
}

/// Derive the session [`Mode`] from environment facts and the caller's
/// source restriction. Never fails; missing capabilities shrink the mode.
pub fn detect_mode(caps: &Capabilities, filter: SourceFilter) -> Mode {
    let mut forum = Vec::new();
    if filter.allows(Source::Forum) {
        if caps.public_forum_search {
            forum.push(Transport::PublicListing);
        }
        if caps.forum_api_key {
            forum.push(Transport::ModelSearch);
        }
    }

    let mut social = Vec::new();
    if filter.allows(Source::Social) {
        if caps.social_helper.is_ready() {
            social.push(Transport::SocialCli);
        }
        if caps.social_api_key {
            social.push(Transport::SocialApi);
        }
    }

    let mode = Mode::new(forum, social);
    tracing::debug!(mode = %mode.kind(), forum = ?mode.forum, social = ?mode.social, "capabilities detected");
    mode
}

/// Inspect credentials and the local helper tool.
pub async fn probe_environment(credentials: &Credentials, config: &SearchConfig) -> Capabilities {
    let social_helper = if config.sources.allows(Source::Social) {
        probe_helper(&config.social.cli_program).await
    } else {
        HelperStatus::default()
    };

    Capabilities {
        forum_api_key: credentials.forum_api_key().is_some(),
        social_api_key: credentials.social_api_key().is_some(),
        public_forum_search: config.forum.public_search,
        social_helper,
    }
}

/// Check whether the helper program is installed and logged in.
///
/// Runs `<program> whoami`; a zero exit with non-empty output means the
/// first output line is the username.
pub async fn probe_helper(program: &str) -> HelperStatus {
    let Ok(path) = which::which(program) else {
        tracing::debug!(program, "social helper not found on PATH");
        return HelperStatus::default();
    };

    let output = tokio::time::timeout(
        HELPER_PROBE_TIMEOUT,
        Command::new(&path).arg("whoami").kill_on_drop(true).output(),
    )
    .await;

    let username = match output {
        Ok(Ok(out)) if out.status.success() => parse_whoami(&String::from_utf8_lossy(&out.stdout)),
        Ok(Ok(out)) => {
            tracing::debug!(program, status = %out.status, "social helper not authenticated");
            None
        }
        Ok(Err(err)) => {
            tracing::debug!(program, error = %err, "social helper failed to run");
            None
        }
        Err(_) => {
            tracing::debug!(program, "social helper whoami timed out");
            None
        }
    };

    HelperStatus {
        installed: true,
        username,
    }
}

/// First non-empty line of `whoami` output, without a leading `@`.
fn parse_whoami(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_start_matches('@').to_owned())
}
