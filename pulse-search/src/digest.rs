//! Compact structured digest of a finished session.
//!
//! The digest is what downstream synthesis consumes: ranked results per
//! source, each source's status, the entities that drove Phase 2, summary
//! counters, and whether the consumer still has to run a web search.
//! Building it is pure.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::capability::ModeKind;
use crate::session::{ResearchSession, SessionStats, SourceStatus};
use crate::types::{Entity, SearchResult, Source, Transport};

/// Serialisable summary of one research session.
#[derive(Debug, Clone, Serialize)]
pub struct Digest {
    /// Topic as given.
    pub topic: String,
    /// Query actually sent (most specific candidate).
    pub query: String,
    /// Tool the findings are meant for, when the caller named one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_tool: Option<String>,
    /// Depth tier name.
    pub depth: &'static str,
    /// Which backends were reachable.
    pub mode: ModeKind,
    /// Transport chain per searched source.
    pub transports: BTreeMap<Source, Vec<Transport>>,
    /// Consumer should run its own web search.
    pub needs_external_search: bool,
    /// Lookback window.
    pub range: DigestRange,
    /// Status and ranked results per source.
    pub sources: BTreeMap<Source, SourceDigest>,
    /// Promoted entities.
    pub entities: Vec<Entity>,
    /// Counters.
    pub stats: SessionStats,
}

/// Lookback window in calendar days.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DigestRange {
    /// First day.
    pub from: NaiveDate,
    /// Last day.
    pub to: NaiveDate,
    /// Window length.
    pub days: u32,
}

/// One source's section of the digest.
#[derive(Debug, Clone, Serialize)]
pub struct SourceDigest {
    /// How the source fared.
    pub status: SourceStatus,
    /// Ranked results, truncated to the tier ceiling.
    pub results: Vec<SearchResult>,
}

impl Digest {
    /// Build the digest of a session.
    pub fn from_session(session: &ResearchSession, target_tool: Option<&str>) -> Self {
        let profile = session.depth.profile();
        let sources = Source::all()
            .iter()
            .map(|source| {
                let mut results = session.results(*source).to_vec();
                results.truncate(profile.ceiling(*source));
                (
                    *source,
                    SourceDigest {
                        status: session.status(*source),
                        results,
                    },
                )
            })
            .collect();

        let transports = session
            .mode
            .sources()
            .into_iter()
            .map(|s| (s, session.mode.transports(s).to_vec()))
            .collect();

        Self {
            topic: session.topic.clone(),
            query: session.plan.primary().to_owned(),
            target_tool: target_tool
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned),
            depth: session.depth.name(),
            mode: session.mode.kind(),
            transports,
            needs_external_search: session.needs_external_search(),
            range: DigestRange {
                from: session.window.from_date(),
                to: session.window.to_date(),
                days: session.window.days,
            },
            sources,
            entities: session.entities.clone(),
            stats: session.stats.clone(),
        }
    }

    /// Results across all sources.
    pub fn total_results(&self) -> usize {
        self.sources.values().map(|s| s.results.len()).sum()
    }

    /// Compact single-line JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Indented JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Mode;
    use crate::config::Depth;
    use crate::orchestrator::LookbackWindow;
    use crate::query::normalize;
    use crate::types::{Engagement, Phase};
    use chrono::Utc;

    fn result(id: usize) -> SearchResult {
        SearchResult {
            source: Source::Social,
            origin_id: format!("status/{id}"),
            url: format!("https://x.com/a/status/{id}"),
            author: Some("a".into()),
            community: None,
            text: "vibe motion".into(),
            timestamp: Utc::now(),
            date_estimated: false,
            engagement: Engagement::new().with("likes", 1),
            engagement_verified: true,
            score: Some(0.5),
            phase: Phase::Primary,
        }
    }

    fn session() -> ResearchSession {
        let mut results = BTreeMap::new();
        results.insert(Source::Social, (0..40).map(result).collect());
        let mut status = BTreeMap::new();
        status.insert(Source::Social, SourceStatus::Contributed);
        ResearchSession {
            topic: "vibe motion best prompt techniques".into(),
            plan: normalize("vibe motion best prompt techniques"),
            window: LookbackWindow::ending_at(Utc::now(), 30),
            depth: Depth::Quick,
            mode: Mode::new(vec![], vec![Transport::SocialCli]),
            results,
            status,
            entities: Vec::new(),
            stats: SessionStats::default(),
            include_web: false,
        }
    }

    #[test]
    fn digest_truncates_to_ceiling_and_reports_mode() {
        let digest = Digest::from_session(&session(), Some("Midjourney"));
        assert_eq!(digest.query, "vibe motion");
        assert_eq!(digest.mode, ModeKind::SocialOnly);
        assert!(digest.needs_external_search);
        assert_eq!(digest.sources[&Source::Social].results.len(), 12);
        assert_eq!(digest.sources[&Source::Forum].status, SourceStatus::Unavailable);
        assert_eq!(digest.total_results(), 12);
        assert_eq!(digest.target_tool.as_deref(), Some("Midjourney"));
    }

    #[test]
    fn digest_json_shape() {
        let json = Digest::from_session(&session(), None).to_json().expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(value["mode"], "social-only");
        assert_eq!(value["needs_external_search"], true);
        assert_eq!(value["sources"]["social"]["status"]["state"], "contributed");
        assert_eq!(value["sources"]["social"]["results"][0]["phase"], 1);
        assert_eq!(value["transports"]["social"][0], "social_cli");
        assert!(value.get("target_tool").is_none());
    }

    #[test]
    fn digest_is_pure() {
        let s = session();
        let a = Digest::from_session(&s, None).to_json().expect("json");
        let b = Digest::from_session(&s, None).to_json().expect("json");
        assert_eq!(a, b);
    }
}
