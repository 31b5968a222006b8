//! Integration tests for the research orchestrator pipeline.
//!
//! These tests run full sessions against mock backends (no network calls)
//! and check the pipeline-level guarantees: deduplication, ranking,
//! query-term fallback, mode handling and the Phase-2 budget.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pulse_search::types::{QueryScope, SearchRequest, SortOrder};
use pulse_search::{
    Backend, BackendClient, BackendError, Depth, Digest, Engagement, Mode, ModeKind, Orchestrator,
    Phase, RawRecord, ResearchSession, SearchConfig, Source, SourceStatus, Transport,
};

type Responder = dyn Fn(&SearchRequest) -> Result<Vec<RawRecord>, BackendError> + Send + Sync;

/// A scripted transport that records every request it receives.
struct MockBackend {
    transport: Transport,
    responder: Box<Responder>,
    calls: Mutex<Vec<SearchRequest>>,
    delay: Option<Duration>,
}

impl MockBackend {
    fn new<F>(transport: Transport, responder: F) -> Arc<Self>
    where
        F: Fn(&SearchRequest) -> Result<Vec<RawRecord>, BackendError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            transport,
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
            delay: None,
        })
    }

    fn slow(transport: Transport, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            transport,
            responder: Box::new(|_| Ok(Vec::new())),
            calls: Mutex::new(Vec::new()),
            delay: Some(delay),
        })
    }

    fn calls(&self) -> Vec<SearchRequest> {
        self.calls.lock().expect("lock").clone()
    }

    fn scoped_calls(&self) -> Vec<SearchRequest> {
        self.calls()
            .into_iter()
            .filter(|r| r.scope != QueryScope::Topic)
            .collect()
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn transport(&self) -> Transport {
        self.transport
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawRecord>, BackendError> {
        self.calls.lock().expect("lock").push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(request)
    }
}

fn client(backend: &Arc<MockBackend>) -> BackendClient {
    BackendClient::new(
        backend.transport.source(),
        vec![Arc::clone(backend) as Arc<dyn Backend>],
        Duration::from_secs(30),
    )
}

fn forum_post(id: &str, author: &str, community: &str, upvotes: u64, days_ago: i64) -> RawRecord {
    let mut r = RawRecord::new(
        Source::Forum,
        format!("https://www.reddit.com/r/{community}/comments/{id}/vibe_motion_thread/"),
        format!("Vibe motion thread {id}"),
    );
    r.author = Some(author.into());
    r.community = Some(community.into());
    r.timestamp = Some(Utc::now() - ChronoDuration::days(days_ago));
    r.engagement = Engagement::new().with("upvotes", upvotes).with("comments", upvotes / 10);
    r.engagement_verified = true;
    r
}

fn social_post(id: u64, author: &str, likes: u64, days_ago: i64) -> RawRecord {
    let mut r = RawRecord::new(
        Source::Social,
        format!("https://x.com/{author}/status/{id}"),
        format!("post {id} about vibe motion"),
    );
    r.author = Some(author.into());
    r.timestamp = Some(Utc::now() - ChronoDuration::days(days_ago));
    r.engagement = Engagement::new().with("likes", likes);
    r.engagement_verified = true;
    r
}

fn config(depth: Depth) -> SearchConfig {
    SearchConfig {
        depth,
        ..Default::default()
    }
}

/// Checks every emitted list: unique origin ids, scores in range, sorted.
fn assert_invariants(session: &ResearchSession) {
    for source in Source::all() {
        let results = session.results(*source);
        let ids: HashSet<&str> = results.iter().map(|r| r.origin_id.as_str()).collect();
        assert_eq!(ids.len(), results.len(), "duplicate origin ids in {source}");
        for r in results {
            let score = r.score.expect("every emitted result is scored");
            assert!((0.0..=1.0).contains(&score), "score {score} out of range");
        }
        assert!(
            results.windows(2).all(|w| w[0].score >= w[1].score),
            "{source} not sorted by score"
        );
    }
}

#[tokio::test]
async fn vibe_motion_forum_only_scenario() {
    let forum = MockBackend::new(Transport::ModelSearch, |req| {
        Ok(vec![
            forum_post("aaa1", "clipmaker", "aivideo", 300, 2),
            forum_post("aaa2", "clipmaker", "aivideo", 120, 4),
            forum_post("aaa3", "someone", "StableDiffusion", 15, 6),
        ]
        .into_iter()
        .take(req.limit)
        .collect())
    });
    let mode = Mode::new(vec![Transport::ModelSearch], vec![]);
    let orchestrator = Orchestrator::new(config(Depth::Default), mode, vec![client(&forum)]);

    let session = orchestrator
        .run("vibe motion best prompt techniques", Vec::new())
        .await
        .expect("session");
    let digest = Digest::from_session(&session, None);

    assert_eq!(digest.mode, ModeKind::ForumOnly);
    assert!(digest.needs_external_search);
    assert_eq!(digest.query, "vibe motion");
    for call in forum.calls() {
        for meta in ["best", "prompt", "techniques"] {
            assert!(!call.query.contains(meta), "query {:?} contains {meta}", call.query);
        }
    }
    assert!(!forum.scoped_calls().is_empty(), "default depth runs Phase 2");
    assert_eq!(session.status(Source::Forum), SourceStatus::Contributed);
    assert_eq!(session.status(Source::Social), SourceStatus::Unavailable);
    assert_invariants(&session);
}

#[tokio::test]
async fn quick_depth_skips_phase_two() {
    let forum = MockBackend::new(Transport::ModelSearch, |_| {
        Ok(vec![
            forum_post("b1", "clipmaker", "aivideo", 300, 2),
            forum_post("b2", "clipmaker", "aivideo", 120, 4),
        ])
    });
    let mode = Mode::new(vec![Transport::ModelSearch], vec![]);
    let orchestrator = Orchestrator::new(config(Depth::Quick), mode, vec![client(&forum)]);

    let session = orchestrator
        .run("vibe motion best prompt techniques", Vec::new())
        .await
        .expect("session");

    assert!(forum.scoped_calls().is_empty());
    assert_eq!(forum.calls().len(), 1);
    assert_eq!(session.results(Source::Forum).len(), 2);
}

#[tokio::test]
async fn unreachable_backend_is_never_queried() {
    let forum = MockBackend::new(Transport::ModelSearch, |_| {
        Ok(vec![forum_post("c1", "a", "rust", 10, 1)])
    });
    let social = MockBackend::new(Transport::SocialApi, |_| Ok(vec![social_post(1, "x", 5, 1)]));
    let mode = Mode::new(vec![Transport::ModelSearch], vec![]);
    let orchestrator =
        Orchestrator::new(config(Depth::Deep), mode, vec![client(&forum), client(&social)]);

    let session = orchestrator.run("rust async", Vec::new()).await.expect("session");
    let digest = Digest::from_session(&session, None);

    assert!(social.calls().is_empty());
    assert!(!digest.transports.contains_key(&Source::Social));
    assert_eq!(digest.mode, ModeKind::ForumOnly);
    assert!(session.results(Source::Social).is_empty());
}

#[tokio::test]
async fn query_fallback_uses_shorter_subset() {
    let forum = MockBackend::new(Transport::ModelSearch, |req| {
        if req.query == "kubernetes operator" {
            Ok(vec![forum_post("d1", "op", "kubernetes", 40, 3)])
        } else {
            Ok(Vec::new())
        }
    });
    let mode = Mode::new(vec![Transport::ModelSearch], vec![]);
    let orchestrator = Orchestrator::new(config(Depth::Quick), mode, vec![client(&forum)]);

    let session = orchestrator
        .run("kubernetes operator reconciliation loop patterns", Vec::new())
        .await
        .expect("session");

    let queries: Vec<String> = forum.calls().into_iter().map(|r| r.query).collect();
    assert_eq!(
        queries,
        vec![
            "kubernetes operator reconciliation loop patterns",
            "kubernetes operator reconciliation",
            "kubernetes operator",
        ]
    );
    assert_eq!(session.results(Source::Forum).len(), 1);
    assert_eq!(session.status(Source::Forum), SourceStatus::Contributed);
}

#[tokio::test]
async fn query_fallback_stops_after_two_retries() {
    let forum = MockBackend::new(Transport::ModelSearch, |_| Ok(Vec::new()));
    let mode = Mode::new(vec![Transport::ModelSearch], vec![]);
    let orchestrator = Orchestrator::new(config(Depth::Quick), mode, vec![client(&forum)]);

    let session = orchestrator
        .run("kubernetes operator reconciliation loop patterns", Vec::new())
        .await
        .expect("session");

    let topic_calls = forum
        .calls()
        .into_iter()
        .filter(|r| r.scope == QueryScope::Topic)
        .count();
    assert_eq!(topic_calls, 3);
    assert_eq!(forum.scoped_calls().len(), 1, "one community guess after the candidates");
    assert_eq!(session.status(Source::Forum), SourceStatus::Empty);
}

#[tokio::test]
async fn empty_forum_search_falls_back_to_community_guess() {
    let forum = MockBackend::new(Transport::PublicListing, |req| match &req.scope {
        QueryScope::Community(name) if name == "nodejs" => {
            Ok(vec![forum_post("g1", "dev", "nodejs", 25, 2)])
        }
        _ => Ok(Vec::new()),
    });
    let mode = Mode::new(vec![Transport::PublicListing], vec![]);
    let orchestrator = Orchestrator::new(config(Depth::Quick), mode, vec![client(&forum)]);

    let session = orchestrator.run("best Node.js tips", Vec::new()).await.expect("session");

    let calls = forum.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].scope, QueryScope::Topic);
    assert_eq!(calls[1].scope, QueryScope::Community("nodejs".into()));
    assert_eq!(calls[1].query, "Node.js");
    assert_eq!(session.status(Source::Forum), SourceStatus::Contributed);
    assert_eq!(session.results(Source::Forum)[0].origin_id, "thread/g1");
    assert_eq!(session.results(Source::Forum)[0].phase, Phase::Primary);
}

#[tokio::test]
async fn social_search_never_guesses_a_community() {
    let social = MockBackend::new(Transport::SocialApi, |_| Ok(Vec::new()));
    let mode = Mode::new(vec![], vec![Transport::SocialApi]);
    let orchestrator = Orchestrator::new(config(Depth::Quick), mode, vec![client(&social)]);

    let session = orchestrator.run("vibe motion", Vec::new()).await.expect("session");

    assert!(social.scoped_calls().is_empty());
    assert_eq!(session.status(Source::Social), SourceStatus::Empty);
}

#[tokio::test]
async fn failed_community_guess_leaves_source_empty() {
    let forum = MockBackend::new(Transport::ModelSearch, |req| match &req.scope {
        QueryScope::Community(_) => Err(BackendError::Transport("HTTP 404".into())),
        _ => Ok(Vec::new()),
    });
    let mode = Mode::new(vec![Transport::ModelSearch], vec![]);
    let orchestrator = Orchestrator::new(config(Depth::Quick), mode, vec![client(&forum)]);

    let session = orchestrator.run("rust", Vec::new()).await.expect("session");

    assert_eq!(forum.scoped_calls().len(), 1);
    assert_eq!(session.status(Source::Forum), SourceStatus::Empty);
    assert!(!session.is_total_failure());
}

#[tokio::test]
async fn stats_sum_engagement_of_kept_results() {
    let social = MockBackend::new(Transport::SocialApi, |_| {
        let mut post = social_post(42, "loud", 500, 1);
        post.engagement = Engagement::new().with("likes", 500).with("reposts", 40);
        Ok(vec![post])
    });
    let mode = Mode::new(vec![], vec![Transport::SocialApi]);
    let orchestrator = Orchestrator::new(config(Depth::Quick), mode, vec![client(&social)]);

    let session = orchestrator.run("vibe motion", Vec::new()).await.expect("session");
    let stats = &session.stats;
    let social_stats = &stats.sources[&Source::Social];
    assert_eq!(social_stats.engagement.get("likes"), 500);
    assert_eq!(social_stats.engagement.get("reposts"), 40);
    assert_eq!(social_stats.total_engagement, 540);
    assert_eq!(stats.total_engagement, 540);
    assert_eq!(stats.most_mentioned.len(), 1);
    assert_eq!(stats.most_mentioned[0].identifier, "loud");

    let json: serde_json::Value =
        serde_json::from_str(&Digest::from_session(&session, None).to_json().expect("json"))
            .expect("parse");
    assert_eq!(json["stats"]["total_engagement"], 540);
    assert_eq!(json["stats"]["sources"]["social"]["total_engagement"], 540);
    assert_eq!(json["stats"]["sources"]["social"]["engagement"]["reposts"], 40);
    assert_eq!(json["stats"]["most_mentioned"][0]["mention_count"], 1);
}

#[tokio::test]
async fn most_mentioned_ranks_by_mentions_not_engagement() {
    let forum = MockBackend::new(Transport::ModelSearch, |_| {
        Ok(vec![
            forum_post("h1", "viral", "bigsub", 5_000, 1),
            forum_post("h2", "steady", "rust", 5, 1),
            forum_post("h3", "steady", "rust", 5, 2),
            forum_post("h4", "steady", "rust", 5, 3),
        ])
    });
    let mode = Mode::new(vec![Transport::ModelSearch], vec![]);
    let orchestrator = Orchestrator::new(config(Depth::Quick), mode, vec![client(&forum)]);

    let session = orchestrator.run("rust", Vec::new()).await.expect("session");

    let top: HashSet<&str> = session
        .stats
        .most_mentioned
        .iter()
        .take(2)
        .map(|e| e.identifier.as_str())
        .collect();
    assert_eq!(top, HashSet::from(["rust", "steady"]));
    assert_eq!(session.stats.most_mentioned[0].mention_count, 3);
    // 5000 upvotes + 500 comments, then three threads of 5 upvotes.
    assert_eq!(session.stats.total_engagement, 5_515);
}

#[tokio::test]
async fn phase_collision_keeps_primary_record() {
    let social = MockBackend::new(Transport::SocialCli, |req| match &req.scope {
        QueryScope::Topic => Ok(vec![
            social_post(100, "alice", 20, 1),
            social_post(101, "alice", 30, 2),
        ]),
        QueryScope::Author(_) => {
            let mut again = social_post(100, "alice", 9_000, 1);
            again.url = "https://twitter.com/alice/status/100?s=20".into();
            Ok(vec![again, social_post(102, "alice", 5, 3)])
        }
        QueryScope::Community(_) => Ok(Vec::new()),
    });
    let mode = Mode::new(vec![], vec![Transport::SocialCli]);
    let orchestrator = Orchestrator::new(config(Depth::Default), mode, vec![client(&social)]);

    let session = orchestrator.run("vibe motion", Vec::new()).await.expect("session");
    let results = session.results(Source::Social);

    let collided: Vec<_> = results.iter().filter(|r| r.origin_id == "status/100").collect();
    assert_eq!(collided.len(), 1);
    assert_eq!(collided[0].phase, Phase::Primary);
    assert_eq!(collided[0].engagement.get("likes"), 20);
    assert!(results
        .iter()
        .any(|r| r.origin_id == "status/102" && r.phase == Phase::Supplemental));
    assert_invariants(&session);
}

#[tokio::test]
async fn zero_entities_means_zero_supplemental_queries() {
    let social = MockBackend::new(Transport::SocialApi, |_| {
        let mut repeat = social_post(3, "c", 5, 3);
        repeat.author = None;
        Ok(vec![
            social_post(1, "a", 3, 1),
            social_post(2, "b", 4, 2),
            social_post(3, "c", 5, 3),
            repeat,
        ])
    });
    let mode = Mode::new(vec![], vec![Transport::SocialApi]);
    let orchestrator = Orchestrator::new(config(Depth::Deep), mode, vec![client(&social)]);

    let session = orchestrator.run("vibe motion", Vec::new()).await.expect("session");

    assert!(session.entities.is_empty());
    assert!(social.scoped_calls().is_empty());
    let ids: HashSet<&str> = session
        .results(Source::Social)
        .iter()
        .map(|r| r.origin_id.as_str())
        .collect();
    assert_eq!(ids, HashSet::from(["status/1", "status/2", "status/3"]));
    assert!(session.results(Source::Social).iter().all(|r| r.phase == Phase::Primary));
}

#[tokio::test]
async fn deep_tier_caps_promoted_entities() {
    let social = MockBackend::new(Transport::SocialCli, |req| match &req.scope {
        QueryScope::Topic => Ok((0..10u64)
            .flat_map(|i| {
                let author = format!("author{i}");
                vec![
                    social_post(i * 2, &author, 10 + i, 1),
                    social_post(i * 2 + 1, &author, 10 + i, 2),
                ]
            })
            .collect()),
        _ => Ok(Vec::new()),
    });
    let mode = Mode::new(vec![], vec![Transport::SocialCli]);
    let orchestrator = Orchestrator::new(config(Depth::Deep), mode, vec![client(&social)]);

    let session = orchestrator.run("vibe motion", Vec::new()).await.expect("session");
    let k = Depth::Deep.profile().entities_per_kind;

    assert_eq!(session.entities.len(), k);
    // Empty scoped results walk the query candidates, so count distinct
    // (scope, sort) pairs rather than raw calls.
    let scoped: HashSet<(QueryScope, SortOrder)> = social
        .scoped_calls()
        .into_iter()
        .map(|r| (r.scope, r.sort))
        .collect();
    assert_eq!(scoped.len(), k * Depth::Deep.profile().queries_per_entity);
    assert!(scoped.iter().any(|(_, sort)| *sort == SortOrder::Top));
    let promoted: HashSet<&str> = session.entities.iter().map(|e| e.identifier.as_str()).collect();
    assert!(promoted.contains("author9"), "highest engagement is promoted first");
    assert!(!promoted.contains("author0"));
}

#[tokio::test]
async fn failing_backend_degrades_without_aborting() {
    let forum = MockBackend::new(Transport::ModelSearch, |_| {
        Err(BackendError::AccessDenied("model gpt-4o-mini not accessible".into()))
    });
    let social = MockBackend::new(Transport::SocialApi, |_| Ok(vec![social_post(7, "z", 10, 1)]));
    let mode = Mode::new(vec![Transport::ModelSearch], vec![Transport::SocialApi]);
    let orchestrator =
        Orchestrator::new(config(Depth::Quick), mode, vec![client(&forum), client(&social)]);

    let session = orchestrator.run("vibe motion", Vec::new()).await.expect("session");

    assert!(matches!(session.status(Source::Forum), SourceStatus::Degraded { .. }));
    assert_eq!(session.status(Source::Social), SourceStatus::Contributed);
    assert!(!session.is_total_failure());
    assert!(!session.needs_external_search());
}

#[tokio::test]
async fn every_backend_failing_is_total_failure() {
    let forum = MockBackend::new(Transport::ModelSearch, |_| {
        Err(BackendError::Transport("HTTP 502".into()))
    });
    let mode = Mode::new(vec![Transport::ModelSearch], vec![]);
    let orchestrator = Orchestrator::new(config(Depth::Quick), mode, vec![client(&forum)]);

    let session = orchestrator.run("vibe motion", Vec::new()).await.expect("session");
    assert!(session.is_total_failure());
}

#[tokio::test(start_paused = true)]
async fn session_deadline_keeps_finished_backends() {
    let forum = MockBackend::slow(Transport::ModelSearch, Duration::from_secs(3600));
    let social = MockBackend::new(Transport::SocialApi, |_| Ok(vec![social_post(8, "q", 3, 1)]));
    let mode = Mode::new(vec![Transport::ModelSearch], vec![Transport::SocialApi]);
    let config = SearchConfig {
        depth: Depth::Quick,
        timeout_seconds: 60,
        session_timeout_seconds: 90,
        ..Default::default()
    };
    let forum_client = BackendClient::new(
        Source::Forum,
        vec![Arc::clone(&forum) as Arc<dyn Backend>],
        Duration::from_secs(60),
    );
    let orchestrator = Orchestrator::new(config, mode, vec![forum_client, client(&social)]);

    let session = orchestrator.run("vibe motion", Vec::new()).await.expect("session");

    assert!(matches!(session.status(Source::Forum), SourceStatus::Degraded { .. }));
    assert_eq!(session.results(Source::Social).len(), 1);
}

#[tokio::test]
async fn stale_and_undated_records_follow_window_rules() {
    let forum = MockBackend::new(Transport::ModelSearch, |_| {
        let mut undated = forum_post("e2", "b", "rust", 10, 0);
        undated.timestamp = None;
        Ok(vec![
            forum_post("e1", "a", "rust", 10, 45),
            undated,
            forum_post("e3", "c", "rust", 10, 1),
        ])
    });
    let mode = Mode::new(vec![Transport::ModelSearch], vec![]);
    let orchestrator = Orchestrator::new(config(Depth::Quick), mode, vec![client(&forum)]);

    let session = orchestrator.run("rust", Vec::new()).await.expect("session");
    let results = session.results(Source::Forum);

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.origin_id != "thread/e1"));
    let undated = results.iter().find(|r| r.origin_id == "thread/e2").expect("kept");
    assert!(undated.date_estimated);
    assert_eq!(session.stats.dated_results, 1);
}

#[tokio::test]
async fn results_are_truncated_to_tier_ceiling() {
    let social = MockBackend::new(Transport::SocialApi, |req| {
        Ok((0..req.limit as u64 + 20)
            .map(|i| social_post(i, &format!("u{i}"), i, 1))
            .collect())
    });
    let mode = Mode::new(vec![], vec![Transport::SocialApi]);
    let orchestrator = Orchestrator::new(config(Depth::Quick), mode, vec![client(&social)]);

    let session = orchestrator.run("vibe motion", Vec::new()).await.expect("session");
    assert_eq!(
        session.results(Source::Social).len(),
        Depth::Quick.profile().social_limit
    );
    assert_invariants(&session);
}

#[tokio::test]
async fn web_results_join_the_digest() {
    let forum = MockBackend::new(Transport::ModelSearch, |_| {
        Ok(vec![forum_post("f1", "a", "rust", 10, 1)])
    });
    let mode = Mode::new(vec![Transport::ModelSearch], vec![]);
    let orchestrator = Orchestrator::new(config(Depth::Quick), mode, vec![client(&forum)]);

    let mut web = RawRecord::new(Source::Web, "https://blog.example.com/vibe-motion", "Vibe motion review");
    web.timestamp = Some(Utc::now() - ChronoDuration::days(2));
    let session = orchestrator.run("vibe motion", vec![web]).await.expect("session");
    let digest = Digest::from_session(&session, Some("Runway"));

    assert_eq!(digest.sources[&Source::Web].results.len(), 1);
    assert_eq!(digest.sources[&Source::Web].status, SourceStatus::Contributed);
    assert_eq!(digest.total_results(), 2);
    assert_invariants(&session);
}
