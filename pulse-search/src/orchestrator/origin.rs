//! Canonical origin identifiers for deduplication.
//!
//! The same thread or post reaches us through different transports and in
//! different URL spellings (`old.` / `www.` hosts, trailing slugs, tracking
//! parameters, `twitter.com` vs `x.com`). Forum threads and social posts
//! are keyed by their backend-native id; anything else falls back to a
//! normalised URL.

use url::Url;

use crate::types::Source;

/// Tracking query parameters stripped during normalisation.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "ref",
    "ref_src",
    "s",
    "t",
    "si",
    "share_id",
    "context",
];

/// A forum thread located by its URL path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForumThread {
    /// Community name as written in the URL.
    pub community: Option<String>,
    /// Backend thread id, lowercase.
    pub id: String,
}

/// Canonical dedup key of a record.
///
/// # Examples
///
/// ```
/// use pulse_search::orchestrator::origin::origin_id;
/// use pulse_search::Source;
///
/// let a = origin_id(Source::Forum, "https://old.reddit.com/r/rust/comments/Abc12/title/?utm_source=share");
/// let b = origin_id(Source::Forum, "https://www.reddit.com/r/rust/comments/abc12/");
/// assert_eq!(a, b);
/// ```
pub fn origin_id(source: Source, url: &str) -> String {
    match source {
        Source::Forum => forum_thread(url).map(|t| format!("thread/{}", t.id)),
        Source::Social => social_status(url).map(|id| format!("status/{id}")),
        Source::Web => None,
    }
    .unwrap_or_else(|| normalize_url(url))
}

/// Locate a forum thread from `/r/{community}/comments/{id}` or
/// `/comments/{id}` URL paths. The host is not checked.
pub fn forum_thread(url: &str) -> Option<ForumThread> {
    let parsed = Url::parse(url).ok()?;
    let segments: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();

    let comments = segments.iter().position(|s| s.eq_ignore_ascii_case("comments"))?;
    let id = segments.get(comments + 1)?;
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    let community = match comments {
        0 => None,
        2 if segments[0].eq_ignore_ascii_case("r") => Some(segments[1].to_owned()),
        _ => return None,
    };

    Some(ForumThread {
        community,
        id: id.to_ascii_lowercase(),
    })
}

/// Numeric post id from `/{user}/status/{id}` or `/i/web/status/{id}`.
pub fn social_status(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segments: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();
    let status = segments.iter().position(|s| *s == "status" || *s == "statuses")?;
    let id = segments.get(status + 1)?;
    (!id.is_empty() && id.chars().all(|c| c.is_ascii_digit())).then(|| (*id).to_owned())
}

/// Normalise a URL for comparison.
///
/// Lowercases scheme and host, drops default ports, the fragment, tracking
/// parameters and a trailing slash, and sorts the remaining query
/// parameters. Unparseable input is returned unchanged.
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut parsed) = Url::parse(raw.trim()) else {
        return raw.to_string();
    };

    parsed.set_fragment(None);

    if matches!(
        (parsed.scheme(), parsed.port()),
        ("http", Some(80)) | ("https", Some(443))
    ) {
        let _ = parsed.set_port(None);
    }

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();

    if params.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(&params);
    }

    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(&path[..path.len() - 1]);
    }

    parsed.to_string()
}
