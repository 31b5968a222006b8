//! Backend transport implementations.
//!
//! Each module provides a struct implementing [`crate::backend::Backend`]
//! for one [`Transport`]. [`build_clients`] turns a detected
//! [`Mode`] into one [`BackendClient`] per reachable source.

pub mod forum_listing;
pub mod forum_model;
pub mod models;
pub mod responses;
pub mod social_api;
pub mod social_cli;

pub use forum_listing::ForumListing;
pub use forum_model::ForumModelSearch;
pub use social_api::SocialApi;
pub use social_cli::SocialCli;

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{Backend, BackendClient};
use crate::capability::{Credentials, Mode};
use crate::config::SearchConfig;
use crate::types::Transport;

/// Build one client per source reached by `mode`, transports in mode order.
///
/// A paid transport whose credential is missing is skipped; the capability
/// detector never puts one in the mode, so this only matters for
/// hand-built modes.
pub fn build_clients(
    mode: &Mode,
    config: &SearchConfig,
    credentials: &Credentials,
    http: &reqwest::Client,
) -> Vec<BackendClient> {
    let timeout = Duration::from_secs(config.timeout_seconds);
    mode.sources()
        .into_iter()
        .map(|source| {
            let chain = mode
                .transports(source)
                .iter()
                .filter_map(|t| build_backend(*t, config, credentials, http))
                .collect();
            BackendClient::new(source, chain, timeout)
        })
        .collect()
}

/// Instantiate a single transport.
pub fn build_backend(
    transport: Transport,
    config: &SearchConfig,
    credentials: &Credentials,
    http: &reqwest::Client,
) -> Option<Arc<dyn Backend>> {
    match transport {
        Transport::PublicListing => Some(Arc::new(ForumListing::new(
            http.clone(),
            &config.forum.listing_base_url,
        ))),
        Transport::ModelSearch => credentials.forum_api_key().map(|key| {
            Arc::new(ForumModelSearch::new(http.clone(), key, &config.forum)) as Arc<dyn Backend>
        }),
        Transport::SocialCli => Some(Arc::new(SocialCli::new(&config.social.cli_program))),
        Transport::SocialApi => credentials.social_api_key().map(|key| {
            Arc::new(SocialApi::new(http.clone(), key, &config.social)) as Arc<dyn Backend>
        }),
    }
}

/// Parse the date formats backends emit: RFC 3339, `YYYY-MM-DD`, and the
/// classic `Wed Jan 15 14:30:00 +0000 2026` form.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("null") {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
    }
    DateTime::parse_from_str(raw, "%a %b %d %H:%M:%S %z %Y")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Convert fractional epoch seconds.
pub(crate) fn from_epoch(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    DateTime::from_timestamp(seconds as i64, 0)
}

/// First day of a lookback window ending today.
pub(crate) fn since_date(lookback_days: u32) -> NaiveDate {
    (Utc::now() - chrono::Duration::days(i64::from(lookback_days))).date_naive()
}

/// Strip `@`, `u/`, `r/` and `/u/`-style prefixes from a handle or
/// community name.
pub(crate) fn strip_handle(raw: &str) -> String {
    let mut name = raw.trim().trim_start_matches('/');
    for prefix in ["u/", "r/", "U/", "R/", "@"] {
        if let Some(rest) = name.strip_prefix(prefix) {
            name = rest;
        }
    }
    name.trim().to_owned()
}
