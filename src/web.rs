//! Web results gathered by the caller's own web search.
//!
//! The file passed with `--web-results` is JSON: either an array of items
//! or an object with a `results` array. Each item needs a `url`; `title`,
//! `snippet` and `date` (RFC 3339 or `YYYY-MM-DD`) are optional.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::path::Path;

use pulse_search::{RawRecord, Source};

use crate::error::{PulseError, Result};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WebFile {
    List(Vec<WebItem>),
    Wrapped { results: Vec<WebItem> },
}

#[derive(Debug, Deserialize)]
struct WebItem {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    date: Option<String>,
}

/// Read web results from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid JSON of the
/// expected shape.
pub fn load_web_results(path: &Path) -> Result<Vec<RawRecord>> {
    let content = std::fs::read_to_string(path)?;
    parse_web_results(&content)
        .map_err(|e| PulseError::Config(format!("{}: {e}", path.display())))
}

pub(crate) fn parse_web_results(json: &str) -> std::result::Result<Vec<RawRecord>, serde_json::Error> {
    let items = match serde_json::from_str::<WebFile>(json)? {
        WebFile::List(items) | WebFile::Wrapped { results: items } => items,
    };
    Ok(items.into_iter().map(into_record).collect())
}

fn into_record(item: WebItem) -> RawRecord {
    let title = item.title.trim();
    let snippet = item.snippet.trim();
    let text = match (title.is_empty(), snippet.is_empty()) {
        (false, false) => format!("{title} - {snippet}"),
        (false, true) => title.to_owned(),
        _ => snippet.to_owned(),
    };
    let mut record = RawRecord::new(Source::Web, item.url.trim(), text);
    record.timestamp = item.date.as_deref().and_then(parse_date);
    record
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}
