//! Model selection for the forum model-search transport.
//!
//! Under [`ModelPolicy::Auto`] the provider's model list is read once per
//! session and the newest mainline model becomes the primary. Any lookup
//! failure falls back to the static chain.

use serde_json::Value;

use crate::config::{ForumSettings, ModelPolicy, FORUM_MODEL_FALLBACKS};
use crate::error::BackendError;
use crate::http;

/// Whether `id` names a mainline model: `gpt-4o`, `gpt-4.1` or `gpt-5`,
/// optionally followed by dotted numeric point releases. Variants such as
/// `-mini`, `-codex` or dated snapshots are not mainline.
pub(crate) fn is_mainline(id: &str) -> bool {
    let Some(rest) = id.strip_prefix("gpt-") else {
        return false;
    };
    let tail = if let Some(tail) = rest.strip_prefix("4o") {
        tail
    } else if let Some(tail) = rest.strip_prefix("4.1") {
        tail
    } else if let Some(tail) = rest.strip_prefix('5') {
        tail
    } else {
        return false;
    };
    tail.split('.')
        .skip(1)
        .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
        && (tail.is_empty() || tail.starts_with('.'))
}

/// Numeric version components of a mainline id; `4o` counts as 4.0.
fn parse_version(id: &str) -> Vec<u32> {
    let rest = id.trim_start_matches("gpt-").replace("4o", "4.0");
    rest.split('.').filter_map(|p| p.parse().ok()).collect()
}

/// Newest mainline model in a `/models` `data` array, by version and then
/// creation time.
pub(crate) fn pick_latest(data: &[Value]) -> Option<String> {
    data.iter()
        .filter_map(|entry| {
            let id = entry.get("id")?.as_str()?;
            is_mainline(id).then(|| {
                let created = entry.get("created").and_then(Value::as_i64).unwrap_or(0);
                (parse_version(id), created, id.to_owned())
            })
        })
        .max_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)))
        .map(|(_, _, id)| id)
}

/// Ask the provider for its newest mainline model.
pub async fn latest_model(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
) -> Result<Option<String>, BackendError> {
    let url = format!("{}/models", base_url.trim_end_matches('/'));
    let response = client.get(&url).bearer_auth(api_key).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(http::status_error(status, &body));
    }
    let listing: Value = response
        .json()
        .await
        .map_err(|e| BackendError::Parse(format!("invalid model listing: {e}")))?;
    let data = listing
        .get("data")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    Ok(pick_latest(data))
}

/// The model chain for this session.
///
/// Pinned settings use the configured chain as is. Auto settings put the
/// newest listed model first, or the first static fallback when the lookup
/// fails or finds nothing.
pub async fn resolve_model_chain(
    client: &reqwest::Client,
    api_key: &str,
    settings: &ForumSettings,
) -> Vec<String> {
    if settings.policy == ModelPolicy::Pinned {
        return settings.model_chain();
    }
    let primary = match latest_model(client, &settings.api_base_url, api_key).await {
        Ok(Some(model)) => model,
        Ok(None) => {
            tracing::debug!("model listing has no mainline model, using fallback");
            FORUM_MODEL_FALLBACKS[0].to_owned()
        }
        Err(err) => {
            tracing::warn!(error = %err, "model lookup failed, using fallback");
            FORUM_MODEL_FALLBACKS[0].to_owned()
        }
    };
    tracing::debug!(model = %primary, "forum model selected");
    settings.chain_from(&primary)
}
