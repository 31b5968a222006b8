//! On-disk configuration for the pulse CLI.
//!
//! The file is TOML with four optional sections:
//!
//! ```toml
//! [credentials]
//! openai_api_key = "sk-..."
//! xai_api_key = "xai-..."
//!
//! [forum]
//! public_search = true
//! model_policy = "auto"
//! model_map = { "gpt-5" = "gpt-5-2025-08-07" }
//!
//! [social]
//! helper = "bird"
//! model = "latest"
//!
//! [search]
//! depth = "deep"
//! lookback_days = 14
//! ```
//!
//! Every field is optional; unset fields keep the library defaults. A
//! forum `model` without a `model_policy` pins that model.
//!
//! `OPENAI_API_KEY`, `XAI_API_KEY`, `OPENAI_BASE_URL`, `XAI_BASE_URL`,
//! `OPENAI_MODEL_POLICY`, `OPENAI_MODEL_PIN`, `OPENAI_MODEL_MAP` and
//! `XAI_MODEL_MAP` override the file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use pulse_search::config::{parse_model_map, Depth, ModelPolicy, SourceFilter};
use pulse_search::{Credentials, SearchConfig};

use crate::error::{PulseError, Result};

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "PULSE_CONFIG";

/// Full CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    /// API keys.
    pub credentials: CredentialsConfig,
    /// Forum backend overrides.
    pub forum: ForumConfig,
    /// Social backend overrides.
    pub social: SocialConfig,
    /// Search behaviour overrides.
    pub search: SearchSection,
}

/// API keys for the paid transports.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Key for the forum model-search API.
    pub openai_api_key: Option<String>,
    /// Key for the social search API.
    pub xai_api_key: Option<String>,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = |k: &Option<String>| k.as_ref().map(|_| "<redacted>");
        f.debug_struct("CredentialsConfig")
            .field("openai_api_key", &shown(&self.openai_api_key))
            .field("xai_api_key", &shown(&self.xai_api_key))
            .finish()
    }
}

/// `[forum]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForumConfig {
    /// Use the unauthenticated public listing as the free transport.
    pub public_search: Option<bool>,
    /// Base URL of the public listing.
    pub listing_base_url: Option<String>,
    /// Base URL of the model API.
    pub api_base_url: Option<String>,
    /// Primary model.
    pub model: Option<String>,
    /// Models tried after the primary one is refused.
    pub fallback_models: Option<Vec<String>>,
    /// `auto` looks up the newest model; `pinned` uses `model`.
    pub model_policy: Option<ModelPolicy>,
    /// Model name aliases.
    pub model_map: Option<BTreeMap<String, String>>,
}

/// `[social]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialConfig {
    /// Helper program name or path.
    pub helper: Option<String>,
    /// Base URL of the social search API.
    pub api_base_url: Option<String>,
    /// Model for the social search API; `latest` and `stable` name the
    /// default model.
    pub model: Option<String>,
    /// Model name aliases.
    pub model_map: Option<BTreeMap<String, String>>,
}

/// `[search]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    /// Default depth tier.
    pub depth: Option<Depth>,
    /// Default lookback window in days.
    pub lookback_days: Option<u32>,
    /// Default source filter.
    pub sources: Option<SourceFilter>,
    /// Per-request timeout in seconds.
    pub timeout_seconds: Option<u64>,
    /// Session deadline in seconds.
    pub session_timeout_seconds: Option<u64>,
    /// Allow a session with no reachable backend to succeed.
    pub allow_web_fallback: Option<bool>,
    /// Concurrent scoped queries per backend.
    pub phase_two_concurrency: Option<usize>,
    /// Concurrent engagement lookups.
    pub enrich_concurrency: Option<usize>,
    /// User-Agent for the public forum endpoints.
    pub user_agent: Option<String>,
}

impl PulseConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        warn_if_exposed(path);
        toml::from_str(&content)
            .map_err(|e| PulseError::Config(format!("{}: {e}", path.display())))
    }

    /// Load the effective configuration.
    ///
    /// An explicit path (from `--config` or [`CONFIG_ENV`]) must exist. The
    /// default path may be missing, in which case defaults apply.
    /// Environment overrides are applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let explicit = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(PulseError::Config(format!(
                        "config file {} does not exist",
                        path.display()
                    )));
                }
                Self::from_file(&path)?
            }
            None => {
                let path = Self::default_config_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    tracing::debug!(path = %path.display(), "no config file, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Returns the default config file path:
    /// `$XDG_CONFIG_HOME/pulse/config.toml`, else `~/.config/pulse/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("pulse").join("config.toml")
        } else if let Some(home) = dirs::home_dir() {
            home.join(".config").join("pulse").join("config.toml")
        } else {
            PathBuf::from("/tmp/pulse-config/config.toml")
        }
    }

    /// Apply environment overrides through `lookup`. Empty values are
    /// ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(key) = get("OPENAI_API_KEY") {
            self.credentials.openai_api_key = Some(key);
        }
        if let Some(key) = get("XAI_API_KEY") {
            self.credentials.xai_api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.forum.api_base_url = Some(url);
        }
        if let Some(url) = get("XAI_BASE_URL") {
            self.social.api_base_url = Some(url);
        }
        if let Some(policy) = get("OPENAI_MODEL_POLICY") {
            match policy.trim().to_ascii_lowercase().as_str() {
                "auto" => self.forum.model_policy = Some(ModelPolicy::Auto),
                "pinned" => self.forum.model_policy = Some(ModelPolicy::Pinned),
                other => tracing::warn!(policy = other, "unknown OPENAI_MODEL_POLICY ignored"),
            }
        }
        if let Some(model) = get("OPENAI_MODEL_PIN") {
            self.forum.model = Some(model.trim().to_owned());
            self.forum.model_policy = Some(ModelPolicy::Pinned);
        }
        if let Some(raw) = get("OPENAI_MODEL_MAP") {
            self.forum.model_map = Some(parse_model_map(&raw));
        }
        if let Some(raw) = get("XAI_MODEL_MAP") {
            self.social.model_map = Some(parse_model_map(&raw));
        }
    }

    /// Credentials for the session.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            self.credentials.openai_api_key.clone(),
            self.credentials.xai_api_key.clone(),
        )
    }

    /// Library configuration with this file's overrides applied.
    pub fn search_config(&self) -> SearchConfig {
        let mut config = SearchConfig::default();
        let search = &self.search;
        if let Some(depth) = search.depth {
            config.depth = depth;
        }
        if let Some(days) = search.lookback_days {
            config.lookback_days = days;
        }
        if let Some(sources) = search.sources {
            config.sources = sources;
        }
        if let Some(secs) = search.timeout_seconds {
            config.timeout_seconds = secs;
        }
        if let Some(secs) = search.session_timeout_seconds {
            config.session_timeout_seconds = secs;
        }
        if let Some(allow) = search.allow_web_fallback {
            config.allow_web_fallback = allow;
        }
        if let Some(n) = search.phase_two_concurrency {
            config.phase_two_concurrency = n;
        }
        if let Some(n) = search.enrich_concurrency {
            config.enrich_concurrency = n;
        }
        if let Some(agent) = &search.user_agent {
            config.user_agent = agent.clone();
        }

        let forum = &self.forum;
        if let Some(public) = forum.public_search {
            config.forum.public_search = public;
        }
        if let Some(url) = &forum.listing_base_url {
            config.forum.listing_base_url = url.trim_end_matches('/').to_owned();
        }
        if let Some(url) = &forum.api_base_url {
            config.forum.api_base_url = url.trim_end_matches('/').to_owned();
        }
        if let Some(model) = &forum.model {
            config.forum.model = model.clone();
            config.forum.policy = ModelPolicy::Pinned;
        }
        if let Some(policy) = forum.model_policy {
            config.forum.policy = policy;
        }
        if let Some(models) = &forum.fallback_models {
            config.forum.fallback_models = models.clone();
        }
        if let Some(map) = &forum.model_map {
            config.forum.model_map = map.clone();
        }

        let social = &self.social;
        if let Some(helper) = &social.helper {
            config.social.cli_program = helper.clone();
        }
        if let Some(url) = &social.api_base_url {
            config.social.api_base_url = url.trim_end_matches('/').to_owned();
        }
        if let Some(model) = &social.model {
            config.social.model = model.clone();
        }
        if let Some(map) = &social.model_map {
            config.social.model_map = map.clone();
        }
        config
    }
}

/// Warn when a file holding API keys is readable by group or others.
#[cfg(unix)]
fn warn_if_exposed(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(meta) = std::fs::metadata(path) {
        let mode = meta.permissions().mode();
        if mode & 0o077 != 0 {
            tracing::warn!(
                path = %path.display(),
                mode = %format!("{:o}", mode & 0o777),
                "config file is readable by other users; consider chmod 600"
            );
        }
    }
}

#[cfg(not(unix))]
fn warn_if_exposed(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_maps_to_library_defaults() {
        let config = PulseConfig::default().search_config();
        let defaults = SearchConfig::default();
        assert_eq!(config.depth, defaults.depth);
        assert_eq!(config.lookback_days, defaults.lookback_days);
        assert_eq!(config.forum, defaults.forum);
        assert_eq!(config.social, defaults.social);
    }

    #[test]
    fn sections_override_fields() {
        let config: PulseConfig = toml::from_str(
            r#"
            [forum]
            public_search = true
            api_base_url = "http://localhost:9000/v1/"
            model = "gpt-5"

            [social]
            helper = "/opt/bin/bird"

            [search]
            depth = "deep"
            lookback_days = 7
            sources = "forum"
            "#,
        )
        .expect("parse");

        let search = config.search_config();
        assert!(search.forum.public_search);
        assert_eq!(search.forum.api_base_url, "http://localhost:9000/v1");
        assert_eq!(search.forum.model_chain()[0], "gpt-5");
        assert_eq!(search.forum.policy, ModelPolicy::Pinned);
        assert_eq!(search.social.cli_program, "/opt/bin/bird");
        assert_eq!(search.depth, Depth::Deep);
        assert_eq!(search.lookback_days, 7);
        assert_eq!(search.sources, SourceFilter::Forum);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = PulseConfig {
            credentials: CredentialsConfig {
                openai_api_key: Some("from-file".into()),
                xai_api_key: Some("xai-file".into()),
            },
            ..Default::default()
        };
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "from-env"),
            ("XAI_API_KEY", "  "),
            ("XAI_BASE_URL", "http://127.0.0.1:8080/v1"),
        ]);
        config.apply_env(|name| env.get(name).map(|v| (*v).to_owned()));

        assert_eq!(config.credentials.openai_api_key.as_deref(), Some("from-env"));
        assert_eq!(config.credentials.xai_api_key.as_deref(), Some("xai-file"));
        assert_eq!(
            config.search_config().social.api_base_url,
            "http://127.0.0.1:8080/v1"
        );
    }

    #[test]
    fn model_env_overrides() {
        let mut config: PulseConfig = toml::from_str(
            r#"
            [forum]
            model_policy = "auto"
            model_map = { "gpt-4o" = "gpt-4o-2024-11-20" }
            "#,
        )
        .expect("parse");
        assert_eq!(config.search_config().forum.policy, ModelPolicy::Auto);

        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_MODEL_PIN", "gpt-5.1"),
            ("OPENAI_MODEL_MAP", "gpt-5.1=gpt-5.1-2025-11-13"),
            ("XAI_MODEL_MAP", r#"{"grok-4-1-fast": "grok-4-1-fast-reasoning"}"#),
        ]);
        config.apply_env(|name| env.get(name).map(|v| (*v).to_owned()));

        let search = config.search_config();
        assert_eq!(search.forum.policy, ModelPolicy::Pinned);
        assert_eq!(search.forum.model_chain()[0], "gpt-5.1-2025-11-13");
        assert_eq!(search.social.resolved_model(), "grok-4-1-fast-reasoning");
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = CredentialsConfig {
            openai_api_key: Some("sk-secret".into()),
            xai_api_key: None,
        };
        let shown = format!("{creds:?}");
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn unknown_depth_is_rejected() {
        let parsed: std::result::Result<PulseConfig, _> = toml::from_str("[search]\ndepth = \"huge\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = PulseConfig::default_config_path();
        assert!(path.ends_with("pulse/config.toml"));
    }
}
